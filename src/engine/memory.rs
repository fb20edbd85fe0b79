// SPDX-License-Identifier: Apache-2.0

//! In-process federation engine
//!
//! Keeps translators, connection factories and deployed VDBs in memory and
//! validates every deployment against them. It performs no query execution;
//! it gives the gateway a working engine for embedding and tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use vdbgate_core::{ConnectionFactory, GatewayError, GatewayResult, VdbDescriptor};

use crate::config::EngineConfig;
use crate::engine::traits::{EmbeddedEngine, EngineFactory};
use crate::federation::descriptor;

/// A VDB accepted by the engine
#[derive(Debug, Clone)]
pub struct DeployedVdb {
    pub descriptor: VdbDescriptor,
    pub raw: Vec<u8>,
}

#[derive(Debug, Default)]
struct EngineState {
    running: bool,
    translators: BTreeSet<String>,
    connection_factories: HashMap<String, Arc<dyn ConnectionFactory>>,
    deployed: BTreeMap<(String, String), DeployedVdb>,
    deploy_count: u64,
}

/// Engine keeping all state in process memory
pub struct InMemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        let state = EngineState {
            running: true,
            ..EngineState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Returns a handle observing this engine's state
    pub fn handle(&self) -> InMemoryEngineHandle {
        InMemoryEngineHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddedEngine for InMemoryEngine {
    fn add_translator(&mut self, translator_id: &str) -> GatewayResult<()> {
        if translator_id.trim().is_empty() {
            return Err(GatewayError::validation("Translator id must not be empty"));
        }
        self.state.lock().translators.insert(translator_id.to_string());
        Ok(())
    }

    fn add_connection_factory(&mut self, name: &str, factory: Arc<dyn ConnectionFactory>) {
        debug!(connection = name, kind = factory.kind(), "Connection factory registered");
        self.state
            .lock()
            .connection_factories
            .insert(name.to_string(), factory);
    }

    async fn deploy_vdb(&mut self, raw: &[u8]) -> GatewayResult<()> {
        let vdb = descriptor::unmarshal(raw)?;
        let mut state = self.state.lock();

        if !state.running {
            return Err(GatewayError::engine("Engine is not running"));
        }

        let key = (vdb.name.clone(), vdb.version.clone());
        if state.deployed.contains_key(&key) {
            return Err(GatewayError::engine(format!(
                "VDB {}.{} is already deployed",
                vdb.name, vdb.version
            )));
        }

        for model in vdb.models() {
            if !state.translators.contains(model.translator_id()) {
                return Err(GatewayError::engine(format!(
                    "Translator {} used by model {} is not registered",
                    model.translator_id(),
                    model.name
                )));
            }
            if !state
                .connection_factories
                .contains_key(&model.source.connection_key)
            {
                return Err(GatewayError::engine(format!(
                    "No connection factory registered for {}",
                    model.source.connection_key
                )));
            }
        }

        info!(vdb = %vdb.name, version = %vdb.version, models = vdb.len(), "VDB deployed");
        state.deployed.insert(
            key,
            DeployedVdb {
                descriptor: vdb,
                raw: raw.to_vec(),
            },
        );
        state.deploy_count += 1;
        Ok(())
    }

    async fn undeploy_vdb(&mut self, name: &str, version: &str) -> GatewayResult<bool> {
        let removed = self
            .state
            .lock()
            .deployed
            .remove(&(name.to_string(), version.to_string()))
            .is_some();
        Ok(removed)
    }

    async fn stop(&mut self) -> GatewayResult<()> {
        let mut state = self.state.lock();
        state.running = false;
        state.deployed.clear();
        state.connection_factories.clear();
        Ok(())
    }
}

/// Read-only view of an [`InMemoryEngine`]
#[derive(Clone)]
pub struct InMemoryEngineHandle {
    state: Arc<Mutex<EngineState>>,
}

impl InMemoryEngineHandle {
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn deployed(&self, name: &str, version: &str) -> Option<DeployedVdb> {
        self.state
            .lock()
            .deployed
            .get(&(name.to_string(), version.to_string()))
            .cloned()
    }

    pub fn translators(&self) -> Vec<String> {
        self.state.lock().translators.iter().cloned().collect()
    }

    pub fn connection_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state
            .lock()
            .connection_factories
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of successful deployments since the engine was created
    pub fn deploy_count(&self) -> u64 {
        self.state.lock().deploy_count
    }
}

/// Factory creating [`InMemoryEngine`]s and remembering the latest one
#[derive(Default)]
pub struct InMemoryEngineFactory {
    latest: Mutex<Option<InMemoryEngineHandle>>,
}

impl InMemoryEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the most recently created engine
    pub fn latest(&self) -> Option<InMemoryEngineHandle> {
        self.latest.lock().clone()
    }
}

impl EngineFactory for InMemoryEngineFactory {
    fn create(&self, _config: &EngineConfig) -> GatewayResult<Box<dyn EmbeddedEngine>> {
        let engine = InMemoryEngine::new();
        *self.latest.lock() = Some(engine.handle());
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdbgate_core::PhysicalModel;

    #[derive(Debug)]
    struct StubFactory;

    impl ConnectionFactory for StubFactory {
        fn kind(&self) -> &str {
            "stub"
        }
    }

    fn marshal(models: &[(&str, &str)]) -> Vec<u8> {
        let mut vdb = VdbDescriptor::default_vdb();
        for (name, translator) in models {
            vdb.add_model(PhysicalModel::for_data_source(*name, *translator));
        }
        descriptor::marshal(&vdb).unwrap()
    }

    #[tokio::test]
    async fn test_deploy_and_undeploy() {
        let mut engine = InMemoryEngine::new();
        let handle = engine.handle();
        engine.add_translator("h2").unwrap();
        engine.add_connection_factory("dbA", Arc::new(StubFactory));

        engine.deploy_vdb(&marshal(&[("dbA", "h2")])).await.expect("deploy failed");
        let deployed = handle.deployed("default", "1.0.0").expect("not deployed");
        assert_eq!(deployed.descriptor.len(), 1);
        assert_eq!(handle.deploy_count(), 1);

        assert!(engine.undeploy_vdb("default", "1.0.0").await.unwrap());
        assert!(!engine.undeploy_vdb("default", "1.0.0").await.unwrap());
        assert!(handle.deployed("default", "1.0.0").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_deploy_rejected() {
        let mut engine = InMemoryEngine::new();
        engine.deploy_vdb(&marshal(&[])).await.unwrap();
        let err = engine.deploy_vdb(&marshal(&[])).await.unwrap_err();
        assert!(matches!(err, GatewayError::Engine { .. }));
    }

    #[tokio::test]
    async fn test_unregistered_translator_rejected() {
        let mut engine = InMemoryEngine::new();
        engine.add_connection_factory("dbA", Arc::new(StubFactory));
        let err = engine.deploy_vdb(&marshal(&[("dbA", "h2")])).await.unwrap_err();
        assert!(err.to_string().contains("Translator h2"));
    }

    #[tokio::test]
    async fn test_missing_connection_factory_rejected() {
        let mut engine = InMemoryEngine::new();
        engine.add_translator("h2").unwrap();
        let err = engine.deploy_vdb(&marshal(&[("dbA", "h2")])).await.unwrap_err();
        assert!(err.to_string().contains("No connection factory registered for dbA"));
    }

    #[tokio::test]
    async fn test_stopped_engine_rejects_deploy() {
        let mut engine = InMemoryEngine::new();
        let handle = engine.handle();
        engine.stop().await.unwrap();
        assert!(!handle.is_running());
        assert!(engine.deploy_vdb(&marshal(&[])).await.is_err());
    }

    #[test]
    fn test_empty_translator_rejected() {
        let mut engine = InMemoryEngine::new();
        assert!(engine.add_translator("  ").is_err());
    }

    #[test]
    fn test_factory_tracks_latest_engine() {
        let factory = InMemoryEngineFactory::new();
        assert!(factory.latest().is_none());
        let mut engine = factory.create(&EngineConfig::default()).unwrap();
        engine.add_translator("oracle").unwrap();
        assert_eq!(factory.latest().unwrap().translators(), vec!["oracle".to_string()]);
    }
}
