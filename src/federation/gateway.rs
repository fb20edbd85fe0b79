// SPDX-License-Identifier: Apache-2.0

//! Federation Gateway
//!
//! Owns the embedded engine for the lifetime of a routing context. The
//! engine is created lazily on first need, collects data sources, and
//! redeploys the default VDB whenever the set of sources grows.
//!
//! Every mutation runs under one async lock: redeployment is undeploy then
//! deploy, so two interleaved redeployments could drop models.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use vdbgate_core::{
    federated_url, ConnectionFactory, GatewayError, GatewayResult, VdbDescriptor,
    ENGINE_DRIVER_CLASS, VDB_NAME, VDB_VERSION,
};

use crate::config::{EngineConfig, GatewayConfig};
use crate::engine::registry::DriverManager;
use crate::engine::traits::{EmbeddedEngine, EngineFactory};
use crate::federation::assembler::VdbAssembler;
use crate::federation::descriptor;
use crate::metrics;

/// Lifecycle state of the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Uninitialized,
    Started,
    Stopped,
}

/// Everything that lives exactly as long as one engine instance
struct EngineSession {
    engine: Box<dyn EmbeddedEngine>,
    assembler: VdbAssembler,
    sources: BTreeMap<String, Arc<dyn ConnectionFactory>>,
    deployed_at: Option<DateTime<Utc>>,
}

struct GatewayState {
    status: GatewayStatus,
    session: Option<EngineSession>,
}

/// Process-wide federation entry point, shared behind an `Arc`
pub struct FederationGateway {
    factory: Arc<dyn EngineFactory>,
    drivers: Arc<DriverManager>,
    config: GatewayConfig,
    state: Mutex<GatewayState>,
}

impl FederationGateway {
    pub fn new(factory: Arc<dyn EngineFactory>, config: GatewayConfig) -> Self {
        Self::with_drivers(factory, Arc::new(DriverManager::with_known_drivers()), config)
    }

    pub fn with_drivers(
        factory: Arc<dyn EngineFactory>,
        drivers: Arc<DriverManager>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            factory,
            drivers,
            config,
            state: Mutex::new(GatewayState {
                status: GatewayStatus::Uninitialized,
                session: None,
            }),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Driver class clients use against [`Self::federated_url`]
    pub fn driver_class(&self) -> &'static str {
        ENGINE_DRIVER_CLASS
    }

    pub async fn status(&self) -> GatewayStatus {
        self.state.lock().await.status
    }

    /// Snapshot of the VDB being assembled, `None` while no engine runs
    pub async fn descriptor(&self) -> Option<VdbDescriptor> {
        let state = self.state.lock().await;
        state
            .session
            .as_ref()
            .map(|session| session.assembler.descriptor().clone())
    }

    /// When the default VDB was last deployed by the running engine
    pub async fn deployed_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state.session.as_ref().and_then(|session| session.deployed_at)
    }

    /// Names registered with the running engine, sorted
    pub async fn data_sources(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .session
            .as_ref()
            .map(|session| session.sources.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Starts the engine with an explicit configuration. No-op when started.
    pub async fn start(&self, config: &EngineConfig) -> GatewayResult<()> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state, config)
    }

    /// Starts the engine with the gateway's own engine configuration
    pub async fn ensure_started(&self) -> GatewayResult<()> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state, &self.config.engine)
    }

    /// Stops the engine.
    ///
    /// Teardown errors are logged and swallowed; the gateway always ends up
    /// stopped and a later start creates a fresh engine.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;

        match state.session.take() {
            Some(mut session) => {
                if let Err(e) = session.engine.stop().await {
                    warn!(error = %e, "Engine teardown failed, continuing shutdown");
                }
                info!(sources = session.sources.len(), "Federation gateway stopped");
            }
            None => debug!(status = ?state.status, "Gateway not running, nothing to stop"),
        }

        if state.status == GatewayStatus::Started {
            state.status = GatewayStatus::Stopped;
        }
    }

    /// Registers a data source with the engine and the VDB.
    ///
    /// Starts the gateway if needed. Returns `true` if a physical model was
    /// added; repeated names are ignored.
    pub async fn add_data_source(
        &self,
        name: &str,
        factory: Arc<dyn ConnectionFactory>,
    ) -> GatewayResult<bool> {
        let mut state = self.state.lock().await;
        let session = self.session_mut(&mut state)?;
        Self::add_locked(session, name, factory).await
    }

    /// Redeploys the default VDB from the current descriptor
    pub async fn deploy_default_vdb(&self) -> GatewayResult<()> {
        let mut state = self.state.lock().await;
        let session = self.session_mut(&mut state)?;
        self.deploy_locked(session).await
    }

    /// Registers every data source and redeploys in one critical section.
    ///
    /// Returns the federated URL. Any failure aborts the whole call and puts
    /// the descriptor and source set back to where they were, so a bad source
    /// never leaks into later deployments.
    #[instrument(skip(self, sources), fields(count = sources.len()))]
    pub async fn federate(
        &self,
        sources: &[(String, Arc<dyn ConnectionFactory>)],
    ) -> GatewayResult<String> {
        let mut state = self.state.lock().await;
        let session = self.session_mut(&mut state)?;

        let snapshot = session.assembler.descriptor().clone();
        let registered: BTreeSet<String> = session.sources.keys().cloned().collect();

        if let Err(e) = self.register_and_deploy(session, sources).await {
            session.assembler.restore(snapshot);
            session.sources.retain(|name, _| registered.contains(name));
            debug!(
                models = session.assembler.descriptor().len(),
                "Federation rolled back"
            );
            return Err(e);
        }

        Ok(federated_url(VDB_NAME))
    }

    /// URL of the deployed default VDB
    pub async fn federated_url(&self) -> GatewayResult<String> {
        let state = self.state.lock().await;
        match state.session.as_ref() {
            Some(session) if session.deployed_at.is_some() => Ok(federated_url(VDB_NAME)),
            _ => Err(GatewayError::not_deployed(VDB_NAME)),
        }
    }

    fn session_mut<'a>(&self, state: &'a mut GatewayState) -> GatewayResult<&'a mut EngineSession> {
        self.start_locked(state, &self.config.engine)?;
        state
            .session
            .as_mut()
            .ok_or_else(|| GatewayError::internal("Gateway started without an engine"))
    }

    #[instrument(skip(self, state, config), fields(translators = config.translators.len()))]
    fn start_locked(&self, state: &mut GatewayState, config: &EngineConfig) -> GatewayResult<()> {
        if state.session.is_some() {
            return Ok(());
        }

        let mut engine = self.factory.create(config)?;
        for translator in &config.translators {
            engine.add_translator(translator)?;
        }

        state.session = Some(EngineSession {
            engine,
            assembler: VdbAssembler::new(
                Arc::clone(&self.drivers),
                Duration::from_millis(self.config.probe_timeout_ms),
            ),
            sources: BTreeMap::new(),
            deployed_at: None,
        });
        state.status = GatewayStatus::Started;
        info!("Federation gateway started");
        Ok(())
    }

    #[instrument(skip(session, factory), fields(kind = factory.kind()))]
    async fn add_locked(
        session: &mut EngineSession,
        name: &str,
        factory: Arc<dyn ConnectionFactory>,
    ) -> GatewayResult<bool> {
        if name.trim().is_empty() {
            return Err(GatewayError::validation("Data source name must not be empty"));
        }
        if session.sources.contains_key(name) {
            debug!("Data source already registered");
            return Ok(false);
        }

        // Probe first so a failing source leaves no trace in the engine.
        let modelled = session
            .assembler
            .register_data_source(name, factory.as_ref())
            .await?;

        session
            .engine
            .add_connection_factory(name, Arc::clone(&factory));
        session.sources.insert(name.to_string(), factory);
        Ok(modelled)
    }

    async fn register_and_deploy(
        &self,
        session: &mut EngineSession,
        sources: &[(String, Arc<dyn ConnectionFactory>)],
    ) -> GatewayResult<()> {
        for (name, factory) in sources {
            Self::add_locked(session, name, Arc::clone(factory)).await?;
        }
        self.deploy_locked(session).await
    }

    #[instrument(skip(self, session))]
    async fn deploy_locked(&self, session: &mut EngineSession) -> GatewayResult<()> {
        let started = Instant::now();
        let limit = Duration::from_millis(self.config.deploy_timeout_ms);

        let mut undeployed = false;
        let result = match descriptor::marshal(session.assembler.descriptor()) {
            Ok(raw) => {
                let engine = &mut session.engine;
                let undeployed = &mut undeployed;
                let cycle = async move {
                    let removed = engine.undeploy_vdb(VDB_NAME, VDB_VERSION).await?;
                    *undeployed = true;
                    debug!(removed, "Previous VDB undeployed");
                    engine.deploy_vdb(&raw).await
                };
                match timeout(limit, cycle).await {
                    Ok(result) => result,
                    Err(_) => {
                        metrics::record_timeout();
                        Err(GatewayError::deployment(format!(
                            "Deployment timed out after {}ms",
                            self.config.deploy_timeout_ms
                        )))
                    }
                }
            }
            Err(e) => Err(e),
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::record_deployment(elapsed_ms, result.is_ok());

        match result {
            Ok(()) => {
                session.deployed_at = Some(Utc::now());
                info!(
                    models = session.assembler.descriptor().len(),
                    elapsed_ms, "Default VDB deployed"
                );
                Ok(())
            }
            Err(e) => {
                // The previous VDB is gone once the undeploy went through.
                if undeployed {
                    session.deployed_at = None;
                }
                let e = e.into_deployment();
                warn!(error = %e, "Default VDB deployment failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::datasource::JdbcUrlDataSource;
    use crate::engine::memory::InMemoryEngineFactory;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct OpaqueFactory;

    impl ConnectionFactory for OpaqueFactory {
        fn kind(&self) -> &str {
            "opaque"
        }
    }

    /// Engine whose every operation fails
    struct BrokenEngine;

    #[async_trait]
    impl EmbeddedEngine for BrokenEngine {
        fn add_translator(&mut self, _translator_id: &str) -> GatewayResult<()> {
            Ok(())
        }

        fn add_connection_factory(&mut self, _name: &str, _factory: Arc<dyn ConnectionFactory>) {}

        async fn deploy_vdb(&mut self, _descriptor: &[u8]) -> GatewayResult<()> {
            Err(GatewayError::engine("disk full"))
        }

        async fn undeploy_vdb(&mut self, _name: &str, _version: &str) -> GatewayResult<bool> {
            Ok(false)
        }

        async fn stop(&mut self) -> GatewayResult<()> {
            Err(GatewayError::engine("teardown exploded"))
        }
    }

    fn broken_factory(_config: &EngineConfig) -> GatewayResult<Box<dyn EmbeddedEngine>> {
        Ok(Box::new(BrokenEngine))
    }

    fn h2(name: &str) -> Arc<dyn ConnectionFactory> {
        Arc::new(JdbcUrlDataSource::new(name, format!("jdbc:h2:mem:{name}")))
    }

    fn gateway() -> (Arc<InMemoryEngineFactory>, FederationGateway) {
        let engines = Arc::new(InMemoryEngineFactory::new());
        let gateway = FederationGateway::new(engines.clone(), GatewayConfig::default());
        (engines, gateway)
    }

    #[tokio::test]
    async fn test_lazy_start() {
        let (engines, gateway) = gateway();
        assert_eq!(gateway.status().await, GatewayStatus::Uninitialized);
        assert!(engines.latest().is_none());
        assert!(gateway.descriptor().await.is_none());

        gateway.add_data_source("dbA", h2("dbA")).await.unwrap();
        assert_eq!(gateway.status().await, GatewayStatus::Started);
        assert!(engines.latest().unwrap().is_running());
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_registers_translators() {
        let (engines, gateway) = gateway();
        let config = EngineConfig {
            translators: vec!["h2".to_string(), "oracle".to_string()],
        };
        gateway.start(&config).await.unwrap();
        let first = engines.latest().unwrap();
        gateway.start(&config).await.unwrap();
        gateway.ensure_started().await.unwrap();

        assert_eq!(first.translators(), vec!["h2", "oracle"]);
        // No second engine was created.
        assert_eq!(engines.latest().unwrap().translators(), first.translators());
    }

    #[tokio::test]
    async fn test_federated_url_requires_deployment() {
        let (_, gateway) = gateway();
        assert_eq!(
            gateway.federated_url().await.unwrap_err(),
            GatewayError::not_deployed("default")
        );

        assert!(gateway.deployed_at().await.is_none());
        gateway.deploy_default_vdb().await.unwrap();
        assert!(gateway.deployed_at().await.is_some());
        assert_eq!(gateway.federated_url().await.unwrap(), "jdbc:teiid:default");
        assert_eq!(gateway.driver_class(), "org.teiid.jdbc.TeiidDriver");
    }

    #[tokio::test]
    async fn test_federate_registers_and_deploys() {
        let (engines, gateway) = gateway();
        let sources = vec![
            ("dbA".to_string(), h2("dbA")),
            (
                "dbB".to_string(),
                Arc::new(JdbcUrlDataSource::new("dbB", "jdbc:derby:memory:dbB;create=true"))
                    as Arc<dyn ConnectionFactory>,
            ),
        ];

        let url = gateway.federate(&sources).await.unwrap();
        assert_eq!(url, "jdbc:teiid:default");

        let engine = engines.latest().unwrap();
        let deployed = engine.deployed("default", "1.0.0").unwrap();
        let translators: Vec<&str> = deployed
            .descriptor
            .models()
            .iter()
            .map(|m| m.translator_id())
            .collect();
        assert_eq!(translators, vec!["h2", "derby"]);
        assert_eq!(engine.connection_keys(), vec!["dbA", "dbB"]);
        assert_eq!(gateway.data_sources().await, vec!["dbA", "dbB"]);
    }

    #[tokio::test]
    async fn test_redeploy_is_cumulative() {
        let (engines, gateway) = gateway();
        gateway
            .federate(&[("dbA".to_string(), h2("dbA"))])
            .await
            .unwrap();
        gateway
            .federate(&[("dbA".to_string(), h2("dbA")), ("dbC".to_string(), h2("dbC"))])
            .await
            .unwrap();

        let engine = engines.latest().unwrap();
        assert_eq!(engine.deploy_count(), 2);
        let deployed = engine.deployed("default", "1.0.0").unwrap();
        assert_eq!(deployed.descriptor.len(), 2);
        assert!(deployed.descriptor.has_model("dbA"));
        assert!(deployed.descriptor.has_model("dbC"));
    }

    #[tokio::test]
    async fn test_non_jdbc_factory_registered_but_not_modelled() {
        let (engines, gateway) = gateway();
        let added = gateway
            .add_data_source("ldap", Arc::new(OpaqueFactory))
            .await
            .unwrap();
        assert!(!added);
        assert_eq!(engines.latest().unwrap().connection_keys(), vec!["ldap"]);
        assert!(gateway.descriptor().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_probe_leaves_no_registration() {
        let (engines, gateway) = gateway();
        let bad = Arc::new(JdbcUrlDataSource::new("bad", "not-a-jdbc-url"));
        let err = gateway.add_data_source("bad", bad).await.unwrap_err();
        assert!(matches!(err, GatewayError::ConnectionProbe { .. }));
        assert!(engines.latest().unwrap().connection_keys().is_empty());
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let (_, gateway) = gateway();
        let err = gateway.add_data_source(" ", h2("x")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_missing_translator_is_deployment_error() {
        let engines = Arc::new(InMemoryEngineFactory::new());
        let mut config = GatewayConfig::default();
        config.engine.translators = vec!["oracle".to_string()];
        let gateway = FederationGateway::new(engines, config);

        let err = gateway
            .federate(&[("dbA".to_string(), h2("dbA"))])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Deployment { .. }));
        assert!(err.to_string().contains("Translator h2"));
        assert!(gateway.federated_url().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_deploy_rolls_back_and_later_federation_succeeds() {
        let engines = Arc::new(InMemoryEngineFactory::new());
        let mut config = GatewayConfig::default();
        config.engine.translators = vec!["h2".to_string()];
        let gateway = FederationGateway::new(engines.clone(), config);

        gateway
            .federate(&[("dbA".to_string(), h2("dbA"))])
            .await
            .unwrap();
        assert!(gateway.deployed_at().await.is_some());

        // hsql is not registered with the engine, so this deploy fails after
        // the previous VDB was undeployed.
        let hsql: Arc<dyn ConnectionFactory> =
            Arc::new(JdbcUrlDataSource::new("dbX", "jdbc:hsqldb:mem:dbX"));
        let err = gateway
            .federate(&[("dbX".to_string(), hsql)])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Deployment { .. }));
        assert!(err.to_string().contains("hsql"));

        let engine = engines.latest().unwrap();
        assert!(engine.deployed("default", "1.0.0").is_none());
        assert!(gateway.deployed_at().await.is_none());
        assert!(gateway.federated_url().await.is_err());
        assert!(!gateway.descriptor().await.unwrap().has_model("dbX"));
        assert_eq!(gateway.data_sources().await, vec!["dbA"]);

        let url = gateway
            .federate(&[("dbB".to_string(), h2("dbB"))])
            .await
            .unwrap();
        assert_eq!(url, "jdbc:teiid:default");
        let deployed = engine.deployed("default", "1.0.0").unwrap();
        let names: Vec<&str> = deployed
            .descriptor
            .models()
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["dbA", "dbB"]);
        assert_eq!(gateway.federated_url().await.unwrap(), "jdbc:teiid:default");
    }

    #[tokio::test]
    async fn test_bad_source_in_batch_rolls_back_earlier_sources() {
        let (_, gateway) = gateway();
        let bad: Arc<dyn ConnectionFactory> =
            Arc::new(JdbcUrlDataSource::new("bad", "not-a-jdbc-url"));
        let err = gateway
            .federate(&[("dbA".to_string(), h2("dbA")), ("bad".to_string(), bad)])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ConnectionProbe { .. }));
        assert!(gateway.descriptor().await.unwrap().is_empty());
        assert!(gateway.data_sources().await.is_empty());
    }

    #[tokio::test]
    async fn test_engine_failure_wrapped_as_deployment() {
        let gateway = FederationGateway::new(Arc::new(broken_factory), GatewayConfig::default());
        let err = gateway.deploy_default_vdb().await.unwrap_err();
        assert_eq!(err, GatewayError::deployment("Engine error: disk full"));
    }

    #[tokio::test]
    async fn test_stop_twice_and_loose_teardown() {
        let gateway = FederationGateway::new(Arc::new(broken_factory), GatewayConfig::default());
        gateway.ensure_started().await.unwrap();

        gateway.stop().await;
        assert_eq!(gateway.status().await, GatewayStatus::Stopped);
        gateway.stop().await;
        assert_eq!(gateway.status().await, GatewayStatus::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let (_, gateway) = gateway();
        gateway.stop().await;
        assert_eq!(gateway.status().await, GatewayStatus::Uninitialized);
    }

    #[tokio::test]
    async fn test_restart_uses_fresh_engine() {
        let (engines, gateway) = gateway();
        gateway
            .federate(&[("dbA".to_string(), h2("dbA"))])
            .await
            .unwrap();
        let first = engines.latest().unwrap();

        gateway.stop().await;
        assert!(!first.is_running());
        assert!(gateway.federated_url().await.is_err());

        gateway
            .federate(&[("dbB".to_string(), h2("dbB"))])
            .await
            .unwrap();
        let second = engines.latest().unwrap();
        let deployed = second.deployed("default", "1.0.0").unwrap();
        assert_eq!(deployed.descriptor.len(), 1);
        assert!(deployed.descriptor.has_model("dbB"));
        assert_eq!(gateway.status().await, GatewayStatus::Started);
    }

    #[tokio::test]
    async fn test_concurrent_federation_keeps_all_models() {
        let (engines, gateway) = gateway();
        let gateway = Arc::new(gateway);

        let mut handles = Vec::new();
        for i in 0..8 {
            let gateway = Arc::clone(&gateway);
            handles.push(tokio::spawn(async move {
                let name = format!("db{i}");
                gateway.federate(&[(name.clone(), h2(&name))]).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let deployed = engines.latest().unwrap().deployed("default", "1.0.0").unwrap();
        assert_eq!(deployed.descriptor.len(), 8);
    }
}
