//! EmbeddedEngine trait definition
//!
//! The federation engine itself is an external system. The gateway only
//! needs it to accept translators and connection factories, and to deploy
//! and undeploy VDB descriptors.

use std::sync::Arc;

use async_trait::async_trait;

use vdbgate_core::{ConnectionFactory, GatewayResult};

use crate::config::EngineConfig;

/// Running federation engine instance
///
/// Instances are created by an [`EngineFactory`] when the gateway starts and
/// dropped when it stops, so a restart always begins from a clean engine.
#[async_trait]
pub trait EmbeddedEngine: Send + Sync {
    /// Makes a translator available to deployed models
    fn add_translator(&mut self, translator_id: &str) -> GatewayResult<()>;

    /// Registers a connection factory under its connection key
    fn add_connection_factory(&mut self, name: &str, factory: Arc<dyn ConnectionFactory>);

    /// Deploys a marshalled VDB descriptor
    async fn deploy_vdb(&mut self, descriptor: &[u8]) -> GatewayResult<()>;

    /// Removes a deployed VDB
    ///
    /// Returns false if nothing with that name and version was deployed.
    async fn undeploy_vdb(&mut self, name: &str, version: &str) -> GatewayResult<bool>;

    /// Shuts the engine down and releases its resources
    async fn stop(&mut self) -> GatewayResult<()>;
}

/// Creates engine instances for the gateway
pub trait EngineFactory: Send + Sync {
    fn create(&self, config: &EngineConfig) -> GatewayResult<Box<dyn EmbeddedEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&EngineConfig) -> GatewayResult<Box<dyn EmbeddedEngine>> + Send + Sync,
{
    fn create(&self, config: &EngineConfig) -> GatewayResult<Box<dyn EmbeddedEngine>> {
        self(config)
    }
}
