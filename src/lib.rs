// vdbgate - Embeddable query-federation gateway
// Core library

pub mod config;
pub mod endpoint;
pub mod engine;
pub mod federation;
pub mod metrics;
pub mod observability;

pub use vdbgate_core::{GatewayError, GatewayResult};

use std::sync::Arc;

use config::GatewayConfig;
use endpoint::{BeanRegistry, EndpointAdapter, QueryEndpointFactory};
use engine::{DriverManager, EngineFactory, InMemoryEngineFactory};
use federation::FederationGateway;

/// Wiring shared by every endpoint of one routing context
pub struct GatewayContext {
    pub drivers: Arc<DriverManager>,
    pub gateway: Arc<FederationGateway>,
    pub registry: Arc<BeanRegistry>,
}

impl GatewayContext {
    pub fn new(engines: Arc<dyn EngineFactory>, config: GatewayConfig) -> Self {
        let drivers = Arc::new(DriverManager::with_known_drivers());
        let gateway = Arc::new(FederationGateway::with_drivers(
            engines,
            Arc::clone(&drivers),
            config,
        ));
        let registry = Arc::new(BeanRegistry::new());

        Self {
            drivers,
            gateway,
            registry,
        }
    }

    /// Context backed by the bundled in-memory engine
    pub fn in_memory(config: GatewayConfig) -> Self {
        Self::new(Arc::new(InMemoryEngineFactory::new()), config)
    }

    /// Adapter resolving references through this context's registry
    pub fn adapter<F: QueryEndpointFactory>(&self, factory: F) -> EndpointAdapter<F> {
        EndpointAdapter::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.registry) as Arc<dyn vdbgate_core::ReferenceResolver>,
            factory,
        )
    }
}

impl Default for GatewayContext {
    fn default() -> Self {
        Self::in_memory(GatewayConfig::default())
    }
}
