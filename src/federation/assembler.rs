// SPDX-License-Identifier: Apache-2.0

//! VDB Assembler
//!
//! Turns registered connection factories into physical models of the
//! default VDB. The translator of each model is inferred from the JDBC
//! driver that accepts the factory's connection URL, because users only
//! ever name a data source, never a dialect.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use vdbgate_core::{
    dialect, ConnectionFactory, GatewayError, GatewayResult, JdbcDataSource, PhysicalModel,
    VdbDescriptor,
};

use crate::engine::registry::DriverManager;
use crate::metrics;
use crate::observability::sensitive::redact_url;

/// Builds the default VDB one data source at a time
#[derive(Debug)]
pub struct VdbAssembler {
    descriptor: VdbDescriptor,
    drivers: Arc<DriverManager>,
    probe_timeout: Duration,
}

impl VdbAssembler {
    pub fn new(drivers: Arc<DriverManager>, probe_timeout: Duration) -> Self {
        Self {
            descriptor: VdbDescriptor::default_vdb(),
            drivers,
            probe_timeout,
        }
    }

    pub fn descriptor(&self) -> &VdbDescriptor {
        &self.descriptor
    }

    /// Replaces the descriptor, used to roll back a failed federation
    pub fn restore(&mut self, descriptor: VdbDescriptor) {
        self.descriptor = descriptor;
    }

    /// Ensures a physical model exists for the named factory.
    ///
    /// Returns `true` if a model was added, `false` if the name was already
    /// modelled or the factory has no JDBC capability.
    #[instrument(skip(self, factory), fields(kind = factory.kind()))]
    pub async fn register_data_source(
        &mut self,
        name: &str,
        factory: &dyn ConnectionFactory,
    ) -> GatewayResult<bool> {
        if self.descriptor.has_model(name) {
            debug!("Model already present, skipping");
            return Ok(false);
        }

        let Some(jdbc) = factory.as_jdbc() else {
            debug!("Factory is not a JDBC data source, no physical model created");
            return Ok(false);
        };

        let url = self.probe_url(name, jdbc).await?;

        let driver = self.drivers.driver_for_url(&url).ok_or_else(|| {
            GatewayError::probe_failed(name, format!("No suitable driver for {}", redact_url(&url)))
        })?;

        let translator = dialect::resolve_translator(&driver.class_name)?;

        self.descriptor
            .add_model(PhysicalModel::for_data_source(name, translator));

        info!(
            driver = %driver.class_name,
            translator,
            models = self.descriptor.len(),
            "Physical model added to VDB"
        );
        Ok(true)
    }

    /// Opens and closes one connection to learn the URL it was opened with.
    async fn probe_url(&self, name: &str, jdbc: &dyn JdbcDataSource) -> GatewayResult<String> {
        let probe = async {
            let mut conn = jdbc.get_connection().await?;
            let url = conn.url().to_string();
            if let Err(e) = conn.close().await {
                warn!(error = %e, "Failed to close probe connection");
            }
            Ok::<_, GatewayError>(url)
        };

        let result = match timeout(self.probe_timeout, probe).await {
            Ok(result) => result.map_err(|e| match e {
                err @ GatewayError::ConnectionProbe { .. } => err,
                other => GatewayError::probe_failed(name, other.to_string()),
            }),
            Err(_) => {
                metrics::record_timeout();
                Err(GatewayError::deployment(format!(
                    "Connection probe for '{name}' timed out after {}ms",
                    self.probe_timeout.as_millis()
                )))
            }
        };

        metrics::record_probe(result.is_ok());
        result
    }
}
