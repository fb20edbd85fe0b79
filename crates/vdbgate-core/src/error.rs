// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the vdbgate federation gateway
//!
//! Every failure raised while wiring data sources into the embedded engine
//! is mapped to one of these variants, so the endpoint-creation caller only
//! ever has to handle a single error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all gateway operations
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Must not specify {conflicting_key} together with {key}")]
    ConfigurationConflict { key: String, conflicting_key: String },

    #[error("Could not find translator for {driver_class}")]
    DialectResolution { driver_class: String },

    #[error("Connection probe failed for data source '{data_source}': {message}")]
    ConnectionProbe { data_source: String, message: String },

    #[error("VDB deployment failed: {message}")]
    Deployment { message: String },

    #[error("No reference found in registry for name: {name}")]
    ReferenceResolution { name: String },

    #[error("VDB {vdb} has not been deployed yet")]
    NotDeployed { vdb: String },

    #[error("Engine error: {message}")]
    Engine { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    pub fn conflict(key: impl Into<String>, conflicting_key: impl Into<String>) -> Self {
        Self::ConfigurationConflict {
            key: key.into(),
            conflicting_key: conflicting_key.into(),
        }
    }

    pub fn dialect_not_found(driver_class: impl Into<String>) -> Self {
        Self::DialectResolution {
            driver_class: driver_class.into(),
        }
    }

    pub fn probe_failed(data_source: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ConnectionProbe {
            data_source: data_source.into(),
            message: msg.into(),
        }
    }

    pub fn deployment(msg: impl Into<String>) -> Self {
        Self::Deployment { message: msg.into() }
    }

    pub fn reference_not_found(name: impl Into<String>) -> Self {
        Self::ReferenceResolution { name: name.into() }
    }

    pub fn not_deployed(vdb: impl Into<String>) -> Self {
        Self::NotDeployed { vdb: vdb.into() }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine { message: msg.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation { message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config { message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { message: msg.into() }
    }

    /// Wraps any error raised while marshalling or deploying a VDB.
    ///
    /// Errors that are already deployment errors pass through untouched so
    /// their message is not nested twice.
    pub fn into_deployment(self) -> Self {
        match self {
            err @ Self::Deployment { .. } => err,
            other => Self::Deployment {
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
