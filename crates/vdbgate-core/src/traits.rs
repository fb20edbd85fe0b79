//! Collaborator traits
//!
//! The gateway never talks to a concrete database or naming registry. It
//! consumes these seams instead, so any connection pool or bean registry can
//! be plugged in.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{GatewayError, GatewayResult};

/// Opaque handle able to produce connections to a backing store.
///
/// Only factories exposing the JDBC capability are modelled as physical
/// sources in the VDB; others are still handed to the engine.
pub trait ConnectionFactory: Send + Sync + fmt::Debug {
    /// Short label for logs (e.g. "jdbc", "ldap")
    fn kind(&self) -> &str;

    /// Returns the JDBC view of this factory, if it has one
    fn as_jdbc(&self) -> Option<&dyn JdbcDataSource> {
        None
    }
}

/// JDBC-style "get connection" capability
#[async_trait]
pub trait JdbcDataSource: Send + Sync {
    /// Opens a connection to the backing store
    async fn get_connection(&self) -> GatewayResult<Box<dyn JdbcConnection>>;
}

/// An open connection, used only to read driver metadata.
#[async_trait]
pub trait JdbcConnection: Send + Sync {
    /// URL the connection was opened with
    fn url(&self) -> &str;

    /// Releases the connection
    async fn close(&mut self) -> GatewayResult<()>;
}

/// Naming registry turning a reference name into a connection factory.
pub trait ReferenceResolver: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Arc<dyn ConnectionFactory>>;

    /// Mandatory lookup: a missing name is a `ReferenceResolution` error.
    fn resolve(&self, name: &str) -> GatewayResult<Arc<dyn ConnectionFactory>> {
        self.lookup(name)
            .ok_or_else(|| GatewayError::reference_not_found(name))
    }
}
