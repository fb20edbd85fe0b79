//! vdbgate-core: virtual database model and driver dialect registry
//!
//! Shared by the gateway and anything implementing its collaborator traits.

pub mod dialect;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use traits::{ConnectionFactory, JdbcConnection, JdbcDataSource, ReferenceResolver};
pub use types::*;
