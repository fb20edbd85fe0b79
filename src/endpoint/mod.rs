// SPDX-License-Identifier: Apache-2.0

//! Routing endpoint integration
//!
//! Turns endpoint URIs into query endpoints, federating multi-source ones
//! through the gateway.

pub mod adapter;
pub mod params;
pub mod placeholder;
pub mod registry;

pub use adapter::{
    EndpointAdapter, EndpointTarget, FederatedEndpointConfig, LifecycleSql, QueryEndpointFactory,
    QueryEndpointSpec,
};
pub use params::{parse_endpoint_uri, EndpointParameters, EndpointUri};
pub use registry::BeanRegistry;
