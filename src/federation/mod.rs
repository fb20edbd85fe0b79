// SPDX-License-Identifier: Apache-2.0

//! Multi-Source Federation
//!
//! Assembles registered data sources into the default VDB and deploys it to
//! the embedded engine, so one federated URL reaches all of them.

pub mod assembler;
pub mod descriptor;
pub mod gateway;

pub use assembler::VdbAssembler;
pub use gateway::{FederationGateway, GatewayStatus};
