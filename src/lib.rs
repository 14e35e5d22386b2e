//! kcsync core - Keycloak reconciliation engine
//!
//! This crate converges realms, clients, roles, default roles, scope mappings
//! and service-account role bindings on a Keycloak server to a declared
//! desired state, and reports the outcome as a resource status.

pub mod config;
pub mod domain;
pub mod error;
pub mod keycloak;
pub mod reconcile;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
pub use reconcile::ReconcileEngine;
