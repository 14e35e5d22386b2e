//! Convergence of desired resources against the admin API
//!
//! - [`diff`]: the set reconciliation primitive
//! - [`engine`]: per-resource passes and their outcome
//! - [`discovery`]: realm selection for clients
//! - [`secrets`]: lookup of externally managed secrets

mod client;
pub mod diff;
pub mod discovery;
pub mod engine;
mod mappings;
mod realm;
pub mod secrets;

pub use diff::{reconcile, Identified, RoleDiff, RoleMatch, RoleUpdate};
pub use discovery::{find_realm, RealmLookupError};
pub use engine::ReconcileEngine;
pub use realm::default_role_name;
pub use secrets::{NoopSecretProbe, SecretProbe};
