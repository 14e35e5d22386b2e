//! Keycloak Admin API integration
//!
//! - [`session`]: TLS trust, admin token and the 401 re-authentication policy
//! - [`client`]: typed admin operations over the session
//! - [`types`]: admin API representations
//! - [`authz`]: typed authorization policies

pub mod authz;
pub mod client;
pub mod session;
pub mod types;

pub use authz::{Policy, PolicyKind, PolicyRepresentation};
pub use client::KeycloakAdminClient;
pub use session::{Session, TrustPolicy};
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

/// Admin operations the reconcile engine depends on.
///
/// Writes are idempotent: creating something that already exists and
/// deleting or unlinking something absent both succeed. Lookups return
/// `None` or an empty collection when nothing is found.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeycloakAdmin: Send + Sync {
    // Realms
    async fn get_realm(&self, realm: &str) -> Result<Option<RealmRepresentation>>;
    async fn create_realm(&self, realm: &RealmRepresentation) -> Result<()>;
    async fn update_realm(&self, realm: &RealmRepresentation) -> Result<()>;
    async fn delete_realm(&self, realm: &str) -> Result<()>;

    // Clients
    async fn find_client(&self, realm: &str, client_id: &str)
        -> Result<Option<ClientRepresentation>>;
    /// Returns the internal UUID of the (possibly pre-existing) client
    async fn create_client(&self, realm: &str, client: &ClientRepresentation) -> Result<String>;
    async fn update_client(
        &self,
        realm: &str,
        client_uuid: &str,
        client: &ClientRepresentation,
    ) -> Result<()>;
    async fn delete_client(&self, realm: &str, client_uuid: &str) -> Result<()>;

    // Roles
    async fn list_realm_roles(&self, realm: &str) -> Result<Vec<RoleRepresentation>>;
    async fn create_realm_role(&self, realm: &str, role: &RoleRepresentation) -> Result<()>;
    async fn list_client_roles(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<Vec<RoleRepresentation>>;
    async fn create_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        role: &RoleRepresentation,
    ) -> Result<()>;
    /// Update (including rename) a role in place, addressed by its ID
    async fn update_role(&self, realm: &str, role_id: &str, role: &RoleRepresentation)
        -> Result<()>;
    async fn delete_role(&self, realm: &str, role_id: &str) -> Result<()>;

    // Composite (default) roles
    async fn list_client_composites(
        &self,
        realm: &str,
        role_id: &str,
        client_uuid: &str,
    ) -> Result<Vec<RoleRepresentation>>;
    async fn add_composites(
        &self,
        realm: &str,
        role_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;
    async fn remove_composites(
        &self,
        realm: &str,
        role_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;

    // Scope mappings
    async fn list_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<MappingsRepresentation>;
    async fn add_realm_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;
    async fn remove_realm_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;
    async fn add_client_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        other_client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;
    async fn remove_client_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        other_client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;

    // Service accounts and user role mappings
    async fn get_service_account_user(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<Option<UserRepresentation>>;
    async fn list_user_role_mappings(
        &self,
        realm: &str,
        user_id: &str,
    ) -> Result<MappingsRepresentation>;
    async fn add_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;
    async fn remove_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;
    async fn add_user_client_roles(
        &self,
        realm: &str,
        user_id: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;
    async fn remove_user_client_roles(
        &self,
        realm: &str,
        user_id: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()>;

    // Client scopes
    async fn list_client_scopes(&self, realm: &str) -> Result<Vec<ClientScopeRepresentation>>;
    async fn list_client_scope_links(
        &self,
        realm: &str,
        client_uuid: &str,
        kind: ClientScopeKind,
    ) -> Result<Vec<ClientScopeRepresentation>>;
    async fn add_client_scope_link(
        &self,
        realm: &str,
        client_uuid: &str,
        kind: ClientScopeKind,
        scope_id: &str,
    ) -> Result<()>;
    async fn remove_client_scope_link(
        &self,
        realm: &str,
        client_uuid: &str,
        kind: ClientScopeKind,
        scope_id: &str,
    ) -> Result<()>;
}
