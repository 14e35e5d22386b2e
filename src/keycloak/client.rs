//! Keycloak Admin API client
//!
//! Thin request/response wrappers over [`Session`]. Each operation maps to
//! one admin endpoint; the idempotency rules of [`KeycloakAdmin`] are
//! applied here so the engine never sees a `Conflict` from a create or a
//! `NotFound` from a delete.

use super::session::Session;
use super::types::*;
use super::KeycloakAdmin;
use crate::config::KeycloakConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Keycloak Admin API client
#[derive(Clone)]
pub struct KeycloakAdminClient {
    session: Session,
}

fn enc(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn realm_path(realm: &str) -> String {
    format!("/admin/realms/{}", enc(realm))
}

fn client_path(realm: &str, client_uuid: &str) -> String {
    format!("{}/clients/{}", realm_path(realm), enc(client_uuid))
}

fn role_by_id_path(realm: &str, role_id: &str) -> String {
    format!("{}/roles-by-id/{}", realm_path(realm), enc(role_id))
}

fn user_role_mappings_path(realm: &str, user_id: &str) -> String {
    format!("{}/users/{}/role-mappings", realm_path(realm), enc(user_id))
}

/// Last path segment of the `Location` header of a 201 response
fn created_id(response: &Response) -> Option<String> {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .and_then(|location| location.trim_end_matches('/').split('/').next_back())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

impl KeycloakAdminClient {
    /// Create a new admin client with its own session
    pub fn new(config: &KeycloakConfig) -> Result<Self> {
        Ok(Self {
            session: Session::new(config)?,
        })
    }

    pub fn from_session(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .session
            .request::<()>(Method::GET, path, None)
            .await?;
        Ok(response.json().await?)
    }

    /// GET that maps 404 to `None`
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get_json(path).await {
            Ok(value) => Ok(Some(value)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET of a collection; a missing parent reads as empty
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        Ok(self.get_optional(path).await?.unwrap_or_default())
    }

    /// POST that treats 409 as success; returns the created ID when known
    async fn create<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Option<String>> {
        match self.session.request(Method::POST, path, Some(body)).await {
            Ok(response) => Ok(created_id(&response)),
            Err(AppError::Conflict(msg)) => {
                debug!(%path, "Already exists: {}", msg);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// DELETE (optionally with a body) that treats 404 as success
    async fn remove<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<()> {
        match self.session.request(Method::DELETE, path, body).await {
            Ok(_) => Ok(()),
            Err(AppError::NotFound(_)) => {
                debug!(%path, "Already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn put<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<()> {
        self.session.request(Method::PUT, path, body).await?;
        Ok(())
    }

    async fn link_roles(&self, path: &str, roles: &[RoleRepresentation]) -> Result<()> {
        if roles.is_empty() {
            return Ok(());
        }
        self.create(path, roles).await.map(|_| ())
    }

    async fn unlink_roles(&self, path: &str, roles: &[RoleRepresentation]) -> Result<()> {
        if roles.is_empty() {
            return Ok(());
        }
        self.remove(path, Some(roles)).await
    }
}

#[async_trait]
impl KeycloakAdmin for KeycloakAdminClient {
    // ============================================================================
    // Realms
    // ============================================================================

    async fn get_realm(&self, realm: &str) -> Result<Option<RealmRepresentation>> {
        self.get_optional(&realm_path(realm)).await
    }

    async fn create_realm(&self, realm: &RealmRepresentation) -> Result<()> {
        self.create("/admin/realms", realm).await.map(|_| ())
    }

    async fn update_realm(&self, realm: &RealmRepresentation) -> Result<()> {
        self.put(&realm_path(&realm.realm), Some(realm)).await
    }

    async fn delete_realm(&self, realm: &str) -> Result<()> {
        self.remove::<()>(&realm_path(realm), None).await
    }

    // ============================================================================
    // Clients
    // ============================================================================

    async fn find_client(
        &self,
        realm: &str,
        client_id: &str,
    ) -> Result<Option<ClientRepresentation>> {
        let path = format!("{}/clients?clientId={}", realm_path(realm), enc(client_id));
        let clients: Vec<ClientRepresentation> = self.get_list(&path).await?;
        // clientId search may be fuzzy on older servers
        Ok(clients.into_iter().find(|c| c.client_id == client_id))
    }

    async fn create_client(&self, realm: &str, client: &ClientRepresentation) -> Result<String> {
        let path = format!("{}/clients", realm_path(realm));
        if let Some(uuid) = self.create(&path, client).await? {
            return Ok(uuid);
        }

        // Conflict or no Location header: the client exists, look its UUID up
        self.find_client(realm, &client.client_id)
            .await?
            .and_then(|c| c.id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Client {} not found after creation",
                    client.client_id
                ))
            })
    }

    async fn update_client(
        &self,
        realm: &str,
        client_uuid: &str,
        client: &ClientRepresentation,
    ) -> Result<()> {
        self.put(&client_path(realm, client_uuid), Some(client))
            .await
    }

    async fn delete_client(&self, realm: &str, client_uuid: &str) -> Result<()> {
        self.remove::<()>(&client_path(realm, client_uuid), None)
            .await
    }

    // ============================================================================
    // Roles
    // ============================================================================

    async fn list_realm_roles(&self, realm: &str) -> Result<Vec<RoleRepresentation>> {
        self.get_list(&format!("{}/roles", realm_path(realm))).await
    }

    async fn create_realm_role(&self, realm: &str, role: &RoleRepresentation) -> Result<()> {
        self.create(&format!("{}/roles", realm_path(realm)), role)
            .await
            .map(|_| ())
    }

    async fn list_client_roles(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<Vec<RoleRepresentation>> {
        self.get_list(&format!("{}/roles", client_path(realm, client_uuid)))
            .await
    }

    async fn create_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        role: &RoleRepresentation,
    ) -> Result<()> {
        self.create(&format!("{}/roles", client_path(realm, client_uuid)), role)
            .await
            .map(|_| ())
    }

    async fn update_role(
        &self,
        realm: &str,
        role_id: &str,
        role: &RoleRepresentation,
    ) -> Result<()> {
        self.put(&role_by_id_path(realm, role_id), Some(role)).await
    }

    async fn delete_role(&self, realm: &str, role_id: &str) -> Result<()> {
        self.remove::<()>(&role_by_id_path(realm, role_id), None)
            .await
    }

    // ============================================================================
    // Composite (default) roles
    // ============================================================================

    async fn list_client_composites(
        &self,
        realm: &str,
        role_id: &str,
        client_uuid: &str,
    ) -> Result<Vec<RoleRepresentation>> {
        let path = format!(
            "{}/composites/clients/{}",
            role_by_id_path(realm, role_id),
            enc(client_uuid)
        );
        self.get_list(&path).await
    }

    async fn add_composites(
        &self,
        realm: &str,
        role_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!("{}/composites", role_by_id_path(realm, role_id));
        self.link_roles(&path, roles).await
    }

    async fn remove_composites(
        &self,
        realm: &str,
        role_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!("{}/composites", role_by_id_path(realm, role_id));
        self.unlink_roles(&path, roles).await
    }

    // ============================================================================
    // Scope mappings
    // ============================================================================

    async fn list_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<MappingsRepresentation> {
        let path = format!("{}/scope-mappings", client_path(realm, client_uuid));
        Ok(self.get_optional(&path).await?.unwrap_or_default())
    }

    async fn add_realm_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!("{}/scope-mappings/realm", client_path(realm, client_uuid));
        self.link_roles(&path, roles).await
    }

    async fn remove_realm_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!("{}/scope-mappings/realm", client_path(realm, client_uuid));
        self.unlink_roles(&path, roles).await
    }

    async fn add_client_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        other_client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!(
            "{}/scope-mappings/clients/{}",
            client_path(realm, client_uuid),
            enc(other_client_uuid)
        );
        self.link_roles(&path, roles).await
    }

    async fn remove_client_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        other_client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!(
            "{}/scope-mappings/clients/{}",
            client_path(realm, client_uuid),
            enc(other_client_uuid)
        );
        self.unlink_roles(&path, roles).await
    }

    // ============================================================================
    // Service accounts and user role mappings
    // ============================================================================

    async fn get_service_account_user(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<Option<UserRepresentation>> {
        let path = format!("{}/service-account-user", client_path(realm, client_uuid));
        self.get_optional(&path).await
    }

    async fn list_user_role_mappings(
        &self,
        realm: &str,
        user_id: &str,
    ) -> Result<MappingsRepresentation> {
        Ok(self
            .get_optional(&user_role_mappings_path(realm, user_id))
            .await?
            .unwrap_or_default())
    }

    async fn add_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!("{}/realm", user_role_mappings_path(realm, user_id));
        self.link_roles(&path, roles).await
    }

    async fn remove_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!("{}/realm", user_role_mappings_path(realm, user_id));
        self.unlink_roles(&path, roles).await
    }

    async fn add_user_client_roles(
        &self,
        realm: &str,
        user_id: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!(
            "{}/clients/{}",
            user_role_mappings_path(realm, user_id),
            enc(client_uuid)
        );
        self.link_roles(&path, roles).await
    }

    async fn remove_user_client_roles(
        &self,
        realm: &str,
        user_id: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let path = format!(
            "{}/clients/{}",
            user_role_mappings_path(realm, user_id),
            enc(client_uuid)
        );
        self.unlink_roles(&path, roles).await
    }

    // ============================================================================
    // Client scopes
    // ============================================================================

    async fn list_client_scopes(&self, realm: &str) -> Result<Vec<ClientScopeRepresentation>> {
        self.get_list(&format!("{}/client-scopes", realm_path(realm)))
            .await
    }

    async fn list_client_scope_links(
        &self,
        realm: &str,
        client_uuid: &str,
        kind: ClientScopeKind,
    ) -> Result<Vec<ClientScopeRepresentation>> {
        let path = format!("{}/{}", client_path(realm, client_uuid), kind.path_segment());
        self.get_list(&path).await
    }

    async fn add_client_scope_link(
        &self,
        realm: &str,
        client_uuid: &str,
        kind: ClientScopeKind,
        scope_id: &str,
    ) -> Result<()> {
        let path = format!(
            "{}/{}/{}",
            client_path(realm, client_uuid),
            kind.path_segment(),
            enc(scope_id)
        );
        match self.put::<()>(&path, None).await {
            Err(AppError::Conflict(_)) => Ok(()),
            other => other,
        }
    }

    async fn remove_client_scope_link(
        &self,
        realm: &str,
        client_uuid: &str,
        kind: ClientScopeKind,
        scope_id: &str,
    ) -> Result<()> {
        let path = format!(
            "{}/{}/{}",
            client_path(realm, client_uuid),
            kind.path_segment(),
            enc(scope_id)
        );
        self.remove::<()>(&path, None).await
    }
}
