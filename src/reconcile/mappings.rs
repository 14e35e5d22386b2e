//! Exact-set convergence of role mappings
//!
//! Scope mappings of a client and direct role mappings of a user share the
//! same shape (a realm bucket plus one bucket per other client), so both go
//! through [`MappingWriter::converge`].

use super::diff::reconcile;
use crate::domain::PassReport;
use crate::error::Result;
use crate::keycloak::{KeycloakAdmin, MappingsRepresentation, RoleRepresentation};
use tracing::{debug, info};

/// Whose mappings are written
#[derive(Debug, Clone, Copy)]
pub(crate) enum MappingTarget<'a> {
    /// Scope mappings of a client
    ClientScope { client_uuid: &'a str },
    /// Direct role mappings of a (service account) user
    User { user_id: &'a str },
}

/// Desired roles of one other client, resolved against live roles
#[derive(Debug, Clone)]
pub(crate) struct ResolvedBucket {
    pub client_id: String,
    pub client_uuid: String,
    pub roles: Vec<RoleRepresentation>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ResolvedMappings {
    pub realm: Vec<RoleRepresentation>,
    pub clients: Vec<ResolvedBucket>,
}

/// Live role with the given non-empty ID, else with the given name
pub(crate) fn find_role<'r>(
    live: &'r [RoleRepresentation],
    id: Option<&str>,
    name: &str,
) -> Option<&'r RoleRepresentation> {
    id.filter(|id| !id.is_empty())
        .and_then(|id| live.iter().find(|r| r.id.as_deref() == Some(id)))
        .or_else(|| live.iter().find(|r| r.name == name))
}

fn owned(roles: &[&RoleRepresentation]) -> Vec<RoleRepresentation> {
    roles.iter().map(|r| (*r).clone()).collect()
}

pub(crate) struct MappingWriter<'a> {
    admin: &'a dyn KeycloakAdmin,
    realm: &'a str,
    target: MappingTarget<'a>,
}

impl<'a> MappingWriter<'a> {
    pub fn new(admin: &'a dyn KeycloakAdmin, realm: &'a str, target: MappingTarget<'a>) -> Self {
        Self {
            admin,
            realm,
            target,
        }
    }

    async fn add_realm(&self, roles: &[RoleRepresentation]) -> Result<()> {
        match self.target {
            MappingTarget::ClientScope { client_uuid } => {
                self.admin
                    .add_realm_scope_mappings(self.realm, client_uuid, roles)
                    .await
            }
            MappingTarget::User { user_id } => {
                self.admin
                    .add_user_realm_roles(self.realm, user_id, roles)
                    .await
            }
        }
    }

    async fn remove_realm(&self, roles: &[RoleRepresentation]) -> Result<()> {
        match self.target {
            MappingTarget::ClientScope { client_uuid } => {
                self.admin
                    .remove_realm_scope_mappings(self.realm, client_uuid, roles)
                    .await
            }
            MappingTarget::User { user_id } => {
                self.admin
                    .remove_user_realm_roles(self.realm, user_id, roles)
                    .await
            }
        }
    }

    async fn add_client(&self, other_uuid: &str, roles: &[RoleRepresentation]) -> Result<()> {
        match self.target {
            MappingTarget::ClientScope { client_uuid } => {
                self.admin
                    .add_client_scope_mappings(self.realm, client_uuid, other_uuid, roles)
                    .await
            }
            MappingTarget::User { user_id } => {
                self.admin
                    .add_user_client_roles(self.realm, user_id, other_uuid, roles)
                    .await
            }
        }
    }

    async fn remove_client(&self, other_uuid: &str, roles: &[RoleRepresentation]) -> Result<()> {
        match self.target {
            MappingTarget::ClientScope { client_uuid } => {
                self.admin
                    .remove_client_scope_mappings(self.realm, client_uuid, other_uuid, roles)
                    .await
            }
            MappingTarget::User { user_id } => {
                self.admin
                    .remove_user_client_roles(self.realm, user_id, other_uuid, roles)
                    .await
            }
        }
    }

    /// Make `actual` exactly `desired`; buckets of clients not desired are emptied.
    pub async fn converge(
        &self,
        actual: &MappingsRepresentation,
        desired: &ResolvedMappings,
    ) -> Result<PassReport> {
        let mut report = PassReport::default();

        let diff = reconcile(&actual.realm_mappings, &desired.realm);
        if !diff.to_remove.is_empty() {
            self.remove_realm(&owned(&diff.to_remove)).await?;
            report.unlinked += diff.to_remove.len() as u64;
        }
        if !diff.to_create.is_empty() {
            self.add_realm(&owned(&diff.to_create)).await?;
            report.linked += diff.to_create.len() as u64;
        }
        if !diff.to_remove.is_empty() || !diff.to_create.is_empty() {
            info!(
                mapping = ?self.target,
                removed = diff.to_remove.len(),
                added = diff.to_create.len(),
                "Converged realm role mappings"
            );
        }

        for bucket in &desired.clients {
            let current = actual
                .client_mappings
                .get(&bucket.client_id)
                .map(|m| m.mappings.as_slice())
                .unwrap_or_default();
            let diff = reconcile(current, &bucket.roles);
            if !diff.to_remove.is_empty() {
                self.remove_client(&bucket.client_uuid, &owned(&diff.to_remove))
                    .await?;
                report.unlinked += diff.to_remove.len() as u64;
            }
            if !diff.to_create.is_empty() {
                self.add_client(&bucket.client_uuid, &owned(&diff.to_create))
                    .await?;
                report.linked += diff.to_create.len() as u64;
            }
            if !diff.to_remove.is_empty() || !diff.to_create.is_empty() {
                info!(
                    mapping = ?self.target,
                    client_id = %bucket.client_id,
                    removed = diff.to_remove.len(),
                    added = diff.to_create.len(),
                    "Converged client role mappings"
                );
            }
        }

        for (client_id, current) in &actual.client_mappings {
            if current.mappings.is_empty()
                || desired.clients.iter().any(|b| &b.client_id == client_id)
            {
                continue;
            }
            let other_uuid = match &current.id {
                Some(id) => Some(id.clone()),
                None => self
                    .admin
                    .find_client(self.realm, client_id)
                    .await?
                    .and_then(|c| c.id),
            };
            let Some(other_uuid) = other_uuid else {
                debug!(%client_id, "Mapped client no longer exists");
                continue;
            };
            self.remove_client(&other_uuid, &current.mappings).await?;
            report.unlinked += current.mappings.len() as u64;
            info!(
                mapping = ?self.target,
                %client_id,
                removed = current.mappings.len(),
                "Removed role mappings of undesired client"
            );
        }

        Ok(report)
    }
}
