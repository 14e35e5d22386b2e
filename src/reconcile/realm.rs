//! Convergence pass for one realm resource

use super::diff::reconcile;
use crate::domain::{PassReport, RealmResource};
use crate::error::{AppError, Result};
use crate::keycloak::{KeycloakAdmin, RealmRepresentation, RoleRepresentation};
use tracing::{debug, info};

/// Name Keycloak gives the composite default role of a realm
pub fn default_role_name(realm: &str) -> String {
    format!("default-roles-{}", realm.to_lowercase())
}

fn realm_differs(actual: &RealmRepresentation, desired: &RealmRepresentation) -> bool {
    actual.enabled != desired.enabled
        || (desired.display_name.is_some() && desired.display_name != actual.display_name)
}

pub(crate) struct RealmPass<'a> {
    admin: &'a dyn KeycloakAdmin,
    resource: &'a RealmResource,
    pub report: PassReport,
}

impl<'a> RealmPass<'a> {
    pub fn new(admin: &'a dyn KeycloakAdmin, resource: &'a RealmResource) -> Self {
        Self {
            admin,
            resource,
            report: PassReport::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.resource.validate()?;
        let default_role_id = self.sync_realm().await?;
        self.sync_roles(default_role_id.as_deref()).await?;
        Ok(())
    }

    /// Returns the ID of the realm default role when known
    async fn sync_realm(&mut self) -> Result<Option<String>> {
        let desired = &self.resource.spec.realm;

        let Some(actual) = self.admin.get_realm(&desired.realm).await? else {
            let create = RealmRepresentation {
                default_role: None,
                ..desired.clone()
            };
            self.admin.create_realm(&create).await?;
            self.report.created += 1;
            info!(realm = %desired.realm, "Created realm");
            return Ok(None);
        };

        if realm_differs(&actual, desired) {
            let update = RealmRepresentation {
                id: actual.id.clone(),
                default_role: actual.default_role.clone(),
                ..desired.clone()
            };
            self.admin.update_realm(&update).await?;
            self.report.updated += 1;
            info!(realm = %desired.realm, "Updated realm");
        } else {
            debug!(realm = %desired.realm, "Realm up to date");
        }

        Ok(actual.default_role.and_then(|r| r.id))
    }

    async fn sync_roles(&mut self, default_role_id: Option<&str>) -> Result<()> {
        let Some(desired) = &self.resource.spec.roles else {
            return Ok(());
        };
        let realm = self.resource.realm_name();
        let protected = default_role_name(realm);

        // The realm default role is owned by the server
        let actual: Vec<RoleRepresentation> = self
            .admin
            .list_realm_roles(realm)
            .await?
            .into_iter()
            .filter(|r| {
                r.name != protected && (default_role_id.is_none() || r.id.as_deref() != default_role_id)
            })
            .collect();
        let diff = reconcile(&actual, desired);

        for role in &diff.to_remove {
            let id = role
                .id
                .as_deref()
                .ok_or_else(|| AppError::from(anyhow::anyhow!("Role {} has no id", role.name)))?;
            self.admin.delete_role(realm, id).await?;
            self.report.deleted += 1;
            info!(%realm, role = %role.name, "Deleted realm role");
        }

        for step in diff.ordered_updates() {
            let id = step
                .actual
                .id
                .as_deref()
                .ok_or_else(|| AppError::from(anyhow::anyhow!("Role {} has no id", step.actual.name)))?;
            let update = RoleRepresentation {
                id: Some(id.to_string()),
                name: step.name.clone(),
                client_role: false,
                container_id: step.actual.container_id.clone(),
                ..step.desired.clone()
            };
            self.admin.update_role(realm, id, &update).await?;
            self.report.updated += 1;
            info!(%realm, from = %step.actual.name, to = %step.name, parked = step.is_parked(), "Updated realm role");
        }

        for role in &diff.to_create {
            let create = RoleRepresentation {
                id: None,
                client_role: false,
                ..(*role).clone()
            };
            self.admin.create_realm_role(realm, &create).await?;
            self.report.created += 1;
            info!(%realm, role = %role.name, "Created realm role");
        }

        Ok(())
    }
}
