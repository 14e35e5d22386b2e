//! Convergence pass for one client resource

use super::diff::reconcile;
use super::mappings::{find_role, MappingTarget, MappingWriter, ResolvedBucket, ResolvedMappings};
use super::secrets::SecretProbe;
use crate::domain::{deprecated_secret_name, ClientResource, PassReport};
use crate::error::{AppError, Result};
use crate::keycloak::authz::normalize_policies;
use crate::keycloak::{
    ClientRepresentation, ClientScopeKind, ClientScopeRepresentation, KeycloakAdmin,
    MappingsRepresentation, RoleRepresentation,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

const SECRET_KIND: &str = "Secret";

fn role_id(role: &RoleRepresentation) -> Result<&str> {
    role.id
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Role {} has no id", role.name).into())
}

fn owned(roles: &[&RoleRepresentation]) -> Vec<RoleRepresentation> {
    roles.iter().map(|r| (*r).clone()).collect()
}

fn set_differs(desired: &[String], actual: &[String]) -> bool {
    desired.iter().collect::<BTreeSet<_>>() != actual.iter().collect::<BTreeSet<_>>()
}

fn option_differs<T: PartialEq>(desired: &Option<T>, actual: &Option<T>) -> bool {
    desired.is_some() && desired != actual
}

/// Tracked fields of the desired client differ from the live one.
///
/// Optional desired fields that are unset are not tracked; attributes are
/// compared only for keys the desired client sets.
pub(crate) fn client_differs(actual: &ClientRepresentation, desired: &ClientRepresentation) -> bool {
    actual.enabled != desired.enabled
        || actual.bearer_only != desired.bearer_only
        || actual.public_client != desired.public_client
        || actual.consent_required != desired.consent_required
        || actual.standard_flow_enabled != desired.standard_flow_enabled
        || actual.implicit_flow_enabled != desired.implicit_flow_enabled
        || actual.direct_access_grants_enabled != desired.direct_access_grants_enabled
        || actual.service_accounts_enabled != desired.service_accounts_enabled
        || actual.authorization_services_enabled != desired.authorization_services_enabled
        || actual.frontchannel_logout != desired.frontchannel_logout
        || actual.surrogate_auth_required != desired.surrogate_auth_required
        || option_differs(&desired.name, &actual.name)
        || option_differs(&desired.description, &actual.description)
        || option_differs(&desired.protocol, &actual.protocol)
        || option_differs(&desired.base_url, &actual.base_url)
        || option_differs(&desired.root_url, &actual.root_url)
        || option_differs(&desired.admin_url, &actual.admin_url)
        || option_differs(&desired.full_scope_allowed, &actual.full_scope_allowed)
        || option_differs(
            &desired.node_re_registration_timeout,
            &actual.node_re_registration_timeout,
        )
        || option_differs(
            &desired.client_authenticator_type,
            &actual.client_authenticator_type,
        )
        || set_differs(&desired.redirect_uris, &actual.redirect_uris)
        || set_differs(&desired.web_origins, &actual.web_origins)
        || desired
            .attributes
            .iter()
            .any(|(k, v)| actual.attributes.get(k) != Some(v))
}

pub(crate) struct ClientPass<'a> {
    admin: &'a dyn KeycloakAdmin,
    secrets: &'a dyn SecretProbe,
    realm: &'a str,
    resource: &'a ClientResource,
    pub report: PassReport,
    pub secondary_resources: BTreeMap<String, Vec<String>>,
    pub unmanaged: Vec<String>,
}

impl<'a> ClientPass<'a> {
    pub fn new(
        admin: &'a dyn KeycloakAdmin,
        secrets: &'a dyn SecretProbe,
        realm: &'a str,
        resource: &'a ClientResource,
    ) -> Self {
        Self {
            admin,
            secrets,
            realm,
            resource,
            report: PassReport::default(),
            secondary_resources: resource.status.secondary_resources.clone(),
            unmanaged: Vec::new(),
        }
    }

    fn client_id(&self) -> &str {
        self.resource.client_id()
    }

    /// Run every step in order; the first error aborts the rest.
    pub async fn run(&mut self) -> Result<()> {
        self.resource.validate()?;
        let client_uuid = self.sync_client().await?;
        self.sync_roles(&client_uuid).await?;
        self.sync_default_roles(&client_uuid).await?;
        self.sync_scope_mappings(&client_uuid).await?;
        self.sync_client_scopes(&client_uuid).await?;
        self.sync_service_account(&client_uuid).await?;
        self.drop_deprecated_secret().await?;
        Ok(())
    }

    fn desired_client(&self) -> Result<ClientRepresentation> {
        let mut client = self.resource.spec.client.clone();
        if let Some(settings) = client.authorization_settings.as_mut() {
            settings.policies = normalize_policies(&settings.policies)?;
        }
        Ok(client)
    }

    // ============================================================================
    // 1. Entity
    // ============================================================================

    async fn sync_client(&mut self) -> Result<String> {
        let desired = self.desired_client()?;

        let Some(actual) = self.admin.find_client(self.realm, &desired.client_id).await? else {
            if self.admin.get_realm(self.realm).await?.is_none() {
                return Err(AppError::reference("realm", self.realm));
            }
            let client_uuid = self.admin.create_client(self.realm, &desired).await?;
            self.report.created += 1;
            info!(realm = %self.realm, client_id = %desired.client_id, %client_uuid, "Created client");
            return Ok(client_uuid);
        };

        let client_uuid = actual.id.clone().ok_or_else(|| {
            AppError::from(anyhow::anyhow!("Client {} has no id", desired.client_id))
        })?;

        if client_differs(&actual, &desired) {
            let mut update = desired;
            update.id = Some(client_uuid.clone());
            self.admin
                .update_client(self.realm, &client_uuid, &update)
                .await?;
            self.report.updated += 1;
            info!(realm = %self.realm, client_id = %update.client_id, "Updated client");
        } else {
            debug!(client_id = %desired.client_id, "Client up to date");
        }

        Ok(client_uuid)
    }

    // ============================================================================
    // 2. Client roles
    // ============================================================================

    async fn sync_roles(&mut self, client_uuid: &str) -> Result<()> {
        let actual = self.admin.list_client_roles(self.realm, client_uuid).await?;
        let diff = reconcile(&actual, &self.resource.spec.roles);

        for role in &diff.to_remove {
            self.admin.delete_role(self.realm, role_id(role)?).await?;
            self.report.deleted += 1;
            info!(client_id = %self.client_id(), role = %role.name, "Deleted client role");
        }

        for step in diff.ordered_updates() {
            let id = role_id(step.actual)?;
            let update = RoleRepresentation {
                id: Some(id.to_string()),
                name: step.name.clone(),
                client_role: true,
                container_id: step.actual.container_id.clone(),
                ..step.desired.clone()
            };
            self.admin.update_role(self.realm, id, &update).await?;
            self.report.updated += 1;
            info!(
                client_id = %self.client_id(),
                from = %step.actual.name,
                to = %step.name,
                parked = step.is_parked(),
                "Updated client role"
            );
        }

        for role in &diff.to_create {
            let create = RoleRepresentation {
                id: None,
                client_role: true,
                ..(*role).clone()
            };
            self.admin
                .create_client_role(self.realm, client_uuid, &create)
                .await?;
            self.report.created += 1;
            info!(client_id = %self.client_id(), role = %role.name, "Created client role");
        }

        Ok(())
    }

    // ============================================================================
    // 3. Default roles
    // ============================================================================

    async fn sync_default_roles(&mut self, client_uuid: &str) -> Result<()> {
        let wanted = &self.resource.spec.default_roles;

        let realm = self
            .admin
            .get_realm(self.realm)
            .await?
            .ok_or_else(|| AppError::reference("realm", self.realm))?;
        let default_role_id = match realm.default_role.and_then(|r| r.id) {
            Some(id) => id,
            None if wanted.is_empty() => {
                debug!(realm = %self.realm, "Realm has no default role");
                return Ok(());
            }
            None => return Err(AppError::reference("default role", self.realm)),
        };

        let actual = self
            .admin
            .list_client_composites(self.realm, &default_role_id, client_uuid)
            .await?;
        let live = self.admin.list_client_roles(self.realm, client_uuid).await?;
        let desired = wanted
            .iter()
            .map(|name| {
                find_role(&live, None, name)
                    .cloned()
                    .ok_or_else(|| AppError::reference("client role", name.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;

        let diff = reconcile(&actual, &desired);
        if !diff.to_remove.is_empty() {
            self.admin
                .remove_composites(self.realm, &default_role_id, &owned(&diff.to_remove))
                .await?;
            self.report.unlinked += diff.to_remove.len() as u64;
        }
        if !diff.to_create.is_empty() {
            self.admin
                .add_composites(self.realm, &default_role_id, &owned(&diff.to_create))
                .await?;
            self.report.linked += diff.to_create.len() as u64;
        }
        if !diff.to_remove.is_empty() || !diff.to_create.is_empty() {
            info!(
                client_id = %self.client_id(),
                removed = diff.to_remove.len(),
                added = diff.to_create.len(),
                "Converged default roles"
            );
        }

        Ok(())
    }

    // ============================================================================
    // 4. Scope mappings
    // ============================================================================

    /// Resolve every desired role before anything is written
    async fn resolve_scope_mappings(&self, desired: &MappingsRepresentation) -> Result<ResolvedMappings> {
        let mut resolved = ResolvedMappings::default();

        if !desired.realm_mappings.is_empty() {
            let live = self.admin.list_realm_roles(self.realm).await?;
            for role in &desired.realm_mappings {
                let found = find_role(&live, role.id.as_deref(), &role.name)
                    .ok_or_else(|| AppError::reference("realm role", role.name.as_str()))?;
                resolved.realm.push(found.clone());
            }
        }

        for (client_id, bucket) in &desired.client_mappings {
            let wanted = bucket
                .mappings
                .iter()
                .map(|r| (r.id.as_deref(), r.name.as_str()));
            resolved
                .clients
                .push(self.resolve_client_roles(client_id, wanted).await?);
        }

        Ok(resolved)
    }

    async fn resolve_client_roles<'r>(
        &self,
        client_id: &str,
        wanted: impl Iterator<Item = (Option<&'r str>, &'r str)>,
    ) -> Result<ResolvedBucket> {
        let client = self
            .admin
            .find_client(self.realm, client_id)
            .await?
            .ok_or_else(|| AppError::reference("client", client_id))?;
        let client_uuid = client
            .id
            .ok_or_else(|| AppError::reference("client", client_id))?;
        let live = self.admin.list_client_roles(self.realm, &client_uuid).await?;

        let roles = wanted
            .map(|(id, name)| {
                find_role(&live, id, name)
                    .cloned()
                    .ok_or_else(|| AppError::reference(format!("{} client role", client_id), name))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedBucket {
            client_id: client_id.to_string(),
            client_uuid,
            roles,
        })
    }

    async fn sync_scope_mappings(&mut self, client_uuid: &str) -> Result<()> {
        let Some(desired) = &self.resource.spec.scope_mappings else {
            return Ok(());
        };

        let resolved = self.resolve_scope_mappings(desired).await?;
        let actual = self.admin.list_scope_mappings(self.realm, client_uuid).await?;

        let writer = MappingWriter::new(
            self.admin,
            self.realm,
            MappingTarget::ClientScope { client_uuid },
        );
        self.report += writer.converge(&actual, &resolved).await?;
        Ok(())
    }

    // ============================================================================
    // 4b. Client scopes
    // ============================================================================

    async fn sync_client_scopes(&mut self, client_uuid: &str) -> Result<()> {
        let client = &self.resource.spec.client;
        let wanted: Vec<(ClientScopeKind, &[String])> = [
            (ClientScopeKind::Default, client.default_client_scopes.as_slice()),
            (ClientScopeKind::Optional, client.optional_client_scopes.as_slice()),
        ]
        .into_iter()
        .filter(|(_, names)| !names.is_empty())
        .collect();
        if wanted.is_empty() {
            return Ok(());
        }

        let available = self.admin.list_client_scopes(self.realm).await?;

        let mut plans = Vec::new();
        for (kind, names) in wanted {
            let desired = names
                .iter()
                .map(|name| {
                    available
                        .iter()
                        .find(|s| &s.name == name)
                        .cloned()
                        .ok_or_else(|| AppError::reference(kind.to_string(), name.as_str()))
                })
                .collect::<Result<Vec<ClientScopeRepresentation>>>()?;
            let actual = self
                .admin
                .list_client_scope_links(self.realm, client_uuid, kind)
                .await?;
            plans.push((kind, actual, desired));
        }

        // Unlink everything first so a scope can move between kinds
        for (kind, actual, desired) in &plans {
            for scope in reconcile(actual, desired).to_remove {
                let Some(id) = scope.id.as_deref() else { continue };
                self.admin
                    .remove_client_scope_link(self.realm, client_uuid, *kind, id)
                    .await?;
                self.report.unlinked += 1;
                info!(client_id = %self.client_id(), scope = %scope.name, %kind, "Unlinked client scope");
            }
        }
        for (kind, actual, desired) in &plans {
            for scope in reconcile(actual, desired).to_create {
                let Some(id) = scope.id.as_deref() else { continue };
                self.admin
                    .add_client_scope_link(self.realm, client_uuid, *kind, id)
                    .await?;
                self.report.linked += 1;
                info!(client_id = %self.client_id(), scope = %scope.name, %kind, "Linked client scope");
            }
        }

        Ok(())
    }

    // ============================================================================
    // 5. Service account
    // ============================================================================

    async fn sync_service_account(&mut self, client_uuid: &str) -> Result<()> {
        let spec = &self.resource.spec;
        if !spec.client.service_accounts_enabled {
            if !spec.service_account_realm_roles.is_empty()
                || !spec.service_account_client_roles.is_empty()
            {
                warn!(
                    client_id = %self.client_id(),
                    "Service account roles configured but service accounts are disabled"
                );
            }
            return Ok(());
        }

        let user = self
            .admin
            .get_service_account_user(self.realm, client_uuid)
            .await?
            .ok_or_else(|| AppError::reference("service account user", self.client_id()))?;

        let mut resolved = ResolvedMappings::default();
        if !spec.service_account_realm_roles.is_empty() {
            let live = self.admin.list_realm_roles(self.realm).await?;
            for name in &spec.service_account_realm_roles {
                let found = find_role(&live, None, name)
                    .ok_or_else(|| AppError::reference("realm role", name.as_str()))?;
                resolved.realm.push(found.clone());
            }
        }
        for (client_id, names) in &spec.service_account_client_roles {
            let wanted = names.iter().map(|n| (None, n.as_str()));
            resolved
                .clients
                .push(self.resolve_client_roles(client_id, wanted).await?);
        }

        let actual = self
            .admin
            .list_user_role_mappings(self.realm, &user.id)
            .await?;

        let writer = MappingWriter::new(
            self.admin,
            self.realm,
            MappingTarget::User { user_id: &user.id },
        );
        self.report += writer.converge(&actual, &resolved).await?;
        Ok(())
    }

    // ============================================================================
    // 6. Deprecated secret
    // ============================================================================

    /// A legacy-named credential secret becomes unmanaged once seen
    async fn drop_deprecated_secret(&mut self) -> Result<()> {
        let name = deprecated_secret_name(self.client_id());
        if !self
            .secrets
            .secret_exists(&self.resource.metadata.namespace, &name)
            .await?
        {
            return Ok(());
        }

        if let Some(secrets) = self.secondary_resources.get_mut(SECRET_KIND) {
            secrets.retain(|s| s != &name);
            if secrets.is_empty() {
                self.secondary_resources.remove(SECRET_KIND);
            }
        }
        warn!(client_id = %self.client_id(), secret = %name, "Deprecated client secret is no longer managed");
        self.unmanaged.push(name);
        Ok(())
    }
}
