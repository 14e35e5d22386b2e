//! Common test utilities: an in-memory Keycloak admin API

#![allow(dead_code)]

use async_trait::async_trait;
use kcsync_core::error::{AppError, Result};
use kcsync_core::keycloak::{
    ClientMappingsRepresentation, ClientRepresentation, ClientScopeKind,
    ClientScopeRepresentation, KeycloakAdmin, MappingsRepresentation, RealmRepresentation,
    RoleRepresentation, UserRepresentation,
};
use kcsync_core::reconcile::SecretProbe;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Default)]
struct RealmState {
    rep: RealmRepresentation,
    roles: Vec<RoleRepresentation>,
    clients: Vec<ClientRepresentation>,
    /// client uuid -> roles
    client_roles: BTreeMap<String, Vec<RoleRepresentation>>,
    /// composite role id -> member role ids
    composites: BTreeMap<String, BTreeSet<String>>,
    /// client uuid -> scope-mapped role ids
    scope_mappings: BTreeMap<String, BTreeSet<String>>,
    users: BTreeMap<String, UserRepresentation>,
    /// user id -> directly mapped role ids
    user_roles: BTreeMap<String, BTreeSet<String>>,
    client_scopes: Vec<ClientScopeRepresentation>,
    /// (client uuid, kind) -> linked scope ids
    scope_links: BTreeMap<(String, &'static str), BTreeSet<String>>,
}

impl RealmState {
    fn role(&self, id: &str) -> Option<&RoleRepresentation> {
        self.roles
            .iter()
            .chain(self.client_roles.values().flatten())
            .find(|r| r.id.as_deref() == Some(id))
    }

    fn role_mut(&mut self, id: &str) -> Option<&mut RoleRepresentation> {
        self.roles
            .iter_mut()
            .chain(self.client_roles.values_mut().flatten())
            .find(|r| r.id.as_deref() == Some(id))
    }

    /// The roles sharing a container (the realm or one client) with role `id`
    fn siblings(&self, id: &str) -> Option<&[RoleRepresentation]> {
        std::iter::once(&self.roles)
            .chain(self.client_roles.values())
            .find(|roles| roles.iter().any(|r| r.id.as_deref() == Some(id)))
            .map(Vec::as_slice)
    }

    fn client_by_uuid(&self, uuid: &str) -> Option<&ClientRepresentation> {
        self.clients.iter().find(|c| c.id.as_deref() == Some(uuid))
    }

    fn client_by_id(&self, client_id: &str) -> Option<&ClientRepresentation> {
        self.clients.iter().find(|c| c.client_id == client_id)
    }

    fn mappings(&self, role_ids: &BTreeSet<String>) -> MappingsRepresentation {
        let mut mappings = MappingsRepresentation::default();
        for id in role_ids {
            if let Some(role) = self.roles.iter().find(|r| r.id.as_deref() == Some(id)) {
                mappings.realm_mappings.push(role.clone());
                continue;
            }
            for (uuid, roles) in &self.client_roles {
                if let Some(role) = roles.iter().find(|r| r.id.as_deref() == Some(id)) {
                    let client = self.client_by_uuid(uuid).map(|c| c.client_id.clone()).unwrap_or_default();
                    mappings
                        .client_mappings
                        .entry(client.clone())
                        .or_insert_with(|| ClientMappingsRepresentation {
                            id: Some(uuid.clone()),
                            client,
                            mappings: Vec::new(),
                        })
                        .mappings
                        .push(role.clone());
                }
            }
        }
        mappings
    }

    fn ensure_service_account(&mut self, client: &ClientRepresentation, next_id: &mut u64) {
        if !client.service_accounts_enabled {
            return;
        }
        let uuid = client.id.clone().unwrap_or_default();
        if self
            .users
            .values()
            .any(|u| u.service_account_client_id.as_deref() == Some(uuid.as_str()))
        {
            return;
        }
        *next_id += 1;
        let user_id = format!("user-{}", next_id);
        self.users.insert(
            user_id.clone(),
            UserRepresentation {
                id: user_id,
                username: format!("service-account-{}", client.client_id),
                enabled: true,
                service_account_client_id: Some(uuid),
            },
        );
    }

    fn forget_role(&mut self, id: &str) {
        for members in self.composites.values_mut() {
            members.remove(id);
        }
        for ids in self.scope_mappings.values_mut() {
            ids.remove(id);
        }
        for ids in self.user_roles.values_mut() {
            ids.remove(id);
        }
    }
}

#[derive(Default)]
struct State {
    realms: BTreeMap<String, RealmState>,
    next_id: u64,
    writes: Vec<String>,
    fail_next: Option<String>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn realm(&mut self, realm: &str) -> Result<&mut RealmState> {
        self.realms
            .get_mut(realm)
            .ok_or_else(|| AppError::NotFound(format!("realm {}", realm)))
    }

    /// Record a mutating call; fails it when armed with `fail_next`
    fn write(&mut self, op: &str, detail: String) -> Result<()> {
        if self.fail_next.as_deref() == Some(op) {
            self.fail_next = None;
            return Err(AppError::Transient(format!("{} timed out", op)));
        }
        self.writes.push(format!("{} {}", op, detail));
        Ok(())
    }
}

/// In-memory admin API with the idempotency rules of the real client
#[derive(Default)]
pub struct FakeKeycloak {
    state: Mutex<State>,
}

impl FakeKeycloak {
    pub fn with_realm(realm: &str) -> Self {
        let fake = Self::default();
        fake.add_realm(realm);
        fake
    }

    pub fn add_realm(&self, realm: &str) {
        let mut state = self.state.lock().unwrap();
        let default_id = state.id("role");
        let default_role = RoleRepresentation {
            id: Some(default_id.clone()),
            name: format!("default-roles-{}", realm),
            composite: true,
            container_id: Some(realm.to_string()),
            ..Default::default()
        };
        let realm_state = RealmState {
            rep: RealmRepresentation {
                id: Some(realm.to_string()),
                realm: realm.to_string(),
                enabled: true,
                display_name: None,
                default_role: Some(default_role.clone()),
            },
            roles: vec![default_role],
            composites: [(default_id, BTreeSet::new())].into(),
            ..Default::default()
        };
        state.realms.insert(realm.to_string(), realm_state);
    }

    pub fn add_realm_role(&self, realm: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.id("role");
        state.realms.get_mut(realm).unwrap().roles.push(RoleRepresentation {
            id: Some(id.clone()),
            name: name.to_string(),
            container_id: Some(realm.to_string()),
            ..Default::default()
        });
        id
    }

    pub fn add_client(&self, realm: &str, client_id: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let uuid = state.id("client");
        let realm_state = state.realms.get_mut(realm).unwrap();
        realm_state.clients.push(ClientRepresentation {
            id: Some(uuid.clone()),
            client_id: client_id.to_string(),
            enabled: true,
            ..Default::default()
        });
        realm_state.client_roles.insert(uuid.clone(), Vec::new());
        uuid
    }

    pub fn add_client_role(&self, realm: &str, client_uuid: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.id("role");
        state
            .realms
            .get_mut(realm)
            .unwrap()
            .client_roles
            .get_mut(client_uuid)
            .unwrap()
            .push(RoleRepresentation {
                id: Some(id.clone()),
                name: name.to_string(),
                client_role: true,
                container_id: Some(client_uuid.to_string()),
                ..Default::default()
            });
        id
    }

    pub fn add_client_scope(&self, realm: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.id("scope");
        state
            .realms
            .get_mut(realm)
            .unwrap()
            .client_scopes
            .push(ClientScopeRepresentation {
                id: Some(id.clone()),
                name: name.to_string(),
                protocol: Some("openid-connect".to_string()),
            });
        id
    }

    pub fn client_uuid(&self, realm: &str, client_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.realms.get(realm)?.client_by_id(client_id)?.id.clone()
    }

    pub fn client(&self, realm: &str, client_id: &str) -> Option<ClientRepresentation> {
        let state = self.state.lock().unwrap();
        state.realms.get(realm)?.client_by_id(client_id).cloned()
    }

    pub fn realm(&self, realm: &str) -> Option<RealmRepresentation> {
        let state = self.state.lock().unwrap();
        state.realms.get(realm).map(|r| r.rep.clone())
    }

    pub fn client_roles(&self, realm: &str, client_id: &str) -> Vec<RoleRepresentation> {
        let uuid = self.client_uuid(realm, client_id).unwrap_or_default();
        let state = self.state.lock().unwrap();
        let mut roles = state.realms[realm]
            .client_roles
            .get(&uuid)
            .cloned()
            .unwrap_or_default();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    pub fn client_role_names(&self, realm: &str, client_id: &str) -> Vec<String> {
        self.client_roles(realm, client_id)
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    pub fn realm_roles(&self, realm: &str) -> Vec<RoleRepresentation> {
        let state = self.state.lock().unwrap();
        state.realms[realm].roles.clone()
    }

    pub fn realm_role_names(&self, realm: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state.realms[realm].roles.iter().map(|r| r.name.clone()).collect();
        names.sort();
        names
    }

    /// Names of the default-role members that are roles of `client_id`
    pub fn default_role_members(&self, realm: &str, client_id: &str) -> Vec<String> {
        let uuid = self.client_uuid(realm, client_id).unwrap_or_default();
        let state = self.state.lock().unwrap();
        let realm_state = &state.realms[realm];
        let default_id = realm_state.rep.default_role.as_ref().and_then(|r| r.id.clone()).unwrap();
        let mut names: Vec<String> = realm_state.composites[&default_id]
            .iter()
            .filter_map(|id| realm_state.role(id))
            .filter(|r| r.container_id.as_deref() == Some(uuid.as_str()))
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn default_role_member_ids(&self, realm: &str) -> BTreeSet<String> {
        let state = self.state.lock().unwrap();
        let realm_state = &state.realms[realm];
        let default_id = realm_state.rep.default_role.as_ref().and_then(|r| r.id.clone()).unwrap();
        realm_state.composites[&default_id].clone()
    }

    pub fn scope_mappings(&self, realm: &str, client_id: &str) -> MappingsRepresentation {
        let uuid = self.client_uuid(realm, client_id).unwrap_or_default();
        let state = self.state.lock().unwrap();
        let realm_state = &state.realms[realm];
        realm_state.mappings(&realm_state.scope_mappings.get(&uuid).cloned().unwrap_or_default())
    }

    /// (realm role names, client-id -> role names) bound to the client's service account
    pub fn service_account_bindings(
        &self,
        realm: &str,
        client_id: &str,
    ) -> (Vec<String>, BTreeMap<String, Vec<String>>) {
        let uuid = self.client_uuid(realm, client_id).unwrap_or_default();
        let state = self.state.lock().unwrap();
        let realm_state = &state.realms[realm];
        let user_id = realm_state
            .users
            .values()
            .find(|u| u.service_account_client_id.as_deref() == Some(uuid.as_str()))
            .map(|u| u.id.clone())
            .unwrap();
        let mappings =
            realm_state.mappings(&realm_state.user_roles.get(&user_id).cloned().unwrap_or_default());
        let mut realm_roles: Vec<String> =
            mappings.realm_mappings.into_iter().map(|r| r.name).collect();
        realm_roles.sort();
        let clients = mappings
            .client_mappings
            .into_iter()
            .map(|(client, bucket)| {
                let mut names: Vec<String> = bucket.mappings.into_iter().map(|r| r.name).collect();
                names.sort();
                (client, names)
            })
            .collect();
        (realm_roles, clients)
    }

    /// Names of client scopes linked to the client as `kind`
    pub fn linked_scopes(&self, realm: &str, client_id: &str, kind: ClientScopeKind) -> Vec<String> {
        let uuid = self.client_uuid(realm, client_id).unwrap_or_default();
        let state = self.state.lock().unwrap();
        let realm_state = &state.realms[realm];
        let mut names: Vec<String> = realm_state
            .scope_links
            .get(&(uuid, kind.path_segment()))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| {
                        realm_state
                            .client_scopes
                            .iter()
                            .find(|s| s.id.as_deref() == Some(id))
                            .map(|s| s.name.clone())
                    })
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Mutating calls since the last [`FakeKeycloak::take_writes`]
    pub fn take_writes(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().unwrap().writes)
    }

    /// Make the next call of the named write operation fail as transient
    pub fn fail_next(&self, op: &str) {
        self.state.lock().unwrap().fail_next = Some(op.to_string());
    }
}

fn ids(roles: &[RoleRepresentation]) -> impl Iterator<Item = String> + '_ {
    roles.iter().filter_map(|r| r.id.clone())
}

fn names(roles: &[RoleRepresentation]) -> String {
    roles
        .iter()
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl KeycloakAdmin for FakeKeycloak {
    async fn get_realm(&self, realm: &str) -> Result<Option<RealmRepresentation>> {
        let state = self.state.lock().unwrap();
        Ok(state.realms.get(realm).map(|r| r.rep.clone()))
    }

    async fn create_realm(&self, realm: &RealmRepresentation) -> Result<()> {
        if self.state.lock().unwrap().realms.contains_key(&realm.realm) {
            return Ok(());
        }
        self.state
            .lock()
            .unwrap()
            .write("create_realm", realm.realm.clone())?;
        self.add_realm(&realm.realm);
        let mut state = self.state.lock().unwrap();
        let rep = &mut state.realm(&realm.realm)?.rep;
        rep.enabled = realm.enabled;
        rep.display_name = realm.display_name.clone();
        Ok(())
    }

    async fn update_realm(&self, realm: &RealmRepresentation) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("update_realm", realm.realm.clone())?;
        let rep = &mut state.realm(&realm.realm)?.rep;
        rep.enabled = realm.enabled;
        rep.display_name = realm.display_name.clone();
        Ok(())
    }

    async fn delete_realm(&self, realm: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("delete_realm", realm.to_string())?;
        state.realms.remove(realm);
        Ok(())
    }

    async fn find_client(
        &self,
        realm: &str,
        client_id: &str,
    ) -> Result<Option<ClientRepresentation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .realms
            .get(realm)
            .and_then(|r| r.client_by_id(client_id))
            .cloned())
    }

    async fn create_client(&self, realm: &str, client: &ClientRepresentation) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.realm(realm)?.client_by_id(&client.client_id) {
            return Ok(existing.id.clone().unwrap_or_default());
        }
        state.write("create_client", client.client_id.clone())?;
        let uuid = state.id("client");
        let mut next_id = state.next_id;
        let realm_state = state.realm(realm)?;
        let created = ClientRepresentation {
            id: Some(uuid.clone()),
            ..client.clone()
        };
        realm_state.ensure_service_account(&created, &mut next_id);
        realm_state.clients.push(created);
        realm_state.client_roles.insert(uuid.clone(), Vec::new());
        state.next_id = next_id;
        Ok(uuid)
    }

    async fn update_client(
        &self,
        realm: &str,
        client_uuid: &str,
        client: &ClientRepresentation,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("update_client", client.client_id.clone())?;
        let mut next_id = state.next_id;
        let realm_state = state.realm(realm)?;
        let slot = realm_state
            .clients
            .iter_mut()
            .find(|c| c.id.as_deref() == Some(client_uuid))
            .ok_or_else(|| AppError::NotFound(client_uuid.to_string()))?;
        *slot = client.clone();
        let updated = slot.clone();
        realm_state.ensure_service_account(&updated, &mut next_id);
        state.next_id = next_id;
        Ok(())
    }

    async fn delete_client(&self, realm: &str, client_uuid: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("delete_client", client_uuid.to_string())?;
        let realm_state = state.realm(realm)?;
        realm_state.clients.retain(|c| c.id.as_deref() != Some(client_uuid));
        let removed: Vec<String> = realm_state
            .client_roles
            .remove(client_uuid)
            .map(|roles| ids(&roles).collect())
            .unwrap_or_default();
        for id in removed {
            realm_state.forget_role(&id);
        }
        Ok(())
    }

    async fn list_realm_roles(&self, realm: &str) -> Result<Vec<RoleRepresentation>> {
        let state = self.state.lock().unwrap();
        Ok(state.realms.get(realm).map(|r| r.roles.clone()).unwrap_or_default())
    }

    async fn create_realm_role(&self, realm: &str, role: &RoleRepresentation) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.realm(realm)?.roles.iter().any(|r| r.name == role.name) {
            return Ok(());
        }
        state.write("create_realm_role", role.name.clone())?;
        let id = state.id("role");
        state.realm(realm)?.roles.push(RoleRepresentation {
            id: Some(id),
            container_id: Some(realm.to_string()),
            ..role.clone()
        });
        Ok(())
    }

    async fn list_client_roles(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<Vec<RoleRepresentation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .realms
            .get(realm)
            .and_then(|r| r.client_roles.get(client_uuid))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        role: &RoleRepresentation,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let exists = state
            .realm(realm)?
            .client_roles
            .get(client_uuid)
            .is_some_and(|roles| roles.iter().any(|r| r.name == role.name));
        if exists {
            return Ok(());
        }
        state.write("create_client_role", role.name.clone())?;
        let id = state.id("role");
        state
            .realm(realm)?
            .client_roles
            .entry(client_uuid.to_string())
            .or_default()
            .push(RoleRepresentation {
                id: Some(id),
                client_role: true,
                container_id: Some(client_uuid.to_string()),
                ..role.clone()
            });
        Ok(())
    }

    async fn update_role(
        &self,
        realm: &str,
        role_id: &str,
        role: &RoleRepresentation,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let taken = state
            .realm(realm)?
            .siblings(role_id)
            .is_some_and(|roles| {
                roles
                    .iter()
                    .any(|r| r.name == role.name && r.id.as_deref() != Some(role_id))
            });
        if taken {
            return Err(AppError::Conflict(format!("Role {} already exists", role.name)));
        }
        state.write("update_role", format!("{}={}", role_id, role.name))?;
        let stored = state
            .realm(realm)?
            .role_mut(role_id)
            .ok_or_else(|| AppError::NotFound(role_id.to_string()))?;
        stored.name = role.name.clone();
        stored.description = role.description.clone();
        Ok(())
    }

    async fn delete_role(&self, realm: &str, role_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("delete_role", role_id.to_string())?;
        let realm_state = state.realm(realm)?;
        realm_state.roles.retain(|r| r.id.as_deref() != Some(role_id));
        for roles in realm_state.client_roles.values_mut() {
            roles.retain(|r| r.id.as_deref() != Some(role_id));
        }
        realm_state.forget_role(role_id);
        Ok(())
    }

    async fn list_client_composites(
        &self,
        realm: &str,
        role_id: &str,
        client_uuid: &str,
    ) -> Result<Vec<RoleRepresentation>> {
        let state = self.state.lock().unwrap();
        let Some(realm_state) = state.realms.get(realm) else {
            return Ok(Vec::new());
        };
        Ok(realm_state
            .composites
            .get(role_id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| realm_state.role(id))
                    .filter(|r| r.container_id.as_deref() == Some(client_uuid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_composites(
        &self,
        realm: &str,
        role_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("add_composites", names(roles))?;
        state
            .realm(realm)?
            .composites
            .entry(role_id.to_string())
            .or_default()
            .extend(ids(roles));
        Ok(())
    }

    async fn remove_composites(
        &self,
        realm: &str,
        role_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("remove_composites", names(roles))?;
        if let Some(members) = state.realm(realm)?.composites.get_mut(role_id) {
            for id in ids(roles) {
                members.remove(&id);
            }
        }
        Ok(())
    }

    async fn list_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<MappingsRepresentation> {
        let state = self.state.lock().unwrap();
        let Some(realm_state) = state.realms.get(realm) else {
            return Ok(MappingsRepresentation::default());
        };
        Ok(realm_state.mappings(
            &realm_state
                .scope_mappings
                .get(client_uuid)
                .cloned()
                .unwrap_or_default(),
        ))
    }

    async fn add_realm_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("add_realm_scope_mappings", names(roles))?;
        state
            .realm(realm)?
            .scope_mappings
            .entry(client_uuid.to_string())
            .or_default()
            .extend(ids(roles));
        Ok(())
    }

    async fn remove_realm_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("remove_realm_scope_mappings", names(roles))?;
        if let Some(mapped) = state.realm(realm)?.scope_mappings.get_mut(client_uuid) {
            for id in ids(roles) {
                mapped.remove(&id);
            }
        }
        Ok(())
    }

    async fn add_client_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        _other_client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("add_client_scope_mappings", names(roles))?;
        state
            .realm(realm)?
            .scope_mappings
            .entry(client_uuid.to_string())
            .or_default()
            .extend(ids(roles));
        Ok(())
    }

    async fn remove_client_scope_mappings(
        &self,
        realm: &str,
        client_uuid: &str,
        _other_client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("remove_client_scope_mappings", names(roles))?;
        if let Some(mapped) = state.realm(realm)?.scope_mappings.get_mut(client_uuid) {
            for id in ids(roles) {
                mapped.remove(&id);
            }
        }
        Ok(())
    }

    async fn get_service_account_user(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<Option<UserRepresentation>> {
        let state = self.state.lock().unwrap();
        Ok(state.realms.get(realm).and_then(|r| {
            r.users
                .values()
                .find(|u| u.service_account_client_id.as_deref() == Some(client_uuid))
                .cloned()
        }))
    }

    async fn list_user_role_mappings(
        &self,
        realm: &str,
        user_id: &str,
    ) -> Result<MappingsRepresentation> {
        let state = self.state.lock().unwrap();
        let Some(realm_state) = state.realms.get(realm) else {
            return Ok(MappingsRepresentation::default());
        };
        Ok(realm_state.mappings(&realm_state.user_roles.get(user_id).cloned().unwrap_or_default()))
    }

    async fn add_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("add_user_realm_roles", names(roles))?;
        state
            .realm(realm)?
            .user_roles
            .entry(user_id.to_string())
            .or_default()
            .extend(ids(roles));
        Ok(())
    }

    async fn remove_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("remove_user_realm_roles", names(roles))?;
        if let Some(mapped) = state.realm(realm)?.user_roles.get_mut(user_id) {
            for id in ids(roles) {
                mapped.remove(&id);
            }
        }
        Ok(())
    }

    async fn add_user_client_roles(
        &self,
        realm: &str,
        user_id: &str,
        _client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("add_user_client_roles", names(roles))?;
        state
            .realm(realm)?
            .user_roles
            .entry(user_id.to_string())
            .or_default()
            .extend(ids(roles));
        Ok(())
    }

    async fn remove_user_client_roles(
        &self,
        realm: &str,
        user_id: &str,
        _client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("remove_user_client_roles", names(roles))?;
        if let Some(mapped) = state.realm(realm)?.user_roles.get_mut(user_id) {
            for id in ids(roles) {
                mapped.remove(&id);
            }
        }
        Ok(())
    }

    async fn list_client_scopes(&self, realm: &str) -> Result<Vec<ClientScopeRepresentation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .realms
            .get(realm)
            .map(|r| r.client_scopes.clone())
            .unwrap_or_default())
    }

    async fn list_client_scope_links(
        &self,
        realm: &str,
        client_uuid: &str,
        kind: ClientScopeKind,
    ) -> Result<Vec<ClientScopeRepresentation>> {
        let state = self.state.lock().unwrap();
        let Some(realm_state) = state.realms.get(realm) else {
            return Ok(Vec::new());
        };
        let linked = realm_state
            .scope_links
            .get(&(client_uuid.to_string(), kind.path_segment()))
            .cloned()
            .unwrap_or_default();
        Ok(realm_state
            .client_scopes
            .iter()
            .filter(|s| s.id.as_ref().is_some_and(|id| linked.contains(id)))
            .cloned()
            .collect())
    }

    async fn add_client_scope_link(
        &self,
        realm: &str,
        client_uuid: &str,
        kind: ClientScopeKind,
        scope_id: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write("add_client_scope_link", format!("{} {}", kind.path_segment(), scope_id))?;
        state
            .realm(realm)?
            .scope_links
            .entry((client_uuid.to_string(), kind.path_segment()))
            .or_default()
            .insert(scope_id.to_string());
        Ok(())
    }

    async fn remove_client_scope_link(
        &self,
        realm: &str,
        client_uuid: &str,
        kind: ClientScopeKind,
        scope_id: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write(
            "remove_client_scope_link",
            format!("{} {}", kind.path_segment(), scope_id),
        )?;
        if let Some(linked) = state
            .realm(realm)?
            .scope_links
            .get_mut(&(client_uuid.to_string(), kind.path_segment()))
        {
            linked.remove(scope_id);
        }
        Ok(())
    }
}

/// Secret store holding a fixed set of `namespace/name` entries
#[derive(Default)]
pub struct FakeSecrets {
    existing: BTreeSet<String>,
}

impl FakeSecrets {
    pub fn with(namespace: &str, name: &str) -> Self {
        Self {
            existing: [format!("{}/{}", namespace, name)].into(),
        }
    }
}

#[async_trait]
impl SecretProbe for FakeSecrets {
    async fn secret_exists(&self, namespace: &str, name: &str) -> Result<bool> {
        Ok(self.existing.contains(&format!("{}/{}", namespace, name)))
    }
}
