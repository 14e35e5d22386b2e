//! Desired client resource

use super::{
    validate_roles, validate_unique_names, validation_error, LabelSelector, ObjectMeta,
    ResourceStatus,
};
use crate::error::Result;
use crate::keycloak::authz::normalize_policies;
use crate::keycloak::{ClientRepresentation, MappingsRepresentation, RoleRepresentation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Legacy name of the generated credential secret of a client
pub fn deprecated_secret_name(client_id: &str) -> String {
    format!("keycloak-client-secret-{}", client_id)
}

fn validate_client(client: &ClientRepresentation) -> std::result::Result<(), validator::ValidationError> {
    if client.client_id.trim().is_empty() {
        return Err(validation_error(
            "empty_client_id",
            "clientId must not be empty".to_string(),
        ));
    }
    if let Some(settings) = &client.authorization_settings {
        normalize_policies(&settings.policies)
            .map_err(|e| validation_error("invalid_policy", e.to_string()))?;
    }
    Ok(())
}

fn validate_names(names: &[String]) -> std::result::Result<(), validator::ValidationError> {
    validate_unique_names(names.iter().map(String::as_str))
}

fn validate_client_role_lists(
    lists: &BTreeMap<String, Vec<String>>,
) -> std::result::Result<(), validator::ValidationError> {
    for (client_id, names) in lists {
        if client_id.trim().is_empty() {
            return Err(validation_error(
                "empty_client_id",
                "Client role bindings need a clientId".to_string(),
            ));
        }
        validate_names(names)?;
    }
    Ok(())
}

fn validate_mappings(
    mappings: &MappingsRepresentation,
) -> std::result::Result<(), validator::ValidationError> {
    validate_roles(&mappings.realm_mappings)?;
    for (client_id, bucket) in &mappings.client_mappings {
        if client_id.trim().is_empty() {
            return Err(validation_error(
                "empty_client_id",
                "Client scope mappings need a clientId".to_string(),
            ));
        }
        validate_roles(&bucket.mappings)?;
    }
    Ok(())
}

/// Desired state of one client. Every collection is the complete target
/// membership; anything present remotely but not listed is removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClientSpec {
    /// Selects the realm resource owning this client
    #[serde(default)]
    pub realm_selector: LabelSelector,
    #[validate(custom(function = "validate_client"))]
    pub client: ClientRepresentation,
    #[serde(default)]
    #[validate(custom(function = "validate_roles"))]
    pub roles: Vec<RoleRepresentation>,
    /// Names of this client's roles that belong to the realm default role
    #[serde(default)]
    #[validate(custom(function = "validate_names"))]
    pub default_roles: Vec<String>,
    /// `None` leaves scope mappings unmanaged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_mappings"))]
    pub scope_mappings: Option<MappingsRepresentation>,
    #[serde(default)]
    #[validate(custom(function = "validate_names"))]
    pub service_account_realm_roles: Vec<String>,
    /// client-id -> role names
    #[serde(default)]
    #[validate(custom(function = "validate_client_role_lists"))]
    pub service_account_client_roles: BTreeMap<String, Vec<String>>,
}

/// Client resource as supplied by the configuration store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResource {
    pub metadata: ObjectMeta,
    pub spec: ClientSpec,
    #[serde(default)]
    pub status: ResourceStatus,
}

impl ClientResource {
    pub fn client_id(&self) -> &str {
        &self.spec.client.client_id
    }

    pub fn validate(&self) -> Result<()> {
        self.spec.validate()?;
        Ok(())
    }
}
