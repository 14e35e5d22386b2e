//! Desired realm resource

use super::{validate_roles, validation_error, ObjectMeta, ResourceStatus};
use crate::error::Result;
use crate::keycloak::{RealmRepresentation, RoleRepresentation};
use serde::{Deserialize, Serialize};
use validator::Validate;

fn validate_realm(realm: &RealmRepresentation) -> std::result::Result<(), validator::ValidationError> {
    if realm.realm.trim().is_empty() {
        return Err(validation_error(
            "empty_realm",
            "realm must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RealmSpec {
    #[validate(custom(function = "validate_realm"))]
    pub realm: RealmRepresentation,
    /// Realm roles; `None` leaves them unmanaged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_roles"))]
    pub roles: Option<Vec<RoleRepresentation>>,
}

/// Realm resource as supplied by the configuration store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmResource {
    pub metadata: ObjectMeta,
    pub spec: RealmSpec,
    #[serde(default)]
    pub status: ResourceStatus,
}

impl RealmResource {
    pub fn realm_name(&self) -> &str {
        &self.spec.realm.realm
    }

    pub fn validate(&self) -> Result<()> {
        self.spec.validate()?;
        Ok(())
    }
}
