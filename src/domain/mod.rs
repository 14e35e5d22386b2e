//! Desired-state resources and the status contract

pub mod client;
pub mod realm;
pub mod status;

pub use client::*;
pub use realm::*;
pub use status::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of a resource in the configuration store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Equality-based label selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Every selector label is present with an equal value. An empty
    /// selector selects nothing.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        !self.match_labels.is_empty()
            && self
                .match_labels
                .iter()
                .all(|(k, v)| labels.get(k) == Some(v))
    }
}

pub(crate) fn validation_error(code: &'static str, message: String) -> validator::ValidationError {
    let mut err = validator::ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Reject empty and duplicate names
pub(crate) fn validate_unique_names<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), validator::ValidationError> {
    let mut seen = std::collections::BTreeSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(validation_error("empty_name", "Names must not be empty".to_string()));
        }
        if !seen.insert(name) {
            return Err(validation_error(
                "duplicate_name",
                format!("Duplicate name: {}", name),
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_roles(
    roles: &[crate::keycloak::RoleRepresentation],
) -> Result<(), validator::ValidationError> {
    validate_unique_names(roles.iter().map(|r| r.name.as_str()))
}
