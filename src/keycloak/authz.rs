//! Authorization policy representations
//!
//! Keycloak transports policy configuration as a flat `String -> String`
//! map whose values frequently embed serialized JSON. [`Policy`] parses that
//! map into a typed variant per policy type and keeps unmodelled keys in
//! `extra` so nothing is lost when the policy is rendered back.

use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire form of a policy, also used verbatim in desired client specs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_strategy: Option<String>,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePolicyEntry {
    pub id: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPolicyEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub extend_children: bool,
}

/// Bounds of a time-based policy; every field is optional in Keycloak
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeWindow {
    pub hour: Option<u8>,
    pub hour_end: Option<u8>,
    pub minute: Option<u8>,
    pub minute_end: Option<u8>,
    pub day_month: Option<u8>,
    pub day_month_end: Option<u8>,
    pub month: Option<u8>,
    pub month_end: Option<u8>,
    pub year: Option<i32>,
    pub year_end: Option<i32>,
    pub not_before: Option<String>,
    pub not_on_or_after: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyKind {
    Role {
        roles: Vec<RolePolicyEntry>,
    },
    Aggregate {
        apply_policies: Vec<String>,
    },
    Resource {
        default_resource_type: Option<String>,
        default: bool,
        resources: Vec<String>,
        apply_policies: Vec<String>,
    },
    Scope {
        scopes: Vec<String>,
        resources: Vec<String>,
        apply_policies: Vec<String>,
    },
    Js {
        code: String,
    },
    Time(TimeWindow),
    Client {
        clients: Vec<String>,
    },
    User {
        users: Vec<String>,
    },
    Group {
        groups: Vec<GroupPolicyEntry>,
        groups_claim: Option<String>,
    },
    /// A policy type this crate does not model; its whole config stays in `extra`
    Opaque {
        policy_type: String,
    },
}

impl PolicyKind {
    pub fn type_name(&self) -> &str {
        match self {
            PolicyKind::Role { .. } => "role",
            PolicyKind::Aggregate { .. } => "aggregate",
            PolicyKind::Resource { .. } => "resource",
            PolicyKind::Scope { .. } => "scope",
            PolicyKind::Js { .. } => "js",
            PolicyKind::Time(_) => "time",
            PolicyKind::Client { .. } => "client",
            PolicyKind::User { .. } => "user",
            PolicyKind::Group { .. } => "group",
            PolicyKind::Opaque { policy_type } => policy_type,
        }
    }
}

/// Typed authorization policy
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub logic: Option<String>,
    pub decision_strategy: Option<String>,
    pub kind: PolicyKind,
    /// Config keys not consumed by `kind`
    pub extra: BTreeMap<String, String>,
}

/// Pulls keys out of a policy's config map, remembering which policy is parsed
struct ConfigReader<'a> {
    policy: &'a str,
    config: BTreeMap<String, String>,
}

impl<'a> ConfigReader<'a> {
    fn take(&mut self, key: &str) -> Option<String> {
        self.config.remove(key)
    }

    fn take_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.config.remove(key) {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                AppError::Validation(format!(
                    "policy '{}': config key '{}' is not valid JSON: {}",
                    self.policy, key, e
                ))
            }),
        }
    }

    fn take_list(&mut self, key: &str) -> Result<Vec<String>> {
        Ok(self.take_json(key)?.unwrap_or_default())
    }

    fn take_number<T: std::str::FromStr>(&mut self, key: &str) -> Result<Option<T>> {
        match self.config.remove(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                AppError::Validation(format!(
                    "policy '{}': config key '{}' must be numeric, got '{}'",
                    self.policy, key, raw
                ))
            }),
        }
    }

    fn take_bool(&mut self, key: &str) -> Result<bool> {
        match self.config.remove(key).as_deref().map(str::trim) {
            None | Some("") | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(AppError::Validation(format!(
                "policy '{}': config key '{}' must be true or false, got '{}'",
                self.policy, key, other
            ))),
        }
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    policy: &str,
    key: &str,
    value: Option<T>,
    min: T,
    max: T,
) -> Result<Option<T>> {
    match value {
        Some(v) if v < min || v > max => Err(AppError::Validation(format!(
            "policy '{}': {} must be between {} and {}, got {}",
            policy, key, min, max, v
        ))),
        other => Ok(other),
    }
}

impl TryFrom<&PolicyRepresentation> for Policy {
    type Error = AppError;

    fn try_from(rep: &PolicyRepresentation) -> Result<Self> {
        if rep.name.trim().is_empty() {
            return Err(AppError::Validation(
                "authorization policy name must not be empty".to_string(),
            ));
        }

        let mut reader = ConfigReader {
            policy: &rep.name,
            config: rep.config.clone(),
        };

        let kind = match rep.policy_type.as_str() {
            "role" => PolicyKind::Role {
                roles: reader.take_json("roles")?.unwrap_or_default(),
            },
            "aggregate" => PolicyKind::Aggregate {
                apply_policies: reader.take_list("applyPolicies")?,
            },
            "resource" => PolicyKind::Resource {
                default_resource_type: reader.take("defaultResourceType"),
                default: reader.take_bool("default")?,
                resources: reader.take_list("resources")?,
                apply_policies: reader.take_list("applyPolicies")?,
            },
            "scope" => PolicyKind::Scope {
                scopes: reader.take_list("scopes")?,
                resources: reader.take_list("resources")?,
                apply_policies: reader.take_list("applyPolicies")?,
            },
            "js" => PolicyKind::Js {
                code: reader.take("code").ok_or_else(|| {
                    AppError::Validation(format!("policy '{}': js policy requires 'code'", rep.name))
                })?,
            },
            "time" => {
                let name = rep.name.as_str();
                PolicyKind::Time(TimeWindow {
                    hour: check_range(name, "hour", reader.take_number("hour")?, 0, 23)?,
                    hour_end: check_range(name, "hourEnd", reader.take_number("hourEnd")?, 0, 23)?,
                    minute: check_range(name, "minute", reader.take_number("minute")?, 0, 59)?,
                    minute_end: check_range(
                        name,
                        "minuteEnd",
                        reader.take_number("minuteEnd")?,
                        0,
                        59,
                    )?,
                    day_month: check_range(name, "dayMonth", reader.take_number("dayMonth")?, 1, 31)?,
                    day_month_end: check_range(
                        name,
                        "dayMonthEnd",
                        reader.take_number("dayMonthEnd")?,
                        1,
                        31,
                    )?,
                    month: check_range(name, "month", reader.take_number("month")?, 1, 12)?,
                    month_end: check_range(name, "monthEnd", reader.take_number("monthEnd")?, 1, 12)?,
                    year: reader.take_number("year")?,
                    year_end: reader.take_number("yearEnd")?,
                    not_before: reader.take("nbf"),
                    not_on_or_after: reader.take("noa"),
                })
            }
            "client" => PolicyKind::Client {
                clients: reader.take_list("clients")?,
            },
            "user" => PolicyKind::User {
                users: reader.take_list("users")?,
            },
            "group" => PolicyKind::Group {
                groups: reader.take_json("groups")?.unwrap_or_default(),
                groups_claim: reader.take("groupsClaim"),
            },
            "" => {
                return Err(AppError::Validation(format!(
                    "policy '{}': type must not be empty",
                    rep.name
                )))
            }
            other => PolicyKind::Opaque {
                policy_type: other.to_string(),
            },
        };

        Ok(Policy {
            id: rep.id.clone(),
            name: rep.name.clone(),
            description: rep.description.clone(),
            logic: rep.logic.clone(),
            decision_strategy: rep.decision_strategy.clone(),
            kind,
            extra: reader.config,
        })
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    // Vec<String> and plain structs cannot fail to serialize
    serde_json::to_string(value).unwrap_or_default()
}

impl Policy {
    /// Render the policy back into Keycloak's flat config form
    pub fn to_representation(&self) -> PolicyRepresentation {
        let mut config = self.extra.clone();
        let mut put = |key: &str, value: String| {
            config.insert(key.to_string(), value);
        };

        match &self.kind {
            PolicyKind::Role { roles } => put("roles", to_json(roles)),
            PolicyKind::Aggregate { apply_policies } => put("applyPolicies", to_json(apply_policies)),
            PolicyKind::Resource {
                default_resource_type,
                default,
                resources,
                apply_policies,
            } => {
                if let Some(t) = default_resource_type {
                    put("defaultResourceType", t.clone());
                }
                if *default {
                    put("default", "true".to_string());
                }
                if !resources.is_empty() {
                    put("resources", to_json(resources));
                }
                put("applyPolicies", to_json(apply_policies));
            }
            PolicyKind::Scope {
                scopes,
                resources,
                apply_policies,
            } => {
                put("scopes", to_json(scopes));
                if !resources.is_empty() {
                    put("resources", to_json(resources));
                }
                put("applyPolicies", to_json(apply_policies));
            }
            PolicyKind::Js { code } => put("code", code.clone()),
            PolicyKind::Time(window) => {
                let numbers = [
                    ("hour", window.hour.map(i32::from)),
                    ("hourEnd", window.hour_end.map(i32::from)),
                    ("minute", window.minute.map(i32::from)),
                    ("minuteEnd", window.minute_end.map(i32::from)),
                    ("dayMonth", window.day_month.map(i32::from)),
                    ("dayMonthEnd", window.day_month_end.map(i32::from)),
                    ("month", window.month.map(i32::from)),
                    ("monthEnd", window.month_end.map(i32::from)),
                    ("year", window.year),
                    ("yearEnd", window.year_end),
                ];
                for (key, value) in numbers {
                    if let Some(v) = value {
                        put(key, v.to_string());
                    }
                }
                if let Some(nbf) = &window.not_before {
                    put("nbf", nbf.clone());
                }
                if let Some(noa) = &window.not_on_or_after {
                    put("noa", noa.clone());
                }
            }
            PolicyKind::Client { clients } => put("clients", to_json(clients)),
            PolicyKind::User { users } => put("users", to_json(users)),
            PolicyKind::Group {
                groups,
                groups_claim,
            } => {
                put("groups", to_json(groups));
                if let Some(claim) = groups_claim {
                    put("groupsClaim", claim.clone());
                }
            }
            PolicyKind::Opaque { .. } => {}
        }

        PolicyRepresentation {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            policy_type: self.kind.type_name().to_string(),
            logic: self.logic.clone(),
            decision_strategy: self.decision_strategy.clone(),
            config,
        }
    }
}

/// Parse and re-render every policy; the first malformed one is a validation error
pub fn normalize_policies(policies: &[PolicyRepresentation]) -> Result<Vec<PolicyRepresentation>> {
    policies
        .iter()
        .map(|rep| Policy::try_from(rep).map(|p| p.to_representation()))
        .collect()
}
