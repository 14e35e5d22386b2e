//! Selecting the realm resource that owns a client

use crate::domain::{LabelSelector, RealmResource};
use crate::error::AppError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RealmLookupError {
    #[error("No realm matches the selector")]
    NotFound,

    #[error("Selector matches multiple realms: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
}

impl From<RealmLookupError> for AppError {
    fn from(e: RealmLookupError) -> Self {
        match e {
            RealmLookupError::NotFound => AppError::reference("realm", "selector"),
            RealmLookupError::Ambiguous(_) => AppError::Validation(e.to_string()),
        }
    }
}

/// The single realm whose labels satisfy `selector`.
///
/// Several matches are reported as [`RealmLookupError::Ambiguous`] (sorted
/// by realm name) rather than picking one.
pub fn find_realm<'r>(
    realms: &'r [RealmResource],
    selector: &LabelSelector,
) -> Result<&'r RealmResource, RealmLookupError> {
    let matches: Vec<&RealmResource> = realms
        .iter()
        .filter(|r| selector.matches(&r.metadata.labels))
        .collect();

    match matches.as_slice() {
        [] => Err(RealmLookupError::NotFound),
        [only] => Ok(*only),
        many => {
            let mut names: Vec<String> = many.iter().map(|r| r.realm_name().to_string()).collect();
            names.sort();
            Err(RealmLookupError::Ambiguous(names))
        }
    }
}
