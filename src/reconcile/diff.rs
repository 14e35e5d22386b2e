//! Set reconciliation over named, optionally identified entries
//!
//! [`reconcile`] compares what the server has with what is wanted and says
//! what to remove, what to keep (possibly renamed or updated) and what to
//! create. It is pure: inputs are borrowed, sorted copies of the references
//! are taken internally, and the result does not depend on input order.

use crate::keycloak::{ClientScopeRepresentation, RoleRepresentation};

/// An entry addressable by name and, once created, by a server-assigned ID
pub trait Identified {
    fn id(&self) -> Option<&str>;
    fn name(&self) -> &str;

    /// Whether the non-identifying content of `self` (desired) differs from `actual`
    fn content_differs(&self, _actual: &Self) -> bool {
        false
    }
}

impl Identified for RoleRepresentation {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn content_differs(&self, actual: &Self) -> bool {
        self.description.as_deref().unwrap_or_default()
            != actual.description.as_deref().unwrap_or_default()
    }
}

impl Identified for ClientScopeRepresentation {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A desired entry matched to an existing one
#[derive(Debug, PartialEq)]
pub struct RoleMatch<'a, T> {
    pub actual: &'a T,
    pub desired: &'a T,
}

impl<T: Identified> RoleMatch<'_, T> {
    /// Matched by ID under a different name
    pub fn is_rename(&self) -> bool {
        self.actual.name() != self.desired.name()
    }

    /// An in-place update (by the actual ID) is required
    pub fn needs_update(&self) -> bool {
        self.is_rename() || self.desired.content_differs(self.actual)
    }
}

#[derive(Debug, PartialEq)]
pub struct RoleDiff<'a, T> {
    pub to_remove: Vec<&'a T>,
    pub to_keep: Vec<RoleMatch<'a, T>>,
    pub to_create: Vec<&'a T>,
}

impl<'a, T: Identified> RoleDiff<'a, T> {
    /// Nothing to remove, create or update
    pub fn is_converged(&self) -> bool {
        self.to_remove.is_empty()
            && self.to_create.is_empty()
            && self.to_keep.iter().all(|m| !m.needs_update())
    }

    pub fn updates(&self) -> impl Iterator<Item = &RoleMatch<'a, T>> + '_ {
        self.to_keep.iter().filter(|m| m.needs_update())
    }

    /// The updates as a write sequence that never renames onto a name still held.
    ///
    /// A rename waits until no other pending entry holds its target name, so
    /// chains run back to front. When every pending rename is blocked the
    /// renames form a cycle; the first one is parked under `<name>.<id>` and
    /// renamed again once its target is free.
    pub fn ordered_updates(&self) -> Vec<RoleUpdate<'a, T>> {
        let pending: Vec<&RoleMatch<'a, T>> = self.updates().collect();
        let mut current: Vec<String> = pending
            .iter()
            .map(|m| m.actual.name().to_string())
            .collect();
        let mut done = vec![false; pending.len()];
        let mut steps = Vec::with_capacity(pending.len());

        while let Some(first) = (0..pending.len()).find(|&i| !done[i]) {
            let ready = (0..pending.len()).find(|&i| {
                !done[i]
                    && (0..pending.len())
                        .all(|j| j == i || current[j] != pending[i].desired.name())
            });

            let (i, name) = match ready {
                Some(i) => {
                    done[i] = true;
                    (i, pending[i].desired.name().to_string())
                }
                None => {
                    let id = pending[first].actual.id().unwrap_or_default();
                    (first, format!("{}.{}", current[first], id))
                }
            };

            current[i] = name.clone();
            steps.push(RoleUpdate {
                actual: pending[i].actual,
                desired: pending[i].desired,
                name,
            });
        }

        steps
    }
}

/// One update write: the matched entry and the name it carries afterwards
#[derive(Debug, PartialEq)]
pub struct RoleUpdate<'a, T> {
    pub actual: &'a T,
    pub desired: &'a T,
    pub name: String,
}

impl<T: Identified> RoleUpdate<'_, T> {
    /// A temporary rename out of a cycle
    pub fn is_parked(&self) -> bool {
        self.name != self.desired.name()
    }
}

fn non_empty(id: Option<&str>) -> Option<&str> {
    id.filter(|id| !id.is_empty())
}

fn sorted<T: Identified>(entries: &[T]) -> Vec<&T> {
    let mut refs: Vec<&T> = entries.iter().collect();
    refs.sort_by(|a, b| {
        a.name()
            .cmp(b.name())
            .then_with(|| a.id().unwrap_or_default().cmp(b.id().unwrap_or_default()))
    });
    refs
}

/// Diff `actual` against `desired`.
///
/// A desired entry with a non-empty ID matches the actual entry carrying that
/// ID (a rename when the names differ); otherwise it matches the actual entry
/// with the same name. ID matches are taken first, and every actual entry
/// matches at most one desired entry. Desired entries repeating a name are
/// ignored after the first.
pub fn reconcile<'a, T: Identified>(actual: &'a [T], desired: &'a [T]) -> RoleDiff<'a, T> {
    let actual = sorted(actual);
    let mut wanted = sorted(desired);
    wanted.dedup_by(|b, a| a.name() == b.name());

    let mut actual_taken = vec![false; actual.len()];
    let mut matched: Vec<Option<usize>> = vec![None; wanted.len()];

    for (d, entry) in wanted.iter().enumerate() {
        if let Some(id) = non_empty(entry.id()) {
            if let Some(a) = (0..actual.len())
                .find(|&a| !actual_taken[a] && non_empty(actual[a].id()) == Some(id))
            {
                actual_taken[a] = true;
                matched[d] = Some(a);
            }
        }
    }

    for (d, entry) in wanted.iter().enumerate() {
        if matched[d].is_some() {
            continue;
        }
        if let Some(a) =
            (0..actual.len()).find(|&a| !actual_taken[a] && actual[a].name() == entry.name())
        {
            actual_taken[a] = true;
            matched[d] = Some(a);
        }
    }

    let mut to_keep = Vec::new();
    let mut to_create = Vec::new();
    for (d, entry) in wanted.iter().enumerate() {
        match matched[d] {
            Some(a) => to_keep.push(RoleMatch {
                actual: actual[a],
                desired: *entry,
            }),
            None => to_create.push(*entry),
        }
    }

    let to_remove = actual
        .iter()
        .zip(actual_taken)
        .filter(|(_, taken)| !taken)
        .map(|(entry, _)| *entry)
        .collect();

    RoleDiff {
        to_remove,
        to_keep,
        to_create,
    }
}
