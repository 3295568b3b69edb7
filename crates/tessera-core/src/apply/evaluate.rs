//! Per-item evaluation of changes against current values.
//!
//! Each change is judged on its own, with no ordering dependency on any
//! other change. An applied change is returned in resolved form: its old
//! side is the value actually replaced, so the set of applied changes equals
//! the diff between the states before and after applying them.

use super::conflict::ConflictKind;
use crate::dataset::Feature;
use crate::diff::{FeatureChange, ValueChange};
use serde_json::Value;

/// Result of evaluating one change
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<C> {
    Applied(C),
    NoOp,
    Conflict(ConflictKind),
}

pub fn evaluate_meta(change: &ValueChange, current: Option<&Value>) -> Outcome<ValueChange> {
    let mismatch = |expected: &Value| ConflictKind::MetaMismatch {
        expected: expected.clone(),
        current: current.cloned(),
    };
    match change {
        ValueChange::Updated { old, new } => match current {
            Some(cur) if cur == old => {
                if old == new {
                    Outcome::NoOp
                } else {
                    Outcome::Applied(change.clone())
                }
            }
            _ => Outcome::Conflict(mismatch(old)),
        },
        ValueChange::Added { new } => match current {
            None => Outcome::Applied(change.clone()),
            Some(cur) if cur == new => Outcome::NoOp,
            Some(_) => Outcome::Conflict(ConflictKind::AddExistingMeta),
        },
        ValueChange::Removed { old } => match current {
            None => Outcome::Conflict(ConflictKind::RemoveNonexistentMeta),
            Some(cur) if cur == old => Outcome::Applied(change.clone()),
            Some(_) => Outcome::Conflict(mismatch(old)),
        },
        ValueChange::SetUnconditional { new } => match current {
            None => Outcome::Applied(ValueChange::Added { new: new.clone() }),
            Some(cur) if cur == new => Outcome::NoOp,
            Some(cur) => Outcome::Applied(ValueChange::Updated {
                old: cur.clone(),
                new: new.clone(),
            }),
        },
    }
}

pub fn evaluate_feature(change: &FeatureChange, current: Option<&Feature>) -> Outcome<FeatureChange> {
    match change {
        FeatureChange::Updated { old, new } => match current {
            None => Outcome::Conflict(ConflictKind::UpdateNonexistentFeature),
            Some(cur) if cur != old => Outcome::Conflict(ConflictKind::UpdateChangedFeature),
            Some(_) if old == new => Outcome::NoOp,
            Some(_) => Outcome::Applied(change.clone()),
        },
        FeatureChange::Inserted { new } => match current {
            None => Outcome::Applied(change.clone()),
            Some(cur) if cur == new => Outcome::NoOp,
            Some(_) => Outcome::Conflict(ConflictKind::CreateExistingFeature),
        },
        FeatureChange::Deleted { old } => match current {
            None => Outcome::Conflict(ConflictKind::DeleteNonexistentFeature),
            Some(cur) if cur == old => Outcome::Applied(change.clone()),
            Some(_) => Outcome::Conflict(ConflictKind::DeleteChangedFeature),
        },
        FeatureChange::SetUnconditional { new } => match current {
            None => Outcome::Applied(FeatureChange::Inserted { new: new.clone() }),
            Some(cur) if cur == new => Outcome::NoOp,
            Some(cur) => Outcome::Applied(FeatureChange::Updated {
                old: cur.clone(),
                new: new.clone(),
            }),
        },
    }
}
