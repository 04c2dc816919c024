//! Status reporting.
//!
//! Turns validator and builder findings into a fresh, immutable list of
//! named conditions per fragment. Conditions are sorted and deduplicated,
//! so unchanged input always yields byte-identical status.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::ObjectKey;
use crate::resolver::error::{Reason, ResolveError, ResolveWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentState {
    Valid,
    Invalid,
    Orphaned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConditionType {
    Valid,
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConditionStatus {
    True,
    False,
}

/// One named condition, e.g. `Valid=False, reason=RootNamespaceError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentStatus {
    pub namespace: String,
    pub name: String,
    pub state: FragmentState,
    pub conditions: Vec<StatusCondition>,
}

impl FragmentStatus {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn is_valid(&self) -> bool {
        self.state == FragmentState::Valid
    }

    /// Reason codes of every error condition.
    pub fn reasons(&self) -> Vec<&str> {
        self.conditions
            .iter()
            .filter(|c| c.condition_type == ConditionType::Error)
            .map(|c| c.reason.as_str())
            .collect()
    }

    pub fn has_reason(&self, reason: Reason) -> bool {
        self.reasons().contains(&reason.as_str())
    }
}

/// Accumulates findings from every resolution stage.
#[derive(Debug, Default)]
pub struct StatusReporter {
    errors: BTreeMap<ObjectKey, Vec<ResolveError>>,
    warnings: BTreeMap<ObjectKey, Vec<ResolveWarning>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, key: &ObjectKey, error: ResolveError) {
        tracing::debug!(
            fragment = %key,
            reason = %error.reason(),
            class = ?error.reason().class(),
            error = %error,
            "Fragment error"
        );
        self.errors.entry(key.clone()).or_default().push(error);
    }

    pub fn warning(&mut self, key: &ObjectKey, warning: ResolveWarning) {
        self.warnings.entry(key.clone()).or_default().push(warning);
    }

    pub fn has_errors(&self, key: &ObjectKey) -> bool {
        self.errors.get(key).is_some_and(|e| !e.is_empty())
    }

    /// Produce one status per key, in key order.
    pub fn finish<'k>(mut self, keys: impl IntoIterator<Item = &'k ObjectKey>) -> Vec<FragmentStatus> {
        keys.into_iter()
            .map(|key| {
                let errors = self.errors.remove(key).unwrap_or_default();
                let warnings = self.warnings.remove(key).unwrap_or_default();
                build_status(key, errors, warnings)
            })
            .collect()
    }
}

fn build_status(
    key: &ObjectKey,
    errors: Vec<ResolveError>,
    warnings: Vec<ResolveWarning>,
) -> FragmentStatus {
    let mut errors: Vec<(Reason, String)> = errors
        .into_iter()
        .map(|e| (e.reason(), e.to_string()))
        .collect();
    errors.sort();
    errors.dedup();

    let mut warnings: Vec<(&'static str, String)> = warnings
        .into_iter()
        .map(|w| (w.reason(), w.to_string()))
        .collect();
    warnings.sort();
    warnings.dedup();

    let state = if errors.is_empty() {
        FragmentState::Valid
    } else if errors.iter().all(|(r, _)| *r == Reason::OrphanedError) {
        FragmentState::Orphaned
    } else {
        FragmentState::Invalid
    };

    let summary = match errors.first() {
        None => StatusCondition {
            condition_type: ConditionType::Valid,
            status: ConditionStatus::True,
            reason: "Valid".to_string(),
            message: "Valid fragment".to_string(),
        },
        Some((reason, message)) if errors.len() == 1 => StatusCondition {
            condition_type: ConditionType::Valid,
            status: ConditionStatus::False,
            reason: reason.as_str().to_string(),
            message: message.clone(),
        },
        Some((reason, _)) => StatusCondition {
            condition_type: ConditionType::Valid,
            status: ConditionStatus::False,
            reason: reason.as_str().to_string(),
            message: format!("{} errors present, see Error conditions for details", errors.len()),
        },
    };

    let mut conditions = Vec::with_capacity(1 + errors.len() + warnings.len());
    conditions.push(summary);
    conditions.extend(errors.into_iter().map(|(reason, message)| StatusCondition {
        condition_type: ConditionType::Error,
        status: ConditionStatus::True,
        reason: reason.as_str().to_string(),
        message,
    }));
    conditions.extend(warnings.into_iter().map(|(reason, message)| StatusCondition {
        condition_type: ConditionType::Warning,
        status: ConditionStatus::True,
        reason: reason.to_string(),
        message,
    }));

    FragmentStatus {
        namespace: key.namespace.clone(),
        name: key.name.clone(),
        state,
        conditions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_fragment() {
        let key = ObjectKey::new("ns", "a");
        let statuses = StatusReporter::new().finish([&key]);
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].is_valid());
        assert_eq!(statuses[0].conditions[0].status, ConditionStatus::True);
    }

    #[test]
    fn test_errors_sorted_and_deduplicated() {
        let key = ObjectKey::new("ns", "a");
        let mut reporter = StatusReporter::new();
        reporter.error(&key, ResolveError::Policy("bad unit".into()));
        reporter.error(&key, ResolveError::RootNamespace { namespace: "ns".into() });
        reporter.error(&key, ResolveError::Policy("bad unit".into()));
        reporter.warning(
            &key,
            ResolveWarning::IncludeNotFound { target: ObjectKey::new("ns", "gone") },
        );

        let status = reporter.finish([&key]).remove(0);
        assert_eq!(status.state, FragmentState::Invalid);
        assert_eq!(status.reasons(), vec!["RootNamespaceError", "PolicyError"]);
        assert_eq!(status.conditions[0].reason, "RootNamespaceError");
        assert_eq!(status.conditions.last().unwrap().reason, "IncludeNotFound");
        assert!(status.has_reason(Reason::PolicyError));
    }

    #[test]
    fn test_orphan_state() {
        let key = ObjectKey::new("ns", "c");
        let mut reporter = StatusReporter::new();
        reporter.error(&key, ResolveError::Orphaned);
        let status = reporter.finish([&key]).remove(0);
        assert_eq!(status.state, FragmentState::Orphaned);
        assert_eq!(status.conditions[0].reason, "OrphanedError");
    }

    #[test]
    fn test_serialized_condition_shape() {
        let key = ObjectKey::new("ns", "c");
        let mut reporter = StatusReporter::new();
        reporter.error(&key, ResolveError::Orphaned);
        let json = serde_json::to_value(reporter.finish([&key])).unwrap();
        assert_eq!(json[0]["state"], "orphaned");
        assert_eq!(json[0]["conditions"][0]["type"], "Valid");
        assert_eq!(json[0]["conditions"][0]["status"], "False");
    }
}
