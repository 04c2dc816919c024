//! Snapshot loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::store::snapshot::{SnapshotDocument, StoreSnapshot};

/// Error type for snapshot loading.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load a snapshot document. `.json` files are read as JSON, anything else as TOML.
pub fn load_snapshot(path: &Path) -> Result<StoreSnapshot, SnapshotError> {
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let doc = if is_json {
        parse_json(&content)?
    } else {
        parse_toml(&content)?
    };

    Ok(StoreSnapshot::from_document(doc))
}

pub fn parse_toml(content: &str) -> Result<SnapshotDocument, SnapshotError> {
    Ok(toml::from_str(content)?)
}

pub fn parse_json(content: &str) -> Result<SnapshotDocument, SnapshotError> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, ObjectKey};

    #[test]
    fn test_parse_toml_document() {
        let doc = parse_toml(
            r#"
            [[fragments]]
            namespace = "roots"
            name = "site"
            virtual_host = { fqdn = "site.example.com" }

            [[fragments.includes]]
            namespace = "team-a"
            name = "app"
            conditions = [{ prefix = "/app" }]

            [[fragments]]
            namespace = "team-a"
            name = "app"

            [[fragments.routes]]
            conditions = [{ exact = "/status" }]
            services = [{ name = "app", port = 8080 }]
            rate_limit = { requests = 10, unit = "minute" }

            [[services]]
            namespace = "team-a"
            name = "app"
            ports = [8080]
            "#,
        )
        .unwrap();

        let snapshot = StoreSnapshot::from_document(doc);
        let root = snapshot.fragment(&ObjectKey::new("roots", "site")).unwrap();
        assert!(root.is_root());
        assert_eq!(root.includes[0].target("roots"), ObjectKey::new("team-a", "app"));

        let child = snapshot.fragment(&ObjectKey::new("team-a", "app")).unwrap();
        assert_eq!(child.routes[0].conditions, vec![Condition::Exact("/status".into())]);
        assert_eq!(child.routes[0].services[0].weight, 1);
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(parse_json("{not json"), Err(SnapshotError::Json(_))));
    }
}
