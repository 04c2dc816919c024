//! Path match conditions.
//!
//! # Responsibilities
//! - Represent `Prefix` / `Exact` path conditions as a closed sum type
//! - Concatenate conditions down an inclusion chain
//! - Match a request path with segment-aware prefix semantics
//!
//! # Design Decisions
//! - `Prefix("/")` is the identity for concatenation
//! - An `Exact` ancestor absorbs every descendant condition
//! - Prefixes match on segment boundaries: `/admin` matches `/admin` and
//!   `/admin/x` but not `/admin-app`
//! - Path matching is case-sensitive

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A path match condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Matches the path and everything below it.
    Prefix(String),
    /// Matches exactly one literal path.
    Exact(String),
}

/// How specific a condition is. Higher sorts first when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specificity {
    exact: bool,
    len: usize,
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.exact
            .cmp(&other.exact)
            .then_with(|| self.len.cmp(&other.len))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Condition {
    /// The catch-all condition, `Prefix("/")`.
    pub fn root() -> Self {
        Condition::Prefix("/".to_string())
    }

    pub fn path(&self) -> &str {
        match self {
            Condition::Prefix(p) | Condition::Exact(p) => p,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Condition::Exact(_))
    }

    /// Append `child` below `self`.
    ///
    /// `Prefix(a) + Prefix(b) = Prefix(a/b)`, `Prefix(a) + Exact(b) = Exact(a/b)`,
    /// and `Exact(a) + _ = Exact(a)`.
    pub fn concat(&self, child: &Condition) -> Condition {
        match (self, child) {
            (Condition::Exact(_), _) => self.clone(),
            (Condition::Prefix(a), Condition::Prefix(b)) => Condition::Prefix(join_paths(a, b)),
            (Condition::Prefix(a), Condition::Exact(b)) => Condition::Exact(join_paths(a, b)),
        }
    }

    /// Fold a sequence of conditions onto `self`, in order.
    pub fn concat_all<'a, I>(&self, conditions: I) -> Condition
    where
        I: IntoIterator<Item = &'a Condition>,
    {
        conditions
            .into_iter()
            .fold(self.clone(), |acc, c| acc.concat(c))
    }

    /// Returns true if the request path satisfies this condition.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Condition::Exact(p) => path == p,
            Condition::Prefix(p) => {
                if p == "/" || path == p {
                    return true;
                }
                if !path.starts_with(p.as_str()) {
                    return false;
                }
                p.ends_with('/') || path.as_bytes().get(p.len()) == Some(&b'/')
            }
        }
    }

    pub fn specificity(&self) -> Specificity {
        Specificity {
            exact: self.is_exact(),
            len: self.path().len(),
        }
    }

    /// Syntax check for a declared condition path.
    pub fn validate(&self) -> Result<(), String> {
        let path = self.path();
        if path.is_empty() {
            return Err(format!("{} condition has an empty path", self.kind()));
        }
        if !path.starts_with('/') {
            return Err(format!("{} {:?} must start with '/'", self.kind(), path));
        }
        if path.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
            return Err(format!(
                "{} {:?} contains whitespace, '?' or '#'",
                self.kind(),
                path
            ));
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        match self {
            Condition::Prefix(_) => "prefix",
            Condition::Exact(_) => "exact",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.path())
    }
}

/// Join two absolute paths with exactly one `/` at the boundary.
fn join_paths(parent: &str, child: &str) -> String {
    if child == "/" || child.is_empty() {
        return parent.to_string();
    }
    if parent == "/" || parent.is_empty() {
        return child.to_string();
    }
    format!(
        "{}/{}",
        parent.trim_end_matches('/'),
        child.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(p: &str) -> Condition {
        Condition::Prefix(p.to_string())
    }

    fn exact(p: &str) -> Condition {
        Condition::Exact(p.to_string())
    }

    #[test]
    fn test_concat_rules() {
        assert_eq!(prefix("/app").concat(&prefix("/v1")), prefix("/app/v1"));
        assert_eq!(prefix("/app/").concat(&prefix("/v1")), prefix("/app/v1"));
        assert_eq!(prefix("/app").concat(&exact("/admin")), exact("/app/admin"));
        assert_eq!(exact("/app").concat(&prefix("/v1")), exact("/app"));
        assert_eq!(exact("/app").concat(&exact("/v1")), exact("/app"));
    }

    #[test]
    fn test_root_is_identity() {
        assert_eq!(Condition::root().concat(&prefix("/api")), prefix("/api"));
        assert_eq!(prefix("/api").concat(&Condition::root()), prefix("/api"));
        assert_eq!(Condition::root().concat_all(std::iter::empty()), Condition::root());
    }

    #[test]
    fn test_prefix_matches_segments() {
        let admin = prefix("/admin");
        assert!(admin.matches("/admin"));
        assert!(admin.matches("/admin/app"));
        assert!(!admin.matches("/admin-app"));
        assert!(!admin.matches("/adm"));

        let slash = prefix("/static/");
        assert!(slash.matches("/static/css"));
        assert!(!slash.matches("/static"));

        assert!(Condition::root().matches("/anything"));
    }

    #[test]
    fn test_exact_matches_literal() {
        let c = exact("/app/admin");
        assert!(c.matches("/app/admin"));
        assert!(!c.matches("/app/admin/"));
        assert!(!c.matches("/app/adminfoo"));
    }

    #[test]
    fn test_specificity_order() {
        assert!(exact("/a").specificity() > prefix("/abcdef").specificity());
        assert!(prefix("/abc").specificity() > prefix("/ab").specificity());
        assert_eq!(prefix("/ab").specificity(), prefix("/cd").specificity());
    }

    #[test]
    fn test_validate() {
        assert!(prefix("/ok").validate().is_ok());
        assert!(prefix("").validate().is_err());
        assert!(prefix("relative").validate().is_err());
        assert!(exact("/a b").validate().is_err());
        assert!(exact("/a?b=1").validate().is_err());
    }

    #[test]
    fn test_deserialize_tagged() {
        let c: Condition = serde_json::from_str(r#"{"exact":"/x"}"#).unwrap();
        assert_eq!(c, exact("/x"));
        assert_eq!(c.to_string(), "exact:/x");
    }
}
