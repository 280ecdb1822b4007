//! Identity-scoped cache keys.
//!
//! `QueryKey`'s private inner struct means a key can only come from
//! [`QueryKey::new`], which requires an [`Identity`]. There is no way to
//! construct a key that is not partitioned by identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tasktrack_core::{ConfigError, Identity, QueryKind, TaskQuery};

/// How query parameters take part in cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    /// Key is `{kind, identity, parameter}`. Distinct filter values and
    /// search texts get distinct entries.
    #[default]
    Parameterized,
    /// Key is `{kind, identity}` only. Two queries of the same kind for the
    /// same identity share one entry until it expires, so the second query
    /// is answered with the first query's results. Kept for compatibility
    /// with clients that depend on that behavior.
    Legacy,
}

impl KeyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMode::Parameterized => "parameterized",
            KeyMode::Legacy => "legacy",
        }
    }
}

impl FromStr for KeyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parameterized" => Ok(KeyMode::Parameterized),
            "legacy" => Ok(KeyMode::Legacy),
            other => Err(ConfigError::InvalidValue {
                field: "cache_key_mode".to_string(),
                value: other.to_string(),
                reason: "expected parameterized or legacy".to_string(),
            }),
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cache key that is scoped to one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Private inner data - cannot be constructed externally
    inner: QueryKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKeyInner {
    identity: Identity,
    kind: QueryKind,
    parameter: Option<String>,
}

impl QueryKey {
    /// Build the key for `query` issued by `identity`.
    pub fn new(mode: KeyMode, identity: &Identity, query: &TaskQuery) -> Self {
        let parameter = match mode {
            KeyMode::Parameterized => query.parameter(),
            KeyMode::Legacy => None,
        };
        Self {
            inner: QueryKeyInner {
                identity: identity.clone(),
                kind: query.kind(),
                parameter,
            },
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn kind(&self) -> QueryKind {
        self.inner.kind
    }

    pub fn parameter(&self) -> Option<&str> {
        self.inner.parameter.as_deref()
    }

    pub fn belongs_to(&self, identity: &Identity) -> bool {
        &self.inner.identity == identity
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug-quote free-form parts so ':' inside them cannot blur boundaries.
        write!(f, "{}:{:?}", self.inner.kind, self.inner.identity.as_str())?;
        if let Some(param) = &self.inner.parameter {
            write!(f, ":{:?}", param)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasktrack_core::Status;

    fn ident(raw: &str) -> Identity {
        Identity::parse(raw).expect("valid identity")
    }

    #[test]
    fn test_parameterized_keys_distinguish_parameters() {
        let u1 = ident("u1");
        let todo = QueryKey::new(KeyMode::Parameterized, &u1, &TaskQuery::ByStatus(Status::Todo));
        let doing = QueryKey::new(KeyMode::Parameterized, &u1, &TaskQuery::ByStatus(Status::InProgress));
        assert_ne!(todo, doing);
        assert_eq!(todo.parameter(), Some("0"));
    }

    #[test]
    fn test_legacy_keys_alias_parameters() {
        let u1 = ident("u1");
        let todo = QueryKey::new(KeyMode::Legacy, &u1, &TaskQuery::ByStatus(Status::Todo));
        let doing = QueryKey::new(KeyMode::Legacy, &u1, &TaskQuery::ByStatus(Status::InProgress));
        assert_eq!(todo, doing);
        assert_eq!(todo.parameter(), None);

        // kinds stay distinct even in legacy mode
        let all = QueryKey::new(KeyMode::Legacy, &u1, &TaskQuery::ListAll);
        assert_ne!(todo, all);
    }

    #[test]
    fn test_keys_partitioned_by_identity() {
        for mode in [KeyMode::Parameterized, KeyMode::Legacy] {
            let a = QueryKey::new(mode, &ident("u1"), &TaskQuery::ListAll);
            let b = QueryKey::new(mode, &ident("u2"), &TaskQuery::ListAll);
            assert_ne!(a, b);
            assert!(a.belongs_to(&ident("u1")));
            assert!(!a.belongs_to(&ident("u2")));
        }
    }

    #[test]
    fn test_display_is_unambiguous() {
        let tricky = QueryKey::new(KeyMode::Parameterized, &ident("u1:x"), &TaskQuery::search_title("y"));
        let other = QueryKey::new(KeyMode::Parameterized, &ident("u1"), &TaskQuery::search_title("x:y"));
        assert_ne!(tricky.to_string(), other.to_string());
        assert_eq!(
            QueryKey::new(KeyMode::Legacy, &ident("u1"), &TaskQuery::ListAll).to_string(),
            "list-all:\"u1\""
        );
    }

    #[test]
    fn test_key_mode_parse() {
        assert_eq!("legacy".parse::<KeyMode>().ok(), Some(KeyMode::Legacy));
        assert_eq!(" Parameterized ".parse::<KeyMode>().ok(), Some(KeyMode::Parameterized));
        assert!("nope".parse::<KeyMode>().is_err());
    }
}
