//! Graph configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tunables for an `AccessGraph`.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// let cfg = acgraph::GraphConfig::from_json(r#"{ "name": "vcenter" }"#).unwrap();
/// assert_eq!(cfg.name.as_deref(), Some("vcenter"));
/// assert_eq!(cfg.cache_warn_threshold, Some(1024));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Label attached to this graph's log events.
    pub name: Option<String>,

    /// Pre-allocation hint for the canonical vertex set.
    pub vertex_capacity: usize,

    /// Log a warning whenever the number of cached child graphs exceeds
    /// this. Cached entries are never evicted, so growth past the expected
    /// number of distinct queries usually means keys embed volatile values.
    /// `None` disables the warning.
    pub cache_warn_threshold: Option<usize>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name: None,
            vertex_capacity: 0,
            cache_warn_threshold: Some(1024),
        }
    }
}

impl GraphConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: GraphConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_warn_threshold == Some(0) {
            return Err(Error::Config(
                "cache_warn_threshold must be positive; use null to disable".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("acgraph")
    }
}
