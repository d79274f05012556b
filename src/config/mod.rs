//! Configuration surface for the header filter and keepalive pool.
//!
//! Mirrors the teacher's `Config`: `serde` deserialization plus `validator`
//! checks, loadable from a YAML document by a host process that wires the
//! header filter and keepalive pool into its own proxy loop.

use std::fs;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{ProxyError, ProxyResult};

/// Root configuration for a single location's header filter plus the
/// keepalive pool and wait queue for a single upstream.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Config::validate_cross_fields"))]
pub struct Config {
    #[validate(nested)]
    #[serde(default)]
    pub headers: HeaderFilterConfig,

    #[validate(nested)]
    pub keepalive: Option<KeepaliveConfig>,

    #[validate(nested)]
    pub queue: Option<WaitQueueConfig>,
}

impl Config {
    /// Loads configuration from a YAML file, matching `Config::load_from_yaml`
    /// in spirit: synchronous, validated before any async machinery starts.
    pub fn load_from_yaml<P>(path: P) -> ProxyResult<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .map_err(|e| ProxyError::Configuration(format!("unable to read {path}: {e}")))?;
        Self::from_yaml(&conf_str)
    }

    /// Parses a YAML configuration string with full validation.
    pub fn from_yaml(conf_str: &str) -> ProxyResult<Self> {
        let conf: Config = serde_yaml::from_str(conf_str)
            .map_err(|e| ProxyError::Configuration(format!("unable to parse yaml: {e}")))?;

        conf.validate()
            .map_err(|e| ProxyError::Configuration(e.to_string()))?;

        Ok(conf)
    }

    fn validate_cross_fields(&self) -> Result<(), ValidationError> {
        if self.queue.is_some() && self.keepalive.is_none() {
            return Err(ValidationError::new("queue_requires_keepalive"));
        }
        Ok(())
    }
}

/// Configuration for the response/request header filter at one location.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct HeaderFilterConfig {
    #[validate(nested)]
    pub expires: Option<ExpiresDirective>,

    #[validate(nested)]
    #[serde(default)]
    pub headers: Vec<AddHeaderDirective>,

    #[validate(nested)]
    #[serde(default)]
    pub trailers: Vec<AddHeaderDirective>,

    #[validate(nested)]
    #[serde(default)]
    pub input_headers: Vec<AddInputHeaderDirective>,

    #[serde(default)]
    pub add_header_subrequest: bool,
}

/// A single `add_header`/`add_trailer` directive.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "AddHeaderDirective::validate_wildcard"))]
pub struct AddHeaderDirective {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub always: bool,
}

impl AddHeaderDirective {
    fn validate_wildcard(&self) -> Result<(), ValidationError> {
        if self.name.ends_with('*') && !self.value.is_empty() {
            return Err(ValidationError::new("wildcard_requires_empty_value"));
        }
        Ok(())
    }
}

/// An `add_input_header` directive (request-header rewrite during the
/// rewrite phase).
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct AddInputHeaderDirective {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Parsed form of the `expires [modified] <spec>` directive.
///
/// This is the config-time representation; `crate::headers::expires` turns
/// it into the `ExpiresMode`/seconds pair the runtime engine consumes.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "ExpiresDirective::validate_spec"))]
pub struct ExpiresDirective {
    /// Raw directive spec, e.g. `"max"`, `"epoch"`, `"@86400"`, `"-1h"`, `"30"`.
    pub spec: String,
    #[serde(default)]
    pub modified: bool,
}

impl ExpiresDirective {
    /// A spec containing `$` is a complex value, resolved fresh on every
    /// response; its eventual value can't be checked until then, so the
    /// static daily/duration grammar below only applies to literal specs.
    fn validate_spec(&self) -> Result<(), ValidationError> {
        if self.spec.contains('$') {
            return Ok(());
        }
        if self.modified && self.spec.starts_with('@') {
            return Err(ValidationError::new("modified_disallows_daily"));
        }
        if let Some(rest) = self.spec.strip_prefix('@') {
            let secs: i64 = rest
                .parse()
                .map_err(|_| ValidationError::new("invalid_daily_spec"))?;
            if !(0..=86_400).contains(&secs) {
                return Err(ValidationError::new("daily_spec_must_be_at_most_24h"));
            }
        }
        Ok(())
    }
}

/// `keepalive <max_cached> [timeout] [requests] [overflow]`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Validate)]
pub struct KeepaliveConfig {
    #[validate(range(min = 1))]
    pub max_cached: usize,

    #[serde(default = "KeepaliveConfig::default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    #[serde(default = "KeepaliveConfig::default_requests")]
    #[validate(range(min = 1))]
    pub requests: u64,

    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl KeepaliveConfig {
    fn default_timeout_secs() -> u64 {
        60
    }

    fn default_requests() -> u64 {
        100
    }
}

/// `queue <max> [timeout] [overflow]`, only meaningful alongside `keepalive`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Validate)]
pub struct WaitQueueConfig {
    #[validate(range(min = 1))]
    pub max_waiters: usize,

    #[serde(default = "WaitQueueConfig::default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl WaitQueueConfig {
    fn default_timeout_secs() -> u64 {
        60
    }
}

/// What happens once the pool (or the wait queue) is saturated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    #[default]
    Reject,
    Ignore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_with_nonempty_value_is_rejected() {
        let d = AddHeaderDirective {
            name: "X-Foo-*".to_string(),
            value: "bar".to_string(),
            always: false,
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn wildcard_with_empty_value_is_accepted() {
        let d = AddHeaderDirective {
            name: "X-Foo-*".to_string(),
            value: String::new(),
            always: false,
        };
        assert!(d.validate().is_ok());
    }

    #[test]
    fn daily_spec_at_86400_accepted_at_86401_rejected_boundary() {
        let ok = ExpiresDirective {
            spec: "@86400".to_string(),
            modified: false,
        };
        assert!(ok.validate().is_ok());

        let bad = ExpiresDirective {
            spec: "@86401".to_string(),
            modified: false,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn modified_disallows_daily_spec() {
        let d = ExpiresDirective {
            spec: "@100".to_string(),
            modified: true,
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn dynamic_spec_skips_static_daily_validation() {
        // "$ttl" can't be range-checked until it's evaluated per request;
        // it must not be rejected as a malformed "@..." daily spec.
        let d = ExpiresDirective {
            spec: "$ttl".to_string(),
            modified: true,
        };
        assert!(d.validate().is_ok());
    }

    #[test]
    fn queue_without_keepalive_is_rejected() {
        let conf = Config {
            headers: HeaderFilterConfig::default(),
            keepalive: None,
            queue: Some(WaitQueueConfig {
                max_waiters: 4,
                timeout_secs: 5,
                overflow: OverflowPolicy::Reject,
            }),
        };
        assert!(conf.validate().is_err());
    }

    #[test]
    fn from_yaml_parses_minimal_document() {
        let yaml = r#"
headers:
  expires:
    spec: "max"
  headers:
    - name: "Server"
      value: "X"
keepalive:
  max_cached: 32
"#;
        let conf = Config::from_yaml(yaml).expect("valid config");
        assert_eq!(conf.keepalive.unwrap().max_cached, 32);
        assert_eq!(conf.headers.headers.len(), 1);
    }
}
