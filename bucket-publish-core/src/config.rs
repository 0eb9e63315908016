use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::PublishError;

/// Default number of render/upload pairs in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default `Accept` header sent to the renderer.
pub const DEFAULT_ACCEPT: &str = "text/html";

/// What the pipeline does after a resource fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going; every resource is attempted.
    #[default]
    CollectAll,
    /// Stop scheduling new work after the first failure.
    AbortOnFirst,
}

/// Everything one publish run needs to know, passed explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    pub bucket: String,
    /// Base URI without trailing slash.
    pub base: String,
    pub prefix: String,
    pub dry_run: bool,
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    /// Skip uploads whose body matches the remote ETag.
    pub skip_unchanged: bool,
    pub accept: String,
    /// Identifier rendered for the bucket's error document.
    pub not_found: Option<String>,
    /// Overall deadline for the resource fan-out.
    #[serde(default, with = "optional_secs")]
    pub deadline: Option<Duration>,
}

impl PublishConfig {
    pub fn new(bucket: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            base: base.into(),
            prefix: String::new(),
            dry_run: false,
            concurrency: DEFAULT_CONCURRENCY,
            failure_policy: FailurePolicy::default(),
            skip_unchanged: false,
            accept: DEFAULT_ACCEPT.to_string(),
            not_found: None,
            deadline: None,
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PublishError> {
        if self.bucket.trim().is_empty() {
            return Err(PublishError::config("no target bucket given"));
        }
        if self.concurrency == 0 {
            return Err(PublishError::config("concurrency must be at least 1"));
        }
        Ok(())
    }

    /// The identifier rendered as the not-found page.
    pub fn not_found_identifier(&self) -> String {
        self.not_found
            .clone()
            .unwrap_or_else(|| format!("{}/.not-found", self.base))
    }

    pub fn trace_loaded(&self) {
        info!(
            bucket = %self.bucket,
            base = %self.base,
            prefix = %self.prefix,
            dry_run = self.dry_run,
            concurrency = self.concurrency,
            failure_policy = ?self.failure_policy,
            "Loaded PublishConfig"
        );
        debug!(?self, "PublishConfig loaded (full debug)");
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bucket_is_a_configuration_error() {
        let config = PublishConfig::new("  ", "http://localhost");
        assert!(matches!(config.validate(), Err(PublishError::Config(_))));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = PublishConfig::new("site", "http://localhost");
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn not_found_defaults_under_base() {
        let config = PublishConfig::new("site", "https://example.com");
        assert_eq!(config.not_found_identifier(), "https://example.com/.not-found");
    }

    #[test]
    fn deadline_round_trips_as_seconds() {
        let mut config = PublishConfig::new("site", "http://localhost");
        config.deadline = Some(Duration::from_secs(30));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["deadline"], 30);
        let back: PublishConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.deadline, Some(Duration::from_secs(30)));
    }
}
