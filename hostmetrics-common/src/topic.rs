use crate::error::{Error, Result};

/// Default topic base for all hostmetrics bridges.
pub const DEFAULT_TOPIC_BASE: &str = "pc";

/// Topic leaf for metric snapshots.
pub const METRICS_LEAF: &str = "metrics";

/// Topic leaf for availability (online/offline) messages.
pub const STATUS_LEAF: &str = "status";

/// Builder for constructing hostmetrics MQTT topics.
///
/// Topics follow the pattern:
/// `<topic_base>/<identity>/<leaf>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    base: String,
    identity: String,
}

impl TopicBuilder {
    /// Create a builder for one agent identity.
    ///
    /// Trailing slashes on the base are ignored.
    pub fn new(base: impl Into<String>, identity: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
            identity: identity.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Topic carrying the metric snapshot.
    ///
    /// # Example
    /// ```
    /// use hostmetrics_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("pc", "desktop01");
    /// assert_eq!(topics.metrics(), "pc/desktop01/metrics");
    /// ```
    pub fn metrics(&self) -> String {
        self.build(METRICS_LEAF)
    }

    /// Topic carrying the retained availability message.
    ///
    /// # Example
    /// ```
    /// use hostmetrics_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("pc", "desktop01");
    /// assert_eq!(topics.status(), "pc/desktop01/status");
    /// ```
    pub fn status(&self) -> String {
        self.build(STATUS_LEAF)
    }

    /// Build `<base>/<identity>/<leaf>`.
    pub fn build(&self, leaf: &str) -> String {
        format!("{}/{}/{}", self.base, self.identity, leaf)
    }
}

/// Check that a string can be used as a topic segment for publishing.
///
/// Rejects empty strings and the MQTT wildcards `+` and `#`.
pub fn validate_topic_part(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Topic(format!("{} must not be empty", name)));
    }
    if value.contains(['+', '#']) {
        return Err(Error::Topic(format!(
            "{} '{}' must not contain MQTT wildcards",
            name, value
        )));
    }
    if value.contains('\0') {
        return Err(Error::Topic(format!("{} contains a NUL character", name)));
    }
    Ok(())
}
