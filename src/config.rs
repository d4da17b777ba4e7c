// Configuration module - immutable exporter settings
//
// This module is responsible for:
// 1. Holding every startup setting in one explicit structure
// 2. Validating the settings once, before the server starts
// 3. Deriving the collection mode and the fixed time zone from them
//
// The collector receives this structure at construction and treats it as
// read-only for the lifetime of the process.

use chrono::FixedOffset;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("a SendGrid user name is required (it becomes the user_name label)")]
    MissingUserName,

    #[error("a SendGrid API key is required (flag or SENDGRID_API_KEY)")]
    MissingApiKey,

    #[error("invalid metric namespace: {0}")]
    InvalidNamespace(String),
}

/// How statistics are grouped on each scrape.
///
/// Fixed at startup; it determines both the label shape of every
/// descriptor and which fetch path the collector takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// One record per scrape, labeled with the user name only.
    Aggregate,

    /// One record per category, labeled with user name and category.
    ByCategory,
}

/// Main configuration structure for the exporter
///
/// Built once in `main` from command-line flags and passed into the
/// collector and client at construction. Immutable afterwards.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// SendGrid account user name, exported as the `user_name` label value
    pub user_name: String,

    /// Prefix for every exported metric name (e.g. "sendgrid" -> "sendgrid_delivered")
    pub namespace: String,

    /// Group statistics by category instead of aggregating per user
    pub by_category: bool,

    /// Query from the first day of the current month instead of today
    pub accumulated: bool,

    /// Display name for the fixed time zone (logging only)
    pub zone_name: String,

    /// UTC offset of the fixed time zone, in seconds east
    pub zone_offset_secs: i32,

    /// SendGrid API key, sent as a bearer token
    pub api_key: String,

    /// Base URL of the statistics API
    pub api_base_url: String,

    /// Address the scrape endpoint listens on
    pub listen_address: SocketAddr,

    /// Deadline applied to each provider fetch
    pub fetch_timeout: Duration,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig {
            user_name: String::new(),
            namespace: "sendgrid".to_string(),
            by_category: false,
            accumulated: false,
            zone_name: String::new(),
            zone_offset_secs: 0,
            api_key: String::new(),
            api_base_url: "https://api.sendgrid.com/v3".to_string(),
            listen_address: SocketAddr::from(([0, 0, 0, 0], 9154)),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ExporterConfig {
    /// Validates the configuration once at startup
    ///
    /// # Returns
    /// * `Ok(())` - Configuration is usable
    /// * `Err(ConfigError)` - A required setting is missing or malformed
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_name.is_empty() {
            return Err(ConfigError::MissingUserName);
        }

        if self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        // A namespace becomes part of every metric name, so it has to
        // satisfy the metric-name charset. An empty namespace is allowed
        // and leaves the kind names unprefixed.
        if !self.namespace.is_empty() && !valid_metric_prefix(&self.namespace) {
            return Err(ConfigError::InvalidNamespace(self.namespace.clone()));
        }

        Ok(())
    }

    /// Returns the collection mode derived from the grouping flag
    pub fn mode(&self) -> CollectionMode {
        if self.by_category {
            CollectionMode::ByCategory
        } else {
            CollectionMode::Aggregate
        }
    }

    /// Label names for every descriptor, in declaration order
    pub fn label_names(&self) -> Vec<&'static str> {
        match self.mode() {
            CollectionMode::Aggregate => vec!["user_name"],
            CollectionMode::ByCategory => vec!["user_name", "category"],
        }
    }

    /// Resolves the configured fixed time zone
    ///
    /// Returns `None` - meaning "use local time" - unless both a zone name
    /// and a non-zero offset are configured. An offset outside the valid
    /// range also falls back to local time rather than failing.
    pub fn fixed_zone(&self) -> Option<FixedOffset> {
        if self.zone_name.is_empty() || self.zone_offset_secs == 0 {
            return None;
        }

        FixedOffset::east_opt(self.zone_offset_secs)
    }
}

/// Checks that a namespace only uses metric-name characters
/// (letters, digits, underscores; no leading digit)
fn valid_metric_prefix(namespace: &str) -> bool {
    let mut chars = namespace.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
