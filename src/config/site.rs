//! Site configuration (_config.yml)

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Main site configuration.
///
/// Typed fields for everything the content engine consumes; anything else in
/// `_config.yml` lands in `extra` so a host application can still reach
/// free-form keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site title
    pub title: String,

    /// Default author for documents that omit one
    pub author: String,

    /// IANA timezone identifier used to interpret dates without an offset
    pub timezone: String,

    /// Site base URL
    pub url: String,

    /// Posts per page for paginated listings
    pub per_page: usize,

    /// chrono format string for user-facing dates
    pub date_format: String,

    /// Free-form keys not covered by the typed fields above
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Inkpress".to_string(),
            author: "John Doe".to_string(),
            timezone: String::new(),
            url: "http://example.com".to_string(),
            per_page: 10,
            date_format: "%Y-%m-%d".to_string(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the configured timezone, falling back to UTC.
    pub fn tz(&self) -> Tz {
        if self.timezone.is_empty() {
            return Tz::UTC;
        }
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!("Unknown timezone {:?}, falling back to UTC", self.timezone);
                Tz::UTC
            }
        }
    }
}
