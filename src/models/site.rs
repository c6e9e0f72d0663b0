// src/models/site.rs

//! Monitored site definition.

use serde::{Deserialize, Serialize};

/// A monitored web resource. Immutable after configuration load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Unique identifier for the site
    pub name: String,

    /// Target URL
    pub url: String,

    /// Check interval in seconds
    pub interval_secs: u64,

    /// Whether the final content requires script execution, forcing a
    /// browser-rendered fetch instead of a raw HTTP GET
    #[serde(default)]
    pub render: bool,
}
