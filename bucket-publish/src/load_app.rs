//! `load_app` module: Loads the YAML application manifest describing what to render and where from.
//!
//! The manifest stands in for the application itself: it declares the
//! resources the application serves, the origin it is running on, and the
//! fixed scheme/authority its resource identifiers use.
//!
//! ```yaml
//! origin: http://127.0.0.1:8080      # where responses are fetched; default: the identifier itself
//! fixed_scheme: https
//! fixed_authority: example.com
//! accept: text/html                   # optional
//! not_found: https://example.com/404  # optional
//! resources:
//!   - https://example.com/index.html
//!   - https://example.com/about.html
//! ```
//!
//! # Errors
//! All errors use `anyhow::Error` and are surfaced at the CLI boundary.

use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use url::Url;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppManifest {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub fixed_scheme: Option<String>,
    #[serde(default)]
    pub fixed_authority: Option<String>,
    #[serde(default)]
    pub accept: Option<String>,
    #[serde(default)]
    pub not_found: Option<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

/// Loads and validates an application manifest.
pub fn load_app<P: AsRef<Path>>(path: P) -> Result<AppManifest> {
    let path_ref = path.as_ref();
    info!(app_path = ?path_ref, "Loading application manifest from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, app_path = ?path_ref, "Failed to read application manifest");
            return Err(anyhow::anyhow!(
                "Failed to read application manifest {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let manifest: AppManifest = match serde_yaml::from_str(&content) {
        Ok(manifest) => {
            info!(app_path = ?path_ref, "Parsed application manifest YAML successfully");
            manifest
        }
        Err(e) => {
            error!(error = ?e, app_path = ?path_ref, "Failed to parse application manifest YAML");
            return Err(anyhow::anyhow!("Failed to parse application manifest YAML: {e}"));
        }
    };

    if let Some(origin) = &manifest.origin {
        if let Err(e) = Url::parse(origin) {
            error!(error = ?e, origin = %origin, "Application origin is not a valid URL");
            anyhow::bail!("Invalid origin {origin:?} in application manifest: {e}");
        }
    }

    info!(
        resources = manifest.resources.len(),
        origin = ?manifest.origin,
        "Application manifest loaded"
    );
    Ok(manifest)
}
