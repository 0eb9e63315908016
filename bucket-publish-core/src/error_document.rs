//! Uploading the application's not-found page as the bucket's error document.
//!
//! Website buckets serve a configured error document for keys that do not
//! exist. When that key is not already taken by a real resource, the
//! application's not-found response is rendered and stored there. The stored
//! object is served with status 200 by the storage layer even though it
//! represents a not-found page; that is accepted.

use std::collections::HashSet;

use tracing::{error, info, warn};

use crate::config::PublishConfig;
use crate::contract::{RenderRequest, Renderer, Store};
use crate::publish::{upload_rendered, PublishOutcome, SkipReason};

/// Status codes accepted from the not-found render.
const NOT_FOUND_STATUSES: &[u16] = &[404, 200];

/// Resolve, render and upload the error document for one run.
///
/// `resource_keys` holds the keys of every in-scope resource; an error
/// document key found there is left alone. A failure to read the website
/// configuration is logged and treated as "no error document".
pub async fn resolve_error_document<R, S>(
    renderer: &R,
    store: &S,
    config: &PublishConfig,
    resource_keys: &HashSet<String>,
) -> PublishOutcome
where
    R: Renderer + ?Sized,
    S: Store + ?Sized,
{
    let identifier = config.not_found_identifier();

    let website = match store.get_bucket_website(&config.bucket).await {
        Ok(website) => website,
        Err(e) => {
            warn!(bucket = %config.bucket, error = %e, "[ERRDOC] Could not read bucket website configuration");
            None
        }
    };
    let Some(key) = website.and_then(|w| w.error_key).filter(|k| !k.is_empty()) else {
        info!(bucket = %config.bucket, "[ERRDOC] No error document configured");
        return PublishOutcome::Skipped {
            identifier,
            key: None,
            reason: SkipReason::NoErrorDocument,
        };
    };

    if resource_keys.contains(&key) {
        info!(key = %key, "[ERRDOC] Error document is shadowed by a real resource");
        return PublishOutcome::Skipped {
            identifier,
            key: Some(key),
            reason: SkipReason::ErrorDocumentShadowed,
        };
    }

    info!(uri = %identifier, key = %key, "[ERRDOC] Publishing not-found page as error document");
    if config.dry_run {
        return PublishOutcome::Skipped {
            identifier,
            key: Some(key),
            reason: SkipReason::DryRun,
        };
    }

    let request = RenderRequest {
        identifier: &identifier,
        accept: &config.accept,
    };
    let response = match renderer.render(request).await {
        Ok(response) => response,
        Err(e) => {
            error!(uri = %identifier, error = %e, "[ERRDOC][ERROR] Render of not-found page failed");
            return PublishOutcome::Failed {
                identifier,
                key: Some(key),
                status: None,
                error: format!("render failed: {e}"),
            };
        }
    };

    upload_rendered(&identifier, key, &response, NOT_FOUND_STATUSES, store, config).await
}
