//! High-level pipeline: orchestrates list → filter → render → upload for one bucket.
//!
//! This module provides the top-level orchestration for publishing an
//! application's resources into a website bucket. It:
//!   - Lists every resource the [`Renderer`] knows about
//!   - Keeps those under the configured base URI ([`crate::scope`])
//!   - Maps each to a storage key ([`crate::keys`])
//!   - Resolves the bucket's error document ([`crate::error_document`])
//!   - Renders and uploads the resources with a bounded number in flight
//!   - Returns a [`RunReport`] with one outcome per submitted resource
//!
//! # Error Handling
//! Only configuration and listing errors end the run early. A failing render
//! or upload becomes a [`PublishOutcome::Failed`] entry and, under the default
//! [`FailurePolicy::CollectAll`], never stops its siblings. With
//! [`FailurePolicy::AbortOnFirst`] scheduling stops after the first failure and
//! the remaining resources are reported as [`SkipReason::Cancelled`].
//!
//! # Concurrency
//! At most `config.concurrency` render/upload pairs run at once. Outcomes are
//! collected by the single loop draining the stream, in completion order, and
//! stored back at the position of their identifier.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use md5::{Digest, Md5};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{FailurePolicy, PublishConfig};
use crate::contract::{PutObject, RenderRequest, RenderedResponse, Renderer, Store};
use crate::error_document::resolve_error_document;
use crate::errors::PublishError;
use crate::invalidate::InvalidationStatus;
use crate::keys::map_key;
use crate::scope::filter_in_scope;

/// Why a resource was not uploaded without that being a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Directory-shaped or otherwise unmappable identifier.
    NotLeaf,
    DryRun,
    /// Remote ETag already matches the rendered body.
    Unchanged,
    /// Not attempted because an earlier resource failed.
    Cancelled,
    /// Not finished before the run's deadline.
    DeadlineExceeded,
    /// The bucket has no error document configured.
    NoErrorDocument,
    /// The error document key is already taken by a real resource.
    ErrorDocumentShadowed,
}

/// Result for a single resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    Uploaded {
        identifier: String,
        key: String,
        status: u16,
    },
    Skipped {
        identifier: String,
        key: Option<String>,
        reason: SkipReason,
    },
    Failed {
        identifier: String,
        key: Option<String>,
        status: Option<u16>,
        error: String,
    },
}

impl PublishOutcome {
    pub fn identifier(&self) -> &str {
        match self {
            PublishOutcome::Uploaded { identifier, .. }
            | PublishOutcome::Skipped { identifier, .. }
            | PublishOutcome::Failed { identifier, .. } => identifier,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PublishOutcome::Failed { .. })
    }

    pub fn uploaded_key(&self) -> Option<&str> {
        match self {
            PublishOutcome::Uploaded { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            PublishOutcome::Skipped { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Everything that happened in one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// One entry per in-scope resource, in listing order.
    pub outcomes: Vec<PublishOutcome>,
    pub error_document: Option<PublishOutcome>,
    pub invalidation: Option<InvalidationStatus>,
}

impl RunReport {
    /// Resource outcomes followed by the error document outcome.
    pub fn all_outcomes(&self) -> impl Iterator<Item = &PublishOutcome> {
        self.outcomes.iter().chain(self.error_document.iter())
    }

    pub fn uploaded_keys(&self) -> Vec<&str> {
        self.all_outcomes().filter_map(PublishOutcome::uploaded_key).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PublishOutcome> {
        self.all_outcomes().filter(|o| o.is_failed())
    }

    pub fn uploaded(&self) -> usize {
        self.uploaded_keys().len()
    }

    /// Skipped resources. A skipped error document is not a resource and
    /// is not counted.
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PublishOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} uploaded, {} skipped, {} failed",
            self.uploaded(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Entrypoint: publish every in-scope resource the renderer lists.
pub async fn publish_site<R, S>(
    renderer: &R,
    store: &S,
    config: &PublishConfig,
) -> Result<RunReport, PublishError>
where
    R: Renderer + ?Sized,
    S: Store + ?Sized,
{
    config.validate()?;
    config.trace_loaded();
    info!("[PUBLISH] Starting publish run");

    let listed = renderer.listing().await.map_err(|e| {
        error!(error = %e, "[PUBLISH][ERROR] Renderer listing failed");
        PublishError::Listing(e.to_string())
    })?;
    let listed_count = listed.len();
    let resources = filter_in_scope(&config.base, listed);
    info!(
        listed = listed_count,
        in_scope = resources.len(),
        base = %config.base,
        "[PUBLISH] Resources listed"
    );

    let resource_keys: HashSet<String> = resources
        .iter()
        .filter_map(|uri| map_key(uri, &config.base, &config.prefix))
        .collect();
    let error_document = resolve_error_document(renderer, store, config, &resource_keys).await;

    let outcomes = publish_resources(&resources, renderer, store, config).await;

    let report = RunReport {
        outcomes,
        error_document: Some(error_document),
        invalidation: None,
    };
    info!(
        uploaded = report.uploaded(),
        skipped = report.skipped(),
        failed = report.failed(),
        "[PUBLISH] Publish run finished"
    );
    match serde_json::to_string_pretty(&report) {
        Ok(json) => debug!(json = %json, "[PUBLISH][DEBUG] Run report as JSON"),
        Err(e) => error!(error = ?e, "[PUBLISH][DEBUG] Failed to serialize run report as JSON"),
    }
    Ok(report)
}

/// Render and upload `identifiers` with bounded concurrency.
///
/// Returns exactly one outcome per identifier, at the identifier's position.
pub async fn publish_resources<R, S>(
    identifiers: &[String],
    renderer: &R,
    store: &S,
    config: &PublishConfig,
) -> Vec<PublishOutcome>
where
    R: Renderer + ?Sized,
    S: Store + ?Sized,
{
    let mut slots: Vec<Option<PublishOutcome>> = vec![None; identifiers.len()];
    let deadline = config.deadline.map(|d| tokio::time::Instant::now() + d);

    let mut in_flight = stream::iter(identifiers.iter().enumerate())
        .map(move |(idx, identifier)| async move {
            (idx, publish_resource(identifier, renderer, store, config).await)
        })
        .buffer_unordered(config.concurrency.max(1));

    let mut stopped: Option<SkipReason> = None;
    loop {
        let next = match deadline {
            Some(at) => match tokio::time::timeout_at(at, in_flight.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!("[PUBLISH] Deadline reached, cancelling unfinished resources");
                    stopped = Some(SkipReason::DeadlineExceeded);
                    break;
                }
            },
            None => in_flight.next().await,
        };
        let Some((idx, outcome)) = next else { break };
        let failed = outcome.is_failed();
        slots[idx] = Some(outcome);
        if failed && config.failure_policy == FailurePolicy::AbortOnFirst {
            warn!(
                uri = %identifiers[idx],
                "[PUBLISH] Resource failed, aborting remaining work"
            );
            stopped = Some(SkipReason::Cancelled);
            break;
        }
    }
    // Dropping the stream cancels whatever is still in flight.
    drop(in_flight);

    let reason = stopped.unwrap_or(SkipReason::Cancelled);
    slots
        .into_iter()
        .zip(identifiers)
        .map(|(slot, identifier)| {
            slot.unwrap_or_else(|| PublishOutcome::Skipped {
                identifier: identifier.clone(),
                key: map_key(identifier, &config.base, &config.prefix),
                reason,
            })
        })
        .collect()
}

/// Map, render and upload a single resource.
pub async fn publish_resource<R, S>(
    identifier: &str,
    renderer: &R,
    store: &S,
    config: &PublishConfig,
) -> PublishOutcome
where
    R: Renderer + ?Sized,
    S: Store + ?Sized,
{
    let Some(key) = map_key(identifier, &config.base, &config.prefix) else {
        debug!(uri = %identifier, "[PUBLISH] Not a leaf resource, skipping");
        return PublishOutcome::Skipped {
            identifier: identifier.to_string(),
            key: None,
            reason: SkipReason::NotLeaf,
        };
    };
    info!(uri = %identifier, key = %key, "[PUBLISH] Mapped resource");

    // Bail as late as possible so mapping problems still show up.
    if config.dry_run {
        return PublishOutcome::Skipped {
            identifier: identifier.to_string(),
            key: Some(key),
            reason: SkipReason::DryRun,
        };
    }

    let request = RenderRequest {
        identifier,
        accept: &config.accept,
    };
    let response = match renderer.render(request).await {
        Ok(response) => response,
        Err(e) => {
            error!(uri = %identifier, error = %e, "[PUBLISH][ERROR] Render failed");
            return PublishOutcome::Failed {
                identifier: identifier.to_string(),
                key: Some(key),
                status: None,
                error: format!("render failed: {e}"),
            };
        }
    };

    upload_rendered(identifier, key, &response, &[200], store, config).await
}

/// Check a rendered response and upload it at `key`.
///
/// `accepted` lists the status codes that may be stored.
pub(crate) async fn upload_rendered<S>(
    identifier: &str,
    key: String,
    response: &RenderedResponse,
    accepted: &[u16],
    store: &S,
    config: &PublishConfig,
) -> PublishOutcome
where
    S: Store + ?Sized,
{
    let status = response.effective_status();
    let content_type = match response.content_type() {
        Some(ct) if accepted.contains(&status) => ct,
        ct => {
            let error = if accepted.contains(&status) {
                "response has no content type".to_string()
            } else {
                format!("unexpected status code {status}")
            };
            error!(
                uri = %identifier,
                status,
                content_type = ?ct,
                "[PUBLISH][ERROR] Rendered response rejected"
            );
            return PublishOutcome::Failed {
                identifier: identifier.to_string(),
                key: Some(key),
                status: Some(status),
                error,
            };
        }
    };

    if config.skip_unchanged {
        match store.head_object(&config.bucket, &key).await {
            Ok(Some(remote)) if etag_matches(remote.etag.as_deref(), &response.body) => {
                info!(uri = %identifier, key = %key, "[PUBLISH] Remote object unchanged, skipping upload");
                return PublishOutcome::Skipped {
                    identifier: identifier.to_string(),
                    key: Some(key),
                    reason: SkipReason::Unchanged,
                };
            }
            Ok(_) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "[PUBLISH] Could not read remote object, uploading anyway");
            }
        }
    }

    let put = PutObject {
        bucket: &config.bucket,
        key: &key,
        body: &response.body,
        content_type,
    };
    match store.put_object(put).await {
        Ok(op) => {
            info!(status, uri = %identifier, key = %key, etag = ?op.etag, "[PUBLISH][UPLOAD] put_object succeeded");
            PublishOutcome::Uploaded {
                identifier: identifier.to_string(),
                key,
                status,
            }
        }
        Err(e) => {
            error!(uri = %identifier, key = %key, error = %e, "[PUBLISH][ERROR][UPLOAD] put_object failed");
            PublishOutcome::Failed {
                identifier: identifier.to_string(),
                key: Some(key),
                status: Some(status),
                error: format!("upload failed: {e}"),
            }
        }
    }
}

/// Lowercase hex MD5 of `body`, the ETag S3 reports for single-part uploads.
pub fn content_etag(body: &[u8]) -> String {
    hex::encode(Md5::digest(body))
}

/// Whether a remote ETag (quoted or not) matches `body`.
pub fn etag_matches(remote: Option<&str>, body: &[u8]) -> bool {
    remote
        .map(|etag| etag.trim_matches('"'))
        .is_some_and(|etag| etag.eq_ignore_ascii_case(&content_etag(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_comparison_ignores_quotes_and_case() {
        // md5("hello")
        let etag = "\"5D41402ABC4B2A76B9719D911017C592\"";
        assert!(etag_matches(Some(etag), b"hello"));
        assert!(!etag_matches(Some(etag), b"hello!"));
        assert!(!etag_matches(None, b"hello"));
    }

    #[test]
    fn report_counts_include_error_document() {
        let report = RunReport {
            outcomes: vec![
                PublishOutcome::Uploaded {
                    identifier: "http://localhost/a.html".into(),
                    key: "a.html".into(),
                    status: 200,
                },
                PublishOutcome::Skipped {
                    identifier: "http://localhost/b/".into(),
                    key: None,
                    reason: SkipReason::NotLeaf,
                },
            ],
            error_document: Some(PublishOutcome::Failed {
                identifier: "http://localhost/.not-found".into(),
                key: Some("404.html".into()),
                status: Some(500),
                error: "unexpected status code 500".into(),
            }),
            invalidation: None,
        };
        assert_eq!(report.uploaded(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.has_failures());
        assert_eq!(report.summary_line(), "1 uploaded, 1 skipped, 1 failed");
    }

    #[test]
    fn missing_error_document_is_not_a_skipped_resource() {
        let report = RunReport {
            outcomes: vec![PublishOutcome::Uploaded {
                identifier: "http://localhost/a.html".into(),
                key: "a.html".into(),
                status: 200,
            }],
            error_document: Some(PublishOutcome::Skipped {
                identifier: "http://localhost/.not-found".into(),
                key: None,
                reason: SkipReason::NoErrorDocument,
            }),
            invalidation: None,
        };
        assert_eq!(report.summary_line(), "1 uploaded, 0 skipped, 0 failed");
        assert_eq!(report.all_outcomes().count(), 2);
    }
}
