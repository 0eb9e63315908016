//! Best-effort CDN invalidation after a publish run.
//!
//! Nothing here can fail a run: every outcome, including a rejected batch, is
//! returned as an [`InvalidationStatus`] for the report.

use serde::Serialize;
use tracing::{error, info};

use crate::contract::{Cdn, InvalidationRequest};
use crate::publish::RunReport;

/// What the invalidation step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InvalidationStatus {
    Submitted {
        id: String,
        status: String,
        caller_reference: String,
        paths: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        caller_reference: String,
        error: String,
    },
}

#[derive(Debug, Clone)]
pub struct InvalidationOptions {
    pub distribution_id: String,
    /// Reused when retrying the same batch; a fresh UUID when absent.
    pub caller_reference: Option<String>,
}

/// CDN paths for every key uploaded in `report`.
pub fn invalidation_paths(report: &RunReport) -> Vec<String> {
    report
        .uploaded_keys()
        .into_iter()
        .map(|key| format!("/{key}"))
        .collect()
}

/// Submit the uploaded paths of a successful run as one invalidation batch.
pub async fn trigger_invalidation<C>(
    cdn: &C,
    report: &RunReport,
    options: &InvalidationOptions,
) -> InvalidationStatus
where
    C: Cdn + ?Sized,
{
    if report.has_failures() {
        info!("[INVALIDATE] Run had failures, not invalidating");
        return InvalidationStatus::Skipped {
            reason: "publish run had failures".to_string(),
        };
    }
    let paths = invalidation_paths(report);
    if paths.is_empty() {
        info!("[INVALIDATE] Nothing uploaded, not invalidating");
        return InvalidationStatus::Skipped {
            reason: "nothing was uploaded".to_string(),
        };
    }

    let caller_reference = options
        .caller_reference
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let count = paths.len();
    let req = InvalidationRequest {
        distribution_id: options.distribution_id.clone(),
        caller_reference: caller_reference.clone(),
        paths,
    };
    info!(
        distribution_id = %options.distribution_id,
        caller_reference = %caller_reference,
        paths = count,
        "[INVALIDATE] Submitting invalidation batch"
    );

    match cdn.create_invalidation(req).await {
        Ok(receipt) => {
            info!(id = %receipt.id, status = %receipt.status, "[INVALIDATE] Invalidation accepted");
            InvalidationStatus::Submitted {
                id: receipt.id,
                status: receipt.status,
                caller_reference,
                paths: count,
            }
        }
        Err(e) => {
            error!(error = %e, caller_reference = %caller_reference, "[INVALIDATE][ERROR] Invalidation failed");
            InvalidationStatus::Failed {
                caller_reference,
                error: e.to_string(),
            }
        }
    }
}
