//! This module implements the CLI interface for bucket-publish: argument
//! parsing, environment fallbacks, client construction and the user-visible
//! summary.
//!
//! All pipeline logic (scope, keys, publishing, error document,
//! invalidation) lives in the [`bucket-publish-core`] crate. This module is
//! strictly CLI glue.
//!
//! ## How To Use
//! - Command line: `bucket-publish --bucket my-site app.yaml` (see `--help`).
//! - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
//!
//! [`bucket-publish-core`]: ../../bucket-publish-core/

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use bucket_publish_core::config::{FailurePolicy, PublishConfig, DEFAULT_ACCEPT, DEFAULT_CONCURRENCY};
use bucket_publish_core::contract::Renderer;
use bucket_publish_core::invalidate::{trigger_invalidation, InvalidationOptions, InvalidationStatus};
use bucket_publish_core::publish::{publish_site, PublishOutcome, RunReport};
use bucket_publish_core::scope::resolve_base;
use clap::Parser;
use url::Url;

use crate::cdn::CloudFrontClient;
use crate::credentials::resolve_credentials;
use crate::load_app::load_app;
use crate::render::HttpRenderer;
use crate::store::{S3Client, StoreConfig};

/// Run <APP> and export its resources to an AWS S3 website bucket.
#[derive(Debug, Parser)]
#[command(
    name = "bucket-publish",
    version,
    about = "Run <APP> and export its resources to an AWS S3 website bucket"
)]
pub struct Cli {
    /// Path to the application manifest (YAML)
    #[arg(value_name = "APP")]
    pub app: PathBuf,

    /// Use AWS credentials from the given profile name
    #[arg(long, env = "AWS_PROFILE", value_name = "NAME")]
    pub profile: Option<String>,

    /// AWS bucket name to save to
    #[arg(long, env = "AWS_S3_BUCKET", value_name = "NAME")]
    pub bucket: Option<String>,

    /// Key prefix to use in the bucket
    #[arg(long = "key", value_name = "PREFIX", default_value = "")]
    pub key_prefix: String,

    /// Website base; defaults to the application's fixed origin
    #[arg(long, value_name = "URI")]
    pub base: Option<String>,

    /// Stop short of uploading, just print results
    #[arg(long, visible_alias = "dry-run")]
    pub pretend: bool,

    /// AWS region of the bucket
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// S3-compatible endpoint (enables path-style addressing)
    #[arg(long, env = "AWS_ENDPOINT_URL", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Maximum number of resources rendered and uploaded at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Stop scheduling new resources after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Skip uploads whose content matches the object already in the bucket
    #[arg(long)]
    pub skip_unchanged: bool,

    /// Give up on unfinished resources after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline_secs: Option<u64>,

    /// Invalidate uploaded paths in CloudFront after a successful run
    #[arg(long)]
    pub invalidate: bool,

    /// CloudFront distribution to invalidate
    #[arg(long, env = "AWS_CLOUDFRONT_DISTRIBUTION_ID", value_name = "ID")]
    pub distribution_id: Option<String>,

    /// Caller reference for the invalidation batch; reuse it when retrying
    #[arg(long, value_name = "REF")]
    pub caller_reference: Option<String>,
}

/// Extracted async CLI logic entrypoint for integration tests and main().
///
/// Returns the run report; callers decide the exit status from
/// [`RunReport::has_failures`].
pub async fn run(cli: Cli) -> Result<RunReport> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let bucket = cli
        .bucket
        .clone()
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| anyhow!("no bucket given: pass --bucket or set AWS_S3_BUCKET"))?;
    let invalidation = match (cli.invalidate, &cli.distribution_id) {
        (false, _) => None,
        (true, Some(id)) if !id.is_empty() => Some(InvalidationOptions {
            distribution_id: id.clone(),
            caller_reference: cli.caller_reference.clone(),
        }),
        (true, _) => {
            return Err(anyhow!(
                "--invalidate needs --distribution-id or AWS_CLOUDFRONT_DISTRIBUTION_ID"
            ))
        }
    };
    let endpoint = cli
        .endpoint
        .as_deref()
        .filter(|e| !e.is_empty())
        .map(Url::parse)
        .transpose()
        .map_err(|e| anyhow!("invalid --endpoint: {e}"))?;

    let app = load_app(&cli.app)?;
    let accept = app.accept.clone().unwrap_or_else(|| DEFAULT_ACCEPT.to_string());
    let not_found = app.not_found.clone();
    let renderer =
        HttpRenderer::new(app).map_err(|e| anyhow!("failed to construct renderer: {e}"))?;
    let base = resolve_base(cli.base.as_deref(), renderer.fixed_origin().as_ref());

    let credentials = match resolve_credentials(cli.profile.as_deref()) {
        Ok(credentials) => Some(credentials),
        Err(e) if cli.pretend => {
            tracing::warn!(error = %e, "No credentials resolved, continuing unsigned in pretend mode");
            None
        }
        Err(e) => return Err(e),
    };

    let config = PublishConfig {
        prefix: cli.key_prefix.clone(),
        dry_run: cli.pretend,
        concurrency: cli.concurrency,
        failure_policy: if cli.fail_fast {
            FailurePolicy::AbortOnFirst
        } else {
            FailurePolicy::CollectAll
        },
        skip_unchanged: cli.skip_unchanged,
        accept,
        not_found,
        deadline: cli.deadline_secs.map(Duration::from_secs),
        ..PublishConfig::new(bucket, base)
    };

    // The store owns the connection pool; it is dropped when this scope ends,
    // on success and on error alike.
    let store = S3Client::new(StoreConfig {
        region: cli.region.clone(),
        endpoint,
        credentials: credentials.clone(),
    })
    .map_err(|e| anyhow!("failed to construct S3 client: {e}"))?;

    println!("Publish starting...");
    let mut report = match publish_site(&renderer, &store, &config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Publish failed");
            return Err(e.into());
        }
    };

    if let Some(options) = invalidation {
        report.invalidation = Some(match credentials {
            Some(credentials) => match CloudFrontClient::new(credentials) {
                Ok(cdn) => trigger_invalidation(&cdn, &report, &options).await,
                Err(e) => InvalidationStatus::Failed {
                    caller_reference: options.caller_reference.clone().unwrap_or_default(),
                    error: e.to_string(),
                },
            },
            None => InvalidationStatus::Skipped {
                reason: "no credentials".to_string(),
            },
        });
    }

    print_report(&report);
    Ok(report)
}

fn print_report(report: &RunReport) {
    for outcome in report.all_outcomes() {
        match outcome {
            PublishOutcome::Uploaded {
                identifier,
                key,
                status,
            } => println!("{status} {identifier} -> {key}"),
            PublishOutcome::Skipped {
                identifier,
                key,
                reason,
            } => match key {
                Some(key) => println!("skipped ({reason:?}) {identifier} -> {key}"),
                None => println!("skipped ({reason:?}) {identifier}"),
            },
            PublishOutcome::Failed {
                identifier,
                status,
                error,
                ..
            } => match status {
                Some(status) => println!("FAILED {status} {identifier}: {error}"),
                None => println!("FAILED {identifier}: {error}"),
            },
        }
    }
    match &report.invalidation {
        Some(InvalidationStatus::Submitted { id, status, paths, .. }) => {
            println!("Invalidation {id} {status} ({paths} paths)")
        }
        Some(InvalidationStatus::Skipped { reason }) => println!("Invalidation skipped: {reason}"),
        Some(InvalidationStatus::Failed { error, .. }) => println!("Invalidation failed: {error}"),
        None => {}
    }
    println!("Publish complete: {}", report.summary_line());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_publish_flags() {
        let cli = Cli::try_parse_from([
            "bucket-publish",
            "--profile",
            "work-account",
            "--bucket",
            "site",
            "--key",
            "pfx/",
            "--base",
            "https://example.com/",
            "--pretend",
            "app.yaml",
        ])
        .unwrap();
        assert_eq!(cli.app, PathBuf::from("app.yaml"));
        assert_eq!(cli.profile.as_deref(), Some("work-account"));
        assert_eq!(cli.bucket.as_deref(), Some("site"));
        assert_eq!(cli.key_prefix, "pfx/");
        assert_eq!(cli.base.as_deref(), Some("https://example.com/"));
        assert!(cli.pretend);
        assert_eq!(cli.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn dry_run_is_an_alias_for_pretend() {
        let cli = Cli::try_parse_from(["bucket-publish", "--dry-run", "app.yaml"]).unwrap();
        assert!(cli.pretend);
    }

    #[test]
    fn app_argument_is_required() {
        let err = Cli::try_parse_from(["bucket-publish", "--bucket", "site"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
