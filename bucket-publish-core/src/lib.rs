#![doc = "bucket-publish-core: core logic library for bucket-publish."]

//! This crate contains the publishing pipeline: scope filtering, key mapping,
//! bounded-concurrency render and upload, error-document handling and the
//! optional CDN invalidation step.
//! No network code lives here; concrete renderers, stores and CDN clients are
//! plugged in through the traits in [`contract`].
//!
//! # Usage
//! Build a [`config::PublishConfig`], hand it to [`publish::publish_site`]
//! together with a [`contract::Renderer`] and a [`contract::Store`], and
//! inspect the returned [`publish::RunReport`].

pub mod config;
pub mod contract;
pub mod error_document;
pub mod errors;
pub mod invalidate;
pub mod keys;
pub mod publish;
pub mod scope;
