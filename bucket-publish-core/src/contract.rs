//! # contract: capabilities consumed by the publishing pipeline
//!
//! This module defines the three traits the pipeline talks to and the plain
//! data types that cross them:
//! - [`Renderer`]: lists the application's resources and renders one of them.
//! - [`Store`]: reads the bucket website configuration and writes objects.
//! - [`Cdn`]: submits an invalidation batch.
//!
//! ## Interface & Extensibility
//! - All methods are async and return boxed errors ([`CapabilityError`]).
//! - The traits carry no transport or credential details; implementors own
//!   their clients and configuration.
//!
//! ## Mocking & Testing
//! - Each trait is annotated for `mockall` so tests (in this crate and
//!   downstream with the `test-export-mocks` feature) get `MockRenderer`,
//!   `MockStore` and `MockCdn`.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Error type returned by every capability (simple boxed error).
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync>;

/// Scheme and authority an application declares as its canonical origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedOrigin {
    pub scheme: String,
    /// May be empty, e.g. for `urn:` style identifiers.
    pub authority: String,
}

/// A request for one resource.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    /// Absolute URI of the resource to render.
    pub identifier: &'a str,
    /// Value of the `Accept` header sent with the request.
    pub accept: &'a str,
}

/// A fully materialised rendered response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedResponse {
    /// Status code, when the renderer set one. Absent means 200.
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RenderedResponse {
    /// Status code with the implicit 200 applied.
    pub fn effective_status(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    /// The content type, if present and not empty.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref().filter(|ct| !ct.is_empty())
    }
}

/// Renders the application's resources.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    /// List every resource identifier the application can render.
    async fn listing(&self) -> Result<Vec<String>, CapabilityError>;

    /// Render a single resource to a materialised response.
    async fn render<'a>(&self, req: RenderRequest<'a>) -> Result<RenderedResponse, CapabilityError>;

    /// The origin the application is fixed to, used to default the base URI.
    fn fixed_origin(&self) -> Option<FixedOrigin>;
}

/// Website hosting configuration of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteConfig {
    /// Index document suffix, e.g. `index.html`.
    pub index_suffix: Option<String>,
    /// Key of the error document, e.g. `404.html`.
    pub error_key: Option<String>,
}

/// Minimal data needed to write one object.
#[derive(Debug, Clone)]
pub struct PutObject<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    pub body: &'a [u8],
    pub content_type: &'a str,
}

/// Returned after a successful put.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOutcome {
    pub etag: Option<String>,
}

/// Metadata of an object already present in the bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteObject {
    pub etag: Option<String>,
}

/// Object storage backing the website.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the bucket's website configuration. `None` when the bucket is not
    /// configured as a website.
    async fn get_bucket_website(&self, bucket: &str) -> Result<Option<WebsiteConfig>, CapabilityError>;

    /// Write one object.
    async fn put_object<'a>(&self, req: PutObject<'a>) -> Result<PutOutcome, CapabilityError>;

    /// Look up an existing object. `None` when there is no object at `key`.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<RemoteObject>, CapabilityError>;
}

/// One invalidation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRequest {
    pub distribution_id: String,
    /// Unique per batch; lets the CDN recognise a retried submission.
    pub caller_reference: String,
    /// Paths to invalidate, each starting with `/`.
    pub paths: Vec<String>,
}

/// Returned after the CDN accepted a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReceipt {
    pub id: String,
    pub status: String,
}

/// Content delivery network in front of the bucket.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Cdn: Send + Sync {
    async fn create_invalidation(
        &self,
        req: InvalidationRequest,
    ) -> Result<InvalidationReceipt, CapabilityError>;
}
