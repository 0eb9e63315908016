//! `Renderer` implementation that renders by fetching from a running application.
//!
//! Each resource identifier is requested from the manifest's `origin` (path
//! and query kept, scheme and authority replaced). The original authority is
//! sent as the `Host` header so virtual-hosted applications answer as they
//! would in production. Redirects are not followed: a redirect is a non-200
//! response and fails that resource.

use async_trait::async_trait;
use bucket_publish_core::contract::{
    CapabilityError, FixedOrigin, RenderRequest, RenderedResponse, Renderer,
};
use url::Url;

use crate::load_app::AppManifest;

pub struct HttpRenderer {
    http: reqwest::Client,
    origin: Option<Url>,
    manifest: AppManifest,
}

impl HttpRenderer {
    pub fn new(manifest: AppManifest) -> Result<Self, CapabilityError> {
        let origin = manifest.origin.as_deref().map(Url::parse).transpose()?;
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        tracing::info!(origin = ?origin.as_ref().map(Url::as_str), "Initialized HttpRenderer");
        Ok(HttpRenderer {
            http,
            origin,
            manifest,
        })
    }

    /// The URL fetched for `identifier` and the `Host` it is fetched as.
    pub fn request_url(&self, identifier: &str) -> Result<(Url, Option<String>), CapabilityError> {
        let resource = Url::parse(identifier)?;
        let Some(origin) = &self.origin else {
            return Ok((resource, None));
        };
        let mut url = origin.clone();
        url.set_path(resource.path());
        url.set_query(resource.query());
        let host = resource.host_str().map(|h| match resource.port() {
            Some(port) => format!("{h}:{port}"),
            None => h.to_string(),
        });
        Ok((url, host))
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn listing(&self) -> Result<Vec<String>, CapabilityError> {
        Ok(self.manifest.resources.clone())
    }

    async fn render<'a>(&self, req: RenderRequest<'a>) -> Result<RenderedResponse, CapabilityError> {
        let (url, host) = self.request_url(req.identifier)?;
        tracing::debug!(uri = req.identifier, url = %url, "Rendering resource");

        let mut builder = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, req.accept);
        if let Some(host) = host {
            builder = builder.header(reqwest::header::HOST, host);
        }
        let resp = builder.send().await?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?.to_vec();
        Ok(RenderedResponse {
            status: Some(status),
            content_type,
            body,
        })
    }

    fn fixed_origin(&self) -> Option<FixedOrigin> {
        match (&self.manifest.fixed_scheme, &self.manifest.fixed_authority) {
            (Some(scheme), Some(authority)) => Some(FixedOrigin {
                scheme: scheme.clone(),
                authority: authority.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(origin: Option<&str>) -> AppManifest {
        AppManifest {
            origin: origin.map(str::to_string),
            fixed_scheme: Some("https".to_string()),
            fixed_authority: Some("example.com".to_string()),
            accept: None,
            not_found: None,
            resources: vec!["https://example.com/index.html".to_string()],
        }
    }

    #[test]
    fn rewrites_identifier_onto_origin() {
        let renderer = HttpRenderer::new(manifest(Some("http://127.0.0.1:8080"))).unwrap();
        let (url, host) = renderer
            .request_url("https://example.com/blog/post.html?lang=en")
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/blog/post.html?lang=en");
        assert_eq!(host.as_deref(), Some("example.com"));
    }

    #[test]
    fn fetches_identifier_directly_without_origin() {
        let renderer = HttpRenderer::new(manifest(None)).unwrap();
        let (url, host) = renderer.request_url("http://localhost:3000/a.html").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/a.html");
        assert_eq!(host, None);
    }

    #[test]
    fn fixed_origin_needs_scheme_and_authority() {
        let renderer = HttpRenderer::new(manifest(None)).unwrap();
        assert_eq!(
            renderer.fixed_origin(),
            Some(FixedOrigin {
                scheme: "https".to_string(),
                authority: "example.com".to_string(),
            })
        );

        let mut m = manifest(None);
        m.fixed_authority = None;
        assert_eq!(HttpRenderer::new(m).unwrap().fixed_origin(), None);
    }

    #[tokio::test]
    async fn listing_returns_manifest_resources() {
        let renderer = HttpRenderer::new(manifest(None)).unwrap();
        assert_eq!(
            renderer.listing().await.unwrap(),
            vec!["https://example.com/index.html".to_string()]
        );
    }
}
