//! `Store` implementation over the S3 REST API.
//!
//! [`S3Client`] owns one `reqwest::Client` (and therefore one connection pool)
//! built from an explicit [`StoreConfig`]. Dropping the client releases the
//! pool; the CLI builds one per run.
//!
//! - Virtual-hosted addressing (`https://{bucket}.s3.{region}.amazonaws.com/{key}`)
//!   by default, path-style (`{endpoint}/{bucket}/{key}`) with a custom endpoint.
//! - Requests are signed with SigV4 when credentials are present and sent
//!   unsigned otherwise.

use async_trait::async_trait;
use bucket_publish_core::contract::{
    CapabilityError, PutObject, PutOutcome, RemoteObject, Store, WebsiteConfig,
};
use regex::Regex;
use reqwest::{Method, Response, StatusCode};
use url::Url;

use crate::credentials::Credentials;
use crate::sigv4::{self, uri_encode, SignableRequest};

/// Explicit configuration for one [`S3Client`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub region: String,
    /// S3-compatible endpoint; switches to path-style addressing.
    pub endpoint: Option<Url>,
    /// `None` sends unsigned requests.
    pub credentials: Option<Credentials>,
}

pub struct S3Client {
    http: reqwest::Client,
    config: StoreConfig,
}

/// A resolved request target.
#[derive(Debug)]
struct Target {
    url: Url,
    host: String,
    path: String,
}

impl S3Client {
    pub fn new(config: StoreConfig) -> Result<Self, CapabilityError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(bucket_publish_core::config::DEFAULT_CONCURRENCY)
            .build()?;
        tracing::info!(
            region = %config.region,
            endpoint = ?config.endpoint.as_ref().map(Url::as_str),
            signed = config.credentials.is_some(),
            "Initialized S3Client"
        );
        Ok(S3Client { http, config })
    }

    fn target(&self, bucket: &str, key: Option<&str>, query: &[(&str, &str)]) -> Result<Target, CapabilityError> {
        if let Some(key) = key {
            if has_dot_segment(key) {
                return Err(format!("key {key:?} has a '.' or '..' segment and cannot be addressed").into());
            }
        }
        let encoded_key = key.map(|k| uri_encode(k, false)).unwrap_or_default();
        let (origin, path) = match &self.config.endpoint {
            Some(endpoint) => {
                let origin = endpoint.origin().ascii_serialization();
                let path = match key {
                    Some(_) => format!("/{}/{}", uri_encode(bucket, true), encoded_key),
                    None => format!("/{}", uri_encode(bucket, true)),
                };
                (origin, path)
            }
            None => (
                format!("https://{bucket}.s3.{}.amazonaws.com", self.config.region),
                format!("/{encoded_key}"),
            ),
        };
        let query_string = query
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    uri_encode(k, true)
                } else {
                    format!("{}={}", uri_encode(k, true), uri_encode(v, true))
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        let raw = if query_string.is_empty() {
            format!("{origin}{path}")
        } else {
            format!("{origin}{path}?{query_string}")
        };
        let url = Url::parse(&raw)?;
        // The signed path must be the path actually sent.
        if url.path() != path {
            return Err(format!("request path {path:?} was rewritten to {:?}", url.path()).into());
        }
        let host = host_header(&url)?;
        Ok(Target { url, host, path })
    }

    async fn send(
        &self,
        method: Method,
        target: Target,
        query: &[(&str, &str)],
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Response, CapabilityError> {
        let mut builder = self.http.request(method.clone(), target.url.clone());
        let extra: Vec<(&str, &str)> = content_type.map(|ct| ("content-type", ct)).into_iter().collect();
        for (name, value) in &extra {
            builder = builder.header(*name, *value);
        }
        if let Some(credentials) = &self.config.credentials {
            let signable = SignableRequest {
                method: method.as_str(),
                host: &target.host,
                path: &target.path,
                query,
                headers: &extra,
                payload: body,
            };
            let signed = sigv4::sign(&signable, credentials, &self.config.region, "s3", chrono::Utc::now())?;
            for (name, value) in signed {
                builder = builder.header(name, value);
            }
        }
        if method == Method::PUT || !body.is_empty() {
            builder = builder.body(body.to_vec());
        }
        Ok(builder.send().await?)
    }
}

#[async_trait]
impl Store for S3Client {
    async fn get_bucket_website(&self, bucket: &str) -> Result<Option<WebsiteConfig>, CapabilityError> {
        tracing::info!(bucket, "Fetching bucket website configuration");
        let query = [("website", "")];
        let target = self.target(bucket, None, &query)?;
        let resp = self.send(Method::GET, target, &query, None, &[]).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            if error_code(&body).as_deref() == Some("NoSuchWebsiteConfiguration") {
                tracing::info!(bucket, "Bucket has no website configuration");
                return Ok(None);
            }
            return Err(format!("S3 GET website failed: 404 {}", error_code(&body).unwrap_or_default()).into());
        }
        let body = read_success(resp, "GET website").await?;
        let website = parse_website_config(&body)?;
        tracing::info!(
            bucket,
            error_key = ?website.error_key,
            index_suffix = ?website.index_suffix,
            "Fetched bucket website configuration"
        );
        Ok(Some(website))
    }

    async fn put_object<'a>(&self, req: PutObject<'a>) -> Result<PutOutcome, CapabilityError> {
        tracing::debug!(bucket = req.bucket, key = req.key, bytes = req.body.len(), "Putting object");
        let target = self.target(req.bucket, Some(req.key), &[])?;
        let resp = self
            .send(Method::PUT, target, &[], Some(req.content_type), req.body)
            .await?;
        let etag = etag_header(&resp);
        read_success(resp, "PUT object").await?;
        Ok(PutOutcome { etag })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<RemoteObject>, CapabilityError> {
        let target = self.target(bucket, Some(key), &[])?;
        let resp = self.send(Method::HEAD, target, &[], None, &[]).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(RemoteObject { etag: etag_header(&resp) })),
            status => Err(format!("S3 HEAD object failed: {status}").into()),
        }
    }
}

/// URL parsing resolves `.` and `..` segments, encoded as `%2E` or not, so
/// such keys would be written somewhere else than asked.
fn has_dot_segment(key: &str) -> bool {
    key.split('/').any(|segment| segment == "." || segment == "..")
}

fn host_header(url: &Url) -> Result<String, CapabilityError> {
    let host = url.host_str().ok_or("request URL has no host")?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn etag_header(resp: &Response) -> Option<String> {
    resp.headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn read_success(resp: Response, op: &str) -> Result<String, CapabilityError> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        let code = error_code(&body).unwrap_or_else(|| "UnknownError".to_string());
        tracing::error!(status = %status, code = %code, op, "S3 request failed");
        Err(format!("S3 {op} failed: {status} {code}").into())
    }
}

/// The `<Code>` of an S3 XML error body.
pub fn error_code(body: &str) -> Option<String> {
    xml_text(body, r"<Code>(.*?)</Code>")
}

/// Read the error document key and index suffix out of a
/// `WebsiteConfiguration` document.
pub fn parse_website_config(xml: &str) -> Result<WebsiteConfig, CapabilityError> {
    let error_re = Regex::new(r"(?s)<ErrorDocument>\s*<Key>(.*?)</Key>")?;
    let index_re = Regex::new(r"(?s)<IndexDocument>\s*<Suffix>(.*?)</Suffix>")?;
    let capture = |re: &Regex| {
        re.captures(xml)
            .and_then(|c| c.get(1))
            .map(|m| xml_unescape(m.as_str().trim()))
    };
    Ok(WebsiteConfig {
        index_suffix: capture(&index_re),
        error_key: capture(&error_re),
    })
}

pub(crate) fn xml_text(body: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| xml_unescape(m.as_str()))
}

pub(crate) fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub(crate) fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
