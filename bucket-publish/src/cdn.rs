//! `Cdn` implementation for CloudFront invalidations.

use async_trait::async_trait;
use bucket_publish_core::contract::{Cdn, CapabilityError, InvalidationReceipt, InvalidationRequest};
use url::Url;

use crate::credentials::Credentials;
use crate::sigv4::{self, uri_encode, SignableRequest};
use crate::store::{xml_escape, xml_text};

const CLOUDFRONT_HOST: &str = "cloudfront.amazonaws.com";
const API_VERSION: &str = "2020-05-31";
/// CloudFront is a global service signed in us-east-1.
const SIGNING_REGION: &str = "us-east-1";

pub struct CloudFrontClient {
    http: reqwest::Client,
    credentials: Credentials,
    endpoint: Url,
}

impl CloudFrontClient {
    pub fn new(credentials: Credentials) -> Result<Self, CapabilityError> {
        let endpoint = Url::parse(&format!("https://{CLOUDFRONT_HOST}"))?;
        Self::with_endpoint(credentials, endpoint)
    }

    /// A client talking to `endpoint` instead of the public CloudFront API.
    pub fn with_endpoint(credentials: Credentials, endpoint: Url) -> Result<Self, CapabilityError> {
        let http = reqwest::Client::builder().build()?;
        tracing::info!(endpoint = %endpoint, "Initialized CloudFrontClient");
        Ok(CloudFrontClient {
            http,
            credentials,
            endpoint,
        })
    }
}

/// The `InvalidationBatch` XML document for `req`.
pub fn invalidation_batch_xml(req: &InvalidationRequest) -> String {
    let items: String = req
        .paths
        .iter()
        .map(|p| format!("<Path>{}</Path>", xml_escape(&uri_encode(p, false))))
        .collect();
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<InvalidationBatch xmlns="http://cloudfront.amazonaws.com/doc/{version}/">"#,
            "<Paths><Quantity>{quantity}</Quantity><Items>{items}</Items></Paths>",
            "<CallerReference>{reference}</CallerReference>",
            "</InvalidationBatch>"
        ),
        version = API_VERSION,
        quantity = req.paths.len(),
        items = items,
        reference = xml_escape(&req.caller_reference),
    )
}

#[async_trait]
impl Cdn for CloudFrontClient {
    async fn create_invalidation(
        &self,
        req: InvalidationRequest,
    ) -> Result<InvalidationReceipt, CapabilityError> {
        tracing::info!(
            distribution_id = %req.distribution_id,
            paths = req.paths.len(),
            "Creating CloudFront invalidation"
        );
        let path = format!(
            "/{API_VERSION}/distribution/{}/invalidation",
            uri_encode(&req.distribution_id, true)
        );
        let url = self.endpoint.join(&path)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err("CloudFront endpoint has no host".into()),
        };
        let body = invalidation_batch_xml(&req);
        let content_type = "application/xml";

        let signable = SignableRequest {
            method: "POST",
            host: &host,
            path: &path,
            query: &[],
            headers: &[("content-type", content_type)],
            payload: body.as_bytes(),
        };
        let signed = sigv4::sign(
            &signable,
            &self.credentials,
            SIGNING_REGION,
            "cloudfront",
            chrono::Utc::now(),
        )?;

        let mut builder = self
            .http
            .post(url)
            .header("content-type", content_type)
            .body(body);
        for (name, value) in signed {
            builder = builder.header(name, value);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            let code = xml_text(&text, r"<Code>(.*?)</Code>").unwrap_or_else(|| "UnknownError".to_string());
            tracing::error!(status = %status, code = %code, "CloudFront invalidation rejected");
            return Err(format!("CloudFront invalidation failed: {status} {code}").into());
        }
        Ok(InvalidationReceipt {
            id: xml_text(&text, r"<Id>(.*?)</Id>").unwrap_or_default(),
            status: xml_text(&text, r"<Status>(.*?)</Status>").unwrap_or_default(),
        })
    }
}
