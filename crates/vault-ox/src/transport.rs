use async_trait::async_trait;
use bytes::Bytes;
#[cfg(feature = "leaky-bucket")]
use leaky_bucket::RateLimiter;
use serde::Deserialize;
#[cfg(feature = "leaky-bucket")]
use std::sync::Arc;
use vault_ox_common::{Endpoint, HttpMethod, RequestBuilder, RequestConfig};

use crate::{
    config::VaultConfig,
    error::{GraphqlError, VaultError},
    graphql::{GraphqlRequest, GraphqlResponse},
    identity::{IDENTITY_HEADER, Identity},
    upload::{self, UploadFile},
};

/// Outbound side of the client. Everything the sync layer sends goes
/// through one of these calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a GraphQL query or mutation.
    async fn execute(
        &self,
        request: GraphqlRequest,
        identity: Option<Identity>,
    ) -> Result<GraphqlResponse, VaultError>;

    /// Multipart upload of one or more files.
    async fn upload(&self, files: Vec<UploadFile>, identity: Identity) -> Result<(), VaultError>;

    /// Fetch a file through its public link. No identity is sent.
    async fn download_public(&self, token: &str) -> Result<Bytes, VaultError>;
}

/// Body the upload endpoint answers with
#[derive(Debug, Deserialize)]
struct UploadAck {
    #[serde(default)]
    ok: bool,
}

/// [`Transport`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    graphql: RequestBuilder,
    service: RequestBuilder,
    #[cfg(feature = "leaky-bucket")]
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &VaultConfig) -> Self {
        let mut graphql = RequestConfig::new(config.api_url.clone());
        let mut service = RequestConfig::new(config.base_url());
        if let Some(ref user_agent) = config.user_agent {
            graphql = graphql.with_user_agent(user_agent.clone());
            service = service.with_user_agent(user_agent.clone());
        }

        Self {
            graphql: RequestBuilder::new(client.clone(), graphql),
            service: RequestBuilder::new(client, service),
            #[cfg(feature = "leaky-bucket")]
            rate_limiter: None,
        }
    }

    #[cfg(feature = "leaky-bucket")]
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Wait for the rate limiter, when one is configured
    async fn throttle(&self) {
        #[cfg(feature = "leaky-bucket")]
        if let Some(ref limiter) = self.rate_limiter {
            limiter.acquire_one().await;
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: GraphqlRequest,
        identity: Option<Identity>,
    ) -> Result<GraphqlResponse, VaultError> {
        self.throttle().await;
        let endpoint = Endpoint::new("", HttpMethod::Post)
            .with_optional_header(IDENTITY_HEADER, identity.map(|i| i.to_string()));

        Ok(self.graphql.request_json(&endpoint, Some(&request)).await?)
    }

    async fn upload(&self, files: Vec<UploadFile>, identity: Identity) -> Result<(), VaultError> {
        self.throttle().await;
        let form = upload::build_form(files)?;
        let endpoint =
            Endpoint::new("upload", HttpMethod::Post).with_header(IDENTITY_HEADER, identity.to_string());

        let ack: UploadAck = self.service.request_multipart(&endpoint, form).await?;
        if ack.ok {
            Ok(())
        } else {
            Err(VaultError::Server(vec![GraphqlError {
                message: "upload rejected".to_string(),
                path: None,
            }]))
        }
    }

    async fn download_public(&self, token: &str) -> Result<Bytes, VaultError> {
        if token.is_empty() {
            return Err(VaultError::validation("empty public token"));
        }
        self.throttle().await;
        let endpoint = Endpoint::new(format!("d/{token}"), HttpMethod::Get);
        Ok(self.service.request_bytes(&endpoint).await?)
    }
}
