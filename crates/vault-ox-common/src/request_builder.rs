use std::collections::HashMap;

use bytes::Bytes;
use reqwest::{
    Method, RequestBuilder as ReqwestRequestBuilder, Response,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{self, CommonRequestError};

/// The two verbs the vault backend understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        if method == HttpMethod::Get { Method::GET } else { Method::POST }
    }
}

/// Path relative to a builder's base URL, plus headers for this call only
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
            headers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds the header only when a value is present.
    #[must_use]
    pub fn with_optional_header(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.with_header(name, value)
        } else {
            self
        }
    }
}

/// Base URL and headers shared by every request of one builder
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub base_url: String,
    pub default_headers: HashMap<String, String>,
    pub user_agent: Option<String>,
}

impl RequestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Thin wrapper over `reqwest` that knows the base URL and default headers
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: reqwest::Client,
    config: RequestConfig,
}

impl RequestBuilder {
    pub fn new(client: reqwest::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Full URL for an endpoint path. An empty path addresses the base URL itself.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    /// Request for `endpoint` with every configured header applied.
    ///
    /// Bad URLs and header values are reported here instead of at send time.
    pub fn build_request(&self, endpoint: &Endpoint) -> Result<ReqwestRequestBuilder, CommonRequestError> {
        let url = self.url_for(&endpoint.path);
        let url = reqwest::Url::parse(&url)
            .map_err(|e| CommonRequestError::RequestBuilder(format!("invalid url {url}: {e}")))?;
        let headers = self.headers_for(endpoint)?;
        Ok(self.client.request(endpoint.method.into(), url).headers(headers))
    }

    /// Default headers, then the endpoint's own, then the user agent
    fn headers_for(&self, endpoint: &Endpoint) -> Result<HeaderMap, CommonRequestError> {
        let mut headers = HeaderMap::new();
        let pairs = self
            .config
            .default_headers
            .iter()
            .chain(&endpoint.headers);
        for (key, value) in pairs {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| CommonRequestError::RequestBuilder(format!("invalid header name {key}: {e}")))?;
            headers.insert(name, header_value(key, value)?);
        }
        if let Some(ref user_agent) = self.config.user_agent {
            headers.insert(USER_AGENT, header_value("user-agent", user_agent)?);
        }
        Ok(headers)
    }

    /// POST or GET with an optional JSON body, decoding a JSON answer.
    pub async fn request_json<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<T, CommonRequestError> {
        let mut req = self.build_request(endpoint)?;
        if let Some(body) = body {
            let payload = serde_json::to_vec(body)?;
            log::trace!(
                "{:?} {} payload: {}",
                endpoint.method,
                endpoint.path,
                String::from_utf8_lossy(&payload)
            );
            req = req.header(CONTENT_TYPE, "application/json").body(payload);
        }
        decode_json(req.send().await?).await
    }

    /// Raw response body, e.g. a file download
    pub async fn request_bytes(&self, endpoint: &Endpoint) -> Result<Bytes, CommonRequestError> {
        let res = self.build_request(endpoint)?.send().await?;
        success_body(res).await
    }

    /// Multipart upload; the form sets its own content type and boundary.
    pub async fn request_multipart<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        form: MultipartForm,
    ) -> Result<T, CommonRequestError> {
        log::trace!("{:?} {} with {} part(s)", endpoint.method, endpoint.path, form.len());
        let res = self.build_request(endpoint)?.multipart(form.build()).send().await?;
        decode_json(res).await
    }
}

fn header_value(key: &str, value: &str) -> Result<HeaderValue, CommonRequestError> {
    HeaderValue::from_str(value)
        .map_err(|e| CommonRequestError::RequestBuilder(format!("invalid value for header {key}: {e}")))
}

/// Body of a success response; failure statuses become errors
async fn success_body(res: Response) -> Result<Bytes, CommonRequestError> {
    let status = res.status();
    let body = res.bytes().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(error::parse_error_response(status, &body))
    }
}

/// Success body decoded as JSON. A 2xx that is not the expected JSON (a proxy
/// page, say) is an unexpected response rather than a decode error.
async fn decode_json<T: DeserializeOwned>(res: Response) -> Result<T, CommonRequestError> {
    let status = res.status();
    let body = success_body(res).await?;
    serde_json::from_slice(&body).map_err(|e| {
        CommonRequestError::UnexpectedResponse(format!(
            "HTTP {} with undecodable body ({e}): {}",
            status.as_u16(),
            String::from_utf8_lossy(&body)
        ))
    })
}

/// Multipart body under construction. Counts its parts so callers can
/// refuse to send an empty upload.
#[derive(Default)]
pub struct MultipartForm {
    form: Form,
    parts: usize,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: String, part: Part) -> Self {
        self.form = self.form.part(name, part);
        self.parts += 1;
        self
    }

    #[must_use]
    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name.into(), Part::text(value.into()))
    }

    /// File part; the server decides the content type.
    #[must_use]
    pub fn file_from_bytes(self, name: impl Into<String>, filename: impl Into<String>, data: Vec<u8>) -> Self {
        self.push(name.into(), Part::bytes(data).file_name(filename.into()))
    }

    /// File part with a declared content type. Fails if `mime_type` does not parse.
    pub fn file_from_bytes_with_mime(
        self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<Self, CommonRequestError> {
        let part = Part::bytes(data)
            .file_name(filename.into())
            .mime_str(mime_type)
            .map_err(|e| CommonRequestError::RequestBuilder(format!("invalid mime type {mime_type}: {e}")))?;
        Ok(self.push(name.into(), part))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts == 0
    }

    pub fn build(self) -> Form {
        self.form
    }
}
