#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Shared HTTP plumbing for the file-vault client
//!
//! Everything that touches `reqwest` directly lives here, so the sync layer in
//! `vault-ox` only deals with GraphQL requests and typed records.

pub mod error;
pub mod request_builder;
pub mod timestamp;

pub use error::CommonRequestError;
pub use request_builder::{Endpoint, HttpMethod, MultipartForm, RequestBuilder, RequestConfig};
pub use timestamp::Timestamp;
