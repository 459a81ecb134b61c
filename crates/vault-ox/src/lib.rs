#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Client-side sync layer for the file-vault storage service.
//!
//! [`Vault`] wires an identity, a [`Transport`] and a [`QueryExecutor`]
//! together and hands out views: the filtered file list, storage stats and
//! the admin panel. Views are plain state holders; mount them with
//! [`Vault::mount`] to get an initial load plus periodic forced refresh.

pub mod admin;
pub mod config;
pub mod error;
pub mod executor;
pub mod files;
pub mod filter;
pub mod graphql;
pub mod identity;
pub mod models;
pub mod mutation;
pub mod poll;
pub mod stats;
pub mod transport;
pub mod upload;
pub mod view;

// Re-export main types
pub use admin::{AdminData, AdminView};
pub use config::VaultConfig;
pub use error::{ErrorKind, GraphqlError, VaultError};
pub use executor::{OperationResult, QueryExecutor, RequestPolicy};
pub use files::FileListView;
pub use filter::{FilterCriteria, FilterInput, MyFilesVariables};
pub use graphql::{GraphqlRequest, GraphqlResponse, Operation, Variables};
pub use identity::{FileIdentityStore, Identity, IdentityProvider, IdentityStore, MemoryIdentityStore};
pub use models::{FileRecord, Role, StorageStats, UserRecord};
pub use mutation::MutationDispatcher;
pub use poll::{PollHandle, SyncView, ViewMount};
pub use stats::StatsView;
pub use transport::{HttpTransport, Transport};
pub use upload::UploadFile;
pub use view::{FetchStatus, ViewState};

// Re-export types from vault-ox-common for convenience
pub use vault_ox_common::Timestamp;

use std::sync::Arc;

/// Entry point: owns the shared identity, executor and mutation dispatcher.
#[derive(Clone)]
pub struct Vault {
    config: VaultConfig,
    executor: QueryExecutor,
    mutations: MutationDispatcher,
}

impl Vault {
    /// HTTP client for `config`. The identity lives in the configured file, or
    /// in memory when no data directory can be determined.
    #[must_use]
    pub fn new(config: VaultConfig) -> Self {
        let transport = HttpTransport::new(reqwest::Client::new(), &config);
        let identity = match config.resolved_identity_path() {
            Some(path) => IdentityProvider::new(FileIdentityStore::new(path)),
            None => {
                log::warn!("no data directory for the identity file, keeping it in memory");
                IdentityProvider::in_memory()
            }
        };
        Self::with_transport(config, Arc::new(transport), identity)
    }

    /// Build from `VAULT_*` environment variables.
    pub fn from_env() -> Result<Self, VaultError> {
        Ok(Self::new(VaultConfig::from_env()?))
    }

    /// Client over any transport, e.g. an in-process fake.
    #[must_use]
    pub fn with_transport(config: VaultConfig, transport: Arc<dyn Transport>, identity: IdentityProvider) -> Self {
        let executor = QueryExecutor::new(transport, identity);
        let mutations = MutationDispatcher::new(executor.clone());
        Self {
            config,
            executor,
            mutations,
        }
    }

    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityProvider {
        self.executor.identity()
    }

    #[must_use]
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    #[must_use]
    pub fn mutations(&self) -> &MutationDispatcher {
        &self.mutations
    }

    #[must_use]
    pub fn files_view(&self) -> Arc<FileListView> {
        Arc::new(FileListView::new(
            self.executor.clone(),
            self.mutations.clone(),
            self.config.page_size,
        ))
    }

    #[must_use]
    pub fn stats_view(&self) -> Arc<StatsView> {
        Arc::new(StatsView::new(self.executor.clone()))
    }

    #[must_use]
    pub fn admin_view(&self) -> Arc<AdminView> {
        Arc::new(AdminView::new(
            self.executor.clone(),
            self.mutations.clone(),
            self.config.page_size,
        ))
    }

    /// Mount a view with the configured poll interval. Creates the identity
    /// if there is none yet. Needs a tokio runtime.
    pub fn mount<V: SyncView + 'static>(&self, view: Arc<V>) -> ViewMount<V> {
        let _ = self.identity().ensure_identity();
        ViewMount::new(view, self.config.poll_interval)
    }

    /// Upload one or more files. Creates the identity if there is none yet.
    pub async fn upload(&self, files: Vec<UploadFile>) -> Result<(), VaultError> {
        if files.is_empty() {
            return Err(VaultError::validation("no files to upload"));
        }
        let identity = self.identity().ensure_identity();
        let count = files.len();
        let result = self.executor.transport().upload(files, identity).await;
        match result {
            Ok(()) => log::debug!("uploaded {count} file(s)"),
            Err(ref e) => log::warn!("upload of {count} file(s) failed: {e}"),
        }
        result
    }

    /// Public download URL for a link token
    #[must_use]
    pub fn public_link_url(&self, token: &str) -> String {
        self.config.public_link_url(token)
    }

    /// Fetch a file through its public link, without identity.
    pub async fn download_public(&self, token: &str) -> Result<bytes::Bytes, VaultError> {
        self.executor.transport().download_public(token).await
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
