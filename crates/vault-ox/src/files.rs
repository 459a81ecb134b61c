//! The user's file list: facet filters, pagination and link actions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{
    error::VaultError,
    executor::{QueryExecutor, RequestPolicy},
    filter::{FilterCriteria, FilterInput, MyFilesVariables},
    graphql::MY_FILES,
    models::FileRecord,
    mutation::MutationDispatcher,
    poll::SyncView,
    view::{MountTicket, ViewCell, ViewState},
};

/// Filter form plus page window; read fresh on every fetch
#[derive(Debug, Clone)]
struct ListParams {
    filters: FilterInput,
    limit: u32,
    offset: u32,
}

/// Filtered, refreshable view of `myFiles`.
///
/// Editing filters never fetches. A fetch happens on [`FileListView::apply`],
/// on every poll tick and after each successful mutation, and always uses the
/// filters as they are at that moment.
pub struct FileListView {
    executor: QueryExecutor,
    mutations: MutationDispatcher,
    params: Mutex<ListParams>,
    cell: ViewCell<Vec<FileRecord>>,
}

impl FileListView {
    #[must_use]
    pub fn new(executor: QueryExecutor, mutations: MutationDispatcher, page_size: u32) -> Self {
        Self {
            executor,
            mutations,
            params: Mutex::new(ListParams {
                filters: FilterInput::default(),
                limit: page_size,
                offset: 0,
            }),
            cell: ViewCell::new(),
        }
    }

    /// Lock the list parameters, recovering from a poisoned mutex
    fn params(&self) -> MutexGuard<'_, ListParams> {
        self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn filters(&self) -> FilterInput {
        self.params().filters.clone()
    }

    /// Replace the filter form. Does not fetch.
    pub fn set_filters(&self, filters: FilterInput) {
        self.params().filters = filters;
    }

    /// Edit the filter form in place. Does not fetch.
    pub fn update_filters(&self, edit: impl FnOnce(&mut FilterInput)) {
        edit(&mut self.params().filters);
    }

    /// Change the page window. Does not fetch.
    pub fn set_page(&self, limit: u32, offset: u32) {
        let mut params = self.params();
        params.limit = limit;
        params.offset = offset;
    }

    /// Query variables for the current filters and page
    #[must_use]
    pub fn variables(&self) -> MyFilesVariables {
        let params = self.params();
        MyFilesVariables::new(FilterCriteria::from(&params.filters), params.limit, params.offset)
    }

    #[must_use]
    pub fn state(&self) -> ViewState<Vec<FileRecord>> {
        self.cell.snapshot()
    }

    #[must_use]
    pub fn files(&self) -> Vec<FileRecord> {
        self.cell.data().unwrap_or_default()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<Vec<FileRecord>>> {
        self.cell.subscribe()
    }

    /// The "Apply" button: fetch now with the current filters.
    pub async fn apply(&self) {
        self.fetch(RequestPolicy::NetworkOnly).await;
    }

    /// Fetch `myFiles` and hand the result to the view cell
    async fn fetch(&self, policy: RequestPolicy) {
        self.cell
            .track(|| async {
                let variables = self.variables().into_variables();
                let data = self.executor.execute(&MY_FILES, variables, policy).await.into_result()?;
                MY_FILES.decode_list::<FileRecord>(&data).map_err(Arc::new)
            })
            .await;
    }

    /// Record a mutation outcome; re-read the list only if it succeeded
    async fn after_mutation<R>(&self, result: Result<R, VaultError>) -> Result<R, Arc<VaultError>> {
        let value = self.cell.settle_action(result)?;
        self.fetch(RequestPolicy::NetworkOnly).await;
        Ok(value)
    }

    /// Create a public link for a file and re-read the list. Returns the token.
    pub async fn create_public_link(&self, file_id: &str) -> Result<String, Arc<VaultError>> {
        let result = self.mutations.create_public_link(file_id).await;
        self.after_mutation(result).await
    }

    pub async fn revoke_public_link(&self, file_id: &str) -> Result<(), Arc<VaultError>> {
        let result = self.mutations.revoke_public_link(file_id).await;
        self.after_mutation(result).await
    }

    pub async fn set_public(&self, file_id: &str, is_public: bool) -> Result<(), Arc<VaultError>> {
        let result = self.mutations.set_public(file_id, is_public).await;
        self.after_mutation(result).await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), Arc<VaultError>> {
        let result = self.mutations.delete_file(file_id).await;
        self.after_mutation(result).await
    }
}

#[async_trait]
impl SyncView for FileListView {
    async fn load(&self) {
        self.fetch(RequestPolicy::CacheFirst).await;
    }

    async fn refresh(&self) {
        self.fetch(RequestPolicy::NetworkOnly).await;
    }

    fn open(&self) -> MountTicket {
        self.cell.open()
    }

    fn close(&self, generation: u64) {
        self.cell.close(generation);
    }
}

impl std::fmt::Debug for FileListView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileListView")
            .field("params", &*self.params())
            .field("cell", &self.cell)
            .finish_non_exhaustive()
    }
}
