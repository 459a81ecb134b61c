use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{
    executor::{QueryExecutor, RequestPolicy},
    graphql::{MY_STORAGE_STATS, Variables},
    models::StorageStats,
    poll::SyncView,
    view::{MountTicket, ViewCell, ViewState},
};

/// Deduplication savings of the current user. Fetched independently of the
/// file list; the first load may come from cache.
pub struct StatsView {
    executor: QueryExecutor,
    cell: ViewCell<StorageStats>,
}

impl StatsView {
    #[must_use]
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            executor,
            cell: ViewCell::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ViewState<StorageStats> {
        self.cell.snapshot()
    }

    #[must_use]
    pub fn stats(&self) -> Option<StorageStats> {
        self.cell.data()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<StorageStats>> {
        self.cell.subscribe()
    }

    /// Fetch `myStorageStats` under the given cache policy
    async fn fetch(&self, policy: RequestPolicy) {
        self.cell
            .track(|| async {
                let data = self
                    .executor
                    .execute(&MY_STORAGE_STATS, Variables::new(), policy)
                    .await
                    .into_result()?;
                MY_STORAGE_STATS.decode_required::<StorageStats>(&data).map_err(Arc::new)
            })
            .await;
    }
}

#[async_trait]
impl SyncView for StatsView {
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

impl std::fmt::Debug for StatsView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsView").field("cell", &self.cell).finish_non_exhaustive()
    }
}
