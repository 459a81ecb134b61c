//! Admin panel data: every file and every user, loaded together.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::watch;

use crate::{
    error::VaultError,
    executor::{QueryExecutor, RequestPolicy},
    graphql::{ALL_FILES, ALL_USERS, Operation, Variables},
    models::{FileRecord, Role, UserRecord},
    mutation::MutationDispatcher,
    poll::SyncView,
    view::{MountTicket, ViewCell, ViewState},
};

/// Both admin collections. Replaced wholesale on every successful load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminData {
    pub files: Vec<FileRecord>,
    pub users: Vec<UserRecord>,
}

impl AdminData {
    #[must_use]
    pub fn user(&self, user_id: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == user_id)
    }
}

/// Loads `allFiles` and `allUsers` concurrently and only shows them once both
/// have settled. If either fails the view is errored and keeps the previous
/// collections.
pub struct AdminView {
    executor: QueryExecutor,
    mutations: MutationDispatcher,
    page_size: u32,
    cell: ViewCell<AdminData>,
}

impl AdminView {
    #[must_use]
    pub fn new(executor: QueryExecutor, mutations: MutationDispatcher, page_size: u32) -> Self {
        Self {
            executor,
            mutations,
            page_size,
            cell: ViewCell::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ViewState<AdminData> {
        self.cell.snapshot()
    }

    #[must_use]
    pub fn data(&self) -> AdminData {
        self.cell.data().unwrap_or_default()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<AdminData>> {
        self.cell.subscribe()
    }

    /// Variables shared by both admin queries
    fn page(&self) -> Variables {
        match json!({ "limit": self.page_size, "offset": 0 }) {
            serde_json::Value::Object(map) => map,
            _ => Variables::new(),
        }
    }

    /// Run one admin list query and decode its root field
    async fn list<T: serde::de::DeserializeOwned>(&self, operation: &Operation) -> Result<Vec<T>, Arc<VaultError>> {
        let data = self
            .executor
            .execute(operation, self.page(), RequestPolicy::NetworkOnly)
            .await
            .into_result()?;
        operation.decode_list(&data).map_err(Arc::new)
    }

    /// Fetch both collections concurrently; the view updates once both settle.
    pub async fn reload(&self) {
        self.cell
            .track(|| async {
                let (files, users) = futures_util::future::join(
                    self.list::<FileRecord>(&ALL_FILES),
                    self.list::<UserRecord>(&ALL_USERS),
                )
                .await;
                Ok::<_, Arc<VaultError>>(AdminData {
                    files: files?,
                    users: users?,
                })
            })
            .await;
    }

    /// Set a user's role, then reload both collections.
    pub async fn set_role(&self, user_id: &str, role: Role) -> Result<(), Arc<VaultError>> {
        let result = self.mutations.set_user_role(user_id, &role).await;
        self.cell.settle_action(result)?;
        self.reload().await;
        Ok(())
    }

    /// Flip the user between admin and user based on the role currently on
    /// display. Returns the role that was requested.
    pub async fn toggle_role(&self, user_id: &str) -> Result<Role, Arc<VaultError>> {
        let current = self
            .cell
            .with_state(|state| state.data.as_ref().and_then(|d| d.user(user_id)).map(|u| u.role.clone()));
        let Some(current) = current else {
            return self
                .cell
                .settle_action(Err(VaultError::validation(format!("unknown user {user_id}"))));
        };

        let target = current.toggled();
        self.set_role(user_id, target.clone()).await?;
        Ok(target)
    }
}

#[async_trait]
impl SyncView for AdminView {
    async fn load(&self) {
        self.reload().await;
    }

    async fn refresh(&self) {
        self.reload().await;
    }

    fn open(&self) -> MountTicket {
        self.cell.open()
    }

    fn close(&self, generation: u64) {
        self.cell.close(generation);
    }
}

impl std::fmt::Debug for AdminView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminView")
            .field("page_size", &self.page_size)
            .field("cell", &self.cell)
            .finish_non_exhaustive()
    }
}
