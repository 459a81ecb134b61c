//! Observable per-view state with out-of-order response protection.
//!
//! Every fetch takes a sequence number when it is issued. A response is only
//! applied if it is newer than what is on display, so a slow early request can
//! never overwrite the result of a later one. Closing the view (unmount)
//! discards whatever is still in flight.

use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::VaultError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FetchStatus {
    /// Nothing requested yet
    #[default]
    Idle,
    Fetching,
    Ready,
    Errored,
}

/// Snapshot of a view, as handed to subscribers
#[derive(Debug, Clone)]
pub struct ViewState<T> {
    pub status: FetchStatus,
    /// Last known good data. Kept when a later fetch fails.
    pub data: Option<T>,
    /// Error of the most recently applied fetch
    pub error: Option<Arc<VaultError>>,
    /// Error of the last user action (mutation), cleared by the next successful one
    pub action_error: Option<Arc<VaultError>>,
    /// Sequence number of the response on display
    pub displayed_seq: u64,
    /// Sequence number of the most recently issued request
    pub issued_seq: u64,
    /// False once unmounted; requests are neither issued nor applied
    pub active: bool,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: None,
            error: None,
            action_error: None,
            displayed_seq: 0,
            issued_seq: 0,
            active: true,
        }
    }
}

impl<T> ViewState<T> {
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.status == FetchStatus::Fetching
    }

    /// Status once nothing newer is outstanding
    fn settled_status(&self) -> FetchStatus {
        if self.error.is_some() {
            FetchStatus::Errored
        } else if self.data.is_some() {
            FetchStatus::Ready
        } else {
            FetchStatus::Idle
        }
    }
}

/// Handed out by [`ViewCell::open`]; identifies one mount of a view
#[derive(Debug, Clone)]
pub struct MountTicket {
    pub generation: u64,
    pub token: CancellationToken,
}

/// Owner of a view's state. Data only ever changes through `complete`.
pub struct ViewCell<T> {
    state: watch::Sender<ViewState<T>>,
    mount: Mutex<Option<MountTicket>>,
    generations: AtomicU64,
}

impl<T> Default for ViewCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ViewCell<T> {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            state,
            mount: Mutex::new(None),
            generations: AtomicU64::new(0),
        }
    }

    /// Lock the mount slot, recovering from a poisoned mutex
    fn mount_slot(&self) -> MutexGuard<'_, Option<MountTicket>> {
        self.mount.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<T>> {
        self.state.subscribe()
    }

    /// Read the current state without cloning it
    pub fn with_state<R>(&self, f: impl FnOnce(&ViewState<T>) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Issue a new sequence number, or `None` if the view is closed.
    pub fn begin(&self) -> Option<u64> {
        let mut seq = None;
        self.state.send_if_modified(|state| {
            if !state.active {
                return false;
            }
            state.issued_seq += 1;
            state.status = FetchStatus::Fetching;
            seq = Some(state.issued_seq);
            true
        });
        seq
    }

    /// Apply the response for `seq` unless something newer is already shown
    /// or the view was closed. Returns whether it was applied.
    pub fn complete(&self, seq: u64, result: Result<T, Arc<VaultError>>) -> bool {
        self.state.send_if_modified(|state| {
            if !state.active {
                log::debug!("discarding response #{seq}: view closed");
                return false;
            }
            if seq <= state.displayed_seq {
                log::debug!(
                    "discarding stale response #{seq}, #{} already displayed",
                    state.displayed_seq
                );
                return false;
            }

            state.displayed_seq = seq;
            match result {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                }
                Err(error) => state.error = Some(error),
            }
            state.status = if seq >= state.issued_seq {
                state.settled_status()
            } else {
                FetchStatus::Fetching
            };
            true
        })
    }

    /// Run `fetch` under a fresh sequence number and apply its result.
    /// Nothing is fetched when the view is closed.
    pub async fn track<F, Fut>(&self, fetch: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Arc<VaultError>>>,
    {
        let Some(seq) = self.begin() else {
            log::debug!("view closed, not fetching");
            return false;
        };
        let result = fetch().await;
        self.complete(seq, result)
    }

    /// Record the outcome of a user action, turning its error into a shared one.
    pub fn settle_action<R>(&self, result: Result<R, VaultError>) -> Result<R, Arc<VaultError>> {
        let result = result.map_err(Arc::new);
        let action_error = result.as_ref().err().cloned();
        if let Some(ref error) = action_error {
            log::debug!("recording action error: {error}");
        }
        self.state.send_if_modified(|state| {
            let changed = state.action_error.is_some() || action_error.is_some();
            state.action_error = action_error;
            changed
        });
        result
    }

    /// Start a new mount. A previous mount, if any, is cancelled; requests it
    /// left in flight will not be applied.
    pub fn open(&self) -> MountTicket {
        let mut slot = self.mount_slot();
        if let Some(previous) = slot.take() {
            previous.token.cancel();
        }
        let ticket = MountTicket {
            generation: self.generations.fetch_add(1, Ordering::Relaxed) + 1,
            token: CancellationToken::new(),
        };
        *slot = Some(ticket.clone());

        self.state.send_modify(|state| {
            state.active = true;
            state.displayed_seq = state.issued_seq;
            if state.is_fetching() {
                state.status = state.settled_status();
            }
        });
        ticket
    }

    /// End the mount identified by `generation`. Stale generations are ignored.
    pub fn close(&self, generation: u64) {
        let mut slot = self.mount_slot();
        if !slot.as_ref().is_some_and(|t| t.generation == generation) {
            return;
        }
        if let Some(ticket) = slot.take() {
            ticket.token.cancel();
        }
        drop(slot);

        self.state.send_modify(|state| {
            state.active = false;
            if state.is_fetching() {
                state.status = state.settled_status();
            }
        });
    }
}

impl<T: Clone> ViewCell<T> {
    #[must_use]
    pub fn snapshot(&self) -> ViewState<T> {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }
}

impl<T> std::fmt::Debug for ViewCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ViewCell")
            .field("status", &state.status)
            .field("displayed_seq", &state.displayed_seq)
            .field("issued_seq", &state.issued_seq)
            .field("active", &state.active)
            .finish_non_exhaustive()
    }
}
