//! Fixed-interval forced refresh tied to a view's mount lifetime.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::view::MountTicket;

/// A view the scheduler can drive
#[async_trait]
pub trait SyncView: Send + Sync {
    /// First fetch after mounting; may be served from cache.
    async fn load(&self);

    /// Forced re-read with the view's current parameters.
    async fn refresh(&self);

    /// Begin a mount, cancelling any previous one.
    fn open(&self) -> MountTicket;

    /// End the mount with this generation.
    fn close(&self, generation: u64);
}

/// Periodic refresh task. Cancelling or dropping the handle stops it.
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Spawn the poll loop. Must be called inside a tokio runtime.
    ///
    /// When `initial_load` is set the view is loaded right away; after that it
    /// is refreshed every `interval`, first tick one interval from now.
    pub fn spawn<V>(view: Arc<V>, interval: Duration, initial_load: bool, token: CancellationToken) -> Self
    where
        V: SyncView + ?Sized + 'static,
    {
        let task = tokio::spawn(run(view, interval, initial_load, token.clone()));
        Self { token, task }
    }

    /// Stop polling. No refresh starts after this returns.
    pub fn cancel(&self) {
        self.token.cancel();
        self.task.abort();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Body of the poll task
async fn run<V>(view: Arc<V>, interval: Duration, initial_load: bool, token: CancellationToken)
where
    V: SyncView + ?Sized,
{
    log::info!("poll started, every {interval:?}");

    if initial_load {
        tokio::select! {
            biased;
            () = token.cancelled() => return,
            () = view.load() => {}
        }
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = view.refresh() => {}
        }
    }

    log::info!("poll stopped");
}

/// A mounted view: initial load plus periodic refresh until dropped.
///
/// Mounting the same view again cancels the previous mount's poll; dropping
/// the old mount afterwards leaves the new one alone.
pub struct ViewMount<V: SyncView + ?Sized + 'static> {
    view: Arc<V>,
    generation: u64,
    poll: PollHandle,
}

impl<V: SyncView + ?Sized + 'static> ViewMount<V> {
    /// Mount `view`. Must be called inside a tokio runtime.
    pub fn new(view: Arc<V>, interval: Duration) -> Self {
        let MountTicket { generation, token } = view.open();
        let poll = PollHandle::spawn(Arc::clone(&view), interval, true, token);
        Self {
            view,
            generation,
            poll,
        }
    }

    #[must_use]
    pub fn view(&self) -> &Arc<V> {
        &self.view
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poll.is_active()
    }

    /// Same as dropping the mount.
    pub fn unmount(self) {}
}

impl<V: SyncView + ?Sized + 'static> Drop for ViewMount<V> {
    fn drop(&mut self) {
        self.poll.cancel();
        self.view.close(self.generation);
    }
}

impl<V: SyncView + ?Sized + 'static> std::fmt::Debug for ViewMount<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewMount")
            .field("generation", &self.generation)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}
