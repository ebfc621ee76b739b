use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{CollectionState, Page, PageSource};
use crate::error::{AirsenseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flight {
    Refresh,
    LoadMore,
}

impl Flight {
    fn clear<T>(self, state: &mut CollectionState<T>) {
        match self {
            Flight::Refresh => state.is_refreshing = false,
            Flight::LoadMore => state.is_loading_more = false,
        }
    }
}

/// Clears the in-flight flag if a fetch is dropped before it completes,
/// including a spawned fetch that was aborted before its first poll
struct FlightGuard<T> {
    state: Arc<watch::Sender<CollectionState<T>>>,
    flight: Flight,
    armed: bool,
}

impl<T> FlightGuard<T> {
    /// Owned by whoever claimed the flag, so it must be created right after the claim
    fn claimed(state: &Arc<watch::Sender<CollectionState<T>>>, flight: Flight) -> Self {
        Self {
            state: Arc::clone(state),
            flight,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        if self.armed {
            let flight = self.flight;
            self.state.send_modify(|state| flight.clear(state));
        }
    }
}

/// Loads a collection from a paged source with refresh and append operations.
///
/// At most one fetch is in flight per loader: the guard flags are checked and
/// set in a single atomic update of the state channel.
pub struct PaginatedCollectionLoader<T: Clone + Send + Sync + 'static> {
    source: Arc<dyn PageSource<T>>,
    page_size: usize,
    state: Arc<watch::Sender<CollectionState<T>>>,
    initial_refresh: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + Sync + 'static> PaginatedCollectionLoader<T> {
    /// Create a loader and start its first refresh in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(source: Arc<dyn PageSource<T>>, page_size: usize) -> Result<Arc<Self>> {
        if page_size == 0 {
            return Err(AirsenseError::config("page_size must be greater than zero"));
        }

        // The first refresh is claimed before anyone can observe the loader
        let (state, _) = watch::channel(CollectionState {
            is_refreshing: true,
            ..CollectionState::default()
        });
        let state = Arc::new(state);
        let guard = FlightGuard::claimed(&state, Flight::Refresh);
        let loader = Arc::new(Self {
            source,
            page_size,
            state,
            initial_refresh: Mutex::new(None),
        });

        let background = Arc::clone(&loader);
        let handle = tokio::spawn(async move {
            background.run(guard, 0).await;
        });
        if let Ok(mut slot) = loader.initial_refresh.lock() {
            *slot = Some(handle);
        }

        Ok(loader)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Snapshot of the current state
    pub fn state(&self) -> CollectionState<T> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<T>> {
        self.state.subscribe()
    }

    /// Resolve once no fetch is in flight
    pub async fn wait_idle(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = receiver.wait_for(CollectionState::is_idle).await;
    }

    /// Reload from offset 0, replacing all items.
    ///
    /// Ignored while any fetch is in flight.
    pub async fn refresh(&self) {
        let claimed = self.state.send_if_modified(|state| {
            if !state.is_idle() {
                return false;
            }
            state.is_refreshing = true;
            true
        });
        if !claimed {
            debug!("Refresh ignored, fetch already in flight");
            return;
        }
        let guard = FlightGuard::claimed(&self.state, Flight::Refresh);
        self.run(guard, 0).await;
    }

    /// Append the next page.
    ///
    /// Ignored while refreshing, while loading more, or when no more items
    /// are expected.
    pub async fn load_more(&self) {
        let mut skip = 0;
        let claimed = self.state.send_if_modified(|state| {
            if state.is_loading_more || state.is_refreshing || !state.has_more {
                return false;
            }
            state.is_loading_more = true;
            skip = state.cursor;
            true
        });
        if !claimed {
            debug!("Load more ignored");
            return;
        }
        let guard = FlightGuard::claimed(&self.state, Flight::LoadMore);
        self.run(guard, skip).await;
    }

    /// Abort the background first refresh if it is still running
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.initial_refresh.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    /// Fetch one page for the flight `guard` holds the flag of
    async fn run(&self, guard: FlightGuard<T>, skip: usize) {
        let flight = guard.flight;

        let page = match self.source.fetch_page(skip, self.page_size).await {
            Ok(items) => Page::new(items, self.page_size),
            Err(e) => {
                warn!(?flight, skip, error = %e, "Page fetch failed");
                return;
            }
        };

        let returned = page.items.len();
        self.state.send_modify(|state| {
            match flight {
                Flight::Refresh => {
                    state.has_more = page.is_full();
                    state.items = page.items;
                    state.cursor = state.items.len();
                }
                Flight::LoadMore if page.items.is_empty() => {
                    state.has_more = false;
                }
                Flight::LoadMore => {
                    state.has_more = page.is_full();
                    state.cursor += returned;
                    state.items.extend(page.items);
                }
            }
            flight.clear(state);
        });
        guard.disarm();

        debug!(?flight, skip, returned, "Page applied");
    }
}
