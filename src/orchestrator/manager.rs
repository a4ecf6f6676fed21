use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::SearchError;
use crate::models::{CategorizedResultSet, SearchQuery};
use crate::transport::SearchTransport;

use super::session::Session;
use super::types::{
    OrchestratorOptions, SearchEvent, SessionId, SessionOutcome, SessionSnapshot, Sleeper,
    TokioSleeper,
};

/// Current epoch, its session and the task driving it
#[derive(Default)]
struct SessionSlot {
    epoch: SessionId,
    current: Option<Session>,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    transport: Arc<dyn SearchTransport>,
    sleeper: Arc<dyn Sleeper>,
    options: OrchestratorOptions,
    slot: Mutex<SessionSlot>,
    event_sender: broadcast::Sender<SearchEvent>,
}

/// Multi-round search controller / 多轮增量搜索调度器
///
/// Runs round 1 immediately, then up to `rounds - 1` delayed backfill
/// rounds against the same query, merging each into the accumulated set.
/// Starting a new search supersedes the previous session: every
/// continuation re-checks its epoch under the slot lock before it touches
/// state or emits, so a stale round can never leak into a newer session.
#[derive(Clone)]
pub struct SearchOrchestrator {
    inner: Arc<Inner>,
}

impl SearchOrchestrator {
    pub fn new(transport: Arc<dyn SearchTransport>, options: OrchestratorOptions) -> Self {
        Self::with_sleeper(transport, Arc::new(TokioSleeper), options)
    }

    pub fn with_sleeper(
        transport: Arc<dyn SearchTransport>,
        sleeper: Arc<dyn Sleeper>,
        options: OrchestratorOptions,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                transport,
                sleeper,
                options,
                slot: Mutex::new(SessionSlot::default()),
                event_sender,
            }),
        }
    }

    /// 订阅搜索事件
    pub fn subscribe(&self) -> broadcast::Receiver<SearchEvent> {
        self.inner.event_sender.subscribe()
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.inner.options
    }

    /// Start a new search session, superseding any in-flight one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_search(&self, query: SearchQuery) -> SessionId {
        let mut slot = self.inner.slot.lock();
        self.inner.supersede(&mut slot);

        slot.epoch += 1;
        let id = slot.epoch;
        tracing::info!("Search session {} started: kw={:?}", id, query.keyword());

        slot.current = Some(Session::new(id, query.clone()));
        let inner = self.inner.clone();
        slot.task = Some(tokio::spawn(inner.run(id, query)));
        id
    }

    /// Cancel the current session without starting another
    pub fn cancel(&self) {
        let mut slot = self.inner.slot.lock();
        self.inner.supersede(&mut slot);
        slot.epoch += 1;
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.inner.slot.lock().current.as_ref().map(|s| s.id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner
            .slot
            .lock()
            .current
            .as_ref()
            .map(Session::snapshot)
            .unwrap_or_else(SessionSnapshot::idle)
    }

    /// Start a search and drive `on_event` with its events until it ends.
    pub async fn run_session<F>(&self, query: SearchQuery, mut on_event: F) -> SessionOutcome
    where
        F: FnMut(&SearchEvent),
    {
        let mut events = self.subscribe();
        let id = self.start_search(query);

        loop {
            match events.recv().await {
                Ok(event) if event.session() == id => {
                    on_event(&event);
                    match event {
                        SearchEvent::Settled { result, .. } => return SessionOutcome::Settled(result),
                        SearchEvent::Error { message, .. } => return SessionOutcome::Failed(message),
                        SearchEvent::Cancelled { .. } => return SessionOutcome::Cancelled,
                        _ => {}
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Session {} subscriber lagged, skipped {} events", id, skipped);
                    // The terminal event may have been among the skipped ones
                    if let Some(outcome) = SessionOutcome::from_snapshot(id, &self.snapshot()) {
                        return outcome;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return SessionOutcome::Cancelled,
            }
        }
    }
}

impl Inner {
    fn emit(&self, event: SearchEvent) {
        let _ = self.event_sender.send(event);
    }

    /// Abort the running task and announce cancellation of an unfinished session
    fn supersede(&self, slot: &mut SessionSlot) {
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        if let Some(previous) = slot.current.take() {
            if previous.state.is_active() {
                tracing::info!("Search session {} superseded", previous.id);
                self.emit(SearchEvent::Cancelled { session: previous.id });
            }
        }
    }

    /// Run `f` against the session only if `id` is still the current epoch.
    fn with_current<R>(&self, id: SessionId, f: impl FnOnce(&mut Session, &Self) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        if slot.epoch != id {
            return None;
        }
        let session = slot.current.as_mut()?;
        Some(f(session, self))
    }

    fn is_current(&self, id: SessionId) -> bool {
        self.with_current(id, |_, _| ()).is_some()
    }

    async fn run(self: Arc<Self>, id: SessionId, query: SearchQuery) {
        let first = self.transport.fetch_results(&query).await;
        let has_backfill = match first {
            Ok(result) => match self.apply_first(id, result) {
                Some(has_backfill) => has_backfill,
                None => return,
            },
            Err(err) => {
                self.apply_failure(id, err);
                return;
            }
        };

        if has_backfill {
            for round in 2..=self.options.rounds {
                if self.with_current(id, |s, _| s.begin_backfill(round)).is_none() {
                    return;
                }
                self.sleeper.sleep(self.options.round_delay).await;
                if !self.is_current(id) {
                    return;
                }

                match self.transport.fetch_results(&query).await {
                    Ok(batch) => {
                        if !self.apply_backfill(id, round, batch) {
                            return;
                        }
                    }
                    Err(err) => {
                        if !self.is_current(id) {
                            return;
                        }
                        tracing::warn!("Session {} round {} failed, skipping: {}", id, round, err);
                    }
                }
            }
        }

        self.apply_settle(id);
    }

    /// Returns `None` when superseded, otherwise whether backfill should run
    fn apply_first(&self, id: SessionId, result: CategorizedResultSet) -> Option<bool> {
        self.with_current(id, |session, inner| {
            let has_backfill = session.record_first(result);
            tracing::info!(
                "Session {} round 1: {} links in {} categories",
                id,
                session.accumulated.total(),
                session.accumulated.category_count()
            );
            inner.emit(SearchEvent::FirstResult {
                session: id,
                result: session.accumulated.clone(),
            });
            has_backfill
        })
    }

    /// Returns false when the session was superseded
    fn apply_backfill(&self, id: SessionId, round: u32, batch: CategorizedResultSet) -> bool {
        self.with_current(id, |session, inner| {
            let added = session.record_backfill(batch);
            tracing::debug!(
                "Session {} round {}: {} new links, total {}",
                id,
                round,
                added,
                session.accumulated.total()
            );
            if added > 0 {
                inner.emit(SearchEvent::Update {
                    session: id,
                    round,
                    added,
                    merged: session.accumulated.clone(),
                });
            }
        })
        .is_some()
    }

    fn apply_failure(&self, id: SessionId, err: SearchError) {
        self.with_current(id, |session, inner| {
            tracing::error!("Session {} round 1 failed: {}", id, err);
            let message = err.to_string();
            session.fail(message.clone());
            inner.emit(SearchEvent::Error { session: id, message });
        });
    }

    fn apply_settle(&self, id: SessionId) {
        self.with_current(id, |session, inner| {
            session.settle();
            tracing::info!(
                "Session {} settled after round {} with {} links",
                id,
                session.round,
                session.accumulated.total()
            );
            inner.emit(SearchEvent::Settled {
                session: id,
                result: session.accumulated.clone(),
            });
        });
    }
}
