use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::config::AppConfig;
use crate::models::CategorizedResultSet;

/// Monotonic session identifier, doubles as the epoch token
pub type SessionId = u64;

/// Session lifecycle / 搜索会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "round", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Round1Pending,
    Round1Done,
    /// Waiting for (or fetching) the given backfill round
    BackfillPending(u32),
    Settled,
    Failed,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Round1Pending | SessionState::Round1Done | SessionState::BackfillPending(_)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Settled | SessionState::Failed)
    }
}

/// Events pushed to subscribers / 推送给订阅者的事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    /// Round 1 succeeded; sent once per session
    FirstResult {
        session: SessionId,
        result: CategorizedResultSet,
    },
    /// A backfill round added at least one link
    Update {
        session: SessionId,
        round: u32,
        added: usize,
        merged: CategorizedResultSet,
    },
    /// Round 1 failed; terminal
    Error { session: SessionId, message: String },
    /// All rounds done, or round 1 had nothing to backfill; terminal
    Settled {
        session: SessionId,
        result: CategorizedResultSet,
    },
    /// Superseded by a newer search or cancelled; terminal
    Cancelled { session: SessionId },
}

impl SearchEvent {
    pub fn session(&self) -> SessionId {
        match self {
            SearchEvent::FirstResult { session, .. }
            | SearchEvent::Update { session, .. }
            | SearchEvent::Error { session, .. }
            | SearchEvent::Settled { session, .. }
            | SearchEvent::Cancelled { session } => *session,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchEvent::Error { .. } | SearchEvent::Settled { .. } | SearchEvent::Cancelled { .. }
        )
    }
}

/// Observable view of the current session / 当前会话快照
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session: Option<SessionId>,
    pub keyword: Option<String>,
    pub state: SessionState,
    pub round: u32,
    pub result: CategorizedResultSet,
    /// Round 1 failure message, set once the session failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            session: None,
            keyword: None,
            state: SessionState::Idle,
            round: 0,
            result: CategorizedResultSet::new(),
            error: None,
        }
    }
}

/// How a session ended, as seen by `run_session`
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Settled(CategorizedResultSet),
    Failed(String),
    Cancelled,
}

impl SessionOutcome {
    /// Outcome of session `id` as read from a snapshot, if it has ended.
    /// A snapshot of another session means `id` was superseded.
    pub fn from_snapshot(id: SessionId, snapshot: &SessionSnapshot) -> Option<Self> {
        if snapshot.session != Some(id) {
            return Some(SessionOutcome::Cancelled);
        }
        match snapshot.state {
            SessionState::Settled => Some(SessionOutcome::Settled(snapshot.result.clone())),
            SessionState::Failed => Some(SessionOutcome::Failed(
                snapshot.error.clone().unwrap_or_default(),
            )),
            _ => None,
        }
    }
}

/// Round count and pacing / 轮数与间隔
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Total rounds including round 1
    pub rounds: u32,
    /// Wait before each backfill round
    pub round_delay: Duration,
    /// Broadcast channel capacity
    pub event_capacity: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            rounds: 4,
            round_delay: Duration::from_millis(2000),
            event_capacity: 256,
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rounds: config.search.rounds.max(1),
            round_delay: config.round_delay(),
            ..Self::default()
        }
    }
}

/// Delay source for the pause between rounds, injectable for tests.
pub trait Sleeper: Send + Sync + 'static {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
