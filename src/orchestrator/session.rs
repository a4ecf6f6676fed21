use crate::models::{CategorizedResultSet, SearchQuery};

use super::types::{SessionId, SessionSnapshot, SessionState};

/// One keyword search from round 1 to settlement.
///
/// Only the orchestrator touches this, and only after checking that `id`
/// is still the current epoch.
#[derive(Debug)]
pub(crate) struct Session {
    pub id: SessionId,
    pub query: SearchQuery,
    pub round: u32,
    pub accumulated: CategorizedResultSet,
    pub state: SessionState,
    pub error: Option<String>,
}

impl Session {
    pub fn new(id: SessionId, query: SearchQuery) -> Self {
        Self {
            id,
            query,
            round: 1,
            accumulated: CategorizedResultSet::new(),
            state: SessionState::Round1Pending,
            error: None,
        }
    }

    /// Store the round 1 result. Returns whether any category key came back,
    /// empty or not; only a round with no keys at all skips backfill.
    pub fn record_first(&mut self, result: CategorizedResultSet) -> bool {
        self.accumulated = result;
        self.state = SessionState::Round1Done;
        !self.accumulated.is_empty()
    }

    pub fn begin_backfill(&mut self, round: u32) {
        self.round = round;
        self.state = SessionState::BackfillPending(round);
    }

    /// Merge a backfill batch, returning the number of new links
    pub fn record_backfill(&mut self, batch: CategorizedResultSet) -> usize {
        self.accumulated.merge(batch)
    }

    pub fn settle(&mut self) {
        self.state = SessionState::Settled;
    }

    /// A failed session keeps no partial results
    pub fn fail(&mut self, message: String) {
        self.accumulated = CategorizedResultSet::new();
        self.state = SessionState::Failed;
        self.error = Some(message);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: Some(self.id),
            keyword: Some(self.query.keyword().to_string()),
            state: self.state,
            round: self.round,
            result: self.accumulated.clone(),
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceLink;

    fn batch(category: &str, urls: &[&str]) -> CategorizedResultSet {
        std::iter::once((
            category.to_string(),
            urls.iter().map(|u| ResourceLink::new(*u, "")).collect(),
        ))
        .collect()
    }

    #[test]
    fn test_state_transitions() {
        let mut session = Session::new(1, SearchQuery::new("example").unwrap());
        assert_eq!(session.state, SessionState::Round1Pending);
        assert!(session.state.is_active());

        assert!(session.record_first(batch("baidu", &["u1"])));
        assert_eq!(session.state, SessionState::Round1Done);

        session.begin_backfill(2);
        assert_eq!(session.state, SessionState::BackfillPending(2));
        assert_eq!(session.record_backfill(batch("baidu", &["u1", "u2"])), 1);

        session.settle();
        assert!(session.state.is_terminal());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.round, 2);
        assert_eq!(snapshot.result.total(), 2);
        assert_eq!(snapshot.keyword.as_deref(), Some("example"));
    }

    #[test]
    fn test_empty_first_round_has_nothing_to_backfill() {
        let mut session = Session::new(7, SearchQuery::new("nothing").unwrap());
        assert!(!session.record_first(CategorizedResultSet::new()));
    }

    #[test]
    fn test_empty_category_key_still_backfills() {
        let mut session = Session::new(8, SearchQuery::new("rare").unwrap());
        assert!(session.record_first(batch("quark", &[])));
        assert_eq!(session.accumulated.total(), 0);
    }

    #[test]
    fn test_fail_discards_results() {
        let mut session = Session::new(3, SearchQuery::new("example").unwrap());
        session.accumulated = batch("quark", &["q1"]);
        session.fail("Server error (500)".to_string());
        assert_eq!(session.state, SessionState::Failed);
        assert!(session.accumulated.is_empty());
        assert_eq!(session.snapshot().error.as_deref(), Some("Server error (500)"));
    }
}
