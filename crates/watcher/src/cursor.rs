use aptwatch_types::Sequence;

/// Query parameters for the event-list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventQuery {
    pub start: Option<Sequence>,
    pub limit: Option<u64>,
}

impl EventQuery {
    pub fn latest() -> Self {
        Self {
            start: None,
            limit: Some(1),
        }
    }

    pub fn from(start: Sequence) -> Self {
        Self {
            start: Some(start),
            limit: None,
        }
    }

    pub fn single(sequence: Sequence) -> Self {
        Self {
            start: Some(sequence),
            limit: Some(1),
        }
    }

    pub fn to_url(&self, events_url: &str) -> String {
        match (self.start, self.limit) {
            (Some(start), Some(limit)) => format!("{events_url}?start={start}&limit={limit}"),
            (Some(start), None) => format!("{events_url}?start={start}"),
            (None, Some(limit)) => format!("{events_url}?limit={limit}"),
            (None, None) => events_url.to_string(),
        }
    }
}

/// Next sequence number the poll loop expects; zero until bootstrapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    next_sequence: Sequence,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    pub fn is_bootstrap(&self) -> bool {
        self.next_sequence == 0
    }

    pub fn query(&self) -> EventQuery {
        if self.is_bootstrap() {
            EventQuery::latest()
        } else {
            EventQuery::from(self.next_sequence)
        }
    }

    /// Moves past `observed`, regardless of whether it was decoded.
    ///
    /// Past the last representable sequence the cursor wraps to zero and the
    /// next poll bootstraps again.
    pub fn advance(&mut self, observed: Sequence) {
        self.next_sequence = observed.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: &str = "http://node/v1/accounts/0x1/events/h/event";

    #[test]
    fn test_bootstrap_asks_for_latest_event() {
        let cursor = Cursor::new();
        assert!(cursor.is_bootstrap());
        assert_eq!(cursor.query().to_url(EVENTS), format!("{EVENTS}?limit=1"));
    }

    #[test]
    fn test_steady_state_asks_for_open_range() {
        let mut cursor = Cursor::new();
        cursor.advance(5);
        assert!(!cursor.is_bootstrap());
        assert_eq!(cursor.next_sequence(), 6);
        assert_eq!(cursor.query().to_url(EVENTS), format!("{EVENTS}?start=6"));
    }

    #[test]
    fn test_single_event_query() {
        assert_eq!(
            EventQuery::single(6).to_url(EVENTS),
            format!("{EVENTS}?start=6&limit=1")
        );
    }

    #[test]
    fn test_advance_past_max_returns_to_bootstrap() {
        let mut cursor = Cursor::new();
        cursor.advance(u64::MAX);
        assert_eq!(cursor.next_sequence(), 0);
        assert!(cursor.is_bootstrap());
        assert_eq!(cursor.query().to_url(EVENTS), format!("{EVENTS}?limit=1"));
    }
}
