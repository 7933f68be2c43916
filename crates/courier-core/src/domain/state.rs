//! Acknowledgment state machine for a single received message.

/// Where a message is in its acknowledgment lifecycle.
///
/// State transitions:
/// - Deleting -> DeleteFailed
/// - Deleting -> Deleted -> Dispatching -> HandlerSucceeded
/// - Deleting -> Deleted -> Dispatching -> HandlerFailed -> RetryScheduled
/// - Deleting -> Deleted -> Dispatching -> HandlerFailed -> RetriesExhausted
///   (only a duplicate that slipped past the entry check)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckState {
    /// Delete request in flight.
    Deleting,

    /// Transport refused the delete; the queue redelivers on its own.
    DeleteFailed,

    /// Removed from the queue; this process now owns the message.
    Deleted,

    /// Handler running.
    Dispatching,

    HandlerSucceeded,

    HandlerFailed,

    /// A copy was submitted with a larger delay.
    RetryScheduled,

    /// Ledger ceiling reached; the message is dropped.
    RetriesExhausted,
}

impl AckState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AckState::DeleteFailed
                | AckState::HandlerSucceeded
                | AckState::RetryScheduled
                | AckState::RetriesExhausted
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: AckState) -> bool {
        matches!(
            (self, next),
            (AckState::Deleting, AckState::DeleteFailed)
                | (AckState::Deleting, AckState::Deleted)
                | (AckState::Deleted, AckState::Dispatching)
                | (AckState::Dispatching, AckState::HandlerSucceeded)
                | (AckState::Dispatching, AckState::HandlerFailed)
                | (AckState::HandlerFailed, AckState::RetryScheduled)
                | (AckState::HandlerFailed, AckState::RetriesExhausted)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AckState::DeleteFailed, true)]
    #[case(AckState::HandlerSucceeded, true)]
    #[case(AckState::RetryScheduled, true)]
    #[case(AckState::RetriesExhausted, true)]
    #[case(AckState::Deleting, false)]
    #[case(AckState::Deleted, false)]
    #[case(AckState::Dispatching, false)]
    #[case(AckState::HandlerFailed, false)]
    fn terminal_states(#[case] state: AckState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn terminal_states_have_no_successor() {
        let all = [
            AckState::Deleting,
            AckState::DeleteFailed,
            AckState::Deleted,
            AckState::Dispatching,
            AckState::HandlerSucceeded,
            AckState::HandlerFailed,
            AckState::RetryScheduled,
            AckState::RetriesExhausted,
        ];
        for from in all.iter().copied().filter(|s| s.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn dispatch_only_after_delete() {
        assert!(!AckState::Deleting.can_transition_to(AckState::Dispatching));
        assert!(AckState::Deleted.can_transition_to(AckState::Dispatching));
    }
}
