//! Exhaustive check of every (status, action) pair against the lifecycle
//! table.

use tix_core::model::{Action, Status};
use tix_core::{Decision, DenyReason, decide};

use Action::{Assign, Cancel, Close, Escalate, Reopen, Resolve, Start, Wait};
use Status::{Assigned, Canceled, Closed, Created, Escalated, InProgress, Resolved, Waiting};

/// Expected target per row, in `Action::ALL` order. `None` is a denial.
fn expected_row(from: Status) -> [Option<Status>; 8] {
    match from {
        Created => [
            Some(Assigned),
            Some(InProgress),
            Some(Waiting),
            Some(Escalated),
            None,
            Some(Closed),
            Some(Canceled),
            None,
        ],
        Assigned => [
            None,
            Some(InProgress),
            Some(Waiting),
            Some(Escalated),
            Some(Resolved),
            Some(Closed),
            Some(Canceled),
            None,
        ],
        InProgress => [
            None,
            None,
            Some(Waiting),
            Some(Escalated),
            Some(Resolved),
            Some(Closed),
            Some(Canceled),
            None,
        ],
        Waiting => [
            None,
            Some(InProgress),
            None,
            Some(Escalated),
            Some(Resolved),
            Some(Closed),
            Some(Canceled),
            None,
        ],
        Escalated => [
            None,
            None,
            None,
            None,
            Some(Resolved),
            Some(Closed),
            Some(Canceled),
            None,
        ],
        Resolved => [None, None, None, None, None, None, None, Some(Created)],
        Closed | Canceled => [None; 8],
    }
}

#[test]
fn every_pair_matches_the_table() {
    assert_eq!(
        Action::ALL,
        [Assign, Start, Wait, Escalate, Resolve, Close, Cancel, Reopen]
    );

    let mut checked = 0;
    for from in Status::ALL {
        for (action, expected) in Action::ALL.into_iter().zip(expected_row(from)) {
            let decision = decide(from, action);
            match expected {
                Some(next) => assert_eq!(
                    decision,
                    Decision::Allowed { next },
                    "{from} + {action} should allow {next}"
                ),
                None => {
                    let want = if from.is_final() {
                        DenyReason::TicketTerminal
                    } else {
                        DenyReason::IllegalTransition
                    };
                    assert_eq!(
                        decision,
                        Decision::Denied { reason: want },
                        "{from} + {action} should deny"
                    );
                }
            }
            checked += 1;
        }
    }
    assert_eq!(checked, 64);
}

#[test]
fn reopen_is_accepted_only_from_resolved() {
    for from in Status::ALL {
        assert_eq!(
            decide(from, Reopen).is_allowed(),
            from == Resolved,
            "reopen from {from}"
        );
    }
}

#[test]
fn no_action_leaves_a_final_status() {
    for from in [Closed, Canceled] {
        for action in Action::ALL {
            assert!(!decide(from, action).is_allowed());
        }
    }
}

#[test]
fn decisions_are_deterministic() {
    for from in Status::ALL {
        for action in Action::ALL {
            assert_eq!(decide(from, action), decide(from, action));
        }
    }
}
