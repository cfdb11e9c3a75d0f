//! Approval chain resolution.
//!
//! Pure evaluation of an approval step's state from its frozen approver
//! snapshot and the responses recorded so far. The service layer records
//! responses; this module answers "is the step decided, and if not, who is
//! still being waited on".

use uuid::Uuid;

use crate::template::ApprovalMode;

/// A single approver's recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Terminal result of an approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    Approved,
    Rejected,
}

/// Result of evaluating an approval chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvaluation {
    /// The step has a terminal outcome.
    Resolved(ChainOutcome),
    /// The step is still open; `open` lists the approvers (from the frozen
    /// snapshot) whose decisions are still awaited right now. Sequential
    /// chains expose exactly one entry.
    Awaiting { open: Vec<Uuid> },
}

/// Evaluate an approval chain.
///
/// `required` is the approver snapshot frozen when the step started, in
/// order. `responses` pairs snapshot approvers with their decisions; an
/// approver appears at most once. An empty snapshot resolves to approved.
#[must_use]
pub fn evaluate(
    mode: ApprovalMode,
    require_all: bool,
    required: &[Uuid],
    responses: &[(Uuid, Decision)],
) -> ChainEvaluation {
    match mode {
        ApprovalMode::Sequential => evaluate_sequential(required, responses),
        ApprovalMode::Parallel => evaluate_parallel(require_all, required, responses),
    }
}

/// Sequential: approvers decide in snapshot order. The first rejection
/// resolves the step; otherwise the next undecided approver is awaited.
#[must_use]
pub fn evaluate_sequential(required: &[Uuid], responses: &[(Uuid, Decision)]) -> ChainEvaluation {
    if responses
        .iter()
        .any(|(_, decision)| *decision == Decision::Reject)
    {
        return ChainEvaluation::Resolved(ChainOutcome::Rejected);
    }

    let approvals = responses.len();
    if approvals >= required.len() {
        return ChainEvaluation::Resolved(ChainOutcome::Approved);
    }

    ChainEvaluation::Awaiting {
        open: vec![required[approvals]],
    }
}

/// Parallel: all approvers are consulted at once.
///
/// With `require_all`, any rejection resolves to rejected and the step
/// approves only when everyone has approved. Without it, the first approval
/// resolves to approved; the step rejects only once everyone has responded
/// and nobody approved.
#[must_use]
pub fn evaluate_parallel(
    require_all: bool,
    required: &[Uuid],
    responses: &[(Uuid, Decision)],
) -> ChainEvaluation {
    if required.is_empty() {
        return ChainEvaluation::Resolved(ChainOutcome::Approved);
    }

    let decided: Vec<Uuid> = responses.iter().map(|(id, _)| *id).collect();
    let approvals = responses
        .iter()
        .filter(|(_, d)| *d == Decision::Approve)
        .count();
    let rejections = responses.len() - approvals;

    if require_all {
        if rejections > 0 {
            return ChainEvaluation::Resolved(ChainOutcome::Rejected);
        }
        if approvals >= required.len() {
            return ChainEvaluation::Resolved(ChainOutcome::Approved);
        }
    } else {
        if approvals > 0 {
            return ChainEvaluation::Resolved(ChainOutcome::Approved);
        }
        if responses.len() >= required.len() {
            return ChainEvaluation::Resolved(ChainOutcome::Rejected);
        }
    }

    ChainEvaluation::Awaiting {
        open: required
            .iter()
            .filter(|id| !decided.contains(id))
            .copied()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn sequential_awaits_in_order() {
        let approvers = ids(3);
        let eval = evaluate_sequential(&approvers, &[]);
        assert_eq!(
            eval,
            ChainEvaluation::Awaiting {
                open: vec![approvers[0]]
            }
        );

        let eval = evaluate_sequential(&approvers, &[(approvers[0], Decision::Approve)]);
        assert_eq!(
            eval,
            ChainEvaluation::Awaiting {
                open: vec![approvers[1]]
            }
        );
    }

    #[test]
    fn sequential_approves_after_everyone() {
        let approvers = ids(2);
        let responses = vec![
            (approvers[0], Decision::Approve),
            (approvers[1], Decision::Approve),
        ];
        assert_eq!(
            evaluate_sequential(&approvers, &responses),
            ChainEvaluation::Resolved(ChainOutcome::Approved)
        );
    }

    #[test]
    fn sequential_rejection_is_terminal() {
        let approvers = ids(3);
        let responses = vec![
            (approvers[0], Decision::Approve),
            (approvers[1], Decision::Reject),
        ];
        assert_eq!(
            evaluate_sequential(&approvers, &responses),
            ChainEvaluation::Resolved(ChainOutcome::Rejected)
        );
    }

    #[test]
    fn parallel_require_all_waits_for_everyone() {
        let approvers = ids(3);
        let responses = vec![
            (approvers[0], Decision::Approve),
            (approvers[2], Decision::Approve),
        ];
        let eval = evaluate_parallel(true, &approvers, &responses);
        assert_eq!(
            eval,
            ChainEvaluation::Awaiting {
                open: vec![approvers[1]]
            }
        );
    }

    #[test]
    fn parallel_require_all_any_rejection_rejects() {
        let approvers = ids(3);
        let responses = vec![(approvers[1], Decision::Reject)];
        assert_eq!(
            evaluate_parallel(true, &approvers, &responses),
            ChainEvaluation::Resolved(ChainOutcome::Rejected)
        );
    }

    #[test]
    fn parallel_any_first_approval_wins() {
        let approvers = ids(3);
        let responses = vec![
            (approvers[0], Decision::Reject),
            (approvers[1], Decision::Approve),
        ];
        assert_eq!(
            evaluate_parallel(false, &approvers, &responses),
            ChainEvaluation::Resolved(ChainOutcome::Approved)
        );
    }

    #[test]
    fn parallel_any_rejects_only_when_exhausted() {
        let approvers = ids(2);
        let partial = vec![(approvers[0], Decision::Reject)];
        assert!(matches!(
            evaluate_parallel(false, &approvers, &partial),
            ChainEvaluation::Awaiting { .. }
        ));

        let full = vec![
            (approvers[0], Decision::Reject),
            (approvers[1], Decision::Reject),
        ];
        assert_eq!(
            evaluate_parallel(false, &approvers, &full),
            ChainEvaluation::Resolved(ChainOutcome::Rejected)
        );
    }

    #[test]
    fn empty_snapshot_approves() {
        assert_eq!(
            evaluate(ApprovalMode::Sequential, true, &[], &[]),
            ChainEvaluation::Resolved(ChainOutcome::Approved)
        );
        assert_eq!(
            evaluate(ApprovalMode::Parallel, true, &[], &[]),
            ChainEvaluation::Resolved(ChainOutcome::Approved)
        );
    }
}
