//! Property-based tests for the approval state machine
//!
//! This module uses proptest to verify that ApprovalFlow behaves correctly
//! across a wide variety of action sequences. The stage transition logic is
//! critical - bugs here corrupt the review trail of every document.
//!
//! These tests focus on invariants that should hold regardless of the
//! specific action sequence, helping catch edge cases that would be
//! difficult to find with manual test case selection.

use proptest::prelude::*;
use serde_json::json;
use target_approval::{
    flow::{Action, ActionRequest, ApprovalFlow, Role, Stage, Status},
    model::TimeStamp,
};

// These property tests cover:
//
// 1. Rejected actions leave the flow untouched - no partial mutation
// 2. Accepted actions append exactly one history entry - audit completeness
// 3. Terminal stage stability - `final` absorbs everything
// 4. Stage/status coupling - `final` implies approved or declined
// 5. Approver accumulation - approvedBy only grows between edits
//
// What these tests DON'T cover (deliberately):
//
// - Persistence and field merging (service-layer concern, covered by the
//   integration tests)
// - Request parsing (covered by the api smoke tests)
//

/// Strategy to generate a reviewer role
fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::SiteBilling), Just(Role::Hod), Just(Role::Md)]
}

/// Strategy to generate an action
fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Propose),
        Just(Action::Edit),
        Just(Action::Approve),
        Just(Action::Decline),
    ]
}

/// Strategy to generate a full action request, with or without staged data
fn request_strategy() -> impl Strategy<Value = ActionRequest> {
    (
        role_strategy(),
        action_strategy(),
        any::<u32>(),
        prop::option::of(any::<i64>()),
    )
        .prop_map(|(role, action, user_num, payload)| ActionRequest {
            role,
            action,
            comment: None,
            updated_data: payload.map(|value| {
                json!({ "remark": value.to_string() })
                    .as_object()
                    .cloned()
                    .unwrap_or_default()
            }),
            user_id: format!("user_{}", user_num),
        })
}

/// Strategy to generate a sequence of requests (1 to 12)
fn request_sequence_strategy() -> impl Strategy<Value = Vec<ActionRequest>> {
    prop::collection::vec(request_strategy(), 1..=12)
}

fn fresh_flow() -> ApprovalFlow {
    ApprovalFlow::new(
        Some("user_proposer".to_string()),
        json!({ "remark": "initial" }),
        TimeStamp::now(),
    )
}

// PROPERTY TESTS
proptest! {
    /// Property: a rejected action leaves the flow byte-for-byte untouched
    ///
    /// Validation happens before any mutation, so an InvalidAction error
    /// must never leave a half-applied stage move or history entry behind.
    #[test]
    fn prop_rejected_actions_never_mutate(requests in request_sequence_strategy()) {
        let mut flow = fresh_flow();

        for request in requests {
            let before = flow.clone();
            if flow.apply(&request, TimeStamp::now()).is_err() {
                prop_assert_eq!(&flow, &before, "rejected action mutated the flow");
            }
        }
    }

    /// Property: every accepted action appends exactly one history entry
    ///
    /// The audit trail is append-only and complete: one accepted action,
    /// one record, no more and no fewer.
    #[test]
    fn prop_history_grows_one_per_accepted_action(requests in request_sequence_strategy()) {
        let mut flow = fresh_flow();

        for request in requests {
            let len_before = flow.history.len();
            let accepted = flow.apply(&request, TimeStamp::now()).is_ok();
            let expected = if accepted { len_before + 1 } else { len_before };
            prop_assert_eq!(flow.history.len(), expected);
        }
    }

    /// Property: the `final` stage is terminal
    ///
    /// Once a flow reaches `final` - via MD approval or any decline - every
    /// further action is rejected and the flow never moves again.
    #[test]
    fn prop_final_stage_absorbs_everything(
        closing in prop_oneof![
            Just((Role::Md, Action::Approve)),
            Just((Role::Hod, Action::Decline)),
        ],
        afterwards in request_sequence_strategy(),
    ) {
        let mut flow = fresh_flow();

        // Drive the flow to `final` through a known-valid path.
        let edit = ActionRequest {
            role: Role::SiteBilling,
            action: Action::Edit,
            comment: None,
            updated_data: None,
            user_id: "user_sb".to_string(),
        };
        flow.apply(&edit, TimeStamp::now()).ok();
        if closing.1 == Action::Approve {
            let endorse = ActionRequest {
                role: Role::Hod,
                action: Action::Approve,
                comment: None,
                updated_data: None,
                user_id: "user_hod".to_string(),
            };
            flow.apply(&endorse, TimeStamp::now()).ok();
        }
        let close = ActionRequest {
            role: closing.0,
            action: closing.1,
            comment: None,
            updated_data: None,
            user_id: "user_closer".to_string(),
        };
        flow.apply(&close, TimeStamp::now()).ok();
        prop_assert_eq!(flow.current_stage, Stage::Final);

        let settled = flow.clone();
        for request in afterwards {
            prop_assert!(
                flow.apply(&request, TimeStamp::now()).is_err(),
                "action accepted in terminal stage"
            );
        }
        prop_assert_eq!(&flow, &settled, "terminal flow moved");
    }

    /// Property: `final` implies a settled status
    ///
    /// Whatever sequence of actions ran, a flow sitting at `final` is either
    /// approved or declined - never pending or in review.
    #[test]
    fn prop_final_stage_has_settled_status(requests in request_sequence_strategy()) {
        let mut flow = fresh_flow();

        for request in requests {
            flow.apply(&request, TimeStamp::now()).ok();
            if flow.current_stage == Stage::Final {
                prop_assert!(
                    matches!(flow.status, Status::Approved | Status::Declined),
                    "final stage with unsettled status {:?}",
                    flow.status
                );
            }
        }
    }

    /// Property: approvedBy only accumulates between edits
    ///
    /// Within one staged change, approvals add identities (deduplicated) and
    /// never drop them; an edit replaces the set wholesale with the editor.
    #[test]
    fn prop_approvers_accumulate_between_edits(requests in request_sequence_strategy()) {
        let mut flow = fresh_flow();

        for request in requests {
            let before: Vec<String> = flow
                .current_change
                .as_ref()
                .map(|change| change.approved_by.clone())
                .unwrap_or_default();

            if flow.apply(&request, TimeStamp::now()).is_err() {
                continue;
            }

            let after: Vec<String> = flow
                .current_change
                .as_ref()
                .map(|change| change.approved_by.clone())
                .unwrap_or_default();

            match request.action {
                Action::Edit => {
                    prop_assert_eq!(&after, &vec![request.user_id.clone()]);
                }
                Action::Approve if flow.current_stage != Stage::Final => {
                    for user in &before {
                        prop_assert!(after.contains(user), "approver {} dropped", user);
                    }
                    prop_assert!(after.contains(&request.user_id));
                    let unique: std::collections::BTreeSet<&String> = after.iter().collect();
                    prop_assert_eq!(unique.len(), after.len(), "duplicate approver recorded");
                }
                // MD approval clears the staged change; propose and decline
                // leave it alone.
                _ => {}
            }
        }
    }
}
