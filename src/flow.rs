//! Approval workflow state machine
//!
//! Pure decision logic over `(currentStage, status, currentChange, history)`.
//! Given an incoming (role, action) pair it validates the action against the
//! per-stage action table, appends an immutable history entry, and stages or
//! commits data through [`ApprovalFlow::apply`]. Persistence is the caller's
//! concern; the machine never touches storage.

use crate::diff::{self, ChangeSet, Fields};
use crate::error::TargetError;
use crate::model::TimeStamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pipeline step a document currently occupies.
///
/// Progression is monotonic along the declared order, except `decline`
/// which jumps straight to `Final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SiteBilling,
    Hod,
    SbRecheck,
    Md,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InReview,
    Approved,
    Declined,
}

/// Reviewer role submitting an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SiteBilling,
    Hod,
    Md,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Propose,
    Edit,
    Approve,
    Decline,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::SiteBilling => "site_billing",
            Stage::Hod => "hod",
            Stage::SbRecheck => "sb_recheck",
            Stage::Md => "md",
            Stage::Final => "final",
        }
    }

    /// Per-stage action table. `Final` is terminal and allows nothing.
    pub fn allows(self, action: Action) -> bool {
        matches!(
            (self, action),
            (Stage::SiteBilling, Action::Propose | Action::Edit)
                | (Stage::Hod, Action::Approve | Action::Edit | Action::Decline)
                | (Stage::SbRecheck, Action::Edit)
                | (Stage::Md, Action::Approve)
        )
    }
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Propose => "propose",
            Action::Edit => "edit",
            Action::Approve => "approve",
            Action::Decline => "decline",
        }
    }
}

/// At most one in-flight proposal awaiting further approvals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentChange {
    /// Snapshot of the proposed data, staged until final approval.
    #[serde(default)]
    pub data: Fields,
    /// Delta against the previously proposed data.
    #[serde(default)]
    pub changes: ChangeSet,
    /// Identities that approved this specific change. Grows only; a new
    /// `edit` replaces it wholesale.
    #[serde(default)]
    pub approved_by: Vec<String>,
}

/// Immutable audit record of one accepted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub by: Option<String>,
    pub role: Role,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_snapshot: Option<Value>,
    pub at: TimeStamp,
}

/// An action submitted against an entity's approval flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub role: Role,
    pub action: Action,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub updated_data: Option<Fields>,
    pub user_id: String,
}

/// What an accepted action did to the flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `propose`: audit record written, nothing else changed.
    Recorded,
    /// `edit`: a fresh change was staged and the stage advanced.
    Staged,
    /// `approve` before the terminal reviewer: approval accumulated.
    Endorsed,
    /// `approve` by MD: staged data to merge into the entity's own fields.
    Committed(Fields),
    /// `decline`: flow short-circuited to `Final`.
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalFlow {
    pub current_stage: Stage,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_by: Option<String>,
    #[serde(default)]
    pub current_change: Option<CurrentChange>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl ApprovalFlow {
    /// Fresh flow at `site_billing`/`pending` with the synthesized
    /// `propose` history entry holding the creation payload snapshot.
    pub fn new(proposed_by: Option<String>, snapshot: Value, at: TimeStamp) -> Self {
        Self {
            current_stage: Stage::SiteBilling,
            status: Status::Pending,
            proposed_by: proposed_by.clone(),
            current_change: None,
            history: vec![HistoryEntry {
                by: proposed_by,
                role: Role::SiteBilling,
                action: Action::Propose,
                comment: None,
                data_snapshot: Some(snapshot),
                at,
            }],
        }
    }

    /// Run one action through the machine.
    ///
    /// Rejected actions leave the flow untouched and report
    /// [`TargetError::InvalidAction`]; accepted actions append exactly one
    /// history entry. On the terminal approval the staged data is handed
    /// back for the caller to merge, written into the final history entry
    /// for audit, and `currentChange` is cleared.
    pub fn apply(&mut self, req: &ActionRequest, at: TimeStamp) -> Result<Outcome, TargetError> {
        if !self.current_stage.allows(req.action) {
            return Err(TargetError::InvalidAction {
                action: req.action.as_str(),
                stage: self.current_stage.as_str(),
            });
        }

        let mut entry = HistoryEntry {
            by: Some(req.user_id.clone()),
            role: req.role,
            action: req.action,
            comment: req.comment.clone(),
            data_snapshot: req.updated_data.clone().map(Value::Object),
            at,
        };

        let outcome = match req.action {
            Action::Propose => Outcome::Recorded,
            Action::Edit => {
                let updated = req.updated_data.clone().unwrap_or_default();
                let old = self.current_change.as_ref().map(|change| &change.data);
                let changes = diff::compute(old, Some(&updated));

                self.current_change = Some(CurrentChange {
                    data: updated,
                    changes,
                    approved_by: vec![req.user_id.clone()],
                });
                // HOD edits go back to site billing for recheck; everyone
                // else escalates to HOD.
                self.current_stage = if req.role == Role::Hod {
                    Stage::SbRecheck
                } else {
                    Stage::Hod
                };
                self.status = Status::InReview;
                Outcome::Staged
            }
            Action::Approve => {
                let change = self.current_change.get_or_insert_with(CurrentChange::default);
                if !change.approved_by.iter().any(|user| user == &req.user_id) {
                    change.approved_by.push(req.user_id.clone());
                }

                match req.role {
                    Role::Md => {
                        let staged = self
                            .current_change
                            .take()
                            .map(|change| change.data)
                            .unwrap_or_default();
                        self.status = Status::Approved;
                        self.current_stage = Stage::Final;
                        // Retain the last staged data in the audit trail
                        // before the in-flight change is cleared.
                        if entry.data_snapshot.is_none() {
                            entry.data_snapshot = Some(Value::Object(staged.clone()));
                        }
                        Outcome::Committed(staged)
                    }
                    Role::Hod => {
                        self.current_stage = Stage::Md;
                        Outcome::Endorsed
                    }
                    Role::SiteBilling => Outcome::Endorsed,
                }
            }
            Action::Decline => {
                self.status = Status::Declined;
                self.current_stage = Stage::Final;
                Outcome::Declined
            }
        };

        self.history.push(entry);
        Ok(outcome)
    }
}
