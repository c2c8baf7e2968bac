//! Entity records, creation drafts, and the closed set of entity kinds
//!
//! Ownership between records is by stored identifier, never by embedding;
//! reads reconstruct the tree through expansion in the service layer. All
//! wire and storage field names are camelCase.

use crate::error::TargetError;
use crate::flow::ApprovalFlow;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Kind-specific human-readable prefixes for record ids. The prefix
/// namespaces the store, so a record's kind is recoverable from its id.
pub mod hrp {
    pub const MONTHLY_TARGET: &str = "mtgt_";
    pub const TASK: &str = "task_";
    pub const SUBTASK: &str = "sub_";
    pub const MANPOWER: &str = "manp_";
    pub const MACHINERY: &str = "mach_";
    pub const TOOLS: &str = "tool_";
    pub const MATERIAL: &str = "matl_";
    pub const USER: &str = "user_";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeStamp(DateTime<Utc>);

impl TimeStamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Self(
            Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
                .single()
                .unwrap_or_default(),
        )
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self(DateTime::<Utc>::MIN_UTC)
    }
}

/// Closed set of entity kinds the generic document routes dispatch over,
/// resolved once at the boundary from the `model=` query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Project,
    Task,
}

impl ModelKind {
    pub fn parse(model: &str) -> Result<Self, TargetError> {
        match model {
            "project" => Ok(ModelKind::Project),
            "task" => Ok(ModelKind::Task),
            other => Err(TargetError::Validation(format!(
                "unknown model '{other}', use \"project\" or \"task\""
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Project => "project",
            ModelKind::Task => "task",
        }
    }

    pub fn hrp(self) -> &'static str {
        match self {
            ModelKind::Project => hrp::MONTHLY_TARGET,
            ModelKind::Task => hrp::TASK,
        }
    }

    /// Allow-list of top-level fields a staged change (or plain update) may
    /// overwrite. Identity, approval state, and audit fields are never
    /// mergeable, so staged data cannot drift the schema.
    pub fn mergeable_fields(self) -> &'static [&'static str] {
        match self {
            ModelKind::Project => &["locationId", "projectId", "remark", "taskIds"],
            ModelKind::Task => &[
                "locationDetailId",
                "taskId",
                "startDate",
                "area",
                "duration",
                "drawing",
                "remark",
                "subtaskIds",
            ],
        }
    }
}

/// Entities that carry their own approval flow instance.
pub trait Approvable: Serialize + DeserializeOwned {
    const KIND: ModelKind;

    fn id(&self) -> &str;
    fn approval_flow_mut(&mut self) -> &mut ApprovalFlow;
    fn mark_approved(&mut self, at: TimeStamp);
    fn touch(&mut self, at: TimeStamp);
}

// ---------------------------------------------------------------------------
// Aggregate root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTarget {
    pub id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub task_ids: Vec<String>,
    #[serde(default)]
    pub is_approved: bool,
    pub approval_flow: ApprovalFlow,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
}

impl Approvable for MonthlyTarget {
    const KIND: ModelKind = ModelKind::Project;

    fn id(&self) -> &str {
        &self.id
    }
    fn approval_flow_mut(&mut self) -> &mut ApprovalFlow {
        &mut self.approval_flow
    }
    fn mark_approved(&mut self, at: TimeStamp) {
        self.is_approved = true;
        self.updated_at = at;
    }
    fn touch(&mut self, at: TimeStamp) {
        self.updated_at = at;
    }
}

/// A task inside a monthly target, with its own independent approval flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub id: String,
    #[serde(default)]
    pub location_detail_id: Option<String>,
    /// External tower-task reference, carried through untouched.
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<TimeStamp>,
    #[serde(default)]
    pub area: f64,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub drawing: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub subtask_ids: Vec<String>,
    #[serde(default)]
    pub is_approved: bool,
    pub approval_flow: ApprovalFlow,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
}

fn default_duration() -> u32 {
    20
}

impl Approvable for TaskDetail {
    const KIND: ModelKind = ModelKind::Task;

    fn id(&self) -> &str {
        &self.id
    }
    fn approval_flow_mut(&mut self) -> &mut ApprovalFlow {
        &mut self.approval_flow
    }
    fn mark_approved(&mut self, at: TimeStamp) {
        self.is_approved = true;
        self.updated_at = at;
    }
    fn touch(&mut self, at: TimeStamp) {
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    #[serde(default)]
    pub utilized_quantity: u64,
    #[serde(default)]
    pub manpower_target_ids: Vec<String>,
    #[serde(default)]
    pub machinery_target_ids: Vec<String>,
    #[serde(default)]
    pub tool_target_ids: Vec<String>,
    #[serde(default)]
    pub material_target_ids: Vec<String>,
    #[serde(default)]
    pub assigned_employee_ids: Vec<String>,
    #[serde(default)]
    pub comment_ids: Vec<String>,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
}

// ---------------------------------------------------------------------------
// Resource targets
// ---------------------------------------------------------------------------

/// Resource-target records materialized from raw embedded objects during
/// aggregate creation. Each kind knows its draft shape and id prefix.
pub trait ResourceTarget: Serialize {
    type Draft: DeserializeOwned;
    const HRP: &'static str;

    fn from_draft(id: String, draft: Self::Draft, at: TimeStamp) -> Self;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManpowerTarget {
    pub id: String,
    #[serde(default)]
    pub utilized: u64,
    #[serde(default)]
    pub assigned: u64,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManpowerDraft {
    #[serde(default)]
    pub utilized: u64,
    #[serde(default)]
    pub assigned: u64,
}

impl ResourceTarget for ManpowerTarget {
    type Draft = ManpowerDraft;
    const HRP: &'static str = hrp::MANPOWER;

    fn from_draft(id: String, draft: Self::Draft, at: TimeStamp) -> Self {
        Self {
            id,
            utilized: draft.utilized,
            assigned: draft.assigned,
            created_at: at,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineryTarget {
    pub id: String,
    /// Location-level machinery inventory this target draws from.
    #[serde(default)]
    pub location_machinery_id: Option<String>,
    #[serde(default)]
    pub utilized: u64,
    #[serde(default)]
    pub assigned: u64,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub spec: String,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineryDraft {
    #[serde(default)]
    pub location_machinery_id: Option<String>,
    #[serde(default)]
    pub utilized: u64,
    #[serde(default)]
    pub assigned: u64,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub spec: String,
}

impl ResourceTarget for MachineryTarget {
    type Draft = MachineryDraft;
    const HRP: &'static str = hrp::MACHINERY;

    fn from_draft(id: String, draft: Self::Draft, at: TimeStamp) -> Self {
        Self {
            id,
            location_machinery_id: draft.location_machinery_id,
            utilized: draft.utilized,
            assigned: draft.assigned,
            quantity: draft.quantity,
            spec: draft.spec,
            created_at: at,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsTarget {
    pub id: String,
    #[serde(default)]
    pub utilized: u64,
    #[serde(default)]
    pub assigned_quantity: u64,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsDraft {
    #[serde(default)]
    pub utilized: u64,
    #[serde(default)]
    pub assigned_quantity: u64,
}

impl ResourceTarget for ToolsTarget {
    type Draft = ToolsDraft;
    const HRP: &'static str = hrp::TOOLS;

    fn from_draft(id: String, draft: Self::Draft, at: TimeStamp) -> Self {
        Self {
            id,
            utilized: draft.utilized,
            assigned_quantity: draft.assigned_quantity,
            created_at: at,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialTarget {
    pub id: String,
    /// Location-level material inventory this target draws from.
    #[serde(default)]
    pub location_material_id: Option<String>,
    #[serde(default)]
    pub utilized: u64,
    #[serde(default)]
    pub assigned_quantity: u64,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDraft {
    #[serde(default)]
    pub location_material_id: Option<String>,
    #[serde(default)]
    pub utilized: u64,
    #[serde(default)]
    pub assigned_quantity: u64,
}

impl ResourceTarget for MaterialTarget {
    type Draft = MaterialDraft;
    const HRP: &'static str = hrp::MATERIAL;

    fn from_draft(id: String, draft: Self::Draft, at: TimeStamp) -> Self {
        Self {
            id,
            location_material_id: draft.location_material_id,
            utilized: draft.utilized,
            assigned_quantity: draft.assigned_quantity,
            created_at: at,
            updated_at: at,
        }
    }
}

// ---------------------------------------------------------------------------
// Creation drafts
// ---------------------------------------------------------------------------

/// Top-level creation payload. Tasks stay raw JSON here; the service walks
/// them bottom-up inside the creation transaction so a malformed node
/// aborts the whole materialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTargetDraft {
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub proposed_by: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Value>,
}

/// Task fields minus the nested `subtasks` array, which the service has
/// already materialized into ids by the time this is parsed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    #[serde(default)]
    pub location_detail_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<TimeStamp>,
    #[serde(default)]
    pub area: f64,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub drawing: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Subtask fields minus the embedded resource arrays, which are
/// materialized first.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskDraft {
    #[serde(default)]
    pub utilized_quantity: u64,
    #[serde(default)]
    pub assigned_employee_ids: Vec<String>,
    #[serde(default)]
    pub comment_ids: Vec<String>,
}
