//! Service layer API for monthly-target workflow operations
//!
//! One method per operation, each a load-mutate-save over the document
//! store. Aggregate creation is the exception: the whole bottom-up
//! materialization runs inside a single sled transaction, so a failure at
//! any depth leaves no partially created records behind. No locking beyond
//! that transaction is attempted; concurrent `apply_approval` calls against
//! the same record race last-write-wins at the storage layer.

use crate::diff::Fields;
use crate::error::TargetError;
use crate::flow::{ActionRequest, ApprovalFlow, Outcome};
use crate::model::{
    Approvable, MachineryTarget, ManpowerTarget, MaterialTarget, ModelKind, MonthlyTarget,
    MonthlyTargetDraft, ResourceTarget, Subtask, SubtaskDraft, TaskDetail, TaskDraft, TimeStamp,
    ToolsTarget, hrp,
};
use crate::store::{DocStore, abort, put_in_tx};
use crate::utils::new_uuid_to_bech32;
use serde::Serialize;
use serde_json::Value;
use sled::transaction::{ConflictableTransactionResult, TransactionError, TransactionalTree};
use std::sync::Arc;

pub struct TargetService {
    store: DocStore,
}

impl TargetService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self {
            store: DocStore::new(instance),
        }
    }

    // -- creation -----------------------------------------------------------

    /// Create a monthly target together with its nested task, subtask, and
    /// resource-target records, bottom-up, inside one transaction.
    ///
    /// Each embedded resource object is persisted first and replaced by its
    /// assigned id in the owning subtask, then subtasks in their task, then
    /// tasks in the aggregate. Ids are generated inside the transaction
    /// closure; sled may retry the closure on conflict, which is safe
    /// because nothing escapes until commit.
    pub fn create_monthly_target(&self, payload: Value) -> Result<MonthlyTarget, TargetError> {
        let draft: MonthlyTargetDraft = serde_json::from_value(payload.clone())
            .map_err(|e| TargetError::Validation(e.to_string()))?;

        let result = self.store.db().transaction(|tx| {
            let at = TimeStamp::now();

            let mut task_ids = Vec::with_capacity(draft.tasks.len());
            for task in &draft.tasks {
                task_ids.push(materialize_task(tx, task, draft.proposed_by.clone(), at)?);
            }

            let id = tx_id(hrp::MONTHLY_TARGET)?;
            let target = MonthlyTarget {
                id: id.clone(),
                location_id: draft.location_id.clone(),
                project_id: draft.project_id.clone(),
                remark: draft.remark.clone(),
                task_ids,
                is_approved: false,
                approval_flow: ApprovalFlow::new(draft.proposed_by.clone(), payload.clone(), at),
                created_at: at,
                updated_at: at,
            };
            put_in_tx(tx, &id, &target)?;
            Ok(target)
        });

        match result {
            Ok(target) => {
                tracing::info!(
                    id = %target.id,
                    tasks = target.task_ids.len(),
                    "monthly target created"
                );
                Ok(target)
            }
            Err(TransactionError::Abort(cause)) => Err(TargetError::Transaction(cause.to_string())),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    // -- reads --------------------------------------------------------------

    /// Fetch a monthly target with full nested expansion: tasks, their
    /// subtasks, and every referenced resource target, assigned employee,
    /// and comment. Dangling references expand to `null`.
    pub fn get_monthly_target(&self, id: &str) -> Result<Value, TargetError> {
        let mut doc = self
            .store
            .get_raw(id)?
            .ok_or_else(|| TargetError::NotFound(id.to_string()))?;
        if let Some(obj) = doc.as_object_mut() {
            self.expand_tasks(obj)?;
        }
        Ok(doc)
    }

    /// All documents of one kind. Tasks come back fully expanded, projects
    /// as stored.
    pub fn list_documents(&self, kind: ModelKind) -> Result<Vec<Value>, TargetError> {
        let docs = self.store.scan_kind(kind.hrp())?;
        match kind {
            ModelKind::Project => Ok(docs),
            ModelKind::Task => docs
                .into_iter()
                .map(|mut task| {
                    if let Some(obj) = task.as_object_mut() {
                        self.expand_subtasks(obj)?;
                    }
                    Ok(task)
                })
                .collect(),
        }
    }

    pub fn get_document(&self, kind: ModelKind, id: &str) -> Result<Value, TargetError> {
        if !id.starts_with(kind.hrp()) {
            return Err(TargetError::NotFound(id.to_string()));
        }
        self.store
            .get_raw(id)?
            .ok_or_else(|| TargetError::NotFound(id.to_string()))
    }

    // -- updates ------------------------------------------------------------

    pub fn update_monthly_target(&self, id: &str, update: &Fields) -> Result<Value, TargetError> {
        self.update_record::<MonthlyTarget>(id, update)
    }

    pub fn update_task(&self, task_id: &str, update: &Fields) -> Result<Value, TargetError> {
        self.update_record::<TaskDetail>(task_id, update)
    }

    pub fn update_document(
        &self,
        kind: ModelKind,
        id: &str,
        update: &Fields,
    ) -> Result<Value, TargetError> {
        match kind {
            ModelKind::Project => self.update_record::<MonthlyTarget>(id, update),
            ModelKind::Task => self.update_record::<TaskDetail>(id, update),
        }
    }

    pub fn delete_document(&self, kind: ModelKind, id: &str) -> Result<(), TargetError> {
        if !id.starts_with(kind.hrp()) || !self.store.remove(id)? {
            return Err(TargetError::NotFound(id.to_string()));
        }
        tracing::info!(%id, model = kind.as_str(), "document deleted");
        Ok(())
    }

    // -- approval -----------------------------------------------------------

    /// Run one approval action through the named record's state machine and
    /// persist the result. On the terminal (MD) approval the staged data is
    /// merged into the record through its kind's allow-list and the record
    /// is marked approved.
    pub fn apply_approval(
        &self,
        kind: ModelKind,
        id: &str,
        request: &ActionRequest,
    ) -> Result<Value, TargetError> {
        match kind {
            ModelKind::Project => self.apply_approval_to::<MonthlyTarget>(id, request),
            ModelKind::Task => self.apply_approval_to::<TaskDetail>(id, request),
        }
    }

    fn apply_approval_to<T: Approvable>(
        &self,
        id: &str,
        request: &ActionRequest,
    ) -> Result<Value, TargetError> {
        let mut doc: T = self
            .store
            .get(id)?
            .ok_or_else(|| TargetError::NotFound(id.to_string()))?;

        let at = TimeStamp::now();
        let outcome = doc.approval_flow_mut().apply(request, at)?;

        if let Outcome::Committed(staged) = &outcome {
            doc = merge_fields(&doc, staged, T::KIND.mergeable_fields())?;
            doc.mark_approved(at);
        } else {
            doc.touch(at);
        }

        self.store.put(id, &doc)?;
        tracing::info!(
            %id,
            model = T::KIND.as_str(),
            action = request.action.as_str(),
            "approval action processed"
        );
        serde_json::to_value(&doc).map_err(Into::into)
    }

    // -- internals ----------------------------------------------------------

    fn update_record<T: Approvable>(&self, id: &str, update: &Fields) -> Result<Value, TargetError> {
        let mut doc: T = self
            .store
            .get(id)?
            .ok_or_else(|| TargetError::NotFound(id.to_string()))?;
        doc = merge_fields(&doc, update, T::KIND.mergeable_fields())?;
        doc.touch(TimeStamp::now());
        self.store.put(id, &doc)?;
        serde_json::to_value(&doc).map_err(Into::into)
    }

    fn expand_tasks(&self, target: &mut Fields) -> Result<(), TargetError> {
        let Some(Value::Array(ids)) = target.get("taskIds") else {
            return Ok(());
        };
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids.clone() {
            let mut task = self.fetch_ref(&id)?;
            if let Some(obj) = task.as_object_mut() {
                self.expand_subtasks(obj)?;
            }
            tasks.push(task);
        }
        target.insert("taskIds".to_string(), Value::Array(tasks));
        Ok(())
    }

    fn expand_subtasks(&self, task: &mut Fields) -> Result<(), TargetError> {
        let Some(Value::Array(ids)) = task.get("subtaskIds") else {
            return Ok(());
        };
        let mut subtasks = Vec::with_capacity(ids.len());
        for id in ids.clone() {
            let mut subtask = self.fetch_ref(&id)?;
            if let Some(obj) = subtask.as_object_mut() {
                for key in [
                    "manpowerTargetIds",
                    "machineryTargetIds",
                    "toolTargetIds",
                    "materialTargetIds",
                    "assignedEmployeeIds",
                    "commentIds",
                ] {
                    self.expand_refs(obj, key)?;
                }
            }
            subtasks.push(subtask);
        }
        task.insert("subtaskIds".to_string(), Value::Array(subtasks));
        Ok(())
    }

    /// Replace an id array with the referenced documents, in place.
    fn expand_refs(&self, obj: &mut Fields, key: &str) -> Result<(), TargetError> {
        let Some(Value::Array(ids)) = obj.get(key) else {
            return Ok(());
        };
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids.clone() {
            docs.push(self.fetch_ref(&id)?);
        }
        obj.insert(key.to_string(), Value::Array(docs));
        Ok(())
    }

    fn fetch_ref(&self, id: &Value) -> Result<Value, TargetError> {
        match id.as_str() {
            Some(id) => Ok(self.store.get_raw(id)?.unwrap_or(Value::Null)),
            None => Ok(Value::Null),
        }
    }
}

/// Merge staged or updated data onto a record, restricted to the kind's
/// allow-list, then re-validate by round-tripping through the record type.
fn merge_fields<T>(doc: &T, update: &Fields, allowed: &[&str]) -> Result<T, TargetError>
where
    T: Approvable,
{
    let mut value = serde_json::to_value(doc)?;
    let Some(obj) = value.as_object_mut() else {
        return Err(TargetError::Validation("record is not an object".into()));
    };
    for key in allowed {
        if let Some(field) = update.get(*key) {
            obj.insert((*key).to_string(), field.clone());
        }
    }
    serde_json::from_value(value).map_err(|e| TargetError::Validation(e.to_string()))
}

// ---------------------------------------------------------------------------
// Bottom-up materialization inside the creation transaction
// ---------------------------------------------------------------------------

fn tx_id(hrp: &str) -> ConflictableTransactionResult<String, TargetError> {
    match new_uuid_to_bech32(hrp) {
        Ok(id) => Ok(id),
        Err(e) => abort(e),
    }
}

fn parse_node<T: serde::de::DeserializeOwned>(
    value: &Value,
    what: &str,
) -> ConflictableTransactionResult<T, TargetError> {
    match serde_json::from_value(value.clone()) {
        Ok(node) => Ok(node),
        Err(e) => abort(TargetError::Validation(format!("invalid {what}: {e}"))),
    }
}

/// Persist each embedded resource object of one kind and collect the
/// assigned ids that replace them in the owning subtask.
fn materialize_resources<R: ResourceTarget + Serialize>(
    tx: &TransactionalTree,
    entries: Option<&Value>,
    what: &str,
    at: TimeStamp,
) -> ConflictableTransactionResult<Vec<String>, TargetError> {
    let Some(entries) = entries else {
        return Ok(Vec::new());
    };
    let Some(list) = entries.as_array() else {
        return abort(TargetError::Validation(format!(
            "{what} must be an array of objects"
        )));
    };

    let mut ids = Vec::with_capacity(list.len());
    for entry in list {
        let draft: R::Draft = parse_node(entry, what)?;
        let id = tx_id(R::HRP)?;
        let record = R::from_draft(id.clone(), draft, at);
        put_in_tx(tx, &id, &record)?;
        ids.push(id);
    }
    Ok(ids)
}

fn materialize_subtask(
    tx: &TransactionalTree,
    value: &Value,
    at: TimeStamp,
) -> ConflictableTransactionResult<String, TargetError> {
    let Some(obj) = value.as_object() else {
        return abort(TargetError::Validation(
            "subtask entries must be objects".into(),
        ));
    };

    // Resources first; their ids replace the embedded objects.
    let manpower = materialize_resources::<ManpowerTarget>(
        tx,
        obj.get("manpowerTargetIds"),
        "manpower target",
        at,
    )?;
    let machinery = materialize_resources::<MachineryTarget>(
        tx,
        obj.get("machineryTargetIds"),
        "machinery target",
        at,
    )?;
    let tools =
        materialize_resources::<ToolsTarget>(tx, obj.get("toolTargetIds"), "tool target", at)?;
    let materials = materialize_resources::<MaterialTarget>(
        tx,
        obj.get("materialTargetIds"),
        "material target",
        at,
    )?;

    let draft: SubtaskDraft = parse_node(value, "subtask")?;
    let id = tx_id(hrp::SUBTASK)?;
    let record = Subtask {
        id: id.clone(),
        utilized_quantity: draft.utilized_quantity,
        manpower_target_ids: manpower,
        machinery_target_ids: machinery,
        tool_target_ids: tools,
        material_target_ids: materials,
        assigned_employee_ids: draft.assigned_employee_ids,
        comment_ids: draft.comment_ids,
        created_at: at,
        updated_at: at,
    };
    put_in_tx(tx, &id, &record)?;
    Ok(id)
}

fn materialize_task(
    tx: &TransactionalTree,
    value: &Value,
    proposed_by: Option<String>,
    at: TimeStamp,
) -> ConflictableTransactionResult<String, TargetError> {
    let Some(obj) = value.as_object() else {
        return abort(TargetError::Validation("task entries must be objects".into()));
    };

    let mut subtask_ids = Vec::new();
    if let Some(subtasks) = obj.get("subtasks") {
        let Some(list) = subtasks.as_array() else {
            return abort(TargetError::Validation("subtasks must be an array".into()));
        };
        for subtask in list {
            subtask_ids.push(materialize_subtask(tx, subtask, at)?);
        }
    }

    let draft: TaskDraft = parse_node(value, "task")?;
    let id = tx_id(hrp::TASK)?;
    let record = TaskDetail {
        id: id.clone(),
        location_detail_id: draft.location_detail_id,
        task_id: draft.task_id,
        start_date: draft.start_date,
        area: draft.area,
        duration: draft.duration,
        drawing: draft.drawing,
        remark: draft.remark,
        subtask_ids,
        is_approved: false,
        approval_flow: ApprovalFlow::new(proposed_by, value.clone(), at),
        created_at: at,
        updated_at: at,
    };
    put_in_tx(tx, &id, &record)?;
    Ok(id)
}
