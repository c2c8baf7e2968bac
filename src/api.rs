//! Request-handling boundary
//!
//! The transport itself (HTTP server, routing) is an external collaborator;
//! these handlers take already-parsed path, query, and body values and
//! return status-coded JSON responses. One handler per route. All failures
//! are translated here and nowhere retried.

use crate::diff::Fields;
use crate::error::TargetError;
use crate::flow::ActionRequest;
use crate::model::ModelKind;
use crate::service::TargetService;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
    fn created(body: Value) -> Self {
        Self { status: 201, body }
    }
    fn failure(err: &TargetError) -> Self {
        Self {
            status: err.status(),
            body: json!({ "error": err.to_string() }),
        }
    }
}

fn respond(result: Result<Value, TargetError>) -> ApiResponse {
    match result {
        Ok(body) => ApiResponse::ok(body),
        Err(err) => ApiResponse::failure(&err),
    }
}

fn body_object(body: &Value) -> Result<&Fields, TargetError> {
    body.as_object()
        .ok_or_else(|| TargetError::Validation("request body must be a JSON object".into()))
}

fn action_request(body: Value) -> Result<ActionRequest, TargetError> {
    serde_json::from_value(body).map_err(|e| TargetError::Validation(e.to_string()))
}

/// POST /monthly-target
pub fn create_monthly_target(service: &TargetService, body: Value) -> ApiResponse {
    match service.create_monthly_target(body) {
        Ok(target) => match serde_json::to_value(&target) {
            Ok(doc) => ApiResponse::created(doc),
            Err(e) => ApiResponse::failure(&TargetError::from(e)),
        },
        Err(err) => ApiResponse::failure(&err),
    }
}

/// PUT /monthly-target/:id
pub fn update_monthly_target(service: &TargetService, id: &str, body: &Value) -> ApiResponse {
    respond(body_object(body).and_then(|update| service.update_monthly_target(id, update)))
}

/// GET /monthly-target/:id
pub fn get_monthly_target(service: &TargetService, id: &str) -> ApiResponse {
    respond(service.get_monthly_target(id))
}

/// POST /monthly-target/:id/approve
///
/// Formerly a simpler per-role boolean-flag mechanism; now routed through
/// the same state machine as /documents/:id/approval.
pub fn approve_monthly_target(service: &TargetService, id: &str, body: Value) -> ApiResponse {
    respond(
        action_request(body)
            .and_then(|request| service.apply_approval(ModelKind::Project, id, &request))
            .map(|doc| json!({ "message": "Action processed", "doc": doc })),
    )
}

/// PUT /task/:taskId
pub fn update_task(service: &TargetService, task_id: &str, body: &Value) -> ApiResponse {
    respond(body_object(body).and_then(|update| service.update_task(task_id, update)))
}

/// POST /task/:taskId/approve
pub fn approve_task(service: &TargetService, task_id: &str, body: Value) -> ApiResponse {
    respond(
        action_request(body)
            .and_then(|request| service.apply_approval(ModelKind::Task, task_id, &request))
            .map(|doc| json!({ "message": "Action processed", "doc": doc })),
    )
}

/// GET /documents?model=project|task
pub fn list_documents(service: &TargetService, model: &str) -> ApiResponse {
    respond(
        ModelKind::parse(model)
            .and_then(|kind| service.list_documents(kind))
            .map(Value::Array),
    )
}

/// GET /documents/:id?model=...
pub fn get_document(service: &TargetService, model: &str, id: &str) -> ApiResponse {
    respond(ModelKind::parse(model).and_then(|kind| service.get_document(kind, id)))
}

/// PUT /documents/:id, body `{model, update}`
pub fn update_document(service: &TargetService, id: &str, body: &Value) -> ApiResponse {
    let result = body_object(body).and_then(|obj| {
        let model = obj
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| TargetError::Validation("body must carry a 'model' field".into()))?;
        let kind = ModelKind::parse(model)?;
        let update = obj
            .get("update")
            .and_then(Value::as_object)
            .ok_or_else(|| TargetError::Validation("body must carry an 'update' object".into()))?;
        service.update_document(kind, id, update)
    });
    respond(result)
}

/// DELETE /documents/:id?model=...
pub fn delete_document(service: &TargetService, model: &str, id: &str) -> ApiResponse {
    respond(
        ModelKind::parse(model)
            .and_then(|kind| service.delete_document(kind, id))
            .map(|()| json!({ "message": "Deleted successfully" })),
    )
}

/// POST /documents/:id/approval?model=... — the full state machine.
pub fn handle_approval(service: &TargetService, model: &str, id: &str, body: Value) -> ApiResponse {
    respond(
        ModelKind::parse(model)
            .and_then(|kind| {
                let request = action_request(body)?;
                service.apply_approval(kind, id, &request)
            })
            .map(|doc| json!({ "message": "Action processed", "doc": doc })),
    )
}
