//! Scratch demo: drive a monthly target through the whole review pipeline
//! against a local sled database and print the expanded document.
//!
//! Run with `cargo run --example sled`.

use serde_json::json;
use std::sync::Arc;
use target_approval::{
    flow::{Action, ActionRequest, Role},
    model::ModelKind,
    service::TargetService,
    utils,
};

fn request(role: Role, action: Action, user: &str, data: Option<serde_json::Value>) -> ActionRequest {
    ActionRequest {
        role,
        action,
        comment: None,
        updated_data: data.and_then(|value| value.as_object().cloned()),
        user_id: user.to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    let db = sled::open("sled")?;

    if !db.is_empty() {
        db.clear()?;
    }

    let service = TargetService::new(Arc::new(db));

    let proposer = utils::new_uuid_to_bech32("user_")?;
    let hod = utils::new_uuid_to_bech32("user_")?;
    let md = utils::new_uuid_to_bech32("user_")?;

    let target = service.create_monthly_target(json!({
        "locationId": "loc_tower_a",
        "projectId": "proj_skyline",
        "remark": "march targets",
        "proposedBy": proposer,
        "tasks": [
            {
                "locationDetailId": "locdet_a1",
                "startDate": "2026-03-01T00:00:00Z",
                "area": 420.5,
                "drawing": "rev-a",
                "remark": "slab cycle",
                "subtasks": [
                    {
                        "utilizedQuantity": 3,
                        "manpowerTargetIds": [{ "utilized": 0, "assigned": 5 }],
                        "machineryTargetIds": [
                            { "utilized": 1, "assigned": 2, "quantity": 2, "spec": "tower crane" }
                        ]
                    }
                ]
            }
        ]
    }))?;

    println!("created {} at stage site_billing", target.id);

    // site billing stages a revision, HOD endorses, MD commits it
    service.apply_approval(
        ModelKind::Project,
        &target.id,
        &request(
            Role::SiteBilling,
            Action::Edit,
            &proposer,
            Some(json!({ "remark": "march targets, revised" })),
        ),
    )?;
    service.apply_approval(
        ModelKind::Project,
        &target.id,
        &request(Role::Hod, Action::Approve, &hod, None),
    )?;
    service.apply_approval(
        ModelKind::Project,
        &target.id,
        &request(Role::Md, Action::Approve, &md, None),
    )?;

    let expanded = service.get_monthly_target(&target.id)?;
    println!("{}", serde_json::to_string_pretty(&expanded)?);

    Ok(())
}
