//! Identifier generation helpers
//!
//! Every record id is a uuid7 encoded with bech32 under a kind-specific
//! human-readable prefix (`mtgt_`, `task_`, ...). The prefix doubles as the
//! record-kind namespace for prefix scans over the store.

use crate::error::TargetError;
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique record id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, TargetError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| TargetError::Id(e.to_string()))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| TargetError::Id(e.to_string()))?;
    Ok(encode)
}
