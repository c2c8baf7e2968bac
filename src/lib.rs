//! Multi-stage approval workflows for construction monthly targets.
//!
//! A monthly target is a nested document (tasks, subtasks, resource
//! allocations) that passes sequential review: site billing proposes, HOD
//! reviews, site billing rechecks, MD gives final approval. The [`flow`]
//! module holds the state machine, [`diff`] the change classifier feeding
//! it, [`service`] the sled-backed operations, and [`api`] the
//! transport-facing handlers.

pub mod api;
pub mod diff;
pub mod error;
pub mod flow;
pub mod model;
pub mod service;
pub mod store;
pub mod utils;
