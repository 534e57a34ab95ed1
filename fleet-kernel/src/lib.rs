//! Fleet kernel - device liveness and health snapshot backend.
//!
//! Edge devices push heartbeats and health snapshots; the kernel keeps an
//! in-memory last-contact registry, persists snapshots, and answers
//! "is this device up" and "what did it last report".

pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod http;
pub mod models;
pub mod registry;
pub mod service;
pub mod status;
pub mod store;

pub use error::FleetError;
pub use registry::LivenessRegistry;
pub use service::FleetService;
pub use status::{evaluate, Status};
