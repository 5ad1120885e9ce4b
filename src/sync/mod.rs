//! Multi-device sync protocol.
//!
//! Devices exchange incremental changes with the server through three
//! operations: pull (download rows changed since a watermark), push (upload
//! local edits as last-write-wins upserts), and status (registry row plus
//! recent audit history). The watermark contract is `updated_at >=
//! last_sync`, boundary inclusive, so clients must tolerate seeing the most
//! recent row again.

pub mod audit;
pub mod engine;
pub mod registry;
pub mod tables;
pub mod types;

pub use audit::SyncAudit;
pub use engine::SyncEngine;
pub use registry::DeviceRegistry;
pub use tables::SyncTable;
pub use types::{
    PullRequest, PullResponse, PushParams, PushResponse, StatusParams, StatusResponse,
    SyncLogEntry, SyncOperation,
};
