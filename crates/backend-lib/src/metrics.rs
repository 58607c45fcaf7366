// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const SESSION_JOINED: &str = "session.joined";
pub const SESSION_ACTIVE: &str = "session.active";
pub const SESSION_EVICTED: &str = "session.evicted";
pub const EDIT_APPLIED: &str = "edit.applied";
pub const EDIT_REJECTED: &str = "edit.rejected";
pub const SAVE_OK: &str = "save.ok";
pub const SAVE_FAILED: &str = "save.failed";
pub const WRITEBACK_BATCH_SIZE: &str = "writeback.batch_size";
