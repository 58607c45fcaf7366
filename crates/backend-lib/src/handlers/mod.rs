// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers of the control surface.

pub mod health;
pub mod session;

pub use health::health;
pub use session::{delete_session, load_session, save_session};
