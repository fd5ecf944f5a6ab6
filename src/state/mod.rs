//! 会话状态模块

pub mod session_store;

pub use session_store::{SessionPhase, SessionStore};
