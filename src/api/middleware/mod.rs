//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: resolves the staff account
//! 2. Access logger: logs after auth, has staff_id

pub mod audit;
pub mod auth;
