//! Request guards for the administrative routes.

pub mod origin;

pub use origin::{is_origin_allowed, origin_guard};
