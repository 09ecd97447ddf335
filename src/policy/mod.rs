//! Pure decision rules: who may do what, and when a job moves on to the
//! next work phase.

pub mod access;
pub mod forwarding;

pub use forwarding::{ForwardSpec, ForwardTarget};
