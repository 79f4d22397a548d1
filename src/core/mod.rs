//! Core contracts and cross-cutting plumbing
//!
//! Collaborator traits for reaching the control plane, the per-call
//! cancellation/deadline context and logging setup.

pub mod logging;
pub mod operation;
pub mod traits;

pub use operation::OperationContext;
pub use traits::{ClusterConnector, ClusterSession, OutputStream, SharedSessionConnector};
