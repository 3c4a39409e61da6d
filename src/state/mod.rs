//! State module for tracking harvest progress
//!
//! Each resource kind ends a run in exactly one [`ResourceStatus`], which the
//! run report, the summary and the persist step all read.

mod resource_status;

pub use resource_status::ResourceStatus;
