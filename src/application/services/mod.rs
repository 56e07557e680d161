//! Application services

pub mod clone;

pub use clone::{
    CloneErrorKind, ClonePlan, CloneReport, CreatedLink, GroupFetch, PlannedLink, RecordFailure,
    SuccessPolicy, TreeCloner,
};
