#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use ocm_governance_core as core;
pub use ocm_governance_k8s_api as k8s;
pub use ocm_governance_k8s_index as index;

mod args;
pub mod poll;
pub mod worker;

pub use self::{
    args::Args,
    worker::{GroupingWorker, Request},
};
