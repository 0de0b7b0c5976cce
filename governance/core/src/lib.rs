#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cell;
pub mod compliance;
pub mod discovered;
pub mod quantity;
pub mod response;
pub mod severity;
pub mod source;

pub use self::{
    compliance::{policy_violation_summary, Compliance, ViolationSummary},
    discovered::{DiscoveredPolicyGroup, DiscoveredPolicyItem},
    response::ResponseActions,
    severity::Severity,
    source::{PolicySource, SourceType},
};
