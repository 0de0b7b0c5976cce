//! Discovered policy index
//!
//! Policy engines (the governance framework itself, Gatekeeper, Kyverno, Kubernetes'
//! `ValidatingAdmissionPolicy`) report their policies on every managed cluster. The search backend
//! returns these findings as a flat list; this crate turns that list into one row per policy:
//!
//! - The reference [`Index`] mirrors the hub's `Channel`, `Subscription` and `HelmRelease`
//!   resources. Readers take an immutable [`References`] snapshot.
//! - [`source`] explains where each finding was deployed from: a parent `Policy`, a subscription
//!   channel (Git, Helm, ...), the cluster itself, or some unknown external manager.
//! - [`grouping`] groups findings by name, kind and API group and combines their severities,
//!   response actions and sources.
//! - [`search`] unpacks raw search results, including the resources related to each policy and
//!   Kyverno's policy reports, before grouping.
//!
//! ```text
//! [ HelmRelease ] -> [ Subscription ] -> [ Channel ]
//!                          ^
//!       [ DiscoveredPolicyItem ] --(group by name/kind/group)--> [ DiscoveredPolicyGroup ]
//! ```
//!
//! Everything here except the index's watch handlers is pure and synchronous.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod grouping;
mod index;
pub mod metrics;
pub mod search;
pub mod source;


pub use self::{
    grouping::group_discovered_policies,
    index::{Index, References, ResourceRef, SharedIndex},
    search::{process_search_results, GroupedPolicies, SearchResult},
    source::{policy_source, resolve_source, source_text, ResolvedSource},
};
