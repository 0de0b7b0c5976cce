#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod apps;
pub mod labels;

pub use self::{
    apps::{Channel, ChannelSpec, HelmRelease, Subscription, SubscriptionSpec},
    labels::{parse_string_map, StringMap},
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
pub use kube::{Resource, ResourceExt};

/// Annotation naming the Subscription, as `namespace/name`, that deployed a resource.
pub const HOSTING_SUBSCRIPTION_ANNOTATION: &str =
    "apps.open-cluster-management.io/hosting-subscription";

pub const HELM_RELEASE_NAMESPACE_ANNOTATION: &str = "meta.helm.sh/release-namespace";
pub const HELM_RELEASE_NAME_ANNOTATION: &str = "meta.helm.sh/release-name";

/// Label set on a replicated policy template, valued `parentNamespace.parentName`.
pub const PARENT_POLICY_LABEL: &str = "policy.open-cluster-management.io/policy";

pub const SEVERITY_ANNOTATION: &str = "policy.open-cluster-management.io/severity";
