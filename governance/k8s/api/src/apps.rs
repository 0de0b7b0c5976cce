//! Application lifecycle resources used to explain where a policy came from.

use k8s_openapi::{apimachinery::pkg::apis::meta::v1::ObjectMeta, NamespaceResourceScope};
use kube::{CustomResource, Resource};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Describes a source repository (Git, Helm, object bucket) that subscriptions pull from.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "apps.open-cluster-management.io",
    version = "v1",
    kind = "Channel",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    #[serde(rename = "type", default)]
    pub type_: String,

    #[serde(default)]
    pub pathname: String,
}

/// Binds a channel to a set of clusters.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "apps.open-cluster-management.io",
    version = "v1",
    kind = "Subscription",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// The subscribed channel, as `namespace/name`.
    #[serde(default)]
    pub channel: String,

    /// The package name for Helm channels.
    pub name: Option<String>,

    pub package_filter: Option<PackageFilter>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFilter {
    pub version: Option<String>,
}

/// A Helm release managed by the subscription operator.
///
/// Only the release's metadata is ever consulted. Releases of charts without values carry no
/// `spec`, so the body is not modelled at all.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct HelmRelease {
    #[serde(default)]
    pub metadata: ObjectMeta,
}

impl Resource for HelmRelease {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        "HelmRelease".into()
    }

    fn group(_: &()) -> Cow<'_, str> {
        "apps.open-cluster-management.io".into()
    }

    fn version(_: &()) -> Cow<'_, str> {
        "v1".into()
    }

    fn plural(_: &()) -> Cow<'_, str> {
        "helmreleases".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
