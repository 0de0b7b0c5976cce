use ahash::AHashMap as HashMap;
use ocm_governance_k8s_api::{Channel, HelmRelease, ResourceExt, Subscription};
use parking_lot::RwLock;
use std::{fmt, sync::Arc};

pub type SharedIndex = Arc<RwLock<Index>>;

/// Indexes the hub's application resources as they're observed by watches.
///
/// Writes are copy-on-write against the current [`References`] so that snapshots handed to the
/// grouping worker are never modified underneath it.
#[derive(Debug, Default)]
pub struct Index {
    refs: Arc<References>,
}

/// An immutable view of the hub's channels, subscriptions and Helm releases, keyed by
/// namespace and name.
#[derive(Clone, Debug, Default)]
pub struct References {
    pub(crate) channels: HashMap<ResourceRef, Channel>,
    pub(crate) subscriptions: HashMap<ResourceRef, Subscription>,
    pub(crate) helm_releases: HashMap<ResourceRef, HelmRelease>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceRef {
    pub namespace: String,
    pub name: String,
}

// === impl Index ===

impl Index {
    pub fn shared() -> SharedIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Returns the current snapshot. This is cheap: the snapshot is shared until the next write.
    pub fn references(&self) -> Arc<References> {
        self.refs.clone()
    }

    fn refs_mut(&mut self) -> &mut References {
        Arc::make_mut(&mut self.refs)
    }
}

/// Derives the index key for a namespaced resource, skipping (and logging) resources without a
/// namespace.
fn resource_ref<R: ResourceExt>(resource: &R, kind: &str) -> Option<ResourceRef> {
    let name = resource.name_unchecked();
    match resource.namespace() {
        Some(namespace) => Some(ResourceRef { namespace, name }),
        None => {
            tracing::warn!(%name, %kind, "ignoring resource without a namespace");
            None
        }
    }
}

impl kubert::index::IndexNamespacedResource<Channel> for Index {
    fn apply(&mut self, channel: Channel) {
        if let Some(key) = resource_ref(&channel, "Channel") {
            tracing::debug!(namespace = %key.namespace, name = %key.name, "indexing channel");
            self.refs_mut().channels.insert(key, channel);
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.refs_mut()
            .channels
            .remove(&ResourceRef { namespace, name });
    }
}

impl kubert::index::IndexNamespacedResource<Subscription> for Index {
    fn apply(&mut self, subscription: Subscription) {
        if let Some(key) = resource_ref(&subscription, "Subscription") {
            tracing::debug!(namespace = %key.namespace, name = %key.name, "indexing subscription");
            self.refs_mut().subscriptions.insert(key, subscription);
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.refs_mut()
            .subscriptions
            .remove(&ResourceRef { namespace, name });
    }
}

impl kubert::index::IndexNamespacedResource<HelmRelease> for Index {
    fn apply(&mut self, release: HelmRelease) {
        if let Some(key) = resource_ref(&release, "HelmRelease") {
            tracing::debug!(namespace = %key.namespace, name = %key.name, "indexing helm release");
            self.refs_mut().helm_releases.insert(key, release);
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.refs_mut()
            .helm_releases
            .remove(&ResourceRef { namespace, name });
    }
}

// === impl References ===

impl References {
    /// Builds a snapshot from lists fetched elsewhere. Resources without a namespace are skipped.
    pub fn from_lists(
        helm_releases: impl IntoIterator<Item = HelmRelease>,
        channels: impl IntoIterator<Item = Channel>,
        subscriptions: impl IntoIterator<Item = Subscription>,
    ) -> Self {
        fn keyed<R: ResourceExt>(
            resources: impl IntoIterator<Item = R>,
            kind: &str,
        ) -> HashMap<ResourceRef, R> {
            resources
                .into_iter()
                .filter_map(|r| Some((resource_ref(&r, kind)?, r)))
                .collect()
        }

        Self {
            channels: keyed(channels, "Channel"),
            subscriptions: keyed(subscriptions, "Subscription"),
            helm_releases: keyed(helm_releases, "HelmRelease"),
        }
    }

    pub fn channel(&self, key: &ResourceRef) -> Option<&Channel> {
        self.channels.get(key)
    }

    pub fn subscription(&self, key: &ResourceRef) -> Option<&Subscription> {
        self.subscriptions.get(key)
    }

    pub fn helm_release(&self, key: &ResourceRef) -> Option<&HelmRelease> {
        self.helm_releases.get(key)
    }

    pub fn channels_len(&self) -> usize {
        self.channels.len()
    }

    pub fn subscriptions_len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn helm_releases_len(&self) -> usize {
        self.helm_releases.len()
    }
}

// === impl ResourceRef ===

impl ResourceRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parses a `namespace/name` reference. Both parts must be non-empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (namespace, name) = s.split_once('/')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
