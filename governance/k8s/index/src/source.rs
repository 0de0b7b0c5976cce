//! Resolves the deployment source of discovered policies.

use crate::{References, ResourceRef};
use ocm_governance_core::{DiscoveredPolicyItem, PolicySource, SourceType};
use ocm_governance_k8s_api::{
    labels::StringMap, ResourceExt, HELM_RELEASE_NAMESPACE_ANNOTATION, HELM_RELEASE_NAME_ANNOTATION,
    HOSTING_SUBSCRIPTION_ANNOTATION, PARENT_POLICY_LABEL,
};
use serde::Serialize;

const BUCKET_PATH_ANNOTATION: &str = "apps.open-cluster-management.io/bucket-path";

/// The subscription and channel that deployed a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource {
    pub bucket_path: Option<String>,
    pub git_path: Option<String>,
    pub git_branch: Option<String>,
    pub git_commit: Option<String>,
    /// The channel type, e.g. `Git`, `GitHub`, `HelmRepo`.
    #[serde(rename = "type")]
    pub type_: String,
    pub path_name: String,
    pub package: String,
    pub package_filter_version: String,
}

/// Finds the subscription and channel that deployed a resource with the given annotations.
///
/// The hosting subscription is read from the resource itself or, for resources installed by a
/// Helm release, from that release. Returns `None` when either the subscription or its channel
/// is unknown.
pub fn resolve_source(annotations: &StringMap, refs: &References) -> Option<ResolvedSource> {
    let hosting = match non_empty(annotations, HOSTING_SUBSCRIPTION_ANNOTATION) {
        Some(hosting) => hosting.to_string(),
        None => {
            let release = ResourceRef::new(
                non_empty(annotations, HELM_RELEASE_NAMESPACE_ANNOTATION)?,
                non_empty(annotations, HELM_RELEASE_NAME_ANNOTATION)?,
            );
            let release = refs.helm_release(&release)?;
            non_empty(release.annotations(), HOSTING_SUBSCRIPTION_ANNOTATION)?.to_string()
        }
    };

    let subscription = refs.subscription(&ResourceRef::parse(&hosting)?)?;
    let channel = refs.channel(&ResourceRef::parse(&subscription.spec.channel)?)?;

    let sub_annotations = subscription.annotations();
    let git_annotation = |name: &str| {
        non_empty(sub_annotations, &format!("apps.open-cluster-management.io/git-{name}"))
            .or_else(|| {
                non_empty(
                    sub_annotations,
                    &format!("apps.open-cluster-management.io/github-{name}"),
                )
            })
            .map(str::to_string)
    };

    Some(ResolvedSource {
        bucket_path: sub_annotations.get(BUCKET_PATH_ANNOTATION).cloned(),
        git_path: git_annotation("path"),
        git_branch: git_annotation("branch"),
        git_commit: git_annotation("commit"),
        type_: channel.spec.type_.clone(),
        path_name: channel.spec.pathname.clone(),
        package: subscription.spec.name.clone().unwrap_or_default(),
        package_filter_version: subscription
            .spec
            .package_filter
            .as_ref()
            .and_then(|f| f.version.clone())
            .unwrap_or_default(),
    })
}

fn non_empty<'m>(map: &'m StringMap, key: &str) -> Option<&'m str> {
    map.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Names a resolved source for display and comparison: the channel type, capitalized, with
/// `GitHub` folded into `Git`. Without a channel type the source is `External` or `Local`.
pub fn source_text(source: &ResolvedSource, is_external: bool) -> SourceType {
    if source.type_.is_empty() {
        return if is_external {
            SourceType::External
        } else {
            SourceType::Local
        };
    }

    let lower = source.type_.to_lowercase();
    let normalized = if lower == "github" { "git" } else { lower.as_str() };
    let mut chars = normalized.chars();
    let text = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    SourceType::from(text)
}

/// Classifies where a discovered policy came from.
///
/// A parent-policy label always wins. Otherwise a policy not managed externally is `Local`, and
/// an externally managed one is attributed to its subscription channel when that resolves.
pub fn policy_source(item: &DiscoveredPolicyItem, refs: &References) -> PolicySource {
    if let Some(parent) = item.labels().get(PARENT_POLICY_LABEL) {
        let mut parts = parent.split('.');
        let parent_ns = parts.next().unwrap_or_default();
        let parent_name = parts.next().unwrap_or_default();
        if !parent_ns.is_empty() && !parent_name.is_empty() {
            return PolicySource::policy(parent_ns, parent_name);
        }
    }

    if !item.is_external() {
        return PolicySource::from(SourceType::Local);
    }

    match resolve_source(&item.annotations(), refs) {
        Some(source) => PolicySource::from(source_text(&source, true)),
        None => PolicySource::from(SourceType::ManagedExternally),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(type_: &str) -> ResolvedSource {
        ResolvedSource {
            type_: type_.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn source_text_capitalizes_channel_types() {
        assert_eq!(source_text(&resolved("git"), true), SourceType::Git);
        assert_eq!(source_text(&resolved("GitHub"), true), SourceType::Git);
        assert_eq!(source_text(&resolved("helm"), false), SourceType::Helm);
        assert_eq!(
            source_text(&resolved("ObjectBucket"), true),
            SourceType::Other("Objectbucket".to_string())
        );
        assert_eq!(source_text(&resolved(""), true), SourceType::External);
        assert_eq!(source_text(&resolved(""), false), SourceType::Local);
    }

    #[test]
    fn parent_policy_label_wins() {
        let item = DiscoveredPolicyItem {
            label: "policy.open-cluster-management.io/policy=default.config-policy".to_string(),
            is_external: Some(false),
            ..Default::default()
        };
        assert_eq!(
            policy_source(&item, &References::default()),
            PolicySource::policy("default", "config-policy")
        );
    }

    #[test]
    fn incomplete_parent_label_is_ignored() {
        let item = DiscoveredPolicyItem {
            label: "policy.open-cluster-management.io/policy=default".to_string(),
            ..Default::default()
        };
        assert_eq!(
            policy_source(&item, &References::default()).type_,
            SourceType::Local
        );
    }

    #[test]
    fn unresolved_external_is_managed_externally() {
        let item = DiscoveredPolicyItem {
            is_external: Some(true),
            annotation: format!("{HOSTING_SUBSCRIPTION_ANNOTATION}=nope/nope"),
            ..Default::default()
        };
        assert_eq!(
            policy_source(&item, &References::default()).type_,
            SourceType::ManagedExternally
        );
    }
}
