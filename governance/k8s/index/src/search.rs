//! Unpacks search results into grouped policies and their related resources.

use crate::{
    grouping::{self, KyvernoViolations, KYVERNO_GROUP},
    References,
};
use ahash::AHashMap as HashMap;
use ocm_governance_core::{
    discovered::group_version, DiscoveredPolicyGroup, DiscoveredPolicyItem,
};
use serde::{Deserialize, Serialize};

/// One search query result: the policies found for a single template, and resources related to
/// them.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchResult {
    pub items: Vec<DiscoveredPolicyItem>,
    pub related: Vec<Related>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Related {
    pub kind: String,
    pub items: Vec<RelatedItem>,
}

/// A resource as reported by search. Fields other than those used for indexing are preserved.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelatedItem {
    pub apigroup: String,
    pub apiversion: String,
    pub kind: String,
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(rename = "_uid", skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Set on Kyverno policy reports, as `policyNamespace/policyName=count; ...`.
    #[serde(
        rename = "_policyViolationCounts",
        skip_serializing_if = "Option::is_none"
    )]
    pub policy_violation_counts: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A resource a discovered policy evaluates, with its compliance on that cluster.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedResource {
    pub apigroup: String,
    pub apiversion: String,
    pub groupversion: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    pub cluster: String,
    #[serde(rename = "_uid", skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// `compliant` or `noncompliant`.
    pub compliant: String,
    pub template_info: TemplateInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_report: Option<RelatedItem>,

    /// The `namespace/name` of the template, as Kyverno reports name it.
    #[serde(skip)]
    template_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    pub cluster_name: String,
    pub api_version: String,
    pub api_group: String,
    pub kind: String,
    pub template_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedPolicies {
    pub policy_items: Vec<DiscoveredPolicyGroup>,
    pub related_resources: Vec<RelatedResource>,
    pub kyverno_policy_reports: Vec<RelatedItem>,
}

/// The minified resource references found in `_missingResources` and `_nonCompliantResources`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MinifiedResource {
    #[serde(rename = "g")]
    apigroup: String,
    #[serde(rename = "v")]
    apiversion: String,
    #[serde(rename = "k")]
    kind: String,
    #[serde(rename = "ns")]
    namespace: Option<String>,
    #[serde(rename = "n")]
    name: String,
}

const COMPLIANT: &str = "compliant";
const NONCOMPLIANT: &str = "noncompliant";

/// An insertion-ordered map of related resources keyed by
/// `cluster:groupversion:kind:namespace:name`.
#[derive(Default)]
struct ResourceMap {
    index: HashMap<String, usize>,
    resources: Vec<RelatedResource>,
}

/// Flattens search results, collects related resources and Kyverno policy reports, and groups the
/// discovered policies.
pub fn process_search_results(results: Vec<SearchResult>, refs: &References) -> GroupedPolicies {
    let mut items = Vec::new();
    let mut reports = Vec::new();
    let mut resources = ResourceMap::default();

    for SearchResult {
        items: result_items,
        related,
    } in results
    {
        let template = result_items.first();
        let template_key = template.map(|t| t.namespaced_name()).unwrap_or_default();
        let is_kyverno = template.is_some_and(|t| t.apigroup == KYVERNO_GROUP);

        let template_namespaces = result_items
            .iter()
            .map(|item| (item.cluster.clone(), item.namespace.clone()))
            .collect::<HashMap<_, _>>();
        let template_info = |cluster: &str| TemplateInfo {
            cluster_name: cluster.to_string(),
            api_version: template.map(|t| t.apiversion.clone()).unwrap_or_default(),
            api_group: template.map(|t| t.apigroup.clone()).unwrap_or_default(),
            kind: template.map(|t| t.kind.clone()).unwrap_or_default(),
            template_name: template.map(|t| t.name.clone()).unwrap_or_default(),
            template_namespace: template_namespaces.get(cluster).cloned().flatten(),
        };

        for Related {
            kind,
            items: related_items,
        } in related
        {
            let is_report = kind == "PolicyReport" || kind == "ClusterPolicyReport";
            if is_kyverno && is_report {
                reports.extend(related_items.iter().cloned());
            }

            for item in related_items {
                match (item.apigroup.as_str(), item.kind.as_str()) {
                    ("internal.open-cluster-management.io", "Cluster")
                    | ("policy.open-cluster-management.io", "Policy")
                    | ("policy.open-cluster-management.io", "ConfigurationPolicy") => continue,
                    ("wgpolicyk8s.io", "PolicyReport" | "ClusterPolicyReport") if is_kyverno => {
                        continue
                    }
                    _ => {}
                }

                let resource = RelatedResource {
                    groupversion: group_version(&item.apigroup, &item.apiversion),
                    template_info: template_info(&item.cluster),
                    apigroup: item.apigroup,
                    apiversion: item.apiversion,
                    kind: item.kind,
                    namespace: item.namespace,
                    name: item.name,
                    cluster: item.cluster,
                    uid: item.uid,
                    compliant: COMPLIANT.to_string(),
                    policy_report: None,
                    template_key: template_key.clone(),
                };
                resources.insert(resource);
            }
        }

        for item in &result_items {
            for missing in parse_minified(item.missing_resources.as_deref(), item) {
                resources.insert(RelatedResource {
                    groupversion: group_version(&missing.apigroup, &missing.apiversion),
                    apigroup: missing.apigroup,
                    apiversion: missing.apiversion,
                    kind: missing.kind,
                    namespace: missing.namespace,
                    name: missing.name,
                    cluster: item.cluster.clone(),
                    uid: None,
                    compliant: COMPLIANT.to_string(),
                    template_info: template_info(&item.cluster),
                    policy_report: None,
                    template_key: template_key.clone(),
                });
            }

            for violating in parse_minified(item.non_compliant_resources.as_deref(), item) {
                let key = resource_key(
                    &item.cluster,
                    &group_version(&violating.apigroup, &violating.apiversion),
                    &violating.kind,
                    violating.namespace.as_deref(),
                    &violating.name,
                );
                if let Some(resource) = resources.get_mut(&key) {
                    resource.compliant = NONCOMPLIANT.to_string();
                }
            }
        }

        items.extend(result_items);
    }

    if items.is_empty() {
        return GroupedPolicies::default();
    }

    let violations = kyverno_violations(&reports);
    if !reports.is_empty() {
        link_policy_reports(&mut resources.resources, &reports);
    }

    let policy_items = grouping::group(items, refs, Some(&violations));
    tracing::debug!(
        groups = policy_items.len(),
        related = resources.resources.len(),
        reports = reports.len(),
        "processed search results"
    );
    GroupedPolicies {
        policy_items,
        related_resources: resources.resources,
        kyverno_policy_reports: reports,
    }
}

/// Sums each Kyverno report's per-policy violation counts by `cluster/policy`.
fn kyverno_violations(reports: &[RelatedItem]) -> KyvernoViolations {
    let mut violations = KyvernoViolations::default();
    for report in reports {
        for (policy, count) in violation_counts(report) {
            *violations
                .entry(format!("{}/{policy}", report.cluster))
                .or_default() += count;
        }
    }
    violations
}

/// Attaches each policy report to the resource it reports on and marks the resource
/// noncompliant when the report counts violations of the resource's template.
fn link_policy_reports(resources: &mut [RelatedResource], reports: &[RelatedItem]) {
    let by_name = reports
        .iter()
        .map(|r| (format!("{}/{}", r.cluster, r.name), r))
        .collect::<HashMap<_, _>>();

    for resource in resources {
        let Some(report) = resource.uid.as_ref().and_then(|uid| by_name.get(uid)) else {
            continue;
        };
        if violation_counts(report)
            .any(|(policy, count)| policy == resource.template_key && count > 0)
        {
            resource.compliant = NONCOMPLIANT.to_string();
        }
        resource.policy_report = Some((*report).clone());
    }
}

fn violation_counts(report: &RelatedItem) -> impl Iterator<Item = (&str, u64)> + '_ {
    report
        .policy_violation_counts
        .as_deref()
        .unwrap_or_default()
        .split("; ")
        .filter_map(|entry| {
            let (policy, count) = entry.split_once('=')?;
            Some((policy, count.trim().parse().ok()?))
        })
}

fn parse_minified(json: Option<&str>, item: &DiscoveredPolicyItem) -> Vec<MinifiedResource> {
    let Some(json) = json.filter(|j| !j.is_empty()) else {
        return Vec::new();
    };
    serde_json::from_str(json).unwrap_or_else(|error| {
        tracing::debug!(%error, policy = %item.name, cluster = %item.cluster, "invalid resource list");
        Vec::new()
    })
}

fn resource_key(
    cluster: &str,
    groupversion: &str,
    kind: &str,
    namespace: Option<&str>,
    name: &str,
) -> String {
    format!(
        "{cluster}:{groupversion}:{kind}:{}:{name}",
        namespace.unwrap_or_default()
    )
}

// === impl ResourceMap ===

impl ResourceMap {
    /// Inserts or replaces a resource, keeping the position of the first insertion.
    fn insert(&mut self, resource: RelatedResource) {
        let key = resource_key(
            &resource.cluster,
            &resource.groupversion,
            &resource.kind,
            resource.namespace.as_deref(),
            &resource.name,
        );
        match self.index.get(&key) {
            Some(&idx) => self.resources[idx] = resource,
            None => {
                self.index.insert(key, self.resources.len());
                self.resources.push(resource);
            }
        }
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut RelatedResource> {
        let idx = *self.index.get(key)?;
        self.resources.get_mut(idx)
    }
}
