//! Groups discovered policies by name, kind and API group.

use crate::{source::policy_source, References};
use ahash::AHashMap as HashMap;
use ocm_governance_core::{
    DiscoveredPolicyGroup, DiscoveredPolicyItem, PolicySource, ResponseActions, Severity,
};
use ocm_governance_k8s_api::SEVERITY_ANNOTATION;

pub const GATEKEEPER_CONSTRAINTS_GROUP: &str = "constraints.gatekeeper.sh";
pub const KYVERNO_GROUP: &str = "kyverno.io";
pub const VALIDATING_ADMISSION_POLICY_BINDING: &str = "ValidatingAdmissionPolicyBinding";

/// Kyverno violation totals keyed by `cluster/namespace/name` (or `cluster/name`).
pub(crate) type KyvernoViolations = HashMap<String, u64>;

/// Groups findings that share a name, kind and API group, preserving the order in which each
/// group was first seen.
///
/// Each finding is annotated with its source, normalized severity and response action. Each
/// group reports the highest member severity, the combined response action, and the members'
/// shared source (or `Multiple` when they disagree).
pub fn group_discovered_policies(
    items: Vec<DiscoveredPolicyItem>,
    refs: &References,
) -> Vec<DiscoveredPolicyGroup> {
    group(items, refs, None)
}

pub(crate) fn group(
    items: Vec<DiscoveredPolicyItem>,
    refs: &References,
    kyverno_violations: Option<&KyvernoViolations>,
) -> Vec<DiscoveredPolicyGroup> {
    let mut keys = HashMap::<(String, String, String), usize>::default();
    let mut groups = Vec::<Vec<DiscoveredPolicyItem>>::new();

    for mut item in items.into_iter().filter(|item| !is_engine_owned_binding(item)) {
        item.source = Some(policy_source(&item, refs));

        if item.apigroup == KYVERNO_GROUP {
            item.response_action = item.validation_failure_action.clone();
            if let Some(violations) = kyverno_violations {
                let key = format!("{}/{}", item.cluster, item.namespaced_name());
                item.total_violations = Some(violations.get(&key).copied().unwrap_or(0));
            }
        }

        // Partition on the structured key so that distinct triples never merge, even when
        // their concatenations collide.
        let key = (item.name.clone(), item.kind.clone(), item.apigroup.clone());
        let idx = *keys.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[idx].push(item);
    }

    tracing::trace!(groups = groups.len(), "grouped discovered policies");
    groups.into_iter().filter_map(reduce).collect()
}

/// `ValidatingAdmissionPolicyBinding`s generated by Gatekeeper and Kyverno duplicate the
/// engines' own policies.
fn is_engine_owned_binding(item: &DiscoveredPolicyItem) -> bool {
    item.kind == VALIDATING_ADMISSION_POLICY_BINDING
        && matches!(item.owned_by.as_deref(), Some("Gatekeeper" | "Kyverno"))
}

fn reduce(mut policies: Vec<DiscoveredPolicyItem>) -> Option<DiscoveredPolicyGroup> {
    let mut highest = Severity::Unknown;
    let mut actions = ResponseActions::default();
    let mut source: Option<PolicySource> = None;

    for policy in &mut policies {
        let severity = item_severity(policy);
        highest = highest.max(Severity::parse(&severity));
        policy.severity = Some(severity);

        if let Some(action) = item_response_action(policy) {
            if policy.kind == VALIDATING_ADMISSION_POLICY_BINDING {
                actions.insert_all(&action);
            } else {
                actions.insert(action.clone());
            }
            policy.response_action = Some(action);
        }

        let member = policy.source.clone().unwrap_or_default();
        match &source {
            None => source = Some(member),
            Some(s) if s.is_multiple() => {}
            Some(s) if *s != member => source = Some(PolicySource::multiple()),
            Some(_) => {}
        }
    }

    let first = policies.first()?;
    Some(DiscoveredPolicyGroup {
        id: format!("{}{}{}", first.name, first.kind, first.apigroup),
        apigroup: first.apigroup.clone(),
        name: first.name.clone(),
        kind: first.kind.clone(),
        severity: highest,
        response_action: actions.combined(),
        source: source.unwrap_or_default(),
        policies,
    })
}

/// The item's lower-cased severity, falling back to the severity annotation.
pub fn item_severity(item: &DiscoveredPolicyItem) -> String {
    match item.severity.as_deref() {
        Some(severity) if !severity.is_empty() => severity.to_lowercase(),
        _ => item
            .annotations()
            .get(SEVERITY_ANNOTATION)
            .map(|s| s.to_lowercase())
            .unwrap_or_default(),
    }
}

/// The item's response action, in whichever field its policy engine reports it.
pub fn item_response_action(item: &DiscoveredPolicyItem) -> Option<String> {
    if let Some(action) = non_empty(&item.remediation_action) {
        return Some(action.to_lowercase());
    }
    if let Some(action) = non_empty(&item.enforcement_action) {
        return Some(action.to_string());
    }
    if item.apigroup == GATEKEEPER_CONSTRAINTS_GROUP {
        // Gatekeeper denies when unset.
        return Some("deny".to_string());
    }
    if item.kind == VALIDATING_ADMISSION_POLICY_BINDING {
        let mut actions = non_empty(&item.validation_actions)?
            .split("; ")
            .collect::<Vec<_>>();
        actions.sort_unstable();
        return Some(actions.join("/"));
    }
    if item.apigroup == KYVERNO_GROUP {
        return item.validation_failure_action.clone();
    }
    None
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}
