//! Policy-engine findings as reported by the search backend.

use crate::{PolicySource, Severity};
use ocm_governance_k8s_api::labels::{parse_string_map, StringMap};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

/// A single policy (or Gatekeeper constraint, Kyverno policy, ...) found on one cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscoveredPolicyItem {
    pub name: String,
    pub kind: String,
    pub apigroup: String,
    pub apiversion: String,
    pub cluster: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// `Compliant`, `NonCompliant`, `Pending`, or anything else the engine reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliant: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation_action: Option<String>,

    /// Gatekeeper's spelling of a response action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcement_action: Option<String>,

    /// Kyverno's spelling of a response action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_failure_action: Option<String>,

    /// `; `-separated actions of a `ValidatingAdmissionPolicyBinding`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_actions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub disabled: Option<bool>,

    /// Labels flattened as `key=value; ...`.
    #[serde(deserialize_with = "deserialize_string")]
    pub label: String,

    /// Annotations flattened as `key=value; ...`.
    #[serde(deserialize_with = "deserialize_string")]
    pub annotation: String,

    #[serde(
        rename = "_isExternal",
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_external: Option<bool>,

    #[serde(rename = "_ownedBy", skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,

    #[serde(rename = "_uid", skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(
        deserialize_with = "deserialize_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_violations: Option<u64>,

    #[serde(
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub deployment_available: Option<bool>,

    #[serde(
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub upgrade_available: Option<bool>,

    /// Minified JSON list of resources the policy expects but that are missing.
    #[serde(rename = "_missingResources", skip_serializing_if = "Option::is_none")]
    pub missing_resources: Option<String>,

    /// Minified JSON list of resources that violate the policy.
    #[serde(
        rename = "_nonCompliantResources",
        skip_serializing_if = "Option::is_none"
    )]
    pub non_compliant_resources: Option<String>,

    /// Set when the item is grouped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_action: Option<String>,

    /// Set when the item is grouped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PolicySource>,
}

/// All findings sharing a name, kind and API group, across clusters.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPolicyGroup {
    pub id: String,
    pub apigroup: String,
    pub name: String,
    pub kind: String,
    /// The highest severity among the members.
    pub severity: Severity,
    pub response_action: String,
    pub policies: Vec<DiscoveredPolicyItem>,
    pub source: PolicySource,
}

// === impl DiscoveredPolicyItem ===

impl DiscoveredPolicyItem {
    pub fn labels(&self) -> StringMap {
        parse_string_map(&self.label)
    }

    pub fn annotations(&self) -> StringMap {
        parse_string_map(&self.annotation)
    }

    pub fn is_external(&self) -> bool {
        self.is_external.unwrap_or(false)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }

    /// `namespace/name` for namespaced policies, `name` otherwise.
    pub fn namespaced_name(&self) -> String {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{ns}/{}", self.name),
            _ => self.name.clone(),
        }
    }

    /// `apigroup/apiversion`, or just the version for the core group.
    pub fn group_version(&self) -> String {
        group_version(&self.apigroup, &self.apiversion)
    }
}

pub fn group_version(group: &str, version: &str) -> String {
    if group.is_empty() {
        version.to_string()
    } else {
        format!("{group}/{version}")
    }
}

// === serde helpers ===

/// A missing or null string reads as empty.
fn deserialize_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// The search backend reports booleans both as JSON booleans and as `"true"`/`"false"`. Any
/// other value is dropped.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Str(String),
        Other(IgnoredAny),
    }

    Ok(
        Option::<Flag>::deserialize(deserializer)?.and_then(|flag| match flag {
            Flag::Bool(b) => Some(b),
            Flag::Str(s) => Some(s.trim().eq_ignore_ascii_case("true")),
            Flag::Other(_) => None,
        }),
    )
}

/// Counters arrive either as numbers or numeric strings. Negative, fractional and unparseable
/// values are dropped.
fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Num(u64),
        Str(String),
        Other(IgnoredAny),
    }

    Ok(
        Option::<Count>::deserialize(deserializer)?.and_then(|count| match count {
            Count::Num(n) => Some(n),
            Count::Str(s) => s.trim().parse().ok(),
            Count::Other(_) => None,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_search_item() {
        let item: DiscoveredPolicyItem = serde_json::from_value(serde_json::json!({
            "_hubClusterResource": true,
            "_uid": "local-cluster/36044810",
            "apigroup": "policy.open-cluster-management.io",
            "apiversion": "v1",
            "cluster": "managed1",
            "kind": "ConfigurationPolicy",
            "label": "",
            "name": "check-policy-reports",
            "namespace": "managed1",
            "compliant": "NonCompliant",
            "remediationAction": "inform",
            "severity": "low",
            "disabled": "false",
            "_isExternal": "true",
            "totalViolations": "85",
            "deploymentAvailable": true,
            "annotation": "cluster-namespace=local-cluster",
        }))
        .expect("item must decode");

        assert_eq!(item.name, "check-policy-reports");
        assert_eq!(item.disabled, Some(false));
        assert!(item.is_external());
        assert_eq!(item.total_violations, Some(85));
        assert_eq!(item.deployment_available, Some(true));
        assert_eq!(item.upgrade_available, None);
        assert_eq!(item.uid.as_deref(), Some("local-cluster/36044810"));
        assert_eq!(item.namespaced_name(), "managed1/check-policy-reports");
        assert_eq!(
            item.annotations().get("cluster-namespace").map(String::as_str),
            Some("local-cluster")
        );
    }

    #[test]
    fn missing_fields_default() {
        let item: DiscoveredPolicyItem =
            serde_json::from_value(serde_json::json!({ "name": "p", "disabled": null }))
                .expect("item must decode");
        assert_eq!(item.disabled, None);
        assert!(!item.is_disabled());
        assert!(!item.is_external());
        assert_eq!(item.namespaced_name(), "p");
        assert!(item.labels().is_empty());
    }

    #[test]
    fn malformed_fields_degrade() {
        let item: DiscoveredPolicyItem = serde_json::from_value(serde_json::json!({
            "name": "p",
            "label": null,
            "annotation": null,
            "totalViolations": -1,
            "deploymentAvailable": 1,
        }))
        .expect("item must decode");
        assert_eq!(item.label, "");
        assert!(item.annotations().is_empty());
        assert_eq!(item.total_violations, None);
        assert_eq!(item.deployment_available, None);

        for (count, expected) in [
            (serde_json::json!(12), Some(12)),
            (serde_json::json!(" 7 "), Some(7)),
            (serde_json::json!(1.5), None),
            (serde_json::json!("-3"), None),
            (serde_json::json!({ "n": 1 }), None),
            (serde_json::json!(null), None),
        ] {
            let item: DiscoveredPolicyItem =
                serde_json::from_value(serde_json::json!({ "totalViolations": count.clone() }))
                    .expect("item must decode");
            assert_eq!(item.total_violations, expected, "{count}");
        }
    }

    #[test]
    fn group_version_omits_core_group() {
        assert_eq!(group_version("", "v1"), "v1");
        assert_eq!(group_version("kyverno.io", "v1"), "kyverno.io/v1");
    }
}
