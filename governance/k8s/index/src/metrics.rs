use crate::{GroupedPolicies, SharedIndex};
use ocm_governance_core::{policy_violation_summary, Compliance, ViolationSummary};
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeLabelSet, EncodeMetric},
    metrics::{counter::Counter, family::Family, gauge::ConstGauge, gauge::Gauge, MetricType},
    registry::Registry,
};

#[derive(Debug)]
struct Instrumented(SharedIndex);

/// Reports the size of the reference index.
pub fn register(reg: &mut Registry, index: SharedIndex) {
    reg.register_collector(Box::new(Instrumented(index)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let refs = self.0.read().references();

        for (name, help, size) in [
            (
                "channel_index_size",
                "The number of channels in the reference index",
                refs.channels_len(),
            ),
            (
                "subscription_index_size",
                "The number of subscriptions in the reference index",
                refs.subscriptions_len(),
            ),
            (
                "helmrelease_index_size",
                "The number of Helm releases in the reference index",
                refs.helm_releases_len(),
            ),
        ] {
            let gauge_encoder = encoder.encode_descriptor(name, help, None, MetricType::Gauge)?;
            ConstGauge::new(size as i64).encode(gauge_encoder)?;
        }

        Ok(())
    }
}

/// Describes the most recent grouping result.
#[derive(Clone, Debug, Default)]
pub struct GroupingMetrics {
    runs: Counter,
    groups: Gauge,
    related_resources: Gauge,
    violations: Family<ViolationLabels, Gauge>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ViolationLabels {
    kind: String,
    status: String,
}

impl GroupingMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let metrics = Self::default();
        reg.register(
            "grouping_runs",
            "Count of completed groupings of discovered policies",
            metrics.runs.clone(),
        );
        reg.register(
            "discovered_policy_groups",
            "The number of discovered policy groups in the latest result",
            metrics.groups.clone(),
        );
        reg.register(
            "related_resources",
            "The number of resources related to discovered policies in the latest result",
            metrics.related_resources.clone(),
        );
        reg.register(
            "discovered_policy_violations",
            "Per-cluster evaluation results of discovered policies by kind",
            metrics.violations.clone(),
        );
        metrics
    }

    /// Replaces the reported state with `result`.
    pub fn observe(&self, result: &GroupedPolicies) {
        self.runs.inc();
        self.groups.set(result.policy_items.len() as i64);
        self.related_resources
            .set(result.related_resources.len() as i64);

        // Kinds that disappeared from the result must not keep reporting stale tallies.
        self.violations.clear();
        for (kind, summary) in summaries_by_kind(result) {
            for status in [
                Compliance::Compliant,
                Compliance::NonCompliant,
                Compliance::Pending,
                Compliance::Unknown,
            ] {
                let count = match status {
                    Compliance::Compliant => summary.compliant,
                    Compliance::NonCompliant => summary.noncompliant,
                    Compliance::Pending => summary.pending,
                    Compliance::Unknown => summary.unknown,
                };
                self.violations
                    .get_or_create(&ViolationLabels {
                        kind: kind.clone(),
                        status: status.as_str().to_string(),
                    })
                    .set(count as i64);
            }
        }
    }
}

/// Tallies each policy kind's per-cluster results across all of its groups.
pub fn summaries_by_kind(result: &GroupedPolicies) -> Vec<(String, ViolationSummary)> {
    let mut summaries = Vec::<(String, ViolationSummary)>::new();
    for group in &result.policy_items {
        let summary = policy_violation_summary(&group.policies);
        match summaries.iter_mut().find(|(kind, _)| *kind == group.kind) {
            Some((_, total)) => *total += summary,
            None => summaries.push((group.kind.clone(), summary)),
        }
    }
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocm_governance_core::{DiscoveredPolicyGroup, DiscoveredPolicyItem, PolicySource, Severity};

    fn group(kind: &str, results: &[&str]) -> DiscoveredPolicyGroup {
        DiscoveredPolicyGroup {
            id: format!("p{kind}g"),
            apigroup: "g".to_string(),
            name: "p".to_string(),
            kind: kind.to_string(),
            severity: Severity::Unknown,
            response_action: String::new(),
            policies: results
                .iter()
                .map(|c| DiscoveredPolicyItem {
                    compliant: Some(c.to_string()),
                    ..Default::default()
                })
                .collect(),
            source: PolicySource::default(),
        }
    }

    #[test]
    fn summarizes_by_kind() {
        let result = GroupedPolicies {
            policy_items: vec![
                group("ConfigurationPolicy", &["Compliant", "NonCompliant"]),
                group("OperatorPolicy", &["Pending"]),
                group("ConfigurationPolicy", &["NonCompliant"]),
            ],
            ..Default::default()
        };
        let summaries = summaries_by_kind(&result);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].0, "ConfigurationPolicy");
        assert_eq!(summaries[0].1.compliant, 1);
        assert_eq!(summaries[0].1.noncompliant, 2);
        assert_eq!(summaries[1].1.pending, 1);
    }

    #[test]
    fn observe_encodes() {
        let mut reg = Registry::default();
        let metrics = GroupingMetrics::register(&mut reg);
        metrics.observe(&GroupedPolicies {
            policy_items: vec![group("ConfigurationPolicy", &["Compliant"])],
            ..Default::default()
        });

        let mut out = String::new();
        prometheus_client::encoding::text::encode(&mut out, &reg).expect("metrics must encode");
        assert!(out.contains("discovered_policy_groups 1"), "{out}");
        assert!(
            out.contains(
                r#"discovered_policy_violations{kind="ConfigurationPolicy",status="compliant"} 1"#
            ),
            "{out}"
        );
    }
}
