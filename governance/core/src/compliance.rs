use crate::DiscoveredPolicyItem;
use serde::{Deserialize, Serialize};

/// A per-cluster evaluation result.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Compliance {
    Compliant,
    NonCompliant,
    Pending,
    Unknown,
}

/// Tallies of evaluation results across clusters.
///
/// `Pending` is kept apart from both compliant and noncompliant results.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViolationSummary {
    pub compliant: usize,
    pub noncompliant: usize,
    pub pending: usize,
    pub unknown: usize,
}

impl Compliance {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "compliant" => Self::Compliant,
            "noncompliant" => Self::NonCompliant,
            "pending" => Self::Pending,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "noncompliant",
            Self::Pending => "pending",
            Self::Unknown => "unknown",
        }
    }
}

impl ViolationSummary {
    pub fn record(&mut self, compliance: Compliance) {
        match compliance {
            Compliance::Compliant => self.compliant += 1,
            Compliance::NonCompliant => self.noncompliant += 1,
            Compliance::Pending => self.pending += 1,
            Compliance::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.compliant + self.noncompliant + self.pending + self.unknown
    }
}

impl std::ops::AddAssign for ViolationSummary {
    fn add_assign(&mut self, other: Self) {
        self.compliant += other.compliant;
        self.noncompliant += other.noncompliant;
        self.pending += other.pending;
        self.unknown += other.unknown;
    }
}

/// Tallies the evaluation results of `items`, skipping disabled items and items that haven't
/// reported a result.
pub fn policy_violation_summary<'a, I>(items: I) -> ViolationSummary
where
    I: IntoIterator<Item = &'a DiscoveredPolicyItem>,
{
    let mut summary = ViolationSummary::default();
    for item in items {
        if item.is_disabled() {
            continue;
        }
        match item.compliant.as_deref() {
            Some(compliant) if !compliant.is_empty() => summary.record(Compliance::parse(compliant)),
            _ => {}
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(compliant: Option<&str>, disabled: Option<bool>) -> DiscoveredPolicyItem {
        DiscoveredPolicyItem {
            compliant: compliant.map(Into::into),
            disabled,
            ..Default::default()
        }
    }

    #[test]
    fn all_compliant() {
        let items = [item(Some("Compliant"), None), item(Some("Compliant"), None)];
        assert_eq!(
            policy_violation_summary(&items),
            ViolationSummary {
                compliant: 2,
                noncompliant: 0,
                pending: 0,
                unknown: 0,
            }
        );
    }

    #[test]
    fn one_of_each() {
        let items = [
            item(Some("Compliant"), None),
            item(Some("NonCompliant"), None),
            item(Some("Pending"), None),
        ];
        assert_eq!(
            policy_violation_summary(&items),
            ViolationSummary {
                compliant: 1,
                noncompliant: 1,
                pending: 1,
                unknown: 0,
            }
        );
    }

    #[test]
    fn skips_disabled_and_unreported() {
        let items = [
            item(Some("NonCompliant"), Some(true)),
            item(None, None),
            item(Some(""), Some(false)),
            item(Some("Terminating"), Some(false)),
            item(Some("noncompliant"), None),
        ];
        let summary = policy_violation_summary(&items);
        assert_eq!(
            summary,
            ViolationSummary {
                compliant: 0,
                noncompliant: 1,
                pending: 0,
                unknown: 1,
            }
        );
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn order_independent() {
        let mut items = vec![
            item(Some("Compliant"), None),
            item(Some("Pending"), None),
            item(Some("NonCompliant"), None),
        ];
        let forward = policy_violation_summary(&items);
        items.reverse();
        assert_eq!(policy_violation_summary(&items), forward);
    }
}
