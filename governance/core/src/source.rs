use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a discovered policy was deployed from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySource {
    #[serde(rename = "type")]
    pub type_: SourceType,
    pub parent_ns: String,
    pub parent_name: String,
}

/// The kind of deployment provenance.
///
/// Channel types that aren't otherwise known (e.g. `Objectbucket`) are carried verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    /// Replicated from a parent governance `Policy`.
    Policy,
    #[default]
    Local,
    ManagedExternally,
    Git,
    Helm,
    External,
    /// Members of a group disagree.
    Multiple,
    Other(String),
}

// === impl PolicySource ===

impl PolicySource {
    pub fn policy(parent_ns: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self {
            type_: SourceType::Policy,
            parent_ns: parent_ns.into(),
            parent_name: parent_name.into(),
        }
    }

    pub fn multiple() -> Self {
        Self::from(SourceType::Multiple)
    }

    pub fn is_multiple(&self) -> bool {
        self.type_ == SourceType::Multiple
    }
}

impl From<SourceType> for PolicySource {
    fn from(type_: SourceType) -> Self {
        Self {
            type_,
            parent_ns: String::new(),
            parent_name: String::new(),
        }
    }
}

// === impl SourceType ===

impl SourceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Policy => "Policy",
            Self::Local => "Local",
            Self::ManagedExternally => "Managed externally",
            Self::Git => "Git",
            Self::Helm => "Helm",
            Self::External => "External",
            Self::Multiple => "Multiple",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for SourceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Policy" => Self::Policy,
            "Local" => Self::Local,
            "Managed externally" => Self::ManagedExternally,
            "Git" => Self::Git,
            "Helm" => Self::Helm,
            "External" => Self::External,
            "Multiple" => Self::Multiple,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for SourceType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<SourceType> for String {
    fn from(t: SourceType) -> Self {
        match t {
            SourceType::Other(s) => s,
            t => t.as_str().to_string(),
        }
    }
}
