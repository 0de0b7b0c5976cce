use std::collections::BTreeSet;

pub const INFORM: &str = "inform";
pub const ENFORCE: &str = "enforce";
pub const INFORM_ENFORCE: &str = "inform/enforce";

/// Accumulates the response actions of a group of policies.
///
/// A group whose members all agree reports the shared action. Once members disagree the group
/// stays mixed: `inform` and `enforce` combine to `inform/enforce`, and any other mix is reported
/// as the sorted distinct actions joined by `/`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseActions(BTreeSet<String>);

impl ResponseActions {
    pub fn insert(&mut self, action: impl Into<String>) {
        self.0.insert(action.into());
    }

    /// Adds each `/`-separated part of a compound action, as reported by
    /// `ValidatingAdmissionPolicyBinding`s.
    pub fn insert_all(&mut self, actions: &str) {
        for action in actions.split('/') {
            self.insert(action);
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.0.len() > 1
    }

    pub fn combined(&self) -> String {
        if self.0.len() == 2 && self.0.contains(INFORM) && self.0.contains(ENFORCE) {
            return INFORM_ENFORCE.to_string();
        }
        // BTreeSet iteration is already sorted.
        self.0.iter().map(String::as_str).collect::<Vec<_>>().join("/")
    }
}

impl<S: Into<String>> FromIterator<S> for ResponseActions {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreeing_members_share_action() {
        let actions = ["enforce", "enforce", "enforce"]
            .into_iter()
            .collect::<ResponseActions>();
        assert!(!actions.is_mixed());
        assert_eq!(actions.combined(), "enforce");
    }

    #[test]
    fn inform_and_enforce_mix() {
        let mut actions = ResponseActions::default();
        actions.insert("enforce");
        actions.insert("inform");
        assert_eq!(actions.combined(), INFORM_ENFORCE);
        actions.insert("enforce");
        assert_eq!(actions.combined(), INFORM_ENFORCE, "once mixed stays mixed");
    }

    #[test]
    fn other_actions_are_sorted() {
        let actions = ["dryrun", "deny"].into_iter().collect::<ResponseActions>();
        assert_eq!(actions.combined(), "deny/dryrun");
    }

    #[test]
    fn compound_actions_split() {
        let mut actions = ResponseActions::default();
        actions.insert_all("Audit/Deny");
        actions.insert("Warn");
        assert_eq!(actions.combined(), "Audit/Deny/Warn");
    }

    #[test]
    fn empty_is_empty() {
        assert_eq!(ResponseActions::default().combined(), "");
    }
}
