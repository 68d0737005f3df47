use regex::Regex;
use std::sync::LazyLock;

use crate::extractor::Pair;

pub const ASSIGNED_TO: &str = "assigned_to";
pub const ASSIGNED_BY: &str = "assigned_by";
pub const REQUESTED_BY: &str = "requested_by";
pub const ASSIGNEE_NAME: &str = "assignee_name";
pub const ASSIGNER_NAME: &str = "assigner_name";
pub const REQUESTOR_NAME: &str = "requestor_name";

const EMAIL_PLACEHOLDER: &str = "<email>";

// anchored at the start only
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

/// Key-text phrases that identify a name role, checked in order.
const NAME_ROLES: &[(&str, &str)] = &[
    ("assignee name", ASSIGNEE_NAME),
    ("assigner name", ASSIGNER_NAME),
    ("requestor name", REQUESTOR_NAME),
];

/// Which email roles have already been handed out. Each role goes to the
/// first email that qualifies for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleSlots {
    pub assigned_to: bool,
    pub assigned_by: bool,
    pub requested_by: bool,
}

/// Role phrases found in the lowercased query.
#[derive(Debug, Clone, Copy)]
struct QueryRoles {
    assigned_to: bool,
    assigned_by: bool,
    requester: bool,
}

impl QueryRoles {
    fn from_query(query_lower: &str) -> Self {
        Self {
            assigned_to: query_lower.contains("assigned to"),
            assigned_by: query_lower.contains("assigned by"),
            requester: query_lower.contains("requester"),
        }
    }
}

impl RoleSlots {
    /// Claim the next free email role allowed by the query phrases.
    fn claim(self, roles: QueryRoles) -> (Self, Option<&'static str>) {
        if roles.assigned_to && !self.assigned_to {
            (Self { assigned_to: true, ..self }, Some(ASSIGNED_TO))
        } else if roles.assigned_by && !self.assigned_by {
            (Self { assigned_by: true, ..self }, Some(ASSIGNED_BY))
        } else if roles.requester && !self.requested_by {
            (Self { requested_by: true, ..self }, Some(REQUESTED_BY))
        } else {
            (self, None)
        }
    }
}

pub fn is_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

fn name_role(key: &str) -> Option<&'static str> {
    let key_lower = key.to_lowercase();
    NAME_ROLES
        .iter()
        .find(|(phrase, _)| key_lower.contains(*phrase))
        .map(|(_, role)| *role)
}

/// Relabel pairs into roles, then drop placeholder requester/assigner
/// emails. `query_lower` is the lowercased, typo-corrected query.
pub fn disambiguate(pairs: Vec<Pair>, query_lower: &str) -> Vec<Pair> {
    let roles = QueryRoles::from_query(query_lower);

    let (_, relabelled) = pairs.into_iter().fold(
        (RoleSlots::default(), Vec::new()),
        |(slots, mut out), pair| {
            let (slots, role) = if is_email(&pair.value) {
                slots.claim(roles)
            } else {
                (slots, name_role(&pair.key))
            };
            out.push(match role {
                Some(role) => Pair::new(role, pair.value),
                None => pair,
            });
            (slots, out)
        },
    );

    relabelled
        .into_iter()
        .filter(|p| {
            let placeholder_role = p.key == REQUESTED_BY || p.key == ASSIGNED_BY;
            !(placeholder_role && (p.value.is_empty() || p.value == EMAIL_PLACEHOLDER))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(pairs: &[Pair]) -> Vec<&str> {
        pairs.iter().map(|p| p.key.as_str()).collect()
    }

    #[test]
    fn test_email_detection_is_prefix_anchored() {
        assert!(is_email("bob@x.com"));
        assert!(is_email("sanketh_consultant@jukshio.com and more"));
        assert!(!is_email("mail: bob@x.com"));
        assert!(!is_email("<email>"));
    }

    #[test]
    fn test_emails_follow_role_precedence() {
        let query = "create task assigned to bob@x.com, assigned by amy@x.com, requester joe@x.com";
        let pairs = vec![
            Pair::new("query_intent", "create task"),
            Pair::new("assignee", "bob@x.com"),
            Pair::new("assigner", "amy@x.com"),
            Pair::new("requester_email", "joe@x.com"),
        ];

        let out = disambiguate(pairs, query);
        assert_eq!(
            keys(&out),
            vec!["query_intent", ASSIGNED_TO, ASSIGNED_BY, REQUESTED_BY]
        );
    }

    #[test]
    fn test_each_role_is_assigned_at_most_once() {
        let query = "assigned to bob@x.com and amy@x.com";
        let pairs = vec![
            Pair::new("a", "bob@x.com"),
            Pair::new("b", "amy@x.com"),
            Pair::new("c", "joe@x.com"),
        ];

        let out = disambiguate(pairs, query);
        assert_eq!(keys(&out), vec![ASSIGNED_TO, "b", "c"]);
    }

    #[test]
    fn test_emails_without_role_phrases_pass_through() {
        let out = disambiguate(vec![Pair::new("owner", "bob@x.com")], "create a task");
        assert_eq!(out, vec![Pair::new("owner", "bob@x.com")]);
    }

    #[test]
    fn test_name_roles_come_from_key_text() {
        let pairs = vec![
            Pair::new("Assignee Name", "suresh"),
            Pair::new("the assigner name", "sanketh"),
            Pair::new("REQUESTOR NAME", "priya"),
            Pair::new("assignee_name", "kept"),
        ];

        let out = disambiguate(pairs, "");
        assert_eq!(
            keys(&out),
            vec![ASSIGNEE_NAME, ASSIGNER_NAME, REQUESTOR_NAME, "assignee_name"]
        );
    }

    #[test]
    fn test_placeholder_emails_are_dropped() {
        let pairs = vec![
            Pair::new(REQUESTED_BY, "<email>"),
            Pair::new(ASSIGNED_BY, "<email>"),
            Pair::new(ASSIGNED_TO, "<email>"),
            Pair::new("title", "<email>"),
        ];

        let out = disambiguate(pairs, "");
        assert_eq!(keys(&out), vec![ASSIGNED_TO, "title"]);
    }
}
