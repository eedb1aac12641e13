//! Allow-list checks for game actions.
//!
//! Join buttons are screened before they reach a collector: buttons that are
//! not rumble buttons pass through untouched, and members who are neither
//! allow-listed by user ID nor by role get an ephemeral rejection.

use std::collections::HashSet;

pub const REJECTION_MESSAGE: &str = "🚫 You are not allowed to join this Rumble Royale match.";

/// Returns true if the actor is allow-listed by ID or holds an allowed role.
pub fn is_allowed(
    actor_id: &str,
    actor_role_ids: &HashSet<String>,
    allowed_user_ids: &HashSet<String>,
    allowed_role_ids: &HashSet<String>,
) -> bool {
    allowed_user_ids.contains(actor_id) || !actor_role_ids.is_disjoint(allowed_role_ids)
}

/// Whether a component custom id belongs to a rumble match.
pub fn is_rumble_button(custom_id: &str) -> bool {
    custom_id.contains("join") || custom_id.contains("rumble")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not a rumble button; leave it alone.
    Ignore,
    /// Tell the actor they may not join.
    Reject(&'static str),
    /// Acknowledge and let the join through.
    Admit,
}

#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    allowed_user_ids: HashSet<String>,
    allowed_role_ids: HashSet<String>,
}

impl AccessGate {
    pub fn new(
        allowed_user_ids: impl IntoIterator<Item = String>,
        allowed_role_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            allowed_user_ids: allowed_user_ids.into_iter().collect(),
            allowed_role_ids: allowed_role_ids.into_iter().collect(),
        }
    }

    pub fn admits(&self, actor_id: &str, actor_role_ids: &HashSet<String>) -> bool {
        is_allowed(
            actor_id,
            actor_role_ids,
            &self.allowed_user_ids,
            &self.allowed_role_ids,
        )
    }

    pub fn screen(
        &self,
        custom_id: Option<&str>,
        actor_id: &str,
        actor_role_ids: &HashSet<String>,
    ) -> Verdict {
        match custom_id {
            Some(id) if is_rumble_button(id) => {}
            _ => return Verdict::Ignore,
        }
        if self.admits(actor_id, actor_role_ids) {
            Verdict::Admit
        } else {
            Verdict::Reject(REJECTION_MESSAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn allowed_by_user_id() {
        assert!(is_allowed("U1", &set(&[]), &set(&["U1"]), &set(&[])));
    }

    #[test]
    fn allowed_by_role() {
        assert!(is_allowed("U2", &set(&["R9"]), &set(&[]), &set(&["R9"])));
    }

    #[test]
    fn denied_without_user_or_role() {
        assert!(!is_allowed("U3", &set(&[]), &set(&[]), &set(&["R9"])));
    }

    #[test]
    fn empty_allow_lists_deny_everyone() {
        assert!(!is_allowed("U1", &set(&["R1"]), &set(&[]), &set(&[])));
    }

    #[test]
    fn screen_ignores_foreign_buttons() {
        let gate = AccessGate::new(vec![], vec![]);
        assert_eq!(gate.screen(Some("poll_vote"), "U1", &set(&[])), Verdict::Ignore);
        assert_eq!(gate.screen(None, "U1", &set(&[])), Verdict::Ignore);
    }

    #[test]
    fn screen_rejects_unlisted_members() {
        let gate = AccessGate::new(vec!["U1".to_string()], vec!["R9".to_string()]);
        assert_eq!(
            gate.screen(Some("rumble_join"), "U3", &set(&["R1"])),
            Verdict::Reject(REJECTION_MESSAGE)
        );
    }

    #[test]
    fn screen_admits_listed_members() {
        let gate = AccessGate::new(vec!["U1".to_string()], vec!["R9".to_string()]);
        assert_eq!(gate.screen(Some("join"), "U1", &set(&[])), Verdict::Admit);
        assert_eq!(gate.screen(Some("rumble"), "U2", &set(&["R9"])), Verdict::Admit);
    }
}
