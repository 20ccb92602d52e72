//! Conference bridge policy
//!
//! Computes the conference name for a call and the join flags for each leg.
//! The per-leg asymmetry is the correctness core of the bridging protocol:
//! the customer leg waits on hold and tears the bridge down when it leaves,
//! the agent leg starts the bridge and may leave without ending the call.

use serde::{Deserialize, Serialize};

/// Which leg of a bridged call is joining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegRole {
    /// The customer side; held until an agent joins
    Customer,
    /// The accepting agent side; starts the bridge
    Agent,
}

/// Join flags for one leg entering a conference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConferenceJoin {
    /// Start the bridge when this leg enters
    pub start_on_enter: bool,
    /// End the bridge for everyone when this leg exits
    pub end_on_exit: bool,
}

/// Two-party bridges only
pub const MAX_PARTICIPANTS: u32 = 2;

/// Join policy for a leg role.
///
/// Customer: does not start the bridge (hears hold audio until the agent
/// arrives) and ends it on exit. Agent: starts the bridge and may drop
/// without ending a call the customer still occupies.
pub fn join_policy(role: LegRole) -> ConferenceJoin {
    match role {
        LegRole::Customer => ConferenceJoin {
            start_on_enter: false,
            end_on_exit: true,
        },
        LegRole::Agent => ConferenceJoin {
            start_on_enter: true,
            end_on_exit: false,
        },
    }
}

/// Derive the conference name for a call.
///
/// Keyed by the customer-facing number plus a call-id suffix so that two
/// concurrent calls to the same number never share a bridge.
pub fn conference_name(customer_number: &str, call_id: &str) -> String {
    let digits: String = customer_number.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = if digits.is_empty() { "unknown" } else { &digits };

    let suffix: String = call_id
        .chars()
        .rev()
        .take(8)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    format!("conf_{}_{}", digits, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_join_policy() {
        let join = join_policy(LegRole::Customer);
        assert!(!join.start_on_enter);
        assert!(join.end_on_exit);
    }

    #[test]
    fn test_agent_join_policy() {
        let join = join_policy(LegRole::Agent);
        assert!(join.start_on_enter);
        assert!(!join.end_on_exit);
    }

    #[test]
    fn test_conference_name_derivation() {
        let name = conference_name("+15550001", "CA1234567890abcdef");
        assert_eq!(name, "conf_15550001_90abcdef");
    }

    #[test]
    fn test_conference_name_deterministic() {
        assert_eq!(
            conference_name("+15550001", "CAfeed01"),
            conference_name("+15550001", "CAfeed01"),
        );
    }

    #[test]
    fn test_concurrent_calls_to_same_number_get_distinct_bridges() {
        let a = conference_name("+15550001", "CAaaaa0001");
        let b = conference_name("+15550001", "CAbbbb0002");
        assert_ne!(a, b);
    }

    #[test]
    fn test_conference_name_without_digits() {
        let name = conference_name("client:anonymous", "CAfeed01");
        assert!(name.starts_with("conf_unknown_"));
    }

    #[test]
    fn test_short_call_id_suffix() {
        assert_eq!(conference_name("+1555", "CA1"), "conf_1555_CA1");
    }
}
