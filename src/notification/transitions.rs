//! Provider status transitions that notify the provider.

use crate::events::{RecordKind, RecordSnapshot};

use super::composer::{compose, NotificationFields};
use super::{Notification, NotificationKind};

/// Notification text for entering one provider state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransitionRule {
    pub state: &'static str,
    pub title: &'static str,
    pub body: &'static str,
    /// Record field that replaces `body` when present
    pub body_override: Option<&'static str>,
}

/// Recognized provider states. Read-only, shared by every invocation.
pub static TRANSITION_RULES: &[StateTransitionRule] = &[
    StateTransitionRule {
        state: "approved",
        title: "Account Approved!",
        body: "Your job provider account has been approved. You can now select a subscription plan.",
        body_override: None,
    },
    StateTransitionRule {
        state: "rejected",
        title: "Account Not Approved",
        body: "Your job provider application was not approved. Please contact support for more information.",
        body_override: Some("rejectionReason"),
    },
    StateTransitionRule {
        state: "active",
        title: "Account Activated",
        body: "Your account is now active. You can start posting jobs!",
        body_override: None,
    },
    StateTransitionRule {
        state: "suspended",
        title: "Account Suspended",
        body: "Your account has been suspended. Please contact support.",
        body_override: None,
    },
];

/// Rule for entering `state`, if it is recognized
pub fn rule_for(state: &str) -> Option<&'static StateTransitionRule> {
    TRANSITION_RULES.iter().find(|rule| rule.state == state)
}

/// Map a state change to a status notification.
///
/// Returns `None` when nothing changed, the record kind has no
/// transitions, or the new state is not recognized. `context` is the
/// after-snapshot, read for body overrides.
pub fn map_transition(
    record_kind: RecordKind,
    old_state: Option<&str>,
    new_state: Option<&str>,
    context: &RecordSnapshot,
) -> Option<Notification> {
    if record_kind != RecordKind::Users || old_state == new_state {
        return None;
    }
    let rule = rule_for(new_state?)?;

    let body = rule
        .body_override
        .and_then(|field| context.str_field(field))
        .unwrap_or(rule.body);

    let fields = NotificationFields::from([
        ("title".to_string(), rule.title.to_string()),
        ("body".to_string(), body.to_string()),
        ("newStatus".to_string(), rule.state.to_string()),
    ]);

    Some(compose(NotificationKind::StatusUpdate, &fields))
}
