//! Kind templates and `{{placeholder}}` rendering.
//!
//! Every kind has one fixed template. Fields missing from the input are
//! filled from `FALLBACK_LABELS` (or left empty) before rendering, so
//! composing never fails and never leaves a placeholder behind.

use std::collections::BTreeMap;

use super::{Notification, NotificationKind};

/// Event-specific values a template is rendered with
pub type NotificationFields = BTreeMap<String, String>;

/// Labels used when a field is missing or blank
pub const FALLBACK_LABELS: &[(&str, &str)] = &[
    ("providerName", "Unknown Provider"),
    ("companyName", "Unknown Company"),
    ("applicantName", "Unknown Applicant"),
    ("jobTitle", "Untitled Job"),
];

struct KindTemplate {
    kind: NotificationKind,
    title: &'static str,
    body: &'static str,
    action: Option<&'static str>,
    /// Fields copied into the notification data map
    data_keys: &'static [&'static str],
}

static TEMPLATES: &[KindTemplate] = &[
    KindTemplate {
        kind: NotificationKind::NewProvider,
        title: "New Job Provider Registration",
        body: "{{providerName}} has registered as a job provider and is pending approval.",
        action: Some("/admin/users/{{providerId}}"),
        data_keys: &["providerId", "providerName", "email", "companyName"],
    },
    KindTemplate {
        kind: NotificationKind::StatusUpdate,
        title: "{{title}}",
        body: "{{body}}",
        action: None,
        data_keys: &["newStatus"],
    },
    KindTemplate {
        kind: NotificationKind::NewApplication,
        title: "New Application Received",
        body: "{{applicantName}} applied for {{jobTitle}}",
        action: Some("/applications/{{applicationId}}"),
        data_keys: &["applicationId", "jobId", "applicantId"],
    },
];

fn template_for(kind: NotificationKind) -> &'static KindTemplate {
    TEMPLATES
        .iter()
        .find(|t| t.kind == kind)
        .unwrap_or(&TEMPLATES[0])
}

fn fallback_for(key: &str) -> &'static str {
    FALLBACK_LABELS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, label)| *label)
        .unwrap_or("")
}

/// Replace every `{{name}}` in `template`. Unknown names render empty.
fn render(template: &str, fields: &NotificationFields) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        result.push_str(&rest[..start]);
        let key = rest[start + 2..start + 2 + len].trim();
        if let Some(value) = fields.get(key) {
            result.push_str(value);
        }
        rest = &rest[start + 2 + len + 2..];
    }
    result.push_str(rest);

    result
}

/// Compose a notification of `kind` from event fields.
///
/// Pure: the same inputs always give the same notification.
pub fn compose(kind: NotificationKind, fields: &NotificationFields) -> Notification {
    let template = template_for(kind);

    let mut resolved: NotificationFields = fields
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for (key, label) in FALLBACK_LABELS {
        resolved
            .entry((*key).to_string())
            .or_insert_with(|| (*label).to_string());
    }

    let mut builder = Notification::builder(
        kind,
        render(template.title, &resolved),
        render(template.body, &resolved),
    )
    .data_entries(template.data_keys.iter().map(|key| {
        let value = resolved
            .get(*key)
            .cloned()
            .unwrap_or_else(|| fallback_for(key).to_string());
        (*key, value)
    }));

    if let Some(action) = template.action {
        builder = builder.action_reference(render(action, &resolved));
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> NotificationFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render() {
        let f = fields(&[("name", "Ada"), ("job", "Welder")]);
        assert_eq!(render("{{name}} applied for {{ job }}", &f), "Ada applied for Welder");
        assert_eq!(render("{{missing}}!", &f), "!");
        assert_eq!(render("open {{name", &f), "open {{name");
    }

    #[test]
    fn test_compose_new_provider() {
        let n = compose(
            NotificationKind::NewProvider,
            &fields(&[
                ("providerId", "p-1"),
                ("providerName", "Ada Lovelace"),
                ("email", "ada@example.com"),
            ]),
        );

        assert_eq!(n.title(), "New Job Provider Registration");
        assert_eq!(
            n.body(),
            "Ada Lovelace has registered as a job provider and is pending approval."
        );
        assert_eq!(n.action_reference(), Some("/admin/users/p-1"));
        assert_eq!(n.data()["type"], "new_provider");
        assert_eq!(n.data()["companyName"], "Unknown Company");
        assert_eq!(n.data()["email"], "ada@example.com");
    }

    #[test]
    fn test_compose_missing_fields_use_fallbacks() {
        let n = compose(NotificationKind::NewApplication, &fields(&[("applicantName", "  ")]));

        assert_eq!(n.body(), "Unknown Applicant applied for Untitled Job");
        assert_eq!(n.action_reference(), Some("/applications/"));
        assert_eq!(n.data()["applicantId"], "");
        assert!(!n.data().contains_key("jobTitle"));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let input = fields(&[
            ("applicationId", "a-1"),
            ("jobId", "j-1"),
            ("applicantId", "s-1"),
            ("applicantName", "Grace"),
            ("jobTitle", "Pipefitter"),
        ]);

        let first = compose(NotificationKind::NewApplication, &input);
        let second = compose(NotificationKind::NewApplication, &input);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
