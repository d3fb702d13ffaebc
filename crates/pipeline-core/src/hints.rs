//! Hint status resolution: turning a Scan Runner response into the
//! `HintResult` list for a sub-job's terminal ResultMessage.

use crate::model::{ConfigBundle, EngineMessage, ErrorPayload, HintResult, HintSeverity, HintStatus};

/// Resolves hint statuses for a successful engine response (`ok: true`).
///
/// For each hint declared on the sub-job:
/// - if the bundle sets it `off`, it becomes `off`;
/// - else if any engine messages name it, its status is the worst severity
///   among those messages (falling back to the bundle's configured severity
///   for messages that don't carry one of their own);
/// - else if the bundle mentions it at all, it becomes `pass`;
/// - else it is left untouched (still `pending`).
pub fn resolve_ok(
    declared: &[HintResult],
    bundle: &ConfigBundle,
    messages: &[EngineMessage],
) -> Vec<HintResult> {
    declared
        .iter()
        .map(|h| {
            let Some(entry) = bundle.get(&h.name) else {
                return h.clone();
            };
            if entry.is_off() {
                return HintResult {
                    name: h.name.clone(),
                    status: HintStatus::Off,
                    messages: Vec::new(),
                };
            }

            let bucket: Vec<&EngineMessage> =
                messages.iter().filter(|m| m.hint_id == h.name).collect();
            if bucket.is_empty() {
                return HintResult {
                    name: h.name.clone(),
                    status: HintStatus::Pass,
                    messages: Vec::new(),
                };
            }

            let default_severity = entry.default_severity().unwrap_or(HintSeverity::Warning);
            let worst = bucket
                .iter()
                .map(|m| m.severity.unwrap_or(default_severity))
                .max()
                .unwrap_or(default_severity);

            HintResult {
                name: h.name.clone(),
                status: match worst {
                    HintSeverity::Error => HintStatus::Error,
                    HintSeverity::Warning => HintStatus::Warning,
                },
                messages: bucket
                    .into_iter()
                    .map(|m| crate::model::HintMessage {
                        hint_id: m.hint_id.clone(),
                        message: m.message.clone(),
                        location: m.location.clone(),
                        severity: m.severity,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Resolves hint statuses for a failed engine response (`ok: false`, spec
/// §4.1.2). Every hint the bundle mentions and does not set `off` becomes
/// `error` with one synthetic message; `off` hints stay `off`; hints not
/// mentioned are left untouched.
pub fn resolve_err(declared: &[HintResult], bundle: &ConfigBundle, error: &ErrorPayload) -> Vec<HintResult> {
    declared
        .iter()
        .map(|h| {
            let Some(entry) = bundle.get(&h.name) else {
                return h.clone();
            };
            if entry.is_off() {
                return HintResult {
                    name: h.name.clone(),
                    status: HintStatus::Off,
                    messages: Vec::new(),
                };
            }
            HintResult {
                name: h.name.clone(),
                status: HintStatus::Error,
                messages: vec![crate::model::HintMessage {
                    hint_id: h.name.clone(),
                    message: error.message.clone(),
                    location: None,
                    severity: Some(HintSeverity::Error),
                }],
            }
        })
        .collect()
}

/// The timeout path: every still-pending hint is marked
/// `pass` (no findings observed within the deadline). Hints already decided
/// (e.g. by a prior partial observation) are left as-is — in practice a
/// sub-job reaches this path with all of its hints still pending, since
/// there is exactly one engine invocation per sub-job.
pub fn resolve_timeout(declared: &[HintResult]) -> Vec<HintResult> {
    declared
        .iter()
        .map(|h| {
            if h.status == HintStatus::Pending {
                HintResult {
                    name: h.name.clone(),
                    status: HintStatus::Pass,
                    messages: Vec::new(),
                }
            } else {
                h.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HintConfigEntry;
    use std::collections::BTreeMap;

    fn bundle(entries: &[(&str, &str)]) -> ConfigBundle {
        let mut b = BTreeMap::new();
        for (name, sev) in entries {
            b.insert(name.to_string(), HintConfigEntry::Severity(sev.to_string()));
        }
        b
    }

    #[test]
    fn off_hint_has_no_messages() {
        let declared = vec![HintResult::pending("axe")];
        let bundle = bundle(&[("axe", "off")]);
        let resolved = resolve_ok(&declared, &bundle, &[]);
        assert_eq!(resolved[0].status, HintStatus::Off);
        assert!(resolved[0].messages.is_empty());
    }

    #[test]
    fn mentioned_hint_with_no_messages_passes() {
        let declared = vec![HintResult::pending("content-type")];
        let bundle = bundle(&[("content-type", "error")]);
        let resolved = resolve_ok(&declared, &bundle, &[]);
        assert_eq!(resolved[0].status, HintStatus::Pass);
    }

    #[test]
    fn unmentioned_hint_stays_pending() {
        let declared = vec![HintResult::pending("manifest-exists")];
        let bundle = bundle(&[("axe", "warning")]);
        let resolved = resolve_ok(&declared, &bundle, &[]);
        assert_eq!(resolved[0].status, HintStatus::Pending);
    }

    #[test]
    fn worst_severity_wins() {
        let declared = vec![HintResult::pending("axe")];
        let bundle = bundle(&[("axe", "warning")]);
        let messages = vec![
            EngineMessage {
                hint_id: "axe".into(),
                message: "a".into(),
                location: None,
                severity: Some(HintSeverity::Warning),
            },
            EngineMessage {
                hint_id: "axe".into(),
                message: "b".into(),
                location: None,
                severity: Some(HintSeverity::Error),
            },
        ];
        let resolved = resolve_ok(&declared, &bundle, &messages);
        assert_eq!(resolved[0].status, HintStatus::Error);
        assert_eq!(resolved[0].messages.len(), 2);
    }

    #[test]
    fn err_case_marks_configured_non_off_hints() {
        let declared = vec![
            HintResult::pending("axe"),
            HintResult::pending("content-type"),
            HintResult::pending("disown-opener"),
            HintResult::pending("manifest-exists"),
        ];
        let mut bundle = BTreeMap::new();
        bundle.insert("axe".to_string(), HintConfigEntry::Severity("warning".into()));
        bundle.insert(
            "content-type".to_string(),
            HintConfigEntry::Severity("error".into()),
        );
        bundle.insert(
            "disown-opener".to_string(),
            HintConfigEntry::SeverityWithOptions("off".into(), serde_json::json!({})),
        );
        let error = ErrorPayload::message("Error running webhint");
        let resolved = resolve_err(&declared, &bundle, &error);

        assert_eq!(resolved[0].status, HintStatus::Error);
        assert_eq!(resolved[1].status, HintStatus::Error);
        assert_eq!(resolved[2].status, HintStatus::Off);
        assert_eq!(resolved[3].status, HintStatus::Pending);
    }

    #[test]
    fn timeout_marks_pending_as_pass() {
        let declared = vec![HintResult::pending("axe")];
        let resolved = resolve_timeout(&declared);
        assert_eq!(resolved[0].status, HintStatus::Pass);
    }
}
