//! A small built-in engine driven by a fixed set of rules keyed by hint
//! name. Stands in for the real scan engine so the workspace can run
//! end-to-end; production deployments swap this for whatever engine the
//! operator actually runs.

use pipeline_core::{EngineMessage, ErrorPayload, Location};

use crate::engine::ScanEngine;

type Rule = fn(url: &str) -> Vec<EngineMessage>;

fn rule_https_only(url: &str) -> Vec<EngineMessage> {
    if url.starts_with("https://") {
        Vec::new()
    } else {
        vec![EngineMessage {
            hint_id: "https-only".to_string(),
            message: format!("{url} is not served over https"),
            location: None,
            severity: None,
        }]
    }
}

fn rule_no_trailing_slash(url: &str) -> Vec<EngineMessage> {
    if url.ends_with('/') && url.matches('/').count() > 2 {
        vec![EngineMessage {
            hint_id: "no-trailing-slash".to_string(),
            message: "URL path ends with a redundant trailing slash".to_string(),
            location: Some(Location { line: None, column: None }),
            severity: None,
        }]
    } else {
        Vec::new()
    }
}

/// Reference `ScanEngine`: evaluates whichever of its built-in rules match
/// the sub-job's declared hint names and reports any findings. Hints it
/// does not recognize simply produce no messages (a clean pass).
pub struct RuleEngine {
    rules: Vec<(&'static str, Rule)>,
}

impl RuleEngine {
    pub fn new() -> Self {
        RuleEngine {
            rules: vec![
                ("https-only", rule_https_only as Rule),
                ("no-trailing-slash", rule_no_trailing_slash as Rule),
            ],
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanEngine for RuleEngine {
    fn scan(
        &self,
        url: &str,
        bundle: &pipeline_core::ConfigBundle,
    ) -> Result<Vec<EngineMessage>, ErrorPayload> {
        let mut messages = Vec::new();
        for (hint_name, rule) in &self.rules {
            let Some(entry) = bundle.get(*hint_name) else {
                continue;
            };
            if entry.is_off() {
                continue;
            }
            messages.extend(rule(url));
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::{ConfigBundle, HintConfigEntry};

    #[test]
    fn flags_non_https_url_when_hint_enabled() {
        let mut bundle = ConfigBundle::new();
        bundle.insert("https-only".to_string(), HintConfigEntry::Severity("error".into()));
        let engine = RuleEngine::new();
        let messages = engine.scan("http://example.com", &bundle).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].hint_id, "https-only");
    }

    #[test]
    fn off_hint_produces_no_messages() {
        let mut bundle = ConfigBundle::new();
        bundle.insert(
            "https-only".to_string(),
            HintConfigEntry::Severity("off".into()),
        );
        let engine = RuleEngine::new();
        let messages = engine.scan("http://example.com", &bundle).unwrap();
        assert!(messages.is_empty());
    }

    #[test]
    fn unmentioned_hints_produce_nothing() {
        let bundle = ConfigBundle::new();
        let engine = RuleEngine::new();
        let messages = engine.scan("http://example.com", &bundle).unwrap();
        assert!(messages.is_empty());
    }
}
