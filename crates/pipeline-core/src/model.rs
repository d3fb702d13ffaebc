//! Core data model: Job, HintResult, sub-jobs, and the ResultMessage wire
//! type that flows over the results queue.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Opaque job (and sub-job) identifier. Wraps a ULID string rather than the
/// `Ulid` type itself so it serializes as a plain JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        JobId(Ulid::new().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

/// Terminal/transitional status of a durable Job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Started,
    Finished,
    Error,
}

/// Status of a single named hint within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintStatus {
    Pending,
    Pass,
    Warning,
    Error,
    Off,
}

/// Severity carried by an individual engine message, when the engine
/// supplies one. Two values only: a message is either a warning-level or
/// error-level finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintSeverity {
    Warning,
    Error,
}

impl HintSeverity {
    fn rank(self) -> u8 {
        match self {
            HintSeverity::Warning => 1,
            HintSeverity::Error => 2,
        }
    }
}

impl PartialOrd for HintSeverity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HintSeverity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Source location of a single hint message, as reported by the engine.
/// Fields are all optional: the engine is a black box and does not
/// guarantee any of them are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u64>,
}

/// A single message attached to a hint result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintMessage {
    pub hint_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<HintSeverity>,
}

impl HintMessage {
    /// The synthetic message substituted for a hint whose own `messages`
    /// array alone exceeds the bus's max message size.
    pub fn too_many_errors(hint_id: &str) -> Self {
        HintMessage {
            hint_id: hint_id.to_string(),
            message:
                "This hint has too many errors, please use webhint locally for more details"
                    .to_string(),
            location: None,
            severity: None,
        }
    }
}

/// Per-hint outcome, uniquely identified by `name` within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintResult {
    pub name: String,
    pub status: HintStatus,
    pub messages: Vec<HintMessage>,
}

impl HintResult {
    pub fn pending(name: impl Into<String>) -> Self {
        HintResult {
            name: name.into(),
            status: HintStatus::Pending,
            messages: Vec::new(),
        }
    }
}

/// A single entry of a configuration bundle: either a bare severity
/// (`"off"`, `"warning"`, `"error"`) or a tuple of severity plus
/// hint-specific options, e.g. `["off", {}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HintConfigEntry {
    Severity(String),
    SeverityWithOptions(String, serde_json::Value),
}

impl HintConfigEntry {
    pub fn severity_str(&self) -> &str {
        match self {
            HintConfigEntry::Severity(s) => s,
            HintConfigEntry::SeverityWithOptions(s, _) => s,
        }
    }

    pub fn is_off(&self) -> bool {
        self.severity_str() == "off"
    }

    /// The severity this entry would impose on a bucket of engine messages
    /// that carry no per-message severity of their own.
    pub fn default_severity(&self) -> Option<HintSeverity> {
        match self.severity_str() {
            "error" => Some(HintSeverity::Error),
            "warning" => Some(HintSeverity::Warning),
            _ => None,
        }
    }
}

/// One configuration bundle: a map from hint name to its configured
/// severity/options. `BTreeMap` keeps iteration order deterministic, which
/// matters for partitioning tests that assert a specific grouping.
pub type ConfigBundle = BTreeMap<String, HintConfigEntry>;

/// `{part, totalParts}` describing where a sub-job sits within its parent
/// job's configuration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInfo {
    pub part: u32,
    pub total_parts: u32,
}

/// `{message, stack?}` payload carried by error terminals and the deadline
/// diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorPayload {
    pub fn message(message: impl Into<String>) -> Self {
        ErrorPayload {
            message: message.into(),
            stack: None,
        }
    }

    pub const TIMEOUT_MESSAGE: &'static str = "TIMEOUT";

    pub fn timeout() -> Self {
        Self::message(Self::TIMEOUT_MESSAGE)
    }
}

/// A single-configuration-bundle slice of a parent Job; the unit of work on
/// the jobs queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubJob {
    pub id: JobId,
    pub url: String,
    pub part_info: PartInfo,
    pub config: ConfigBundle,
    pub hints: Vec<HintResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_run_time: Option<u64>,
}

/// The durable record a parent Job is persisted as. Mutated only by the
/// Sync Service, always under the per-job lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub status: JobStatus,
    pub hints: Vec<HintResult>,
    pub config: Vec<ConfigBundle>,
    pub queued: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,
    pub max_run_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
}

impl Job {
    /// Creates a new Job in `pending` status, with one HintResult per
    /// distinct hint name named across `config`'s bundles.
    pub fn new_pending(url: impl Into<String>, config: Vec<ConfigBundle>, max_run_time: u64) -> Self {
        let mut names: Vec<String> = Vec::new();
        for bundle in &config {
            for name in bundle.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        Job {
            id: JobId::new(),
            url: url.into(),
            status: JobStatus::Pending,
            hints: names.into_iter().map(HintResult::pending).collect(),
            config,
            queued: crate::time::now_rfc3339(),
            started: None,
            finished: None,
            max_run_time,
            error: None,
            engine_version: None,
        }
    }

    pub fn all_hints_non_pending(&self) -> bool {
        self.hints.iter().all(|h| h.status != HintStatus::Pending)
    }
}

/// Fields common to all three `ResultMessage` variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultCommon {
    pub id: JobId,
    pub part_info: PartInfo,
    pub hints: Vec<HintResult>,
}

/// The sub-job's hints populated, tagged with the outcome the worker
/// observed. Emitted onto the results queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResultMessage {
    Started {
        #[serde(flatten)]
        common: ResultCommon,
        started: String,
        #[serde(skip_serializing_if = "Option::is_none", rename = "engineVersion")]
        engine_version: Option<String>,
    },
    Finished {
        #[serde(flatten)]
        common: ResultCommon,
        finished: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorPayload>,
    },
    #[serde(rename = "error")]
    Errored {
        #[serde(flatten)]
        common: ResultCommon,
        finished: String,
        error: ErrorPayload,
    },
}

impl ResultMessage {
    pub fn id(&self) -> &JobId {
        &self.common().id
    }

    pub fn part_info(&self) -> PartInfo {
        self.common().part_info
    }

    pub fn hints(&self) -> &[HintResult] {
        &self.common().hints
    }

    pub fn common(&self) -> &ResultCommon {
        match self {
            ResultMessage::Started { common, .. }
            | ResultMessage::Finished { common, .. }
            | ResultMessage::Errored { common, .. } => common,
        }
    }

    pub fn common_mut(&mut self) -> &mut ResultCommon {
        match self {
            ResultMessage::Started { common, .. }
            | ResultMessage::Finished { common, .. }
            | ResultMessage::Errored { common, .. } => common,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResultMessage::Started { .. })
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            ResultMessage::Started { .. } => "started",
            ResultMessage::Finished { .. } => "finished",
            ResultMessage::Errored { .. } => "error",
        }
    }
}

/// One item of the `messages` array the Scan Runner reports on `ok: true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMessage {
    pub hint_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<HintSeverity>,
}

/// The Scan Runner's IPC response: one message, exactly once, per child.
/// The wire shape keys off a boolean `ok` field rather than a string tag,
/// so dispatch is done by hand against a raw struct instead of serde's
/// internally-tagged derive (which only matches string tags).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineResponse {
    Ok { messages: Vec<EngineMessage> },
    Err { error: ErrorPayload },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEngineResponse {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<EngineMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorPayload>,
}

impl Serialize for EngineResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let raw = match self {
            EngineResponse::Ok { messages } => RawEngineResponse {
                ok: true,
                messages: Some(messages.clone()),
                error: None,
            },
            EngineResponse::Err { error } => RawEngineResponse {
                ok: false,
                messages: None,
                error: Some(error.clone()),
            },
        };
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EngineResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawEngineResponse::deserialize(deserializer)?;
        if raw.ok {
            Ok(EngineResponse::Ok {
                messages: raw.messages.unwrap_or_default(),
            })
        } else {
            Ok(EngineResponse::Err {
                error: raw.error.unwrap_or_else(|| {
                    ErrorPayload::message("engine reported failure without an error payload")
                }),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errored_variant_serializes_status_as_error() {
        let msg = ResultMessage::Errored {
            common: ResultCommon {
                id: JobId::from("01ARZ3NDEKTSV4RRFFQ69G5FAV"),
                part_info: PartInfo {
                    part: 1,
                    total_parts: 1,
                },
                hints: Vec::new(),
            },
            finished: "2024-01-01T00:00:00Z".to_string(),
            error: ErrorPayload::message("boom"),
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(msg.status_str(), "error");
    }
}
