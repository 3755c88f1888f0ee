use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Paused,
    Completed,
    #[serde(other)]
    Unknown,
}

impl AgentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }
}

/// One entry of a roadmap or scheduled plan. Roadmaps are generated text on
/// the backend, so every field decodes leniently: a malformed field becomes
/// `None` (or an empty topic) instead of failing the whole response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    #[serde(default, deserialize_with = "lenient_text_or_empty")]
    pub topic: String,
    #[serde(
        default,
        deserialize_with = "lenient_hours",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_hours: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub start: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<String>,
}

impl PlanItem {
    fn untitled() -> Self {
        Self {
            topic: String::new(),
            duration_hours: None,
            start: None,
            end: None,
        }
    }

    pub fn new(topic: impl Into<String>, duration_hours: f64) -> Self {
        Self {
            topic: topic.into(),
            duration_hours: Some(duration_hours),
            start: None,
            end: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentRunResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub status: Option<AgentStatus>,
    #[serde(default, deserialize_with = "lenient_plan")]
    pub roadmap: Option<Vec<PlanItem>>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
}

impl AgentRunResponse {
    /// `message` wins unless it is missing or empty, then `response`.
    pub fn content(&self) -> String {
        first_non_empty(self.message.as_deref(), self.response.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentFeedbackResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<AgentStatus>,
    #[serde(default, deserialize_with = "lenient_plan")]
    pub roadmap: Option<Vec<PlanItem>>,
    #[serde(default, deserialize_with = "lenient_plan")]
    pub scheduled_plan: Option<Vec<PlanItem>>,
}

impl AgentFeedbackResponse {
    pub fn content(&self) -> String {
        self.message.clone().unwrap_or_default()
    }

    /// A revised roadmap takes precedence over a scheduled plan.
    pub fn plan(&self) -> Vec<PlanItem> {
        self.roadmap
            .clone()
            .or_else(|| self.scheduled_plan.clone())
            .unwrap_or_default()
    }
}

/// Body returned by `/upload`; the chat client only logs it.
pub type UploadResponse = Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalAction {
    Commit,
    Update { feedback: String },
}

impl ProposalAction {
    /// Builds an `Update` carrying the feedback as typed, or `None` when it is
    /// blank.
    pub fn update(feedback: impl Into<String>) -> Option<Self> {
        let feedback = feedback.into();
        if feedback.trim().is_empty() {
            None
        } else {
            Some(Self::Update { feedback })
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "COMMIT",
            Self::Update { .. } => "UPDATE",
        }
    }

    pub fn feedback(&self) -> Option<&str> {
        match self {
            Self::Commit => None,
            Self::Update { feedback } => Some(feedback.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "application/pdf".to_string(),
            bytes,
        }
    }
}

fn first_non_empty(primary: Option<&str>, fallback: Option<&str>) -> String {
    primary
        .filter(|value| !value.is_empty())
        .or(fallback)
        .unwrap_or_default()
        .to_string()
}

fn lenient_plan<'de, D>(deserializer: D) -> Result<Option<Vec<PlanItem>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };

    Ok(Some(items.into_iter().map(plan_item_from_value).collect()))
}

/// Objects decode field by field; a bare value becomes the topic.
fn plan_item_from_value(value: Value) -> PlanItem {
    match value {
        Value::Object(_) => serde_json::from_value(value).unwrap_or_else(|_| PlanItem::untitled()),
        other => PlanItem {
            topic: value_as_text(other).unwrap_or_default(),
            ..PlanItem::untitled()
        },
    }
}

fn lenient_hours<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('h').trim().parse().ok(),
        _ => None,
    }
    .filter(|hours: &f64| hours.is_finite()))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_as_text(Value::deserialize(deserializer)?))
}

fn lenient_text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn value_as_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
