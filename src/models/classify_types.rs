use serde::{Deserialize, Serialize};

/// One `{label, score}` pair as returned by the classification endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }

    /// First comma-separated segment of the label ("tabby, tabby cat" -> "tabby").
    pub fn display_name(&self) -> &str {
        display_name(&self.label)
    }

    pub fn percent(&self) -> u32 {
        (self.score * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

pub fn display_name(label: &str) -> &str {
    label.split(", ").next().unwrap_or(label)
}

/// Ranked predictions for one image, highest confidence first.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct ClassificationResult(pub Vec<Prediction>);

impl ClassificationResult {
    pub fn top(&self) -> Option<&Prediction> {
        self.0.first()
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Prediction>> for ClassificationResult {
    fn from(predictions: Vec<Prediction>) -> Self {
        Self(predictions)
    }
}

/// Per-file classification slot. `Failed` is terminal for the run that set it
/// and is kept distinct from `Pending` so the chart can tell them apart.
#[derive(Debug, Serialize, Clone, PartialEq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassificationState {
    #[default]
    Pending,
    Classified { predictions: ClassificationResult },
    Failed { reason: String },
}

impl ClassificationState {
    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            ClassificationState::Classified { predictions } => Some(predictions),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ClassificationState::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ClassificationState::Failed { .. })
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct ClassifyReport {
    pub total: usize,
    pub classified: usize,
    pub failed: usize,
    /// Results that came back for files removed while the request was in flight.
    pub dropped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_takes_first_segment() {
        let p = Prediction::new("tabby, tabby cat", 0.914);
        assert_eq!(p.display_name(), "tabby");
        assert_eq!(p.percent(), 91);
        assert_eq!(display_name("dog"), "dog");
    }

    #[test]
    fn result_deserializes_from_endpoint_array() {
        let json = r#"[{"label":"animal","score":0.92},{"label":"plant","score":0.05}]"#;
        let result: ClassificationResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.predictions().len(), 2);
        assert_eq!(result.top().unwrap().label, "animal");
    }

    #[test]
    fn state_serializes_with_status_tag() {
        let state = ClassificationState::Failed {
            reason: "timeout".into(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "timeout");
        assert!(ClassificationState::default().is_pending());
    }
}
