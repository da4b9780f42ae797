use serde::{Deserialize, Serialize};

/// The caller's high-level goal for the call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Lead,
    Booking,
    Menu,
}

impl Intent {
    pub const ALL: [Intent; 3] = [Intent::Lead, Intent::Booking, Intent::Menu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Booking => "booking",
            Self::Menu => "menu",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a classification pass over one caller utterance.
#[derive(Clone, Debug, PartialEq)]
pub struct IntentDecision {
    pub intent: Intent,
    /// Combined keyword/confidence score that selected the intent. Zero means
    /// "no signal" and the decision fell back to the default intent.
    pub score: f32,
    /// Keyword hits contributed by the utterance itself, before any
    /// conversation-history weighting.
    pub utterance_hits: usize,
}

impl IntentDecision {
    pub fn fallback() -> Self {
        Self { intent: Intent::Lead, score: 0.0, utterance_hits: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::{Intent, IntentDecision};

    #[test]
    fn fallback_decision_is_lead_with_no_signal() {
        let decision = IntentDecision::fallback();
        assert_eq!(decision.intent, Intent::Lead);
        assert_eq!(decision.utterance_hits, 0);
    }

    #[test]
    fn intent_names_are_stable() {
        assert_eq!(Intent::Booking.to_string(), "booking");
        assert_eq!(Intent::ALL.len(), 3);
    }
}
