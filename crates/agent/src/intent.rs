//! Keyword-based intent detection.
//!
//! Scoring combines keyword hits in the current utterance with a weaker,
//! confidence-weighted signal from every prior caller turn. The intent with
//! the strictly highest combined score wins; ties and silence fall back to
//! the lead intent.

use frontdesk_core::domain::intent::{Intent, IntentDecision};
use frontdesk_core::domain::session::{Speaker, TranscriptEntry};

const UTTERANCE_WEIGHT: f32 = 2.0;
const HISTORY_WEIGHT: f32 = 0.5;

const BOOKING_KEYWORDS: [&str; 6] =
    ["reservation", "reserve", "book", "table", "party of", "seating"];

const MENU_KEYWORDS: [&str; 10] = [
    "menu",
    "special",
    "vegan",
    "vegetarian",
    "gluten",
    "dish",
    "dessert",
    "appetizer",
    "wine",
    "do you serve",
];

const LEAD_KEYWORDS: [&str; 10] = [
    "information",
    "info",
    "services",
    "pricing",
    "quote",
    "interested",
    "learn more",
    "catering",
    "call back",
    "inquiry",
];

/// Classification seam: the deterministic keyword scorer can be swapped for a
/// smarter backend without touching the router contract.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, text: &str, history: &[TranscriptEntry]) -> IntentDecision;
}

#[derive(Clone, Debug, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn classify(&self, text: &str, history: &[TranscriptEntry]) -> IntentDecision {
        let mut best: Option<IntentDecision> = None;
        let mut tied = false;

        for intent in Intent::ALL {
            let keywords = keywords_for(intent);
            let utterance_hits = keyword_hits(text, keywords);
            let mut score = utterance_hits as f32 * UTTERANCE_WEIGHT;
            for entry in history.iter().filter(|entry| entry.speaker == Speaker::Caller) {
                let hits = keyword_hits(&entry.text, keywords) as f32;
                score += hits * entry.confidence.unwrap_or(1.0) * HISTORY_WEIGHT;
            }

            match &best {
                Some(current) if score == current.score => tied = true,
                Some(current) if score > current.score => {
                    tied = false;
                    best = Some(IntentDecision { intent, score, utterance_hits });
                }
                Some(_) => {}
                None => best = Some(IntentDecision { intent, score, utterance_hits }),
            }
        }

        match best {
            Some(decision) if decision.score > 0.0 && !tied => decision,
            _ => IntentDecision::fallback(),
        }
    }
}

fn keywords_for(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Booking => &BOOKING_KEYWORDS,
        Intent::Menu => &MENU_KEYWORDS,
        Intent::Lead => &LEAD_KEYWORDS,
    }
}

fn keyword_hits(text: &str, keywords: &[&str]) -> usize {
    let normalized = text.to_ascii_lowercase();
    keywords.iter().filter(|keyword| normalized.contains(*keyword)).count()
}

#[cfg(test)]
mod tests {
    use frontdesk_core::domain::intent::Intent;
    use frontdesk_core::domain::session::TranscriptEntry;

    use super::{IntentClassifier, KeywordIntentClassifier};

    fn classifier() -> KeywordIntentClassifier {
        KeywordIntentClassifier::new()
    }

    #[test]
    fn booking_phrases_route_to_booking() {
        let decision = classifier()
            .classify("I would like to make a reservation for 4 people tonight at 7 PM", &[]);
        assert_eq!(decision.intent, Intent::Booking);
        assert!(decision.utterance_hits >= 1);
    }

    #[test]
    fn menu_phrases_route_to_menu() {
        let decision = classifier().classify("What are tonight's specials on the menu?", &[]);
        assert_eq!(decision.intent, Intent::Menu);
    }

    #[test]
    fn service_inquiries_route_to_lead() {
        let decision = classifier().classify("I'd like information about your services", &[]);
        assert_eq!(decision.intent, Intent::Lead);
    }

    #[test]
    fn no_signal_falls_back_to_lead() {
        let decision = classifier().classify("hello, is anyone there?", &[]);
        assert_eq!(decision.intent, Intent::Lead);
        assert_eq!(decision.score, 0.0);
    }

    #[test]
    fn cross_intent_tie_falls_back_to_lead() {
        // One booking keyword and one menu keyword, no lead signal.
        let decision = classifier().classify("a table near the dessert station", &[]);
        assert_eq!(decision.intent, Intent::Lead);
    }

    #[test]
    fn history_signal_breaks_an_otherwise_silent_utterance() {
        let history = vec![
            TranscriptEntry::caller("do you have vegan dishes on the menu", Some(0.95)),
            TranscriptEntry::agent("We have several."),
        ];
        let decision = classifier().classify("and what about tomorrow?", &history);
        assert_eq!(decision.intent, Intent::Menu);
        assert_eq!(decision.utterance_hits, 0);
        assert!(decision.score > 0.0);
    }
}
