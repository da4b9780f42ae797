//! Slot extraction heuristics.
//!
//! Everything here is deterministic keyword and pattern matching over the raw
//! utterance. Each heuristic either yields a plausible, length/range-bounded
//! value or nothing at all; a miss is silent and never an error.

use frontdesk_core::domain::slots::TimeSlot;

/// Pluggable extraction seam. The default implementation is pure heuristics;
/// a smarter backend can replace it without touching the router or agents.
pub trait SlotExtractor: Send + Sync {
    fn name(&self, text: &str) -> Option<String>;
    fn email(&self, text: &str) -> Option<String>;
    fn phone(&self, text: &str) -> Option<String>;
    fn party_size(&self, text: &str, max: u8) -> Option<u8>;
    fn time_slot(&self, text: &str) -> Option<TimeSlot>;
    fn use_case(&self, text: &str) -> Option<String>;
    fn special_requests(&self, text: &str) -> Option<String>;
    /// True when the utterance explicitly corrects something already given.
    fn is_correction(&self, text: &str) -> bool;
}

#[derive(Clone, Debug, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl SlotExtractor for HeuristicExtractor {
    fn name(&self, text: &str) -> Option<String> {
        extract_name(text)
    }

    fn email(&self, text: &str) -> Option<String> {
        extract_email(text)
    }

    fn phone(&self, text: &str) -> Option<String> {
        extract_phone(text)
    }

    fn party_size(&self, text: &str, max: u8) -> Option<u8> {
        extract_party_size(text, max)
    }

    fn time_slot(&self, text: &str) -> Option<TimeSlot> {
        let date = extract_date(text)?;
        let time = extract_time(text)?;
        Some(TimeSlot { date, time })
    }

    fn use_case(&self, text: &str) -> Option<String> {
        extract_use_case(text)
    }

    fn special_requests(&self, text: &str) -> Option<String> {
        extract_special_requests(text)
    }

    fn is_correction(&self, text: &str) -> bool {
        let normalized = normalize_text(text);
        let trimmed = normalized.trim_start();
        trimmed.starts_with("actually")
            || trimmed.starts_with("no,")
            || trimmed.starts_with("sorry,")
            || normalized.contains("i meant")
            || normalized.contains("change that")
            || normalized.contains("make that")
    }
}

fn normalize_text(text: &str) -> String {
    text.to_ascii_lowercase()
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() || matches!(character, ':' | '@') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_ascii_lowercase()).collect()
}

const NAME_MARKERS: [&str; 6] =
    ["my name is", "the name is", "name is", "this is", "i am", "i'm"];

const NAME_STOP_WORDS: [&str; 12] = [
    "and", "my", "the", "a", "an", "email", "phone", "number", "at", "for", "calling", "with",
];

fn extract_name(text: &str) -> Option<String> {
    let lower = normalize_text(text);
    for marker in NAME_MARKERS {
        let Some(position) = lower.find(marker) else {
            continue;
        };
        // ASCII lowercasing preserves byte offsets, so the index into the
        // lowered text is valid in the original.
        let remainder = &text[position + marker.len()..];
        let words = collect_name_words(remainder);
        if !words.is_empty() {
            return Some(words.join(" "));
        }
    }
    None
}

fn collect_name_words(remainder: &str) -> Vec<String> {
    let mut words = Vec::new();
    for raw_word in remainder.split_whitespace() {
        if words.len() == 3 {
            break;
        }
        let word = raw_word.trim_matches(|c: char| !c.is_alphabetic() && c != '\'');
        if word.is_empty() || NAME_STOP_WORDS.contains(&word.to_ascii_lowercase().as_str()) {
            break;
        }
        let plausible = word.len() >= 2
            && word.len() <= 20
            && word.chars().next().is_some_and(|c| c.is_uppercase())
            && word.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '-');
        if !plausible {
            break;
        }
        words.push(word.to_string());
    }
    words
}

fn extract_email(text: &str) -> Option<String> {
    for raw_token in text.split_whitespace() {
        let token = raw_token.trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';'));
        let Some((local, domain)) = token.split_once('@') else {
            continue;
        };
        let plausible = !local.is_empty()
            && domain.contains('.')
            && !domain.ends_with('.')
            && token.len() <= 64;
        if plausible {
            return Some(token.to_ascii_lowercase());
        }
    }
    None
}

fn extract_phone(text: &str) -> Option<String> {
    let mut digits = String::new();
    let mut in_run = false;
    for character in text.chars() {
        if character.is_ascii_digit() {
            digits.push(character);
            in_run = true;
        } else if in_run && matches!(character, '-' | '.' | ' ' | '(' | ')') {
            // separators inside a number run are fine
        } else {
            if (7..=15).contains(&digits.len()) {
                return Some(digits);
            }
            digits.clear();
            in_run = false;
        }
    }
    (7..=15).contains(&digits.len()).then_some(digits)
}

const PARTY_UNITS: [&str; 6] = ["people", "guests", "persons", "ppl", "adults", "diners"];

fn extract_party_size(text: &str, max: u8) -> Option<u8> {
    let tokens = tokenize(text);
    for (index, token) in tokens.iter().enumerate() {
        let Some(value) = parse_count(token) else {
            continue;
        };
        if value == 0 || value > max {
            continue;
        }
        let followed_by_unit =
            tokens.get(index + 1).is_some_and(|next| PARTY_UNITS.contains(&next.as_str()));
        let after_party_of = index >= 2
            && tokens[index - 2] == "party"
            && tokens[index - 1] == "of";
        let after_table_for = index >= 2
            && tokens[index - 2] == "table"
            && tokens[index - 1] == "for";
        if followed_by_unit || after_party_of || after_table_for {
            return Some(value);
        }
    }
    None
}

fn parse_count(token: &str) -> Option<u8> {
    if let Ok(value) = token.parse::<u8>() {
        return Some(value);
    }
    let words = [
        ("one", 1),
        ("two", 2),
        ("three", 3),
        ("four", 4),
        ("five", 5),
        ("six", 6),
        ("seven", 7),
        ("eight", 8),
        ("nine", 9),
        ("ten", 10),
        ("eleven", 11),
        ("twelve", 12),
    ];
    words.iter().find(|(word, _)| *word == token).map(|(_, value)| *value)
}

const DATE_PHRASES: [&str; 10] = [
    "tomorrow", "tonight", "today", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday",
];

fn extract_date(text: &str) -> Option<String> {
    let normalized = normalize_text(text);
    for phrase in DATE_PHRASES {
        if !contains_word(&normalized, phrase) {
            continue;
        }
        for qualifier in ["next", "this"] {
            let qualified = format!("{qualifier} {phrase}");
            if normalized.contains(&qualified) {
                return Some(qualified);
            }
        }
        return Some(phrase.to_string());
    }
    None
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_ascii_alphanumeric()).any(|token| token == word)
}

fn extract_time(text: &str) -> Option<String> {
    let tokens = tokenize(text);
    for (index, token) in tokens.iter().enumerate() {
        if token == "noon" || token == "midday" {
            return Some("12:00 PM".to_string());
        }
        // "7pm" as a single token
        for suffix in ["pm", "am"] {
            if let Some(prefix) = token.strip_suffix(suffix) {
                if let Some(formatted) = format_clock(prefix, suffix) {
                    return Some(formatted);
                }
            }
        }
        // "7 pm" / "7:30 pm" as two tokens
        let Some(meridiem) = tokens.get(index + 1) else {
            continue;
        };
        if meridiem == "pm" || meridiem == "am" {
            if let Some(formatted) = format_clock(token, meridiem) {
                return Some(formatted);
            }
        }
    }
    None
}

fn format_clock(raw: &str, meridiem: &str) -> Option<String> {
    let (hour_part, minute_part) = match raw.split_once(':') {
        Some((hour, minute)) => (hour, minute),
        None => (raw, "00"),
    };
    let hour: u8 = hour_part.parse().ok()?;
    let minute: u8 = minute_part.parse().ok()?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }
    Some(format!("{hour}:{minute:02} {}", meridiem.to_ascii_uppercase()))
}

const USE_CASE_MARKERS: [&str; 6] = [
    "interested in",
    "looking for",
    "need help with",
    "information about",
    "info about",
    "learn more about",
];

fn extract_use_case(text: &str) -> Option<String> {
    let normalized = normalize_text(text);
    for marker in USE_CASE_MARKERS {
        let Some(position) = normalized.find(marker) else {
            continue;
        };
        let remainder: Vec<&str> = normalized[position + marker.len()..]
            .split_whitespace()
            .take(8)
            .collect();
        let phrase = remainder.join(" ");
        let phrase = phrase.trim_matches(|c: char| !c.is_ascii_alphanumeric());
        if !phrase.is_empty() && phrase.len() <= 60 {
            return Some(phrase.to_string());
        }
    }
    None
}

const SPECIAL_REQUEST_KEYWORDS: [&str; 10] = [
    "window", "booth", "patio", "birthday", "anniversary", "wheelchair", "high chair",
    "highchair", "allergy", "allergies",
];

fn extract_special_requests(text: &str) -> Option<String> {
    let normalized = normalize_text(text);
    let mut found = Vec::new();
    for keyword in SPECIAL_REQUEST_KEYWORDS {
        if normalized.contains(keyword) && !found.contains(&keyword) {
            found.push(keyword);
        }
    }
    // "highchair" and "high chair" describe the same request
    if found.contains(&"high chair") {
        found.retain(|keyword| *keyword != "highchair");
    }
    if found.contains(&"allergy") {
        found.retain(|keyword| *keyword != "allergies");
    }
    if found.is_empty() {
        None
    } else {
        Some(found.join(", "))
    }
}
