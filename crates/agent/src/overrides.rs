//! Policy override engine.
//!
//! A priority-sorted, immutable rule table evaluated before intent routing.
//! The first matching rule whose handler returns a non-empty response ends
//! the turn; a faulting handler is logged and skipped so a broken rule never
//! breaks the conversation.

use std::sync::Arc;

use tracing::warn;

use frontdesk_core::capabilities::join_spoken;
use frontdesk_core::domain::session::Session;

pub type OverrideHandler =
    Arc<dyn Fn(&Session, &str) -> Result<Option<String>, OverrideFault> + Send + Sync>;

/// A handler fault. Evaluation continues with the next matching rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverrideFault(pub String);

impl std::fmt::Display for OverrideFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "override handler fault: {}", self.0)
    }
}

impl std::error::Error for OverrideFault {}

#[derive(Clone)]
pub struct OverrideRule {
    pub name: &'static str,
    pub priority: i32,
    pub keywords: &'static [&'static str],
    pub handler: OverrideHandler,
}

impl OverrideRule {
    fn matches(&self, normalized_text: &str) -> bool {
        self.keywords.iter().any(|keyword| normalized_text.contains(keyword))
    }
}

/// Immutable after construction; "adding" a rule means building a new engine.
#[derive(Clone)]
pub struct PolicyOverrideEngine {
    rules: Arc<[OverrideRule]>,
}

#[derive(Default)]
pub struct OverrideEngineBuilder {
    rules: Vec<OverrideRule>,
}

impl OverrideEngineBuilder {
    pub fn rule(
        mut self,
        name: &'static str,
        priority: i32,
        keywords: &'static [&'static str],
        handler: OverrideHandler,
    ) -> Self {
        self.rules.push(OverrideRule { name, priority, keywords, handler });
        self
    }

    pub fn build(mut self) -> PolicyOverrideEngine {
        self.rules.sort_by_key(|rule| std::cmp::Reverse(rule.priority));
        PolicyOverrideEngine { rules: self.rules.into() }
    }
}

impl PolicyOverrideEngine {
    pub fn builder() -> OverrideEngineBuilder {
        OverrideEngineBuilder::default()
    }

    /// Evaluates rules highest priority first against the raw caller text.
    /// Returns the first non-empty handler response, or `None` to hand the
    /// turn to the router.
    pub fn evaluate(&self, session: &Session, text: &str) -> Option<String> {
        let normalized = text.to_ascii_lowercase();
        for rule in self.rules.iter() {
            if !rule.matches(&normalized) {
                continue;
            }
            match (rule.handler)(session, text) {
                Ok(Some(response)) if !response.is_empty() => return Some(response),
                Ok(_) => {}
                Err(fault) => {
                    warn!(rule = rule.name, %fault, "override handler failed; trying next rule");
                }
            }
        }
        None
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name).collect()
    }

    /// The standard rule set: human transfer, complaint, repeat, pacing, and
    /// email spell-back, in descending priority.
    pub fn with_default_rules() -> Self {
        Self::builder()
            .rule(
                "human_transfer",
                100,
                &["urgent", "emergency", "speak to a human", "talk to a person", "real person",
                  "manager", "transfer me"],
                Arc::new(|_session, _text| {
                    Ok(Some(
                        "Of course, I'm connecting you with a member of our team right now. \
                         Please hold."
                            .to_string(),
                    ))
                }),
            )
            .rule(
                "complaint",
                90,
                &["complaint", "terrible", "awful", "unacceptable", "very disappointed"],
                Arc::new(|_session, _text| {
                    Ok(Some(
                        "I'm very sorry to hear that. Let me get a manager on the line so we can \
                         make this right."
                            .to_string(),
                    ))
                }),
            )
            .rule(
                "repeat",
                80,
                &["repeat", "say that again", "what did you say", "come again"],
                Arc::new(|session, _text| Ok(replay_last_content(session))),
            )
            .rule(
                "pacing",
                70,
                &["slow down", "too fast", "speak slower", "slower please"],
                Arc::new(|session, _text| {
                    let mut response = "My apologies, I'll slow down.".to_string();
                    if let Some(line) = session.last_agent_line() {
                        response.push(' ');
                        response.push_str(line);
                    }
                    Ok(Some(response))
                }),
            )
            .rule(
                "spell_email",
                60,
                &["spell", "letter by letter"],
                Arc::new(|session, _text| Ok(Some(spell_collected_email(session)))),
            )
            .build()
    }
}

/// Replays the most recently spoken menu items verbatim, falling back to the
/// last agent transcript line.
fn replay_last_content(session: &Session) -> Option<String> {
    if let Some(items) = session.last_menu_read.as_ref().filter(|items| !items.is_empty()) {
        return Some(format!("Of course. Once more: {}.", join_spoken(items)));
    }
    session.last_agent_line().map(|line| format!("Of course. I said: {line}"))
}

fn spell_collected_email(session: &Session) -> String {
    let email = session
        .collected
        .contact()
        .and_then(|contact| contact.email.as_deref());
    let Some(email) = email else {
        return "I don't have an email address on file yet. Could you give it to me first?"
            .to_string();
    };
    let spelled = match email.split_once('@') {
        Some((local, domain)) => {
            let letters: Vec<String> =
                local.chars().map(|c| c.to_uppercase().to_string()).collect();
            format!("{} at {domain}", letters.join("-"))
        }
        None => email.chars().map(|c| c.to_string()).collect::<Vec<_>>().join("-"),
    };
    format!("That email is {spelled}.")
}
