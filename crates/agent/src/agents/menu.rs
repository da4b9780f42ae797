//! Menu inquiry agent.
//!
//! Pure lookups against the configured menu. The only session state it
//! touches is `last_menu_read`, which keeps the exact spoken list so a
//! "repeat" request can replay it verbatim. It never opens a CRM action.

use std::sync::Arc;

use async_trait::async_trait;

use frontdesk_core::capabilities::{join_spoken, MenuItem, MenuSource};
use frontdesk_core::config::BusinessConfig;
use frontdesk_core::domain::intent::Intent;
use frontdesk_core::domain::session::CallId;
use frontdesk_core::errors::TurnError;
use frontdesk_store::SessionStore;

use super::{greet_if_first, SlotFillingAgent};

pub struct MenuAgent {
    menu: Arc<dyn MenuSource>,
    business: BusinessConfig,
}

impl MenuAgent {
    pub fn new(menu: Arc<dyn MenuSource>, business: BusinessConfig) -> Self {
        Self { menu, business }
    }

    fn specials_reply(&self) -> (String, Option<Vec<String>>) {
        let specials = self.menu.specials();
        if specials.is_empty() {
            return (
                format!("We don't have any specials today. {}", self.menu.voice_summary()),
                None,
            );
        }
        let lines: Vec<String> = specials.iter().map(MenuItem::spoken_line).collect();
        (format!("Today's specials: {}.", join_spoken(&lines)), Some(lines))
    }

    fn dietary_reply(&self, tag: &str) -> (String, Option<Vec<String>>) {
        let items = self.menu.items_with_tag(tag);
        if items.is_empty() {
            return (
                format!("I'm sorry, nothing on our menu is marked {tag} right now."),
                None,
            );
        }
        let names: Vec<String> = items.into_iter().map(|item| item.name).collect();
        (format!("For {tag} we have {}.", join_spoken(&names)), Some(names))
    }

    fn mentioned_item(&self, normalized: &str) -> Option<MenuItem> {
        self.menu.items().into_iter().find(|item| {
            item.name
                .split_whitespace()
                .any(|word| word.len() > 3 && normalized.contains(&word.to_ascii_lowercase()))
        })
    }
}

#[async_trait]
impl SlotFillingAgent for MenuAgent {
    fn intent(&self) -> Intent {
        Intent::Menu
    }

    async fn respond(
        &self,
        store: &SessionStore,
        call_id: &CallId,
        text: &str,
    ) -> Result<String, TurnError> {
        let session =
            store.get(call_id).ok_or_else(|| TurnError::SessionMissing(call_id.clone()))?;
        let normalized = text.to_ascii_lowercase();

        let (reply, read_items) = if normalized.contains("special") {
            self.specials_reply()
        } else if normalized.contains("vegetarian") {
            self.dietary_reply("vegetarian")
        } else if normalized.contains("vegan") {
            self.dietary_reply("vegan")
        } else if normalized.contains("gluten") {
            self.dietary_reply("gluten-free")
        } else if let Some(item) = self.mentioned_item(&normalized) {
            let line = item.spoken_line();
            (format!("The {}.", line), Some(vec![line]))
        } else {
            (
                format!(
                    "{} Is there anything in particular you'd like to hear about?",
                    self.menu.voice_summary()
                ),
                None,
            )
        };

        if let Some(items) = read_items {
            store.update(call_id, |session| {
                session.last_menu_read = Some(items);
            });
        }

        Ok(greet_if_first(&session, &self.business, reply))
    }
}
