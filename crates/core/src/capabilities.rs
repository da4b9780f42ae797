//! Consumed external capabilities.
//!
//! The conversation core never talks to speech, CRM, or availability backends
//! directly; it goes through the traits here. Deterministic in-memory
//! implementations live alongside the traits so the core can run and be
//! tested without any backend configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::crm::{ContactPayload, DealPayload, IdempotencyKey, ReservationPayload};
use crate::domain::slots::TimeSlot;
use crate::errors::CapabilityError;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TranscribeOptions {
    pub language_hint: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub confidence: f32,
    pub language: Option<String>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        options: &TranscribeOptions,
    ) -> Result<Transcription, CapabilityError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Pcm16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SynthesizedSpeech {
    pub audio: Vec<u8>,
    pub format: AudioFormat,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SynthesizeOptions {
    pub voice: Option<String>,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesizeOptions,
    ) -> Result<SynthesizedSpeech, CapabilityError>;
}

/// Result of a CRM write. `NotConfigured` is a sentinel, not a failure: a
/// deployment without CRM credentials still converses normally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CrmOutcome {
    Recorded { id: String },
    NotConfigured,
}

impl CrmOutcome {
    pub fn external_id(&self) -> Option<&str> {
        match self {
            Self::Recorded { id } => Some(id),
            Self::NotConfigured => None,
        }
    }
}

#[async_trait]
pub trait CrmConnector: Send + Sync {
    async fn upsert_contact(
        &self,
        payload: &ContactPayload,
        key: &IdempotencyKey,
    ) -> Result<CrmOutcome, CapabilityError>;

    async fn create_deal(
        &self,
        payload: &DealPayload,
        key: &IdempotencyKey,
    ) -> Result<CrmOutcome, CapabilityError>;

    async fn create_reservation(
        &self,
        payload: &ReservationPayload,
        key: &IdempotencyKey,
    ) -> Result<CrmOutcome, CapabilityError>;
}

#[async_trait]
pub trait AvailabilityCalendar: Send + Sync {
    async fn is_slot_available(
        &self,
        slot: &TimeSlot,
        party_size: u8,
    ) -> Result<bool, CapabilityError>;

    /// Commits a slot. Returning `false` means the slot was taken between
    /// check and commit; callers treat that as an alternate-offer branch.
    async fn reserve_slot(&self, slot: &TimeSlot, party_size: u8)
        -> Result<bool, CapabilityError>;

    async fn alternative_times(
        &self,
        date: &str,
        party_size: u8,
    ) -> Result<Vec<String>, CapabilityError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuItem {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub category: String,
    pub dietary_tags: Vec<String>,
    pub is_special: bool,
}

impl MenuItem {
    /// Voice-formatted single-item line, e.g. for reading specials aloud.
    pub fn spoken_line(&self) -> String {
        format!("{}: {}, {}", self.name, self.description, spoken_price(self.price_cents))
    }
}

/// Read-only menu lookups. Menu data is local and static, so this seam stays
/// synchronous.
pub trait MenuSource: Send + Sync {
    fn items(&self) -> Vec<MenuItem>;

    fn specials(&self) -> Vec<MenuItem> {
        self.items().into_iter().filter(|item| item.is_special).collect()
    }

    fn categories(&self) -> Vec<String> {
        let mut categories = Vec::new();
        for item in self.items() {
            if !categories.contains(&item.category) {
                categories.push(item.category);
            }
        }
        categories
    }

    fn items_with_tag(&self, tag: &str) -> Vec<MenuItem> {
        let wanted = tag.to_ascii_lowercase();
        self.items()
            .into_iter()
            .filter(|item| item.dietary_tags.iter().any(|t| t.eq_ignore_ascii_case(&wanted)))
            .collect()
    }

    fn find_item(&self, name_fragment: &str) -> Option<MenuItem> {
        let wanted = name_fragment.to_ascii_lowercase();
        self.items().into_iter().find(|item| item.name.to_ascii_lowercase().contains(&wanted))
    }

    /// Voice-formatted overview of what the menu covers.
    fn voice_summary(&self) -> String {
        let categories = self.categories();
        if categories.is_empty() {
            return "Our menu is being updated at the moment.".to_string();
        }
        format!("Our menu covers {}.", join_spoken(&categories))
    }
}

fn spoken_price(cents: i64) -> String {
    if cents % 100 == 0 {
        format!("{} dollars", cents / 100)
    } else {
        format!("{} dollars {}", cents / 100, cents % 100)
    }
}

/// Joins a spoken list the way a person would: "a, b, and c".
pub fn join_spoken(parts: &[String]) -> String {
    match parts {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [head @ .., tail] => format!("{}, and {tail}", head.join(", ")),
    }
}

/// CRM connector for deployments without credentials: every write reports the
/// not-configured sentinel.
#[derive(Clone, Debug, Default)]
pub struct UnconfiguredCrm;

#[async_trait]
impl CrmConnector for UnconfiguredCrm {
    async fn upsert_contact(
        &self,
        _payload: &ContactPayload,
        _key: &IdempotencyKey,
    ) -> Result<CrmOutcome, CapabilityError> {
        Ok(CrmOutcome::NotConfigured)
    }

    async fn create_deal(
        &self,
        _payload: &DealPayload,
        _key: &IdempotencyKey,
    ) -> Result<CrmOutcome, CapabilityError> {
        Ok(CrmOutcome::NotConfigured)
    }

    async fn create_reservation(
        &self,
        _payload: &ReservationPayload,
        _key: &IdempotencyKey,
    ) -> Result<CrmOutcome, CapabilityError> {
        Ok(CrmOutcome::NotConfigured)
    }
}

/// Recording CRM used in tests and local runs. Each call is remembered with
/// its idempotency key, and the next call can be forced to fail.
#[derive(Debug, Default)]
pub struct InMemoryCrm {
    calls: Mutex<Vec<(String, IdempotencyKey)>>,
    next_id: AtomicU64,
    fail_with: Mutex<Option<String>>,
}

impl InMemoryCrm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, reason: impl Into<String>) {
        match self.fail_with.lock() {
            Ok(mut slot) => *slot = Some(reason.into()),
            Err(poisoned) => *poisoned.into_inner() = Some(reason.into()),
        }
    }

    pub fn calls(&self) -> Vec<(String, IdempotencyKey)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn calls_of(&self, operation: &str) -> usize {
        self.calls().iter().filter(|(op, _)| op == operation).count()
    }

    fn record(&self, operation: &str, key: &IdempotencyKey) -> Result<CrmOutcome, CapabilityError> {
        let forced = match self.fail_with.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(reason) = forced {
            return Err(CapabilityError::Crm(reason));
        }

        match self.calls.lock() {
            Ok(mut calls) => calls.push((operation.to_string(), key.clone())),
            Err(poisoned) => poisoned.into_inner().push((operation.to_string(), key.clone())),
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CrmOutcome::Recorded { id: format!("{operation}-{id}") })
    }
}

#[async_trait]
impl CrmConnector for InMemoryCrm {
    async fn upsert_contact(
        &self,
        _payload: &ContactPayload,
        key: &IdempotencyKey,
    ) -> Result<CrmOutcome, CapabilityError> {
        self.record("contact", key)
    }

    async fn create_deal(
        &self,
        _payload: &DealPayload,
        key: &IdempotencyKey,
    ) -> Result<CrmOutcome, CapabilityError> {
        self.record("deal", key)
    }

    async fn create_reservation(
        &self,
        _payload: &ReservationPayload,
        key: &IdempotencyKey,
    ) -> Result<CrmOutcome, CapabilityError> {
        self.record("reservation", key)
    }
}

/// Seat-counted availability calendar keyed by the caller's own date/time
/// phrasing. Reservation commits are atomic under one lock, so a lost race
/// between check and commit surfaces as `reserve_slot == false`.
#[derive(Debug, Default)]
pub struct InMemoryAvailability {
    seats: Mutex<HashMap<(String, String), u8>>,
}

impl InMemoryAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(self, date: &str, time: &str, seats: u8) -> Self {
        {
            let mut table = match self.seats.lock() {
                Ok(table) => table,
                Err(poisoned) => poisoned.into_inner(),
            };
            table.insert((normalize_key(date), normalize_key(time)), seats);
        }
        self
    }

    fn with_table<T>(&self, f: impl FnOnce(&mut HashMap<(String, String), u8>) -> T) -> T {
        match self.seats.lock() {
            Ok(mut table) => f(&mut table),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[async_trait]
impl AvailabilityCalendar for InMemoryAvailability {
    async fn is_slot_available(
        &self,
        slot: &TimeSlot,
        party_size: u8,
    ) -> Result<bool, CapabilityError> {
        let key = (normalize_key(&slot.date), normalize_key(&slot.time));
        Ok(self.with_table(|table| table.get(&key).copied().unwrap_or(0) >= party_size))
    }

    async fn reserve_slot(
        &self,
        slot: &TimeSlot,
        party_size: u8,
    ) -> Result<bool, CapabilityError> {
        let key = (normalize_key(&slot.date), normalize_key(&slot.time));
        Ok(self.with_table(|table| match table.get_mut(&key) {
            Some(remaining) if *remaining >= party_size => {
                *remaining -= party_size;
                true
            }
            _ => false,
        }))
    }

    async fn alternative_times(
        &self,
        date: &str,
        party_size: u8,
    ) -> Result<Vec<String>, CapabilityError> {
        let wanted_date = normalize_key(date);
        Ok(self.with_table(|table| {
            let mut times: Vec<String> = table
                .iter()
                .filter(|((slot_date, _), remaining)| {
                    *slot_date == wanted_date && **remaining >= party_size
                })
                .map(|((_, time), _)| time.clone())
                .collect();
            times.sort();
            times
        }))
    }
}

/// Fixed menu built at startup.
#[derive(Clone, Debug)]
pub struct StaticMenu {
    items: Vec<MenuItem>,
}

impl StaticMenu {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    /// Small bistro menu used by default wiring and tests.
    pub fn sample() -> Self {
        Self::new(vec![
            MenuItem {
                name: "Roasted Beet Salad".to_string(),
                description: "golden beets, goat cheese, candied walnuts".to_string(),
                price_cents: 1400,
                category: "starters".to_string(),
                dietary_tags: vec!["vegetarian".to_string(), "gluten-free".to_string()],
                is_special: false,
            },
            MenuItem {
                name: "Seared Salmon".to_string(),
                description: "crispy skin salmon with lemon butter".to_string(),
                price_cents: 2800,
                category: "mains".to_string(),
                dietary_tags: vec!["gluten-free".to_string()],
                is_special: true,
            },
            MenuItem {
                name: "Wild Mushroom Risotto".to_string(),
                description: "porcini and cremini with parmesan".to_string(),
                price_cents: 2400,
                category: "mains".to_string(),
                dietary_tags: vec!["vegetarian".to_string()],
                is_special: true,
            },
            MenuItem {
                name: "Chocolate Torte".to_string(),
                description: "flourless torte with raspberry coulis".to_string(),
                price_cents: 1100,
                category: "desserts".to_string(),
                dietary_tags: vec!["vegetarian".to_string(), "gluten-free".to_string()],
                is_special: false,
            },
        ])
    }
}

impl MenuSource for StaticMenu {
    fn items(&self) -> Vec<MenuItem> {
        self.items.clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::crm::{ContactPayload, IdempotencyKey};
    use crate::domain::slots::TimeSlot;

    use super::{
        join_spoken, AvailabilityCalendar, CrmConnector, CrmOutcome, InMemoryAvailability,
        InMemoryCrm, MenuSource, StaticMenu, UnconfiguredCrm,
    };

    fn slot(date: &str, time: &str) -> TimeSlot {
        TimeSlot { date: date.to_string(), time: time.to_string() }
    }

    #[tokio::test]
    async fn unconfigured_crm_reports_sentinel_instead_of_failing() {
        let crm = UnconfiguredCrm;
        let outcome = crm
            .upsert_contact(&ContactPayload::default(), &IdempotencyKey::generate())
            .await
            .expect("sentinel, not error");
        assert_eq!(outcome, CrmOutcome::NotConfigured);
        assert!(outcome.external_id().is_none());
    }

    #[tokio::test]
    async fn in_memory_crm_records_calls_and_can_fail_once() {
        let crm = InMemoryCrm::new();
        crm.fail_next("simulated outage");

        let error = crm
            .upsert_contact(&ContactPayload::default(), &IdempotencyKey::generate())
            .await
            .expect_err("forced failure");
        assert!(error.to_string().contains("simulated outage"));

        let outcome = crm
            .upsert_contact(&ContactPayload::default(), &IdempotencyKey::generate())
            .await
            .expect("second call succeeds");
        assert!(outcome.external_id().is_some());
        assert_eq!(crm.calls_of("contact"), 1);
    }

    #[tokio::test]
    async fn reservation_commit_decrements_seats_atomically() {
        let calendar = InMemoryAvailability::new().with_slot("tonight", "7:00 pm", 4);
        let requested = slot("tonight", "7:00 PM");

        assert!(calendar.is_slot_available(&requested, 4).await.expect("lookup"));
        assert!(calendar.reserve_slot(&requested, 4).await.expect("commit"));
        // Seats are gone now; the same slot loses the race.
        assert!(!calendar.reserve_slot(&requested, 4).await.expect("commit"));
        assert!(!calendar.is_slot_available(&requested, 1).await.expect("lookup"));
    }

    #[tokio::test]
    async fn alternative_times_lists_only_slots_that_fit_the_party() {
        let calendar = InMemoryAvailability::new()
            .with_slot("tonight", "6:00 pm", 2)
            .with_slot("tonight", "8:30 pm", 6)
            .with_slot("tomorrow", "7:00 pm", 6);

        let times = calendar.alternative_times("tonight", 4).await.expect("lookup");
        assert_eq!(times, vec!["8:30 pm".to_string()]);
    }

    #[test]
    fn sample_menu_supports_dietary_and_special_lookups() {
        let menu = StaticMenu::sample();
        assert_eq!(menu.specials().len(), 2);
        assert!(!menu.items_with_tag("vegetarian").is_empty());
        assert!(menu.find_item("salmon").is_some());
        assert!(menu.voice_summary().contains("starters"));
    }

    #[test]
    fn spoken_join_reads_naturally() {
        let parts =
            vec!["soup".to_string(), "salad".to_string(), "bread".to_string()];
        assert_eq!(join_spoken(&parts), "soup, salad, and bread");
        assert_eq!(join_spoken(&parts[..2]), "soup and salad");
        assert_eq!(join_spoken(&parts[..1]), "soup");
    }
}
