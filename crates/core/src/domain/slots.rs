use serde::{Deserialize, Serialize};

use crate::domain::intent::Intent;

/// Contact fields shared by every intent. Values are write-once through the
/// `fill_*` methods; the `correct_*` methods exist for explicit caller
/// corrections and are the only path that overwrites a filled slot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactDetails {
    pub fn fill_name(&mut self, value: impl Into<String>) -> bool {
        fill(&mut self.name, value)
    }

    pub fn fill_email(&mut self, value: impl Into<String>) -> bool {
        fill(&mut self.email, value)
    }

    pub fn fill_phone(&mut self, value: impl Into<String>) -> bool {
        fill(&mut self.phone, value)
    }

    pub fn correct_name(&mut self, value: impl Into<String>) {
        self.name = Some(value.into());
    }

    pub fn correct_email(&mut self, value: impl Into<String>) {
        self.email = Some(value.into());
    }

    pub fn correct_phone(&mut self, value: impl Into<String>) {
        self.phone = Some(value.into());
    }
}

/// A concrete requested seating slot, kept as the caller's own phrasing so it
/// can be spoken back verbatim and used as an availability lookup key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: String,
    pub time: String,
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.date, self.time)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSlots {
    pub contact: ContactDetails,
    pub use_case: Option<String>,
}

impl LeadSlots {
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.contact.name.is_none() {
            missing.push("name");
        }
        if self.contact.email.is_none() {
            missing.push("email");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSlots {
    pub contact: ContactDetails,
    pub party_size: Option<u8>,
    pub requested: Option<TimeSlot>,
    pub special_requests: Option<String>,
}

impl BookingSlots {
    pub fn fill_party_size(&mut self, value: u8) -> bool {
        if self.party_size.is_some() {
            return false;
        }
        self.party_size = Some(value);
        true
    }

    pub fn fill_requested(&mut self, value: TimeSlot) -> bool {
        if self.requested.is_some() {
            return false;
        }
        self.requested = Some(value);
        true
    }

    pub fn fill_special_requests(&mut self, value: impl Into<String>) -> bool {
        fill(&mut self.special_requests, value)
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.contact.name.is_none() {
            missing.push("name");
        }
        if self.party_size.is_none() {
            missing.push("party_size");
        }
        if self.requested.is_none() {
            missing.push("date_time");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }
}

/// Menu inquiries have no required slots; the intent is always "complete".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSlots {
    pub contact: ContactDetails,
}

/// Closed per-intent slot set. The variant is chosen when the intent is
/// assigned, so each agent can only ever see the fields that are legal for it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum CollectedSlots {
    #[default]
    Unassigned,
    Lead(LeadSlots),
    Booking(BookingSlots),
    Menu(MenuSlots),
}

impl CollectedSlots {
    /// Initial slot set for a newly assigned or switched intent. Contact
    /// details already collected under the previous intent carry over.
    pub fn for_intent(intent: Intent, carry_over: ContactDetails) -> Self {
        match intent {
            Intent::Lead => Self::Lead(LeadSlots { contact: carry_over, use_case: None }),
            Intent::Booking => Self::Booking(BookingSlots {
                contact: carry_over,
                party_size: None,
                requested: None,
                special_requests: None,
            }),
            Intent::Menu => Self::Menu(MenuSlots { contact: carry_over }),
        }
    }

    pub fn contact(&self) -> Option<&ContactDetails> {
        match self {
            Self::Unassigned => None,
            Self::Lead(slots) => Some(&slots.contact),
            Self::Booking(slots) => Some(&slots.contact),
            Self::Menu(slots) => Some(&slots.contact),
        }
    }

    pub fn contact_carry_over(&self) -> ContactDetails {
        self.contact().cloned().unwrap_or_default()
    }

    pub fn as_lead_mut(&mut self) -> Option<&mut LeadSlots> {
        match self {
            Self::Lead(slots) => Some(slots),
            _ => None,
        }
    }

    pub fn as_booking_mut(&mut self) -> Option<&mut BookingSlots> {
        match self {
            Self::Booking(slots) => Some(slots),
            _ => None,
        }
    }

    pub fn as_lead(&self) -> Option<&LeadSlots> {
        match self {
            Self::Lead(slots) => Some(slots),
            _ => None,
        }
    }

    pub fn as_booking(&self) -> Option<&BookingSlots> {
        match self {
            Self::Booking(slots) => Some(slots),
            _ => None,
        }
    }
}

fn fill(slot: &mut Option<String>, value: impl Into<String>) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value.into());
    true
}

#[cfg(test)]
mod tests {
    use crate::domain::intent::Intent;

    use super::{BookingSlots, CollectedSlots, ContactDetails, TimeSlot};

    #[test]
    fn filled_slots_are_not_overwritten_by_fill() {
        let mut contact = ContactDetails::default();
        assert!(contact.fill_name("Sarah Johnson"));
        assert!(!contact.fill_name("Someone Else"));
        assert_eq!(contact.name.as_deref(), Some("Sarah Johnson"));
    }

    #[test]
    fn correction_overwrites_a_filled_slot() {
        let mut contact = ContactDetails::default();
        contact.fill_email("old@example.com");
        contact.correct_email("new@example.com");
        assert_eq!(contact.email.as_deref(), Some("new@example.com"));
    }

    #[test]
    fn booking_reports_missing_required_fields_in_order() {
        let mut slots = BookingSlots::default();
        assert_eq!(slots.missing_required(), vec!["name", "party_size", "date_time"]);

        slots.contact.fill_name("Sam");
        slots.fill_party_size(4);
        assert_eq!(slots.missing_required(), vec!["date_time"]);

        slots.fill_requested(TimeSlot { date: "tonight".to_string(), time: "7:00 PM".to_string() });
        assert!(slots.is_complete());
    }

    #[test]
    fn collected_slots_serialize_with_an_intent_tag() {
        let collected = CollectedSlots::for_intent(Intent::Booking, ContactDetails::default());
        let json = serde_json::to_value(&collected).expect("serializable");
        assert_eq!(json["intent"], "booking");
    }

    #[test]
    fn contact_details_carry_over_on_intent_switch() {
        let mut collected = CollectedSlots::for_intent(Intent::Lead, ContactDetails::default());
        collected.as_lead_mut().expect("lead slots").contact.fill_name("Test User");

        let switched = CollectedSlots::for_intent(Intent::Booking, collected.contact_carry_over());
        assert_eq!(
            switched.as_booking().and_then(|slots| slots.contact.name.as_deref()),
            Some("Test User")
        );
    }
}
