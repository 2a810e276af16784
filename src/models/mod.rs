use serde::{Deserialize, Serialize};
use std::fmt;

pub mod candidate;
pub mod fetch;
pub mod notification_record;
pub mod run_status;

// Re-exports for convenience
pub use candidate::*;
pub use fetch::*;
pub use notification_record::*;
pub use run_status::*;

/// Kind of special event detected in a listing title.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum EventCategory {
    #[serde(rename = "Q&A")]
    #[sqlx(rename = "Q&A")]
    QuestionAndAnswer,
    #[serde(rename = "Early Access")]
    #[sqlx(rename = "Early Access")]
    EarlyAccess,
    #[serde(rename = "Advance Screening")]
    #[sqlx(rename = "Advance Screening")]
    AdvanceScreening,
    #[serde(rename = "Special Event")]
    #[sqlx(rename = "Special Event")]
    SpecialEvent,
    #[serde(rename = "Fan Event")]
    #[sqlx(rename = "Fan Event")]
    FanEvent,
    #[serde(rename = "One Night Only")]
    #[sqlx(rename = "One Night Only")]
    OneNightOnly,
    #[serde(rename = "Sneak Peek")]
    #[sqlx(rename = "Sneak Peek")]
    SneakPeek,
    #[serde(rename = "Premiere Event")]
    #[sqlx(rename = "Premiere Event")]
    PremiereEvent,
    #[serde(rename = "Talkback")]
    #[sqlx(rename = "Talkback")]
    Talkback,
    #[serde(rename = "Panel Discussion")]
    #[sqlx(rename = "Panel Discussion")]
    PanelDiscussion,
}

impl EventCategory {
    pub const ALL: [EventCategory; 10] = [
        EventCategory::QuestionAndAnswer,
        EventCategory::EarlyAccess,
        EventCategory::AdvanceScreening,
        EventCategory::SpecialEvent,
        EventCategory::FanEvent,
        EventCategory::OneNightOnly,
        EventCategory::SneakPeek,
        EventCategory::PremiereEvent,
        EventCategory::Talkback,
        EventCategory::PanelDiscussion,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EventCategory::QuestionAndAnswer => "Q&A",
            EventCategory::EarlyAccess => "Early Access",
            EventCategory::AdvanceScreening => "Advance Screening",
            EventCategory::SpecialEvent => "Special Event",
            EventCategory::FanEvent => "Fan Event",
            EventCategory::OneNightOnly => "One Night Only",
            EventCategory::SneakPeek => "Sneak Peek",
            EventCategory::PremiereEvent => "Premiere Event",
            EventCategory::Talkback => "Talkback",
            EventCategory::PanelDiscussion => "Panel Discussion",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of comparing a candidate against the notification history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    New,
    Updated,
    Unchanged,
}
