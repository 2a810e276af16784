//! Keyword classifier: finds special-event screenings in listing payloads.

use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

use crate::config::{ClassifierConfig, SourceConfig};
use crate::models::{AggregateReport, CandidateItem, EventCategory, NotificationIdentity};
use crate::utils::error::AppError;
use crate::Result;

/// Turns an aggregate report into an ordered list of candidates.
pub trait Classifier: Send + Sync {
    fn classify(&self, report: &AggregateReport) -> Vec<CandidateItem>;
}

const SPECIAL_EVENT_PATTERN: &str = r"(?ix)
    \b(?:
        (?P<qa>
            live(?:\s*[-\x20]?stream(?:ed|ing)?)?\s*q\W*a
          | q\s*(?:&|&amp;|and|\+|/)\s*a
          | q\W*a
        )
      | (?P<early_access>early\s*access)
      | (?P<advance>advanced?\s*screening)
      | (?P<special>special\s*(?:screening|event))
      | (?P<fan>fan\s*event)
      | (?P<one_night>one\s*night\s*only)
      | (?P<sneak_peek>sneak\s*peek)
      | (?P<premiere>premiere\s*event)
      | (?P<talkback>talkback)
      | (?P<panel>panel\s+discussion)
    )\b
";

const GROUPS: [(&str, EventCategory); 10] = [
    ("qa", EventCategory::QuestionAndAnswer),
    ("early_access", EventCategory::EarlyAccess),
    ("advance", EventCategory::AdvanceScreening),
    ("special", EventCategory::SpecialEvent),
    ("fan", EventCategory::FanEvent),
    ("one_night", EventCategory::OneNightOnly),
    ("sneak_peek", EventCategory::SneakPeek),
    ("premiere", EventCategory::PremiereEvent),
    ("talkback", EventCategory::Talkback),
    ("panel", EventCategory::PanelDiscussion),
];

#[derive(Debug, Deserialize)]
struct ListingPayload {
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    movies: Vec<ListingMovie>,
}

#[derive(Debug, Deserialize)]
struct ListingMovie {
    name: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    showtimes: Vec<String>,
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    rating: Option<String>,
}

pub struct KeywordClassifier {
    pattern: Regex,
    categories: BTreeSet<EventCategory>,
    source_names: HashMap<String, String>,
}

impl KeywordClassifier {
    pub fn new(config: &ClassifierConfig, sources: &[SourceConfig]) -> Result<Self> {
        let pattern = Regex::new(SPECIAL_EVENT_PATTERN)
            .map_err(|e| AppError::Classifier(format!("invalid special event pattern: {}", e)))?;

        Ok(Self {
            pattern,
            categories: config.categories.iter().copied().collect(),
            source_names: sources.iter().map(|s| (s.id.clone(), s.name.clone())).collect(),
        })
    }

    /// Category of the first special-event phrase in `title`, if any.
    pub fn detect(&self, title: &str) -> Option<EventCategory> {
        let captures = self.pattern.captures(title)?;
        let category = GROUPS
            .iter()
            .find(|(group, _)| captures.name(group).is_some())
            .map(|(_, category)| *category)
            .unwrap_or(EventCategory::SpecialEvent);
        Some(category)
    }

    fn source_name(&self, source_unit_id: &str, venue: Option<String>) -> String {
        venue
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.source_names.get(source_unit_id).cloned())
            .unwrap_or_else(|| source_unit_id.to_string())
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, report: &AggregateReport) -> Vec<CandidateItem> {
        let mut items: Vec<CandidateItem> = Vec::new();
        let mut index: HashMap<NotificationIdentity, usize> = HashMap::new();

        for result in report.successes() {
            let Some(payload) = result.payload() else { continue };

            let listing: ListingPayload = match serde_json::from_str(payload) {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!(
                        source_unit = %result.source_unit_id,
                        date = %result.time_window,
                        "Skipping malformed listing payload: {}", e
                    );
                    continue;
                }
            };

            let source_name = self.source_name(&result.source_unit_id, listing.venue);

            for movie in listing.movies {
                let name = movie.name.trim();
                if name.is_empty() {
                    continue;
                }
                let Some(category) = self.detect(name) else { continue };
                if !self.categories.contains(&category) {
                    continue;
                }

                let attributes: BTreeSet<String> = movie
                    .showtimes
                    .iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();

                let item = CandidateItem {
                    source_unit_id: result.source_unit_id.clone(),
                    source_name: source_name.clone(),
                    date: result.time_window,
                    subject_name: name.to_string(),
                    occurrence_key: movie
                        .slug
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| slugify(name)),
                    attributes,
                    category,
                    runtime_minutes: movie.runtime,
                    rating: movie.rating.filter(|r| !r.is_empty()),
                };

                // Same film listed twice on one page: merge showtimes.
                match index.get(&item.identity()) {
                    Some(&at) => items[at].attributes.extend(item.attributes),
                    None => {
                        index.insert(item.identity(), items.len());
                        items.push(item);
                    }
                }
            }
        }

        tracing::info!(candidates = items.len(), "Classified listings");
        items
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
