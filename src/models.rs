//! Data models for search input and scraped listings.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SearchQuery`]: Validated, immutable search parameters for one run
//! - [`ExperienceLevel`]: The six experience filters the endpoint understands
//! - [`Record`]: One job listing extracted from a results page
//! - [`PageResult`]: The records produced by a single page fetch
//!
//! Fields that could not be extracted carry the [`SENTINEL`] value rather than
//! an empty string, and sinks write it through unchanged.

use crate::error::ScrapeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder for a field that could not be extracted.
pub const SENTINEL: &str = "N/A";

/// Experience level filter accepted by the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExperienceLevel {
    Internship,
    Entry,
    Associate,
    MidSenior,
    Director,
    Executive,
}

impl ExperienceLevel {
    /// All levels in the order the endpoint numbers them.
    pub const ALL: [ExperienceLevel; 6] = [
        ExperienceLevel::Internship,
        ExperienceLevel::Entry,
        ExperienceLevel::Associate,
        ExperienceLevel::MidSenior,
        ExperienceLevel::Director,
        ExperienceLevel::Executive,
    ];

    /// The `f_E` query parameter token for this level.
    pub fn code(self) -> &'static str {
        match self {
            ExperienceLevel::Internship => "1",
            ExperienceLevel::Entry => "2",
            ExperienceLevel::Associate => "3",
            ExperienceLevel::MidSenior => "4",
            ExperienceLevel::Director => "5",
            ExperienceLevel::Executive => "6",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExperienceLevel::Internship => "internship",
            ExperienceLevel::Entry => "entry",
            ExperienceLevel::Associate => "associate",
            ExperienceLevel::MidSenior => "mid-senior",
            ExperienceLevel::Director => "director",
            ExperienceLevel::Executive => "executive",
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExperienceLevel {
    type Err = ScrapeError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ExperienceLevel::ALL
            .into_iter()
            .find(|level| level.name() == wanted)
            .ok_or_else(|| {
                ScrapeError::Validation(format!(
                    "unknown experience level {s:?}; expected one of internship, entry, \
                     associate, mid-senior, director, executive"
                ))
            })
    }
}

/// Validated search parameters for one scrape run.
///
/// Construct with [`SearchQuery::new`]; the fields are private so a query that
/// exists has already passed validation and cannot change mid-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    keywords: String,
    location: String,
    experience: Option<ExperienceLevel>,
    target_count: usize,
}

impl SearchQuery {
    /// Validate raw search input.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Validation`] if:
    /// - `keywords` is empty or whitespace
    /// - `target_count` is zero or greater than `max_count`
    /// - `experience` is present but not one of the six recognized levels
    pub fn new(
        keywords: &str,
        location: &str,
        experience: Option<&str>,
        target_count: usize,
        max_count: usize,
    ) -> Result<Self, ScrapeError> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(ScrapeError::Validation("keywords must not be empty".into()));
        }
        if target_count == 0 || target_count > max_count {
            return Err(ScrapeError::Validation(format!(
                "job count {target_count} must be between 1 and {max_count}"
            )));
        }
        let experience = experience
            .filter(|e| !e.trim().is_empty())
            .map(str::parse::<ExperienceLevel>)
            .transpose()?;

        Ok(SearchQuery {
            keywords: keywords.to_string(),
            location: location.trim().to_string(),
            experience,
            target_count,
        })
    }

    pub fn keywords(&self) -> &str {
        &self.keywords
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn experience(&self) -> Option<ExperienceLevel> {
        self.experience
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }
}

/// A single job listing.
///
/// Identity is the canonical `url`: two records with the same URL are the same
/// listing no matter how the other fields differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Job title.
    pub title: String,
    /// Hiring company.
    pub organization: String,
    /// Location as displayed on the listing.
    pub location: String,
    /// Absolute listing URL without a query string.
    pub url: String,
    /// Machine-readable date if present, otherwise the displayed text.
    pub posted_at: String,
}

impl Record {
    /// The key used for deduplication.
    pub fn identity_key(&self) -> &str {
        &self.url
    }
}

/// Records extracted from one fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    pub records: Vec<Record>,
}

impl PageResult {
    /// Whether the page produced at least one accepted record.
    pub fn is_non_empty(&self) -> bool {
        !self.records.is_empty()
    }
}
