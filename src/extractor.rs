//! Tolerant extraction of job records from a results page.
//!
//! The endpoint returns a fragment of `<li>` cards whose markup drifts over
//! time. Each field is therefore read through an ordered list of [`Rule`]s:
//! the first rule whose first matching element yields non-empty text wins, and
//! a field no rule can fill gets [`SENTINEL`].
//!
//! # Field rules
//!
//! | Field | Rules, in order |
//! |-------|-----------------|
//! | title | `h3.base-search-card__title`, `h3[class*=title]`, `h3`, `a.base-card__full-link` |
//! | organization | `h4.base-search-card__subtitle`, `a.hidden-nested-link`, `h4`, `a[class*=company]` |
//! | location | `span.job-search-card__location`, `span[class*=location]`, `span.base-search-card__metadata` |
//! | url | `a.base-card__full-link`, `a[href*="/jobs/view/"]`, `a[href]` |
//! | posted | `time.job-search-card__listdate`, `time.job-search-card__listdate--new`, `time`, `span[class*=date]` |
//!
//! Class-substring rules compare case-insensitively. Dates prefer the
//! `datetime` attribute over the element text.

use crate::error::CandidateError;
use crate::models::{PageResult, Record, SENTINEL};
use crate::observer::{Observer, ScrapeEvent};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static CANDIDATE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li").expect("static selector"));

/// Structural predicate over a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Tag name plus an exact class token.
    TagWithClass(&'static str, &'static str),
    /// Tag name plus a class attribute containing the marker, ignoring case.
    TagClassContains(&'static str, &'static str),
    /// Any element with this tag name.
    Tag(&'static str),
    /// A link whose `href` contains the marker.
    LinkHrefContains(&'static str),
    /// Any link carrying an `href`.
    AnyLink,
}

impl Rule {
    pub fn matches(&self, el: &ElementRef) -> bool {
        let e = el.value();
        match *self {
            Rule::TagWithClass(tag, class) => e.name() == tag && e.classes().any(|c| c == class),
            Rule::TagClassContains(tag, marker) => {
                e.name() == tag
                    && e.attr("class")
                        .is_some_and(|c| c.to_lowercase().contains(marker))
            }
            Rule::Tag(tag) => e.name() == tag,
            Rule::LinkHrefContains(marker) => {
                e.name() == "a" && e.attr("href").is_some_and(|h| h.contains(marker))
            }
            Rule::AnyLink => e.name() == "a" && e.attr("href").is_some(),
        }
    }

    /// First descendant of `card` (excluding `card` itself) matching this rule.
    pub fn find<'a>(&self, card: ElementRef<'a>) -> Option<ElementRef<'a>> {
        card.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .find(|el| self.matches(el))
    }
}

/// What to read from the element a rule selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Take {
    Text,
    Href,
    /// The `datetime` attribute if present and non-blank, else the text.
    DatetimeOrText,
}

impl Take {
    fn read(self, el: ElementRef) -> Option<String> {
        match self {
            Take::Text => normalize_text(&el.text().collect::<String>()),
            Take::Href => el.value().attr("href").and_then(normalize_text),
            Take::DatetimeOrText => el
                .value()
                .attr("datetime")
                .and_then(normalize_text)
                .or_else(|| normalize_text(&el.text().collect::<String>())),
        }
    }
}

/// The ordered rule chain for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRules {
    pub take: Take,
    pub rules: &'static [Rule],
}

impl FieldRules {
    /// Value from the first rule that yields non-empty normalized text.
    pub fn apply(&self, card: ElementRef) -> Option<String> {
        self.rules
            .iter()
            .filter_map(|rule| rule.find(card))
            .find_map(|el| self.take.read(el))
    }
}

pub const TITLE: FieldRules = FieldRules {
    take: Take::Text,
    rules: &[
        Rule::TagWithClass("h3", "base-search-card__title"),
        Rule::TagClassContains("h3", "title"),
        Rule::Tag("h3"),
        Rule::TagWithClass("a", "base-card__full-link"),
    ],
};

pub const ORGANIZATION: FieldRules = FieldRules {
    take: Take::Text,
    rules: &[
        Rule::TagWithClass("h4", "base-search-card__subtitle"),
        Rule::TagWithClass("a", "hidden-nested-link"),
        Rule::Tag("h4"),
        Rule::TagClassContains("a", "company"),
    ],
};

pub const LOCATION: FieldRules = FieldRules {
    take: Take::Text,
    rules: &[
        Rule::TagWithClass("span", "job-search-card__location"),
        Rule::TagClassContains("span", "location"),
        Rule::TagWithClass("span", "base-search-card__metadata"),
    ],
};

pub const URL: FieldRules = FieldRules {
    take: Take::Href,
    rules: &[
        Rule::TagWithClass("a", "base-card__full-link"),
        Rule::LinkHrefContains("/jobs/view/"),
        Rule::AnyLink,
    ],
};

pub const POSTED_AT: FieldRules = FieldRules {
    take: Take::DatetimeOrText,
    rules: &[
        Rule::TagWithClass("time", "job-search-card__listdate"),
        Rule::TagWithClass("time", "job-search-card__listdate--new"),
        Rule::Tag("time"),
        Rule::TagClassContains("span", "date"),
    ],
};

/// Collapse whitespace runs to single spaces and trim. Blank input gives `None`.
pub fn normalize_text(raw: &str) -> Option<String> {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Turn an extracted href into a canonical absolute URL.
///
/// Anything that is not an `http(s)://` link is appended to `origin` as a
/// path, including protocol-relative `//host/...` links, so those never leave
/// the site. Any query string or fragment is dropped.
pub fn canonical_url(href: &str, origin: &Url) -> Result<String, CandidateError> {
    let invalid = |reason: String| CandidateError::InvalidUrl {
        href: href.to_string(),
        reason,
    };

    let base = origin.as_str().trim_end_matches('/');
    let absolute = if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    };
    let mut url = Url::parse(&absolute).map_err(|e| invalid(e.to_string()))?;

    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Extracts [`Record`]s from results-page markup.
///
/// Holds no per-run state and can be shared between concurrent runs.
#[derive(Debug, Clone)]
pub struct Extractor {
    origin: Url,
}

impl Extractor {
    pub fn new(origin: Url) -> Self {
        Extractor { origin }
    }

    /// Extract every accepted record from `markup`, in document order.
    ///
    /// Candidates that fail to parse are reported to `observer` and skipped;
    /// candidates without a usable title or URL are dropped silently.
    pub fn extract(&self, markup: &str, observer: &dyn Observer) -> PageResult {
        let document = Html::parse_fragment(markup);
        let mut records = Vec::new();

        for (index, card) in document.select(&CANDIDATE_SELECTOR).enumerate() {
            match self.parse_card(card) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(error) => {
                    observer.on_event(&ScrapeEvent::CandidateSkipped { index, error })
                }
            }
        }

        PageResult { records }
    }

    /// Parse one candidate element.
    ///
    /// Returns `Ok(None)` when the candidate is not a listing: no title of at
    /// least two characters, or no link at all.
    pub fn parse_card(&self, card: ElementRef) -> Result<Option<Record>, CandidateError> {
        let Some(title) = TITLE.apply(card).filter(|t| t.chars().count() >= 2) else {
            return Ok(None);
        };
        let Some(href) = URL.apply(card) else {
            return Ok(None);
        };
        let url = canonical_url(&href, &self.origin)?;

        Ok(Some(Record {
            title,
            organization: or_sentinel(ORGANIZATION.apply(card)),
            location: or_sentinel(LOCATION.apply(card)),
            url,
            posted_at: or_sentinel(POSTED_AT.apply(card)),
        }))
    }
}

fn or_sentinel(value: Option<String>) -> String {
    value.unwrap_or_else(|| SENTINEL.to_string())
}
