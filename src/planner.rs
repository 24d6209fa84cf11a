//! Query planners: turn a logical request into an ordered list of job parameters.
//!
//! Three shapes are supported:
//! - count-bounded chunking of identifier lists ([`chunk_ids`])
//! - row paging after a probe request ([`plan_row_pages`])
//! - result paging for "fetch all" searches ([`plan_search_pages`])
//!
//! All chunk/page arithmetic lives here, including clipping of the final page
//! so the pages cover the requested range exactly. The engine never looks
//! inside the bundles.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::PlannerError;
use crate::types::Params;

/// Separator the EIA series endpoints expect between ids
pub const SERIES_ID_SEPARATOR: &str = ";";

/// Split `ids` into chunks of at most `chunk_size`, one job per chunk
///
/// Each job carries the chunk joined with `separator` under `key`. An empty
/// id list yields no jobs.
///
/// # Errors
///
/// Returns [`PlannerError::ZeroPageSize`] if `chunk_size` is zero.
pub fn chunk_ids<S: AsRef<str>>(
    ids: &[S],
    chunk_size: usize,
    key: &str,
    separator: &str,
) -> Result<Vec<Params>, PlannerError> {
    if chunk_size == 0 {
        return Err(PlannerError::ZeroPageSize { what: "chunk_size" });
    }

    Ok(ids
        .chunks(chunk_size)
        .map(|chunk| {
            let joined = chunk
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(separator);
            Params::new().with(key, joined)
        })
        .collect())
}

/// A half-open row range `[start, start + len)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRange {
    /// First row (0-based)
    pub start: usize,
    /// Number of rows
    pub len: usize,
}

/// Split `[0, total)` into consecutive ranges of `page_size`, clipping the last one
///
/// # Errors
///
/// Returns [`PlannerError::ZeroPageSize`] if `page_size` is zero.
pub fn page_ranges(total: usize, page_size: usize) -> Result<Vec<PageRange>, PlannerError> {
    if page_size == 0 {
        return Err(PlannerError::ZeroPageSize { what: "page_size" });
    }

    Ok((0..total.div_ceil(page_size))
        .map(|page| {
            let start = page * page_size;
            PageRange {
                start,
                len: page_size.min(total - start),
            }
        })
        .collect())
}

/// Row pages for the updates endpoint
///
/// Every job is `base` plus `firstrow` and `rows`, covering `[0, total_rows)`.
///
/// # Errors
///
/// Returns [`PlannerError::ZeroPageSize`] if `page_size` is zero.
pub fn plan_row_pages(
    base: &Params,
    total_rows: usize,
    page_size: usize,
) -> Result<Vec<Params>, PlannerError> {
    Ok(page_ranges(total_rows, page_size)?
        .into_iter()
        .map(|range| {
            let mut params = base.clone();
            params.insert("firstrow", range.start);
            params.insert("rows", range.len);
            params
        })
        .collect())
}

/// Result pages for a "fetch all" search
///
/// Every job is `base` plus a 1-based `page_num` and `rows_per_page`; the
/// last page asks only for the remaining results.
///
/// # Errors
///
/// Returns [`PlannerError::ZeroPageSize`] if `page_size` is zero.
pub fn plan_search_pages(
    base: &Params,
    total: usize,
    page_size: usize,
) -> Result<Vec<Params>, PlannerError> {
    Ok(page_ranges(total, page_size)?
        .into_iter()
        .enumerate()
        .map(|(page, range)| {
            let mut params = base.clone();
            params.insert("page_num", page + 1);
            params.insert("rows_per_page", range.len);
            params
        })
        .collect())
}

/// Field searched by the search endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchTerm {
    /// Series identifier
    SeriesId,
    /// Series name
    Name,
    /// Last update timestamp
    LastUpdated,
}

impl SearchTerm {
    /// Wire name of the term
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchTerm::SeriesId => "series_id",
            SearchTerm::Name => "name",
            SearchTerm::LastUpdated => "last_updated",
        }
    }
}

impl std::str::FromStr for SearchTerm {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "series_id" => Ok(SearchTerm::SeriesId),
            "name" => Ok(SearchTerm::Name),
            "last_updated" => Ok(SearchTerm::LastUpdated),
            other => Err(PlannerError::InvalidSearchTerm(other.to_string())),
        }
    }
}

/// Value searched for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchValue {
    /// Free text; quoted for id/name searches, passed through for `last_updated`
    Text(String),
    /// Inclusive date range for `last_updated` searches
    Range(String, String),
}

impl From<&str> for SearchValue {
    fn from(s: &str) -> Self {
        SearchValue::Text(s.to_string())
    }
}

impl From<String> for SearchValue {
    fn from(s: String) -> Self {
        SearchValue::Text(s)
    }
}

impl<A: Into<String>, B: Into<String>> From<(A, B)> for SearchValue {
    fn from((from, to): (A, B)) -> Self {
        SearchValue::Range(from.into(), to.into())
    }
}

/// Normalize a search request into the `search_term`/`search_value` parameters
///
/// - `series_id` and `name` values are wrapped in double quotes unless already quoted.
/// - a `last_updated` date range becomes `[YYYY-MM-DDTHH:MM:SSZ TO YYYY-MM-DDTHH:MM:SSZ]`;
///   a text value is assumed to already be in that form and passed through.
///
/// # Errors
///
/// Returns [`PlannerError::InvalidSearchTerm`] for an unknown term,
/// [`PlannerError::InvalidDate`] for an unparseable date and
/// [`PlannerError::InvalidDateRange`] for a range on an id/name search.
pub fn clean_search_params(term: &str, value: &SearchValue) -> Result<Params, PlannerError> {
    let term: SearchTerm = term.parse()?;

    let cleaned = match (term, value) {
        (SearchTerm::SeriesId | SearchTerm::Name, SearchValue::Text(text)) => quote(text),
        (SearchTerm::SeriesId | SearchTerm::Name, SearchValue::Range(..)) => {
            return Err(PlannerError::InvalidDateRange(format!(
                "{} searches take a single value",
                term.as_str()
            )));
        }
        (SearchTerm::LastUpdated, SearchValue::Text(text)) => text.clone(),
        (SearchTerm::LastUpdated, SearchValue::Range(from, to)) => {
            let from = parse_datetime(from)?;
            let to = parse_datetime(to)?;
            if from > to {
                return Err(PlannerError::InvalidDateRange(format!(
                    "start {} is after end {}",
                    format_solr(&from),
                    format_solr(&to)
                )));
            }
            format!("[{} TO {}]", format_solr(&from), format_solr(&to))
        }
    };

    Ok(Params::new()
        .with("search_term", term.as_str())
        .with("search_value", cleaned))
}

fn quote(text: &str) -> String {
    let inner = text.trim_matches('"');
    format!("\"{inner}\"")
}

fn format_solr(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%b %d, %Y", "%B %d, %Y", "%b. %d, %Y"];

/// Parse the date spellings accepted for `last_updated` ranges (interpreted as UTC)
fn parse_datetime(input: &str) -> Result<DateTime<Utc>, PlannerError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format)
            && let Some(dt) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(dt.and_utc());
        }
    }

    Err(PlannerError::InvalidDate(input.to_string()))
}
