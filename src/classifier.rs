//! Series classification by title pattern
//!
//! Patterns are tried in table order and the first one that matches a prefix of the
//! title wins, so overlapping patterns are disambiguated by their position.

use crate::config::SeriesConfig;
use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Upper bound for a compiled pattern, keeps hostile config files from ballooning memory
const PATTERN_SIZE_LIMIT: usize = 1024 * 1024;

/// Result of classifying one title
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification<'a> {
    /// Title belongs to the named series (index into the series table)
    Series {
        /// Position of the series in the table
        index: usize,
        /// Series name
        name: &'a str,
    },
    /// No pattern matched
    Unknown,
}

/// Ordered table of compiled series patterns
#[derive(Clone, Debug)]
pub struct Classifier {
    series: Vec<(String, Regex)>,
}

impl Classifier {
    /// Compile the series table
    ///
    /// Each pattern is anchored at the start of the title, so `"^YoGPoD"` and `"YoGPoD"`
    /// behave the same and neither matches `"The YoGPoD"`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPattern`] for the first pattern that does not compile
    pub fn new(series: &[SeriesConfig]) -> Result<Self> {
        let series = series
            .iter()
            .map(|s| {
                RegexBuilder::new(&format!("^(?:{})", s.pattern))
                    .size_limit(PATTERN_SIZE_LIMIT)
                    .build()
                    .map(|re| (s.name.clone(), re))
                    .map_err(|source| Error::InvalidPattern {
                        series: s.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { series })
    }

    /// Classify a title
    pub fn classify(&self, title: &str) -> Classification<'_> {
        for (index, (name, re)) in self.series.iter().enumerate() {
            if re.is_match(title) {
                debug!(title, series = name.as_str(), "classified");
                return Classification::Series { index, name };
            }
        }
        debug!(title, "no series pattern matched");
        Classification::Unknown
    }

    /// Series names in table order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|(name, _)| name.as_str())
    }
}
