//! # Topic Filters
//!
//! MQTT-style subscription filters.
//!
//! - `+` matches exactly one topic level
//! - `#` matches any number of trailing levels (including zero) and must be
//!   the last level
//! - wildcards must occupy a whole level

use thiserror::Error;

/// Errors from filter parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Empty filter string.
    #[error("Topic filter is empty")]
    Empty,

    /// `#` used anywhere but the final level.
    #[error("Multi-level wildcard must be the last level in {filter}")]
    MisplacedMultiLevel { filter: String },

    /// Wildcard mixed with other characters inside one level.
    #[error("Wildcard must occupy a whole level in {filter}")]
    PartialWildcard { filter: String },
}

/// A validated subscription filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter {
    raw: String,
}

impl TopicFilter {
    /// Parse and validate a filter.
    pub fn new(filter: &str) -> Result<Self, FilterError> {
        if filter.is_empty() {
            return Err(FilterError::Empty);
        }

        let levels: Vec<&str> = filter.split('/').collect();
        let last = levels.len() - 1;
        for (i, level) in levels.iter().enumerate() {
            if level.contains('#') {
                if *level != "#" {
                    return Err(FilterError::PartialWildcard {
                        filter: filter.to_string(),
                    });
                }
                if i != last {
                    return Err(FilterError::MisplacedMultiLevel {
                        filter: filter.to_string(),
                    });
                }
            }
            if level.contains('+') && *level != "+" {
                return Err(FilterError::PartialWildcard {
                    filter: filter.to_string(),
                });
            }
        }

        Ok(Self {
            raw: filter.to_string(),
        })
    }

    /// The filter as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the filter has no wildcards.
    pub fn is_exact(&self) -> bool {
        !self.raw.contains(['+', '#'])
    }

    /// Check whether a concrete topic matches this filter.
    pub fn matches(&self, topic: &str) -> bool {
        if self.is_exact() {
            return self.raw == topic;
        }

        let mut filter_levels = self.raw.split('/');
        let mut topic_levels = topic.split('/');

        loop {
            match (filter_levels.next(), topic_levels.next()) {
                (Some("#"), _) => return true,
                (Some("+"), Some(_)) => continue,
                (Some(f), Some(t)) if f == t => continue,
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}
