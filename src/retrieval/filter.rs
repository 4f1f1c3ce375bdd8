//! Filename suffix filter
//!
//! Decides whether a resource is eligible for download purely from the text
//! after the last `.` of its filename.

use crate::config::RetrievalConfig;
use std::collections::BTreeSet;

/// Allow-list of filename suffixes
#[derive(Debug, Clone, Default)]
pub struct SuffixFilter {
    suffixes: BTreeSet<String>,
}

impl SuffixFilter {
    /// Creates a filter from suffixes written without the leading dot
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a filter from the configured `valid-suffixes`
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            suffixes: config.valid_suffixes.clone(),
        }
    }

    /// Returns true if `filename` ends in an allowed suffix
    ///
    /// The comparison is case-sensitive. A filename without any `.` is compared
    /// as a whole, which in practice means it is rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use edgar_getter::retrieval::SuffixFilter;
    ///
    /// let filter = SuffixFilter::new(["gz", "xls"]);
    /// assert!(filter.is_downloadable("testfile.gz"));
    /// assert!(!filter.is_downloadable("testfile.js"));
    /// ```
    pub fn is_downloadable(&self, filename: &str) -> bool {
        let suffix = filename.rsplit('.').next().unwrap_or(filename);
        self.suffixes.contains(suffix)
    }

    /// Allowed suffixes, in sorted order
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.suffixes.iter().map(String::as_str)
    }
}
