//! URI helpers for edgar-getter
//!
//! Resource URIs are handled mostly as plain strings: the filename of a resource is
//! its last `/`-delimited segment, and a source URI "looks like a file" when that
//! segment contains a dot. Joining discovered hrefs onto an index page URI is
//! delegated to a [`LinkJoin`] strategy.

mod join;

pub use join::LinkJoin;

/// Returns the last `/`-delimited segment of a URI
///
/// The segment is taken from the raw string, so a trailing slash yields an empty
/// segment and query strings are kept as part of the segment.
///
/// # Examples
///
/// ```
/// use edgar_getter::url::last_segment;
///
/// assert_eq!(last_segment("https://host/path/file.tar.gz"), "file.tar.gz");
/// assert_eq!(last_segment("https://host/path/"), "");
/// assert_eq!(last_segment("file.gz"), "file.gz");
/// ```
pub fn last_segment(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

/// Returns true if the source URI points directly at a single resource
///
/// A URI whose last segment contains a `.` is treated as a filename. Note that a
/// bare host such as `https://www.sec.gov` also matches.
pub fn looks_like_file(uri: &str) -> bool {
    last_segment(uri).contains('.')
}
