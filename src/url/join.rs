use crate::{UrlError, UrlResult};
use serde::Deserialize;
use url::Url;

/// Strategy for turning an href found on an index page into a fetchable URI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkJoin {
    /// Plain string concatenation `base + href`
    ///
    /// No `../` handling and no scheme/host merging: an absolute href ends up
    /// appended to the base verbatim.
    #[default]
    Concat,

    /// RFC 3986 reference resolution via [`Url::join`]
    Resolve,
}

impl LinkJoin {
    /// Joins `href` onto `base` according to the strategy
    ///
    /// # Examples
    ///
    /// ```
    /// use edgar_getter::url::LinkJoin;
    ///
    /// let base = "https://host/feed/";
    /// assert_eq!(LinkJoin::Concat.join(base, "a.gz").unwrap(), "https://host/feed/a.gz");
    /// assert_eq!(LinkJoin::Resolve.join(base, "../b.gz").unwrap(), "https://host/b.gz");
    /// ```
    pub fn join(&self, base: &str, href: &str) -> UrlResult<String> {
        match self {
            Self::Concat => Ok(format!("{}{}", base, href)),
            Self::Resolve => {
                let base_url = Url::parse(base)
                    .map_err(|e| UrlError::Parse(format!("{}: {}", base, e)))?;
                base_url
                    .join(href)
                    .map(String::from)
                    .map_err(|e| UrlError::Join {
                        base: base.to_string(),
                        href: href.to_string(),
                        message: e.to_string(),
                    })
            }
        }
    }
}
