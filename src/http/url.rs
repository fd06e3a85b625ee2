//! Absolute request URL, reconstructed from the `Host` header and request target.

use std::fmt;

use thiserror::Error;

/// Errors produced while building a [`Url`].
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("invalid URL {input:?}: {source}")]
    Invalid {
        input: String,
        #[source]
        source: ::url::ParseError,
    },
}

/// The absolute URL a request addressed.
///
/// # Examples
///
/// ```
/// use haven::http::Url;
///
/// let url = Url::parse("https://user:pw@example.com:8443/Docs/guide.html?lang=en#top").unwrap();
/// assert_eq!(url.host(), Some("example.com"));
/// assert_eq!(url.port(), Some(8443));
/// assert_eq!(url.path_segments(true), vec!["docs", "guide.html"]);
/// assert!(url.path_is_file());
/// assert_eq!(url.query_param("lang").as_deref(), Some("en"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    inner: ::url::Url,
}

impl Url {
    /// Parses an absolute URL string.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        ::url::Url::parse(input)
            .map(|inner| Self { inner })
            .map_err(|source| UrlError::Invalid {
                input: input.to_owned(),
                source,
            })
    }

    /// Builds the URL from a request's `Host` header value and origin-form target.
    ///
    /// Absolute-form targets (`http://...`) are parsed as-is.
    pub fn from_parts(scheme: &str, host: &str, target: &str) -> Result<Self, UrlError> {
        if target.contains("://") {
            return Self::parse(target);
        }
        let target = if target.starts_with('/') {
            target.to_owned()
        } else {
            format!("/{target}")
        };
        Self::parse(&format!("{scheme}://{host}{target}"))
    }

    pub fn scheme(&self) -> &str {
        self.inner.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.inner.host_str()
    }

    /// Returns the explicit port, or the scheme's well-known port.
    pub fn port(&self) -> Option<u16> {
        self.inner.port_or_known_default()
    }

    /// Returns the user name, or `None` when empty.
    pub fn user(&self) -> Option<&str> {
        Some(self.inner.username()).filter(|u| !u.is_empty())
    }

    pub fn password(&self) -> Option<&str> {
        self.inner.password()
    }

    pub fn path(&self) -> &str {
        self.inner.path()
    }

    /// Returns the non-empty path segments, optionally lowercased.
    pub fn path_segments(&self, lowercase: bool) -> Vec<String> {
        self.inner
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if lowercase {
                    s.to_lowercase()
                } else {
                    s.to_owned()
                }
            })
            .collect()
    }

    pub fn path_segments_count(&self) -> usize {
        self.path_segments(false).len()
    }

    /// `true` when the path addresses a directory (ends with `/`).
    pub fn path_is_directory(&self) -> bool {
        self.inner.path().ends_with('/')
    }

    /// `true` when the last path segment looks like a file name (contains a `.`).
    pub fn path_is_file(&self) -> bool {
        self.path_segments(false)
            .last()
            .is_some_and(|last| last.contains('.'))
    }

    /// Returns the raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.inner.query()
    }

    /// Returns the percent-decoded query pairs in order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.inner
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Returns the first decoded value for `key`.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.inner
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn fragment(&self) -> Option<&str> {
        self.inner.fragment()
    }

    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.inner.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_origin_form_target() {
        let url = Url::from_parts("http", "localhost:8080", "/a/b/?x=1&y=two%20words").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host(), Some("localhost"));
        assert_eq!(url.port(), Some(8080));
        assert_eq!(url.path(), "/a/b/");
        assert!(url.path_is_directory());
        assert!(!url.path_is_file());
        assert_eq!(url.path_segments_count(), 2);
        assert_eq!(url.query_param("y").as_deref(), Some("two words"));
    }

    #[test]
    fn default_port_and_credentials() {
        let url = Url::from_parts("http", "example.com", "/").unwrap();
        assert_eq!(url.port(), Some(80));
        assert_eq!(url.user(), None);
        assert_eq!(url.password(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn absolute_form_target() {
        let url = Url::from_parts("http", "ignored", "http://other.test/x").unwrap();
        assert_eq!(url.host(), Some("other.test"));
        assert_eq!(url.path(), "/x");
    }

    #[test]
    fn invalid_host_is_an_error() {
        assert!(Url::from_parts("http", "bad host", "/").is_err());
    }
}
