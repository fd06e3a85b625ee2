//! Structured parsing of simple list-valued header fields.
//!
//! Handles the `Accept*` / `Content-*` family: comma-separated items, each with
//! optional `;`-separated `key=value` parameters. Quoted strings (single or
//! double quotes) may contain either separator. Cookies, user agents and other
//! free-form fields are out of scope.
//!
//! ```text
//! Accept: text/html;level=1;q=0.7, application/json, */*;q=0.1
//!         └── item ──────────────┘  └── item ───────┘  └ item ┘
//! ```

/// One comma-separated entry of a header value: its bare value plus parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderItem {
    value: String,
    params: Vec<(String, String)>,
}

impl HeaderItem {
    /// Creates an item with no parameters.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            params: Vec::new(),
        }
    }

    /// Returns the bare value, e.g. `text/html`. Empty when the entry only had parameters.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the parameter named `name` (case-insensitive).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns all parameters in declaration order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the `q` weight, clamped to `0.0..=1.0`. Missing or malformed weights count as `1.0`.
    pub fn quality(&self) -> f32 {
        self.param("q")
            .and_then(|q| q.parse::<f32>().ok())
            .filter(|q| q.is_finite())
            .map(|q| q.clamp(0.0, 1.0))
            .unwrap_or(1.0)
    }

    /// `true` unless the client explicitly refused this entry with `q=0`.
    pub fn is_acceptable(&self) -> bool {
        self.quality() > 0.0
    }
}

/// A parsed header value.
///
/// # Examples
///
/// ```
/// use haven::http::HeaderValue;
///
/// let parsed = HeaderValue::parse(r#"text/html; charset="ISO-8859-4""#);
/// assert_eq!(parsed.values(), vec!["text/html"]);
/// assert_eq!(parsed.param("CHARSET"), Some("ISO-8859-4"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderValue {
    items: Vec<HeaderItem>,
}

impl HeaderValue {
    /// Parses `raw` into items. Malformed fragments are dropped rather than rejected.
    pub fn parse(raw: &str) -> Self {
        let mut items = Vec::new();

        for group in split_unquoted(raw, ',') {
            let mut current: Option<HeaderItem> = None;
            let mut pending_params = Vec::new();

            for part in split_unquoted(&group, ';') {
                let (key, value) = split_param(&part);
                let value = unquote(value);
                if value.is_empty() {
                    continue;
                }
                match key {
                    Some(key) => match current.as_mut() {
                        Some(item) => item.params.push((key.to_owned(), value.to_owned())),
                        None => pending_params.push((key.to_owned(), value.to_owned())),
                    },
                    None => {
                        if let Some(done) = current.take() {
                            items.push(done);
                        }
                        let mut item = HeaderItem::new(value);
                        item.params.append(&mut pending_params);
                        current = Some(item);
                    }
                }
            }

            match current {
                Some(item) => items.push(item),
                None if !pending_params.is_empty() => items.push(HeaderItem {
                    value: String::new(),
                    params: pending_params,
                }),
                None => {}
            }
        }

        Self { items }
    }

    /// Returns every parsed item in order.
    pub fn items(&self) -> &[HeaderItem] {
        &self.items
    }

    /// Consumes the parser and returns its items.
    pub fn into_items(self) -> Vec<HeaderItem> {
        self.items
    }

    /// Returns only the bare values, in order.
    pub fn values(&self) -> Vec<&str> {
        self.items
            .iter()
            .map(HeaderItem::value)
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Returns the first parameter named `name` across all items.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.items.iter().find_map(|item| item.param(name))
    }

    /// `true` when nothing usable was parsed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// Splits on `separator` outside of quotes, trimming each piece and skipping
// empty ones. An unterminated quote discards the trailing piece.
fn split_unquoted(raw: &str, separator: char) -> Vec<String> {
    let mut groups = Vec::new();
    let mut group = String::new();
    let mut open_quote: Option<char> = None;

    for ch in raw.chars() {
        match ch {
            '"' | '\'' => {
                match open_quote {
                    Some(q) if q == ch => open_quote = None,
                    None => open_quote = Some(ch),
                    Some(_) => {}
                }
                group.push(ch);
            }
            c if c == separator && open_quote.is_none() => {
                let trimmed = group.trim();
                if !trimmed.is_empty() {
                    groups.push(trimmed.to_owned());
                }
                group.clear();
            }
            c => group.push(c),
        }
    }

    if open_quote.is_none() {
        let trimmed = group.trim();
        if !trimmed.is_empty() {
            groups.push(trimmed.to_owned());
        }
    }

    groups
}

// A part is a parameter only when its `=` precedes any quote character.
fn split_param(part: &str) -> (Option<&str>, &str) {
    let Some(eq) = part.find('=') else {
        return (None, part);
    };
    let first_quote = part.find(['"', '\'']);
    match first_quote {
        Some(q) if eq > q => (None, part),
        _ => (Some(part[..eq].trim()), part[eq + 1..].trim()),
    }
}

fn unquote(value: &str) -> &str {
    if value.len() > 1 {
        for quote in ['"', '\''] {
            if value.starts_with(quote) && value.ends_with(quote) {
                return &value[1..value.len() - 1];
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_with_weights() {
        let parsed = HeaderValue::parse("audio/*; q=0.2, audio/basic");
        assert_eq!(parsed.values(), vec!["audio/*", "audio/basic"]);
        let items = parsed.items();
        assert_eq!(items[0].quality(), 0.2);
        assert_eq!(items[1].quality(), 1.0);
    }

    #[test]
    fn quoted_separators_are_literal() {
        let parsed = HeaderValue::parse(r#"multipart/form-data; boundary="a,b;c""#);
        assert_eq!(parsed.values(), vec!["multipart/form-data"]);
        assert_eq!(parsed.param("boundary"), Some("a,b;c"));
    }

    #[test]
    fn single_quotes_are_stripped() {
        let parsed = HeaderValue::parse("text/plain; charset='utf-8'");
        assert_eq!(parsed.param("charset"), Some("utf-8"));
    }

    #[test]
    fn unterminated_quote_drops_trailing_group() {
        let parsed = HeaderValue::parse(r#"gzip, br; x="oops"#);
        assert_eq!(parsed.values(), vec!["gzip"]);
    }

    #[test]
    fn empty_fragments_are_skipped() {
        let parsed = HeaderValue::parse(" , en ,, da ;");
        assert_eq!(parsed.values(), vec!["en", "da"]);
        assert!(HeaderValue::parse("  ").is_empty());
    }

    #[test]
    fn equals_after_quote_is_a_bare_value() {
        let parsed = HeaderValue::parse(r#""a=b""#);
        assert_eq!(parsed.values(), vec!["a=b"]);
    }

    #[test]
    fn quality_edge_cases() {
        let parsed = HeaderValue::parse("gzip;q=0, br;q=7, deflate;q=abc");
        let q: Vec<f32> = parsed.items().iter().map(HeaderItem::quality).collect();
        assert_eq!(q, vec![0.0, 1.0, 1.0]);
        assert!(!parsed.items()[0].is_acceptable());
    }

    #[test]
    fn missing_param_is_none() {
        let parsed = HeaderValue::parse("text/html");
        assert_eq!(parsed.param("charset"), None);
    }
}
