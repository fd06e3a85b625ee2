//! Content-negotiation predicates shared by the default [`Route`](super::Route) checks.
//!
//! Each function answers one question about a request's `Accept*` / `Content-*`
//! headers against what a route can produce or consume. Entries a client
//! refused with `q=0` never count as a match.

use crate::config::Settings;
use crate::http::HeaderItem;
use crate::http::request::SUPPORTED_ENCODINGS;

/// `true` when `range` (`*/*`, `type/*`, `type/subtype`) covers `media_type`.
///
/// Parameters on either side are ignored; comparison is case-insensitive.
pub fn media_matches(range: &str, media_type: &str) -> bool {
    let range = essence(range);
    let media_type = essence(media_type);
    if range == "*/*" || range == "*" {
        return true;
    }
    match (range.split_once('/'), media_type.split_once('/')) {
        (Some((rt, "*")), Some((mt, _))) => rt.eq_ignore_ascii_case(mt),
        (Some(_), Some(_)) => range.eq_ignore_ascii_case(media_type),
        _ => false,
    }
}

/// `Accept` check: some acceptable media range matches a produced type.
/// A route producing nothing in particular accepts everything.
pub fn accepts_media(accept: &[HeaderItem], produces: &[String]) -> bool {
    if produces.is_empty() {
        return true;
    }
    accept
        .iter()
        .filter(|item| item.is_acceptable() && !item.value().is_empty())
        .any(|item| produces.iter().any(|p| media_matches(item.value(), p)))
}

/// `Accept-Charset` check against the application's supported charsets.
pub fn accepts_charset(accept_charset: &[HeaderItem], settings: &Settings) -> bool {
    if accept_charset.is_empty() {
        return true;
    }
    accept_charset
        .iter()
        .filter(|item| item.is_acceptable())
        .any(|item| item.value() == "*" || settings.supports_charset(item.value()))
}

/// `Accept-Encoding` check.
///
/// `identity` stays acceptable unless refused with `identity;q=0`, or with
/// `*;q=0` when `identity` is not listed. Otherwise some acceptable entry must
/// be `*`, `identity`, one of [`SUPPORTED_ENCODINGS`], or one of the route's
/// extra `available` codings.
pub fn accepts_encoding(accept_encoding: &[HeaderItem], available: &[String]) -> bool {
    if accept_encoding.is_empty() {
        return true;
    }
    let find = |name: &str| {
        accept_encoding
            .iter()
            .find(|item| item.value().eq_ignore_ascii_case(name))
    };
    let identity_ok = find("identity")
        .or_else(|| find("*"))
        .is_none_or(HeaderItem::is_acceptable);

    identity_ok
        || accept_encoding
            .iter()
            .filter(|item| item.is_acceptable())
            .any(|item| {
                let coding = item.value();
                coding == "*"
                    || coding.eq_ignore_ascii_case("identity")
                    || SUPPORTED_ENCODINGS.iter().any(|e| e.eq_ignore_ascii_case(coding))
                    || available.iter().any(|a| a.eq_ignore_ascii_case(coding))
            })
}

/// `Accept-Language` check: a listed range equals an available tag or its primary subtag.
pub fn accepts_language(accept_language: &[HeaderItem], available: &[String]) -> bool {
    if accept_language.is_empty() || available.is_empty() {
        return true;
    }
    accept_language
        .iter()
        .filter(|item| item.is_acceptable())
        .any(|item| {
            let range = item.value();
            range == "*"
                || available.iter().any(|tag| {
                    tag.eq_ignore_ascii_case(range)
                        || tag
                            .split('-')
                            .next()
                            .is_some_and(|primary| primary.eq_ignore_ascii_case(range))
                })
        })
}

/// `Content-Encoding` check: the body is unencoded or in a coding we can decode.
pub fn content_encoding_supported(content_encoding: &str) -> bool {
    content_encoding.is_empty()
        || content_encoding.eq_ignore_ascii_case("identity")
        || SUPPORTED_ENCODINGS
            .iter()
            .any(|e| e.eq_ignore_ascii_case(content_encoding))
}

/// `Content-Type` check: a request without a declared body type always passes.
pub fn content_type_supported(content_type: &str, consumes: &[String]) -> bool {
    consumes.is_empty()
        || content_type.is_empty()
        || consumes.iter().any(|range| media_matches(range, content_type))
}

fn essence(media: &str) -> &str {
    media.split(';').next().unwrap_or_default().trim()
}
