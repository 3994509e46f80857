//! Asynchronous, order-preserving replacement of CSS asset references.
//!
//! The rewriters walk a declaration value token by token: the untouched
//! prefix before each token is copied through byte-for-byte, the token's
//! inner reference is handed to the [`UrlReplacer`], and the result is
//! requoted to stay valid CSS. Replacement calls for the candidates of an
//! `image-set(` list run concurrently, but the reassembled text always
//! preserves the original left-to-right order.

use crate::error::Result;
use crate::scan;
use crate::srcset;
use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::path::Path;

/// Resolves one raw CSS reference into its final URL.
///
/// `importer` identifies the stylesheet the declaration came from, when the
/// build pipeline knows it. Implementations typically resolve the reference
/// against the importer, schedule an upload, and return the remote URL.
#[async_trait]
pub trait UrlReplacer: Send + Sync {
    async fn replace(&self, url: &str, importer: Option<&Path>) -> Result<String>;
}

/// Rewrites every replaceable asset reference in one declaration value.
///
/// A value containing an `image-set(` list is processed per candidate
/// (nested `url(...)` tokens included); otherwise every `url(...)` token is
/// processed directly. A value containing neither comes back unchanged.
pub async fn rewrite_declaration(
    value: &str,
    importer: Option<&Path>,
    replacer: &dyn UrlReplacer,
) -> Result<String> {
    if scan::next_image_set(value).is_some() {
        rewrite_image_set(value, importer, replacer).await
    } else if scan::next_url_token(value).is_some() {
        rewrite_css_urls(value, importer, replacer).await
    } else {
        Ok(value.to_string())
    }
}

/// Rewrites every well-formed `url(...)` token in `value`.
///
/// Text outside the tokens is reproduced exactly; a replacement failure
/// fails this value only.
pub async fn rewrite_css_urls(
    value: &str,
    importer: Option<&Path>,
    replacer: &dyn UrlReplacer,
) -> Result<String> {
    let mut remaining = value;
    let mut rewritten = String::with_capacity(value.len());
    while let Some(token) = scan::next_url_token(remaining) {
        rewritten.push_str(&remaining[..token.start]);
        rewritten.push_str(&do_url_replace(token.raw_url, token.matched, importer, replacer).await?);
        remaining = &remaining[token.start + token.matched.len()..];
    }
    rewritten.push_str(remaining);
    Ok(rewritten)
}

/// Rewrites every `image-set(...)` argument list in `value`, candidate by
/// candidate.
pub async fn rewrite_image_set(
    value: &str,
    importer: Option<&Path>,
    replacer: &dyn UrlReplacer,
) -> Result<String> {
    let mut remaining = value;
    let mut rewritten = String::with_capacity(value.len());
    while let Some(span) = scan::next_image_set(remaining) {
        rewritten.push_str(&remaining[..span.start]);
        rewritten.push_str(&srcset::rewrite_candidates(span.inner, importer, replacer).await?);
        remaining = &remaining[span.start + span.inner.len()..];
    }
    rewritten.push_str(remaining);
    Ok(rewritten)
}

/// References that must never be rewritten: already-absolute URLs, inline
/// data, fragment references, and other CSS function calls.
fn should_skip(raw_url: &str) -> bool {
    is_external(raw_url) || is_data_url(raw_url) || raw_url.starts_with('#') || is_function_call(raw_url)
}

fn is_external(url: &str) -> bool {
    let rest = url.strip_prefix("https:").or_else(|| url.strip_prefix("http:")).unwrap_or(url);
    rest.starts_with("//")
}

fn is_data_url(url: &str) -> bool {
    let trimmed = url.trim_start();
    trimmed.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

fn is_function_call(url: &str) -> bool {
    let bytes = url.as_bytes();
    if !bytes.first().is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') {
        return false;
    }
    let run = bytes[1..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_' || **b == b'-')
        .count();
    bytes.get(1 + run) == Some(&b'(')
}

/// Byte set that ECMAScript's `encodeURI` percent-escapes. A URL equal to
/// its encoded form is safe to emit unquoted inside `url()`.
const ENCODE_URI: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

fn differs_from_encoded(url: &str) -> bool {
    utf8_percent_encode(url, ENCODE_URI).to_string() != url
}

fn escape_unescaped_double_quotes(url: &str) -> String {
    let mut out = String::with_capacity(url.len() + 2);
    let mut prev_backslash = false;
    for c in url.chars() {
        if c == '"' && !prev_backslash {
            out.push('\\');
        }
        prev_backslash = c == '\\';
        out.push(c);
    }
    out
}

/// Replaces one reference and requotes the result as a `url(...)` token.
///
/// `matched` is returned untouched for the skip cases, so malformed or
/// non-rewritable tokens round-trip exactly. Quoting rules:
/// an unquoted result that would need percent-escaping gains double quotes;
/// a single-quoted result containing `'` switches to double quotes; double
/// quotes inside a double-quoted result are backslash-escaped.
pub(crate) async fn do_url_replace(
    raw_url: &str,
    matched: &str,
    importer: Option<&Path>,
    replacer: &dyn UrlReplacer,
) -> Result<String> {
    let mut wrap = None;
    let mut url = raw_url;
    if let Some(first) = url.chars().next().filter(|c| *c == '"' || *c == '\'') {
        wrap = Some(first);
        url = &url[first.len_utf8()..];
        if let Some((last, _)) = url.char_indices().next_back() {
            url = &url[..last];
        }
    }

    if should_skip(url) {
        return Ok(matched.to_string());
    }

    let mut new_url = replacer.replace(url, importer).await?;
    // The new url might need wrapping even if the original did not have it,
    // e.g. if a space was added during replacement.
    if wrap.is_none() && differs_from_encoded(&new_url) {
        wrap = Some('"');
    }
    // Give preference to double quotes since SVG inlining converts double
    // quotes to single quotes.
    if wrap == Some('\'') && new_url.contains('\'') {
        wrap = Some('"');
    }
    if wrap == Some('"') && new_url.contains('"') {
        new_url = escape_unescaped_double_quotes(&new_url);
    }
    match wrap {
        Some(quote) => Ok(format!("url({quote}{new_url}{quote})")),
        None => Ok(format!("url({new_url})")),
    }
}
