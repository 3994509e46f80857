//! Splitting and reassembly of `image-set(...)` candidate lists.
//!
//! A candidate list is comma-separated, but commas also occur inside nested
//! function calls (`url(data:...)`, `linear-gradient(red, blue)`), quoted
//! strings, and bare data URIs. Those spans are masked with blank filler of
//! identical length in a scratch copy, the commas are located in the masked
//! copy, and the *original* text is sliced at the same offsets — exact
//! original content survives, internal commas included.

use crate::error::Result;
use crate::replace::{UrlReplacer, do_url_replace, rewrite_css_urls};
use crate::scan;
use futures::future::try_join_all;
use std::path::Path;

/// One URL+descriptor pair of a candidate list. The descriptor (density or
/// width token, or anything else trailing the URL) is opaque and preserved
/// verbatim.
#[derive(Debug, PartialEq, Eq)]
struct Candidate {
    url: String,
    descriptor: String,
}

/// Image functions whose candidates are never rewritten.
const UNPROCESSED_FNS: [&str; 4] = ["gradient(", "element(", "cross-fade(", "image("];

/// Rewrites each candidate's URL and rejoins the list.
///
/// Candidates resolve concurrently; the output order is the original
/// left-to-right order regardless of resolution timing.
pub(crate) async fn rewrite_candidates(
    inner: &str,
    importer: Option<&Path>,
    replacer: &dyn UrlReplacer,
) -> Result<String> {
    let candidates = split_candidates(inner);
    let urls = try_join_all(
        candidates.iter().map(|candidate| rewrite_candidate_url(&candidate.url, importer, replacer)),
    )
    .await?;
    Ok(urls
        .iter()
        .zip(candidates.iter())
        .map(|(url, candidate)| format!("{url} {}", candidate.descriptor))
        .collect::<Vec<_>>()
        .join(", "))
}

async fn rewrite_candidate_url(url: &str, importer: Option<&Path>, replacer: &dyn UrlReplacer) -> Result<String> {
    // A candidate may itself be a `url(...)` token.
    if scan::next_url_token(url).is_some() {
        return rewrite_css_urls(url, importer, replacer).await;
    }
    if !UNPROCESSED_FNS.iter().any(|name| url.contains(name)) {
        return do_url_replace(url, url, importer, replacer).await;
    }
    Ok(url.to_string())
}

/// Splits a candidate list and parses each part into URL + descriptor.
/// Parts with an empty URL token are dropped entirely.
fn split_candidates(inner: &str) -> Vec<Candidate> {
    split_top_level(inner)
        .into_iter()
        .filter_map(|part| {
            let collapsed = collapse_escaped_spaces(part);
            let src = collapsed.trim();
            let url = leading_url_token(src);
            if url.is_empty() {
                return None;
            }
            Some(Candidate {
                descriptor: src[url.len()..].trim().to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

/// Splits at top-level commas only: commas are located in a masked copy,
/// the original is sliced at the same offsets.
fn split_top_level(inner: &str) -> Vec<&str> {
    let masked = mask_opaque_spans(inner.as_bytes());
    let mut parts = Vec::new();
    let mut start = 0;
    loop {
        match memchr::memchr(b',', &masked[start..]) {
            Some(comma) => {
                parts.push(&inner[start..start + comma]);
                start += comma + 1;
            },
            None => {
                parts.push(&inner[start..]);
                break;
            },
        }
    }
    parts
}

/// Blanks every span a comma could legally hide in: `url`/`image`/
/// `gradient`/`cross-fade` calls (substring match, so `linear-gradient(`
/// masks too), quoted strings with escaped-quote awareness, and bare
/// base64 data URIs.
fn mask_opaque_spans(bytes: &[u8]) -> Vec<u8> {
    let mut masked = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        let span = masked_call_len(&bytes[i..])
            .or_else(|| quoted_len(&bytes[i..], b'"'))
            .or_else(|| quoted_len(&bytes[i..], b'\''))
            .or_else(|| data_uri_len(&bytes[i..]));
        match span {
            Some(len) => {
                masked[i..i + len].fill(b' ');
                i += len;
            },
            None => i += 1,
        }
    }
    masked
}

/// `url(`/`image(`/`gradient(`/`cross-fade(` through the next `)`.
fn masked_call_len(bytes: &[u8]) -> Option<usize> {
    let name_len = [&b"url("[..], &b"image("[..], &b"gradient("[..], &b"cross-fade("[..]]
        .into_iter()
        .find(|name| bytes.starts_with(name))?
        .len();
    let close = memchr::memchr(b')', &bytes[name_len..])?;
    Some(name_len + close + 1)
}

/// A `quote`-delimited string where a backslash-escaped quote continues the
/// string.
fn quoted_len(bytes: &[u8], quote: u8) -> Option<usize> {
    if bytes.first() != Some(&quote) {
        return None;
    }
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == quote && bytes[i - 1] != b'\\' {
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// A bare `data:<type>/<subtype>;base64,<payload>` run.
fn data_uri_len(bytes: &[u8]) -> Option<usize> {
    let mut i = bytes.strip_prefix(b"data:").map(|_| "data:".len())?;
    let mime = bytes[i..].iter().take_while(|b| b.is_ascii_alphanumeric() || **b == b'_').count();
    if mime == 0 || bytes.get(i + mime) != Some(&b'/') {
        return None;
    }
    i += mime + 1;
    let subtype = bytes[i..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(**b, b'_' | b'.' | b'+' | b'-'))
        .count();
    if subtype == 0 || !bytes[i + subtype..].starts_with(b";base64,") {
        return None;
    }
    i += subtype + ";base64,".len();
    let payload = bytes[i..].iter().take_while(|b| b.is_ascii_alphanumeric() || matches!(**b, b'_' | b'+' | b'/' | b'=')).count();
    match payload {
        0 => None,
        _ => Some(i + payload),
    }
}

/// Collapses runs of candidate-separator escapes (a space, or the literal
/// two-character sequences `\t` `\n` `\f` `\r`) into a single space.
fn collapse_escaped_spaces(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(c) = rest.chars().next() {
        if let Some(len) = space_unit_len(rest) {
            rest = &rest[len..];
            while let Some(more) = space_unit_len(rest) {
                rest = &rest[more..];
            }
            out.push(' ');
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

fn space_unit_len(s: &str) -> Option<usize> {
    if s.starts_with(' ') {
        Some(1)
    } else if ["\\t", "\\n", "\\f", "\\r"].iter().any(|esc| s.starts_with(esc)) {
        Some(2)
    } else {
        None
    }
}

/// The leading URL token of a candidate: a function call (lazily to its
/// first `)`), a quoted string, or a bare run up to the next whitespace —
/// possibly empty.
fn leading_url_token(src: &str) -> &str {
    let bytes = src.as_bytes();
    let ident = bytes.iter().take_while(|b| b.is_ascii_alphanumeric() || matches!(**b, b'_' | b'-')).count();
    if ident > 0
        && bytes.get(ident) == Some(&b'(')
        && let Some(close) = memchr::memchr(b')', &bytes[ident + 1..])
    {
        return &src[..ident + 1 + close + 1];
    }
    if let Some(quote) = src.chars().next().filter(|c| *c == '\'' || *c == '"')
        && let Some(close) = src[1..].find(quote)
    {
        return &src[..close + 2];
    }
    let end = src.find(char::is_whitespace).unwrap_or(src.len());
    &src[..end]
}
