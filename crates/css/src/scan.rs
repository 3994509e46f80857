//! Incremental token scanning for CSS declaration values.
//!
//! Rust's regex engine has no lookaround, so the token boundaries are
//! enforced by an explicit scanner instead: a `url(` occurrence only counts
//! as the CSS function when the preceding character is not an identifier
//! character, and `image-set(` argument lists are balanced by hand so that
//! nested function calls don't terminate the span early.

use memchr::memmem;

/// A located `url(...)` occurrence within a declaration value.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct UrlToken<'a> {
    /// The full matched token text, `url(` through the closing parenthesis.
    pub matched: &'a str,
    /// The inner reference, surrounding whitespace trimmed, quotes kept.
    pub raw_url: &'a str,
    /// Byte offset of the token within the scanned text.
    pub start: usize,
}

/// A located `image-set(...)` argument span within a declaration value.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ImageSetSpan<'a> {
    /// The argument text between the parentheses.
    pub inner: &'a str,
    /// Byte offset of the argument text within the scanned text.
    pub start: usize,
}

/// Identifier characters that disqualify a preceding position as a `url(`
/// token boundary, so that `my-url(` or `-moz-url(` never parse as the CSS
/// function. Word characters, `-`, and the BMP range above U+007F.
fn blocks_boundary(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || ('\u{0080}'..='\u{FFFF}').contains(&c)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Finds the first well-formed `url(...)` token in `value`.
///
/// A malformed occurrence (no closing parenthesis, unbalanced quote) is
/// stepped over and scanning continues behind it.
pub(crate) fn next_url_token(value: &str) -> Option<UrlToken<'_>> {
    let finder = memmem::Finder::new(b"url(");
    let mut from = 0;
    while let Some(pos) = finder.find(&value.as_bytes()[from..]) {
        let start = from + pos;
        from = start + "url(".len();
        if let Some(prev) = value[..start].chars().next_back()
            && blocks_boundary(prev)
        {
            continue;
        }
        if let Some((raw, end)) = url_body(value, start + "url(".len()) {
            return Some(UrlToken {
                matched: &value[start..end],
                raw_url: raw.trim(),
                start,
            });
        }
    }
    None
}

/// Parses the token body after `url(`: either an optionally-padded quoted
/// string or an unquoted run, terminated by `)`. Returns the inner capture
/// (whitespace padding included, trimmed by the caller) and the byte offset
/// one past the closing parenthesis.
fn url_body(value: &str, body: usize) -> Option<(&str, usize)> {
    let rest = &value[body..];
    let pad = rest.len() - rest.trim_start().len();
    let after_pad = &rest[pad..];
    if let Some(quote) = after_pad.chars().next().filter(|c| *c == '\'' || *c == '"') {
        // Quoted form: a non-empty quote-delimited string (no escape
        // processing), optional trailing whitespace, then `)`. A quote that
        // never closes into `)` cannot fall back to the unquoted form,
        // since quotes are excluded from it.
        let close = after_pad[1..].find(quote)?;
        if close == 0 {
            return None;
        }
        let quoted_end = pad + 1 + close + 1;
        let tail = &rest[quoted_end..];
        let tail_pad = tail.len() - tail.trim_start().len();
        if !tail[tail_pad..].starts_with(')') {
            return None;
        }
        let inner_end = quoted_end + tail_pad;
        return Some((&rest[..inner_end], body + inner_end + 1));
    }
    // Unquoted form: a non-empty run excluding quotes and `)`.
    let run = rest.find(['\'', '"', ')']).unwrap_or(rest.len());
    if run == 0 || !rest[run..].starts_with(')') {
        return None;
    }
    Some((&rest[..run], body + run + 1))
}

/// Finds the first `image-set(` argument span in `value`.
///
/// The prefixed vendor form (`-webkit-image-set(`) is matched as well.
pub(crate) fn next_image_set(value: &str) -> Option<ImageSetSpan<'_>> {
    let finder = memmem::Finder::new(b"image-set(");
    let mut from = 0;
    while let Some(pos) = finder.find(&value.as_bytes()[from..]) {
        let start = from + pos + "image-set(".len();
        from = start;
        if let Some(end) = image_set_end(value, start) {
            return Some(ImageSetSpan { inner: &value[start..end], start });
        }
    }
    None
}

/// Walks the argument list of an `image-set(`: a nested `ident(...)` call
/// swallows one `)`, and the span ends at the first unconsumed `)`. Returns
/// `None` when the list never closes.
fn image_set_end(value: &str, from: usize) -> Option<usize> {
    let bytes = value.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if let Some(next) = nested_call_end(bytes, i) {
            i = next;
            continue;
        }
        if bytes[i] == b')' {
            return Some(i);
        }
        // Byte-wise advance is safe: the only bytes inspected are ASCII,
        // which never occur inside a multi-byte UTF-8 sequence.
        i += 1;
    }
    None
}

/// Matches `ident(` at `i` (identifier of 1..=256 word/`-` characters)
/// followed by a closing `)`. Returns the offset one past that `)`.
fn nested_call_end(bytes: &[u8], i: usize) -> Option<usize> {
    let run = bytes[i..].iter().take_while(|b| is_ident_byte(**b)).count();
    if run == 0 || run > 256 || bytes.get(i + run) != Some(&b'(') {
        return None;
    }
    let close = memchr::memchr(b')', &bytes[i + run + 1..])?;
    Some(i + run + 1 + close + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("url(../a.png)", "url(../a.png)", "../a.png", 0)]
    #[case("no-repeat url(a.png) center", "url(a.png)", "a.png", 10)]
    #[case("url('a.png')", "url('a.png')", "'a.png'", 0)]
    #[case(r#"url( "a.png" )"#, r#"url( "a.png" )"#, r#""a.png""#, 0)]
    #[case("url( spaced.png )", "url( spaced.png )", "spaced.png", 0)]
    fn test_url_token_found(
        #[case] value: &str,
        #[case] matched: &str,
        #[case] raw_url: &str,
        #[case] start: usize,
    ) {
        let token = next_url_token(value).unwrap();
        assert_eq!(token.matched, matched);
        assert_eq!(token.raw_url, raw_url);
        assert_eq!(token.start, start);
    }

    #[rstest]
    #[case("color: red")]
    #[case("my-url(a.png)")]
    #[case("data-url(a.png)")]
    #[case("_url(a.png)")]
    #[case("éurl(a.png)")]
    #[case("url()")]
    #[case("url('')")]
    #[case("url('unterminated")]
    #[case("url(unterminated")]
    #[case(r#"url("a.png" extra)"#)]
    fn test_url_token_absent(#[case] value: &str) {
        assert_eq!(next_url_token(value), None);
    }

    #[test]
    fn test_url_token_skips_malformed_and_finds_later() {
        let token = next_url_token("url(bad'one) url(good.png)").unwrap();
        assert_eq!(token.raw_url, "good.png");
    }

    #[test]
    fn test_url_token_inner_function_stops_at_first_paren() {
        // The unquoted run ends at the first `)`; the trailing one is left
        // to the surrounding text.
        let token = next_url_token("url(var(--x))").unwrap();
        assert_eq!(token.matched, "url(var(--x)");
        assert_eq!(token.raw_url, "var(--x");
    }

    #[rstest]
    #[case(r#"image-set("a.png" 1x, "b.png" 2x)"#, r#""a.png" 1x, "b.png" 2x"#)]
    #[case("image-set(url(a.png) 1x)", "url(a.png) 1x")]
    #[case("-webkit-image-set(url(a.png) 1x)", "url(a.png) 1x")]
    #[case("image-set(linear-gradient(red, blue) 1x)", "linear-gradient(red, blue) 1x")]
    fn test_image_set_span(#[case] value: &str, #[case] inner: &str) {
        let span = next_image_set(value).unwrap();
        assert_eq!(span.inner, inner);
    }

    #[test]
    fn test_image_set_absent() {
        assert_eq!(next_image_set("background: url(a.png)"), None);
        assert_eq!(next_image_set("image-set(never closes"), None);
    }

    #[test]
    fn test_image_set_span_offset() {
        let value = "background: image-set(url(a.png) 1x)";
        let span = next_image_set(value).unwrap();
        assert_eq!(&value[span.start..span.start + span.inner.len()], span.inner);
    }
}
