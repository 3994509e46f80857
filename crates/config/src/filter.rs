//! Include/exclude path predicates, plus the default notion of which files
//! count as uploadable assets and which as stylesheets.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use regex::RegexSet;

/// File extensions treated as uploadable assets when no include patterns
/// are configured.
const KNOWN_ASSET_EXTENSIONS: &[&str] = &[
    // images
    "apng", "png", "jpg", "jpeg", "jfif", "pjpeg", "pjp", "gif", "svg", "ico", "webp", "avif",
    // media
    "mp4", "webm", "ogg", "mp3", "wav", "flac", "aac", "opus",
    // fonts
    "woff", "woff2", "eot", "ttf", "otf",
    // other
    "webmanifest", "pdf", "txt",
];

const STYLESHEET_EXTENSIONS: &[&str] =
    &["css", "less", "sass", "scss", "styl", "stylus", "pcss", "postcss", "sss"];

fn extension_of(path: &str) -> Option<&str> {
    // A query/fragment suffix does not change the file type.
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = &path[..end];
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    name.rsplit_once('.').map(|(_, ext)| ext)
}

/// Whether a path points at a file type that is uploaded by default.
pub fn is_known_asset(path: &str) -> bool {
    extension_of(path).is_some_and(|ext| KNOWN_ASSET_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Whether a path points at a stylesheet (whose declarations are candidates
/// for URL rewriting).
pub fn is_stylesheet(path: &str) -> bool {
    extension_of(path).is_some_and(|ext| STYLESHEET_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Compiled include/exclude predicate over asset paths.
///
/// A path is accepted when it matches any include pattern (an empty include
/// list accepts everything) and no exclude pattern. Exclusion always wins.
#[derive(Debug, Default)]
pub struct Filter {
    include: Option<RegexSet>,
    exclude: Option<RegexSet>,
}

impl Filter {
    pub fn compile(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile_set(include)?,
            exclude: compile_set(exclude)?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        if let Some(exclude) = &self.exclude
            && exclude.is_match(path)
        {
            return false;
        }
        match &self.include {
            Some(include) => include.is_match(path),
            None => true,
        }
    }
}

fn compile_set(patterns: &[String]) -> Result<Option<RegexSet>> {
    match patterns.is_empty() {
        true => Ok(None),
        false => RegexSet::new(patterns).map(Some).or_raise(|| ErrorKind::Pattern(patterns.join(", "))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("anything/at/all.png", true)]
    #[case("", true)]
    fn test_default_accepts_everything(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(Filter::default().matches(path), expected);
    }

    #[rstest]
    #[case("img/photo.png", true)]
    #[case("img/photo.jpg", true)]
    #[case("fonts/face.woff2", false)]
    fn test_include_restricts(#[case] path: &str, #[case] expected: bool) {
        let filter = Filter::compile(&[r"\.(png|jpg)$".to_string()], &[]).unwrap();
        assert_eq!(filter.matches(path), expected);
    }

    #[rstest]
    #[case("img/photo.png", true)]
    #[case("node_modules/pkg/logo.png", false)]
    fn test_exclude_wins(#[case] path: &str, #[case] expected: bool) {
        let filter = Filter::compile(&[r"\.png$".to_string()], &["node_modules".to_string()]).unwrap();
        assert_eq!(filter.matches(path), expected);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = Filter::compile(&["(unclosed".to_string()], &[]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Pattern(_)));
    }

    #[rstest]
    #[case("img/logo.png", true)]
    #[case("img/logo.PNG", true)]
    #[case("img/logo.png?v=3", true)]
    #[case("fonts/face.woff2", true)]
    #[case("src/main.rs", false)]
    #[case("README", false)]
    fn test_is_known_asset(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_known_asset(path), expected);
    }

    #[rstest]
    #[case("styles/site.css", true)]
    #[case("styles/site.scss", true)]
    #[case("styles/site.css?inline", true)]
    #[case("img/logo.png", false)]
    fn test_is_stylesheet(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_stylesheet(path), expected);
    }
}
