//! Title and artist normalization for cross-catalog matching.

use once_cell::sync::Lazy;
use regex::Regex;

static BRACKETED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*\)|\[[^\[\]]*\]|\{[^{}]*\}").expect("bracket pattern is valid")
});

static FEATURING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+(feat\.?|ft\.?|featuring)\s.*$").expect("featuring pattern is valid")
});

static DASH_QUALIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\s+[-\u{2013}\u{2014}]\s+.*\b",
        r"(remaster|remastered|live|remix|mix|version|edit|",
        r"mono|stereo|acoustic|demo|single|radio)\b.*$",
    ))
    .expect("qualifier pattern is valid")
});

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_once(s: &str) -> String {
    let mut out = s.to_string();
    // Innermost groups first, until no bracket pair is left.
    loop {
        let next = BRACKETED.replace_all(&out, " ").into_owned();
        if next == out {
            break;
        }
        out = next;
    }
    out = FEATURING.replace(&out, "").into_owned();
    out = DASH_QUALIFIER.replace(&out, "").into_owned();
    collapse_whitespace(&out)
}

/// Normalize a title for comparison.
///
/// Lower-cases, removes bracketed and parenthetical segments, drops
/// `feat.`/`ft.`/`featuring` tails and dash-separated version qualifiers
/// (`- Remastered 2011`, `- Live`), and collapses whitespace. A title that
/// would normalize to nothing keeps its lower-cased form. Idempotent.
pub fn normalize_title(title: &str) -> String {
    let base = collapse_whitespace(&title.to_lowercase());
    let mut current = base.clone();
    loop {
        let next = strip_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    if current.is_empty() {
        base
    } else {
        current
    }
}

/// Normalize an artist name: lower-case and collapsed whitespace only.
pub fn normalize_artist(name: &str) -> String {
    collapse_whitespace(&name.to_lowercase())
}
