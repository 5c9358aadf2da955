//! Identifier normalization shared by all sources.

use regex::Regex;
use std::sync::OnceLock;

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

fn pdf_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4}\.\d{4,5})v\d+").expect("valid regex"))
}

fn doi_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"v\d+$").expect("valid regex"))
}

/// Strip URL/scheme prefixes from a DOI, leaving the bare `10.x/y` identifier.
///
/// Prefix matching ignores case; the identifier itself is returned as given.
pub fn normalize_doi(doi: &str) -> String {
    let trimmed = doi.trim();
    for prefix in DOI_PREFIXES {
        if trimmed.len() >= prefix.len()
            && trimmed.is_char_boundary(prefix.len())
            && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return trimmed[prefix.len()..].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Remove arXiv-style version suffixes (`2311.18356v2` -> `2311.18356`) from a URL
pub fn strip_pdf_version(url: &str) -> String {
    pdf_version_regex().replace_all(url, "$1").into_owned()
}

/// Remove a trailing preprint version (`...123456v3` -> `...123456`) from a DOI
pub fn strip_doi_version(doi: &str) -> String {
    doi_version_regex().replace(doi.trim(), "").into_owned()
}

/// Year from the leading `YYYY` of a provider date string
pub fn year_from_date(date: &str) -> Option<i32> {
    let date = date.trim();
    let head = date.get(..4)?;
    if !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if date.as_bytes().get(4).is_some_and(|b| b.is_ascii_digit()) {
        return None;
    }
    head.parse().ok()
}

/// Extract an arXiv identifier from an abs/pdf URL, dropping any version suffix
pub fn arxiv_id_from_url(url: &str) -> Option<String> {
    let tail = url
        .rsplit_once("/abs/")
        .or_else(|| url.rsplit_once("/pdf/"))
        .map(|(_, tail)| tail)?;
    let tail = tail.trim_end_matches(".pdf").trim_end_matches('/');
    if tail.is_empty() {
        return None;
    }
    let id = match tail.rfind('v') {
        Some(pos)
            if pos + 1 < tail.len() && tail[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &tail[..pos]
        }
        _ => tail,
    };
    Some(id.to_string())
}
