//! DOI normalization helpers.
//!
//! DOIs arrive either bare (`10.1017/S0272263119000123`) or as resolver URLs
//! (`https://doi.org/10.1017/...`). Records always store the bare form, and
//! comparisons across sources go through [`doi_key`].

/// Resolver prefix used when building links from a DOI.
pub const DOI_RESOLVER: &str = "https://doi.org/";

/// Prefixes stripped from incoming DOIs, longest first.
const DOI_PREFIXES: &[&str] = &[
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "https://doi.org/",
    "http://doi.org/",
];

/// Strip a resolver prefix and surrounding whitespace from a DOI.
pub fn normalize_doi(raw: &str) -> String {
    let trimmed = raw.trim();
    DOI_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Case-insensitive comparison key. `None` for an empty DOI, which never
/// matches anything.
pub fn doi_key(doi: &str) -> Option<String> {
    let doi = normalize_doi(doi);
    if doi.is_empty() {
        None
    } else {
        Some(doi.to_lowercase())
    }
}

/// `https://doi.org/<doi>`, or empty when there is no DOI.
pub fn doi_link(doi: &str) -> String {
    let doi = normalize_doi(doi);
    if doi.is_empty() {
        String::new()
    } else {
        format!("{}{}", DOI_RESOLVER, doi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi_strips_prefix() {
        assert_eq!(normalize_doi("https://doi.org/10.1/abc"), "10.1/abc");
        assert_eq!(normalize_doi("http://dx.doi.org/10.1/abc"), "10.1/abc");
        assert_eq!(normalize_doi("  10.1/abc "), "10.1/abc");
        assert_eq!(normalize_doi(""), "");
    }

    #[test]
    fn test_doi_key_is_case_insensitive() {
        assert_eq!(doi_key("10.1/X"), doi_key("https://doi.org/10.1/x"));
        assert_eq!(doi_key("   "), None);
    }

    #[test]
    fn test_doi_link() {
        assert_eq!(doi_link("10.1/abc"), "https://doi.org/10.1/abc");
        assert_eq!(doi_link("https://doi.org/10.1/abc"), "https://doi.org/10.1/abc");
        assert_eq!(doi_link(""), "");
    }
}
