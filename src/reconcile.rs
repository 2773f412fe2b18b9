//! Text matching for bank-transfer reconciliation.
//!
//! Transfer descriptions are human-typed, so matching is a containment
//! heuristic over normalized text rather than a protocol. The matcher
//! reports every candidate hit so ambiguous notifications can be logged
//! and audited instead of silently resolved.

/// Lowercase and keep only ASCII alphanumerics. Applied to both the
/// notification content and each order code before comparison.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Indices of every candidate whose normalized code appears in the
/// normalized content. Empty codes never match.
pub fn matching_indices<'a, I>(content: &str, codes: I) -> Vec<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let haystack = normalize(content);
    codes
        .into_iter()
        .enumerate()
        .filter(|(_, code)| {
            let needle = normalize(code);
            !needle.is_empty() && haystack.contains(&needle)
        })
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(normalize("Chuyen tien DH-1001, thanks!"), "chuyentiendh1001thanks");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn code_embedded_in_free_text_matches() {
        let hits = matching_indices("chuyen tien DH1001 thanks", ["DH2002", "DH1001"]);
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn punctuation_inside_the_code_does_not_break_matching() {
        let hits = matching_indices("thanh toan don DH 10.01", ["DH1001"]);
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn unrelated_content_matches_nothing() {
        let hits = matching_indices("ung ho quy tu thien", ["DH1001", "DH2002"]);
        assert!(hits.is_empty());
    }

    #[test]
    fn substring_codes_can_both_hit() {
        // DH100 is a textual prefix of DH1001: both hit, caller logs the
        // ambiguity and takes the first.
        let hits = matching_indices("tt DH1001", ["DH100", "DH1001"]);
        assert_eq!(hits, vec![0, 1]);
    }
}
