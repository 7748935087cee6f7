use shared::domain::DrillKind;

use crate::normalize::InputNormalizer;

/// Lower-cased, trimmed form of a submission. Word drills additionally go
/// through the phonetic normalizer.
pub fn normalize_submission(
    submitted: &str,
    kind: DrillKind,
    normalizer: &dyn InputNormalizer,
) -> String {
    let cleaned = submitted.trim().to_lowercase();
    match kind {
        DrillKind::Meaning => cleaned,
        DrillKind::Word => normalizer.normalize(&cleaned).trim().to_string(),
    }
}

/// Iterates the alternatives of a comma-separated accepted-answer string.
pub fn accepted_alternatives(accepted: &str) -> impl Iterator<Item = String> + '_ {
    accepted
        .split(',')
        .map(|alt| alt.trim().to_lowercase())
        .filter(|alt| !alt.is_empty())
}

/// True iff the normalized submission equals one of the accepted alternatives.
///
/// Blank submissions never match; the session controller filters them out before
/// they get here.
pub fn matches(
    submitted: &str,
    accepted: &str,
    kind: DrillKind,
    normalizer: &dyn InputNormalizer,
) -> bool {
    if submitted.trim().is_empty() {
        return false;
    }
    let candidate = normalize_submission(submitted, kind, normalizer);
    accepted_alternatives(accepted).any(|alt| alt == candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{PassthroughNormalizer, WanaKanaNormalizer};

    #[test]
    fn comma_split_is_case_and_space_insensitive() {
        assert!(matches("b", "a, B ,c", DrillKind::Meaning, &PassthroughNormalizer));
        assert!(matches("  A ", "a, B ,c", DrillKind::Meaning, &PassthroughNormalizer));
        assert!(!matches("d", "a, B ,c", DrillKind::Meaning, &PassthroughNormalizer));
    }

    #[test]
    fn requires_exact_alternative_not_substring() {
        assert!(!matches("blac", "black", DrillKind::Meaning, &PassthroughNormalizer));
        assert!(!matches("black dog", "black", DrillKind::Meaning, &PassthroughNormalizer));
    }

    #[test]
    fn blank_submission_never_matches() {
        assert!(!matches("   ", "a,,b", DrillKind::Meaning, &PassthroughNormalizer));
        assert!(!matches("", "", DrillKind::Meaning, &PassthroughNormalizer));
    }

    #[test]
    fn word_drills_accept_romaji() {
        assert!(matches("kuroi", "くろい", DrillKind::Word, &WanaKanaNormalizer));
        assert!(matches("Kuro ", "くろ, こく", DrillKind::Word, &WanaKanaNormalizer));
        assert!(matches("こく", "くろ, こく", DrillKind::Word, &WanaKanaNormalizer));
    }

    #[test]
    fn meaning_drills_skip_phonetic_conversion() {
        // "ka" would become "か" if converted.
        assert!(matches("ka", "ka", DrillKind::Meaning, &WanaKanaNormalizer));
    }
}
