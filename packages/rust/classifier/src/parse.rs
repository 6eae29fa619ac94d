//! Tagged classifier results.
//!
//! Raw classifier text is converted exactly once, here, into either a
//! validated value or a failure variant. Failure variants keep the raw answer
//! for logging and collapse to the operation's sentinel.

use std::sync::LazyLock;

use budgetlens_shared::{SCORE_RANGE, UNKNOWN_FUNDING_SOURCE, UNKNOWN_SCORE};
use regex::Regex;

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

static CODE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;\s]+").expect("valid regex"));

/// Shape of a category code when no candidate list is available: `071`.
static CODE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}$").expect("valid regex"));

/// Relevance score answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreResult {
    Score(u8),
    Invalid(String),
}

impl ScoreResult {
    /// Take the first integer in the answer; accept it only inside `1..=10`.
    pub fn parse(raw: &str) -> Self {
        FIRST_INTEGER
            .find(raw)
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .filter(|score| SCORE_RANGE.contains(score))
            .map_or_else(|| Self::Invalid(raw.to_string()), Self::Score)
    }

    pub fn value(&self) -> u8 {
        match self {
            Self::Score(score) => *score,
            Self::Invalid(_) => UNKNOWN_SCORE,
        }
    }
}

/// Category-code list answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeListResult {
    Codes(Vec<String>),
    /// The classifier explicitly answered that no code applies.
    NoneApplicable,
    Invalid(String),
}

impl CodeListResult {
    /// Split the answer on commas, semicolons and whitespace.
    ///
    /// When `candidates` is non-empty, codes outside it are discarded.
    /// Without candidates only three-digit tokens count as codes. An answer
    /// left with no codes is invalid. Order is kept, duplicates dropped.
    pub fn parse(raw: &str, candidates: &[String]) -> Self {
        let trimmed = raw.trim().trim_matches(['\'', '"', '.']);
        if trimmed.eq_ignore_ascii_case("none") {
            return Self::NoneApplicable;
        }

        let mut codes: Vec<String> = Vec::new();
        for token in CODE_SEPARATORS.split(trimmed) {
            let code = token.trim_matches(['\'', '"', '.', '[', ']']);
            if code.is_empty() || codes.iter().any(|c| c == code) {
                continue;
            }
            let accepted = if candidates.is_empty() {
                CODE_SHAPE.is_match(code)
            } else {
                candidates.iter().any(|c| c == code)
            };
            if accepted {
                codes.push(code.to_string());
            }
        }

        if codes.is_empty() {
            Self::Invalid(raw.to_string())
        } else {
            Self::Codes(codes)
        }
    }

    /// Codes, or the empty set sentinel.
    pub fn into_codes(self) -> Vec<String> {
        match self {
            Self::Codes(codes) => codes,
            Self::NoneApplicable | Self::Invalid(_) => Vec::new(),
        }
    }
}

/// Pick-one-of-N answer, used for funding sources and parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceResult {
    Chosen(String),
    /// The answer is not verbatim one of the candidates.
    Unmatched(String),
}

impl ChoiceResult {
    /// Accept the answer only if, after trimming whitespace and wrapping
    /// quotes, it equals one of `candidates` exactly.
    pub fn parse(raw: &str, candidates: &[String]) -> Self {
        let answer = raw.trim().trim_matches(['\'', '"']).trim();
        match candidates.iter().find(|c| c.as_str() == answer) {
            Some(chosen) => Self::Chosen(chosen.clone()),
            None => Self::Unmatched(raw.to_string()),
        }
    }

    pub fn chosen(&self) -> Option<&str> {
        match self {
            Self::Chosen(value) => Some(value),
            Self::Unmatched(_) => None,
        }
    }

    /// Funding-source value: the choice, or `"unknown"`.
    pub fn into_funding_source(self) -> String {
        match self {
            Self::Chosen(value) => value,
            Self::Unmatched(_) => UNKNOWN_FUNDING_SOURCE.to_string(),
        }
    }

    /// Parent value: the choice, or the empty string.
    pub fn into_parent_name(self) -> String {
        match self {
            Self::Chosen(value) => value,
            Self::Unmatched(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn score_takes_first_integer_in_range() {
        assert_eq!(ScoreResult::parse("8"), ScoreResult::Score(8));
        assert_eq!(ScoreResult::parse("Điểm: 10/10"), ScoreResult::Score(10));
        assert_eq!(ScoreResult::parse("0").value(), UNKNOWN_SCORE);
        assert_eq!(ScoreResult::parse("11").value(), UNKNOWN_SCORE);
        assert_eq!(ScoreResult::parse("999999").value(), UNKNOWN_SCORE);
        assert!(matches!(ScoreResult::parse(""), ScoreResult::Invalid(_)));
        assert!(matches!(ScoreResult::parse("không rõ"), ScoreResult::Invalid(_)));
    }

    #[test]
    fn code_list_splits_and_filters() {
        let candidates = list(&["071", "072", "073"]);
        assert_eq!(
            CodeListResult::parse("071, 073; 073 099", &candidates),
            CodeListResult::Codes(list(&["071", "073"]))
        );
        assert_eq!(
            CodeListResult::parse("'None'", &candidates),
            CodeListResult::NoneApplicable
        );
        assert!(matches!(
            CodeListResult::parse("099", &candidates),
            CodeListResult::Invalid(_)
        ));
        assert!(CodeListResult::parse("", &candidates).into_codes().is_empty());
    }

    #[test]
    fn code_list_without_candidates_keeps_code_shaped_tokens() {
        assert_eq!(
            CodeListResult::parse("[\"080\", \"090\"]", &[]).into_codes(),
            list(&["080", "090"])
        );
        assert_eq!(
            CodeListResult::parse("Mã 071 và 72", &[]).into_codes(),
            list(&["071"])
        );
    }

    #[test]
    fn prose_without_candidates_is_invalid() {
        let parsed = CodeListResult::parse("Không xác định được khoản", &[]);
        assert!(matches!(parsed, CodeListResult::Invalid(_)));
        assert!(parsed.into_codes().is_empty());
    }

    #[test]
    fn choice_requires_verbatim_candidate() {
        let candidates = list(&["Chi sự nghiệp giáo dục", "Chi sự nghiệp y tế"]);
        let parsed = ChoiceResult::parse(" \"Chi sự nghiệp y tế\"\n", &candidates);
        assert_eq!(parsed.chosen(), Some("Chi sự nghiệp y tế"));

        let hallucinated = ChoiceResult::parse("Chi sự nghiệp văn hóa", &candidates);
        assert_eq!(hallucinated.chosen(), None);
        assert_eq!(hallucinated.into_parent_name(), "");

        let lowercase = ChoiceResult::parse("chi sự nghiệp y tế", &candidates);
        assert_eq!(lowercase.into_funding_source(), UNKNOWN_FUNDING_SOURCE);
    }
}
