//! Mapping of a requested question onto the columns of a period.
//!
//! Survey forms get reworded from one month to the next, so the header of a
//! question is not stable across files. The resolver tries a list of
//! strategies in order and keeps the first column that one of them accepts.

use log::debug;

use crate::config::DEFAULT_TIMESTAMP_COLUMN;

/// Phrases shared by the known rewordings of the capacity question.
///
/// The same list is used whatever the requested question is.
pub const KEYWORD_PHRASES: [&str; 2] = ["capacity", "process changes"];

/// A column found by the resolver, with the name of the strategy that found it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResolvedColumn {
    pub column: String,
    pub strategy: &'static str,
}

/// One way of matching a requested question against the available columns.
pub trait ColumnMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the matching column, if any. `available` is in header order.
    fn try_match(&self, requested: &str, available: &[String]) -> Option<String>;
}

/// Exact string equality.
pub struct ExactMatch;

impl ColumnMatcher for ExactMatch {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn try_match(&self, requested: &str, available: &[String]) -> Option<String> {
        available.iter().find(|c| c.as_str() == requested).cloned()
    }
}

/// Matches through a fixed list of domain phrases.
///
/// Applies when the request mentions one of the phrases. The match is only
/// accepted when exactly one candidate column mentions any of the phrases.
pub struct KeywordPhraseMatch {
    phrases: Vec<String>,
    excluded_column: String,
}

impl KeywordPhraseMatch {
    pub fn new(phrases: &[&str], excluded_column: &str) -> KeywordPhraseMatch {
        KeywordPhraseMatch {
            phrases: phrases.iter().map(|s| s.to_lowercase()).collect(),
            excluded_column: excluded_column.to_string(),
        }
    }

    fn mentions_phrase(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.phrases.iter().any(|p| lower.contains(p.as_str()))
    }
}

impl ColumnMatcher for KeywordPhraseMatch {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn try_match(&self, requested: &str, available: &[String]) -> Option<String> {
        if !self.mentions_phrase(requested) {
            return None;
        }
        let candidates: Vec<&String> = available
            .iter()
            .filter(|c| **c != self.excluded_column && self.mentions_phrase(c))
            .collect();
        debug!(
            "KeywordPhraseMatch: requested: {:?} candidates: {:?}",
            requested, candidates
        );
        match candidates.as_slice() {
            [single] => Some(single.to_string()),
            _ => None,
        }
    }
}

/// Matches on the share of significant words of the request found in a column.
pub struct TokenOverlapMatch {
    /// Words must be strictly longer than this to count.
    min_word_len: usize,
    /// Percentage of the request words that must be found, rounded up.
    min_percent: usize,
    excluded_column: String,
}

impl TokenOverlapMatch {
    pub fn new(excluded_column: &str) -> TokenOverlapMatch {
        TokenOverlapMatch {
            min_word_len: 3,
            min_percent: 30,
            excluded_column: excluded_column.to_string(),
        }
    }

    /// Lowercased words of the text, punctuation removed, short words dropped.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let cleaned: String = text
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
            .collect();
        cleaned
            .split_whitespace()
            .filter(|w| w.chars().count() > self.min_word_len)
            .map(|w| w.to_lowercase())
            .collect()
    }

    fn threshold(&self, num_tokens: usize) -> usize {
        (num_tokens * self.min_percent).div_ceil(100)
    }
}

impl ColumnMatcher for TokenOverlapMatch {
    fn name(&self) -> &'static str {
        "tokens"
    }

    fn try_match(&self, requested: &str, available: &[String]) -> Option<String> {
        let tokens = self.tokenize(requested);
        // Nothing significant to compare: any column would pass a zero threshold.
        if tokens.is_empty() {
            return None;
        }
        let threshold = self.threshold(tokens.len());
        for candidate in available.iter().filter(|c| **c != self.excluded_column) {
            let lower = candidate.to_lowercase();
            let hits = tokens.iter().filter(|t| lower.contains(t.as_str())).count();
            if hits >= threshold {
                debug!(
                    "TokenOverlapMatch: {:?} -> {:?} ({}/{} tokens)",
                    requested,
                    candidate,
                    hits,
                    tokens.len()
                );
                return Some(candidate.clone());
            }
        }
        None
    }
}

/// Matches a column containing the beginning of the request, case-insensitive.
pub struct PrefixMatch {
    prefix_len: usize,
}

impl PrefixMatch {
    pub fn new(prefix_len: usize) -> PrefixMatch {
        PrefixMatch { prefix_len }
    }
}

impl ColumnMatcher for PrefixMatch {
    fn name(&self) -> &'static str {
        "prefix"
    }

    fn try_match(&self, requested: &str, available: &[String]) -> Option<String> {
        let prefix: String = requested
            .to_lowercase()
            .chars()
            .take(self.prefix_len)
            .collect();
        if prefix.is_empty() {
            return None;
        }
        available
            .iter()
            .find(|c| c.to_lowercase().contains(prefix.as_str()))
            .cloned()
    }
}

/// An ordered list of matchers. The first one to return a column wins.
pub struct ColumnResolver {
    matchers: Vec<Box<dyn ColumnMatcher>>,
}

impl ColumnResolver {
    pub fn new(matchers: Vec<Box<dyn ColumnMatcher>>) -> ColumnResolver {
        ColumnResolver { matchers }
    }

    /// The resolver used for the trends: exact, then keyword phrases, then word overlap.
    pub fn for_trends(timestamp_column: &str) -> ColumnResolver {
        ColumnResolver::new(vec![
            Box::new(ExactMatch),
            Box::new(KeywordPhraseMatch::new(&KEYWORD_PHRASES, timestamp_column)),
            Box::new(TokenOverlapMatch::new(timestamp_column)),
        ])
    }

    /// The looser resolver of the director breakdown: exact, then the first 20 characters.
    pub fn for_cross_tab() -> ColumnResolver {
        ColumnResolver::new(vec![Box::new(ExactMatch), Box::new(PrefixMatch::new(20))])
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    pub fn resolve(&self, requested: &str, available: &[String]) -> Option<ResolvedColumn> {
        for m in self.matchers.iter() {
            if let Some(column) = m.try_match(requested, available) {
                debug!(
                    "resolve: {:?} -> {:?} with strategy {}",
                    requested,
                    column,
                    m.name()
                );
                return Some(ResolvedColumn {
                    column,
                    strategy: m.name(),
                });
            }
        }
        debug!("resolve: no column found for {:?}", requested);
        None
    }
}

impl Default for ColumnResolver {
    fn default() -> Self {
        ColumnResolver::for_trends(DEFAULT_TIMESTAMP_COLUMN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_short_circuits() {
        // The exact column would also be found by the keyword strategy
        // together with another one, which would make it ambiguous.
        let available = cols(&[
            "Timestamp",
            "Did the team have enough capacity?",
            "Was capacity planning useful?",
        ]);
        let r = ColumnResolver::default()
            .resolve("Was capacity planning useful?", &available)
            .unwrap();
        assert_eq!(r.column, "Was capacity planning useful?");
        assert_eq!(r.strategy, "exact");
    }

    #[test]
    fn keyword_phrase_needs_a_single_candidate() {
        let m = KeywordPhraseMatch::new(&KEYWORD_PHRASES, "Timestamp");
        let available = cols(&["Timestamp", "How were process changes received?", "Team"]);
        assert_eq!(
            m.try_match("Rate the recent Process Changes", &available),
            Some("How were process changes received?".to_string())
        );

        let ambiguous = cols(&["Team capacity", "Process changes", "Team"]);
        assert_eq!(m.try_match("capacity next sprint", &ambiguous), None);

        // The request does not mention any phrase.
        assert_eq!(m.try_match("Which team are you on?", &available), None);
    }

    #[test]
    fn keyword_phrase_ignores_timestamp() {
        let m = KeywordPhraseMatch::new(&KEYWORD_PHRASES, "capacity log");
        let available = cols(&["capacity log", "Enough capacity this release?"]);
        assert_eq!(
            m.try_match("Capacity?", &available),
            Some("Enough capacity this release?".to_string())
        );
    }

    #[test]
    fn tokens_drop_punctuation_and_short_words() {
        let m = TokenOverlapMatch::new("Timestamp");
        assert_eq!(
            m.tokenize("How's the AI tooling, overall?"),
            vec!["hows", "tooling", "overall"]
        );
    }

    #[test]
    fn token_overlap_takes_first_column_over_threshold() {
        let m = TokenOverlapMatch::new("Timestamp");
        // 4 tokens -> threshold of 2.
        let available = cols(&[
            "Timestamp",
            "Which scrum team do you belong to?",
            "How useful were the sprint retrospective meetings this release?",
            "Were sprint retrospective meetings useful?",
        ]);
        assert_eq!(
            m.try_match("Usefulness of sprint retrospective meetings", &available),
            Some("How useful were the sprint retrospective meetings this release?".to_string())
        );
    }

    #[test]
    fn token_overlap_without_tokens_finds_nothing() {
        let m = TokenOverlapMatch::new("Timestamp");
        assert_eq!(m.try_match("Is it ok?", &cols(&["Anything"])), None);
    }

    #[test]
    fn prefix_match_uses_twenty_chars() {
        let m = PrefixMatch::new(20);
        let available = cols(&["director org", "Overall, how satisfied were you (1-5)"]);
        assert_eq!(
            m.try_match("OVERALL, HOW SATISFIED ARE YOU?", &available),
            Some("Overall, how satisfied were you (1-5)".to_string())
        );
        assert_eq!(m.try_match("Overall, how happy", &available), None);
    }

    #[test]
    fn unresolved_returns_none() {
        let available = cols(&["Timestamp", "Team"]);
        assert_eq!(
            ColumnResolver::default().resolve("Favourite colour", &available),
            None
        );
    }

    #[test]
    fn request_without_significant_words_is_unresolved() {
        // "NPS" has no word longer than 3 characters: the overlap step does
        // not fall back to the first column.
        let available = cols(&["Timestamp", "NPS score"]);
        assert_eq!(ColumnResolver::default().resolve("NPS", &available), None);
        assert_eq!(
            ColumnResolver::default()
                .resolve("NPS score", &available)
                .map(|r| r.strategy),
            Some("exact")
        );
    }

    #[test]
    fn keyword_step_runs_before_token_overlap() {
        let request = "Did capacity allow enough sprint planning work?";
        let available = cols(&[
            "Timestamp",
            "Sprint planning work quality overall",
            "Capacity this release",
        ]);
        // On its own, the overlap step picks the first column (3 of 6 words).
        assert_eq!(
            TokenOverlapMatch::new("Timestamp").try_match(request, &available),
            Some("Sprint planning work quality overall".to_string())
        );
        let r = ColumnResolver::default().resolve(request, &available).unwrap();
        assert_eq!(r.column, "Capacity this release");
        assert_eq!(r.strategy, "keyword");
    }

    #[test]
    fn strategies_are_ordered() {
        assert_eq!(
            ColumnResolver::default().strategies(),
            vec!["exact", "keyword", "tokens"]
        );
        assert_eq!(
            ColumnResolver::for_cross_tab().strategies(),
            vec!["exact", "prefix"]
        );
    }
}
