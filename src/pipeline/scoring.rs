//! Candidate scoring for fallback text searches.
//!
//! A candidate's score is the weighted sum of title-word overlap and author
//! token overlap, plus bonuses for an exact title match and for having a
//! publication date. Only candidates strictly above `min_score` qualify.

use crate::clients::catalog::CatalogVolume;

/// Words of this many characters or fewer are ignored when comparing.
const MIN_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchWeights {
    pub min_score: f64,
    pub title_weight: f64,
    pub author_weight: f64,
    pub exact_title_bonus: f64,
    pub published_bonus: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            min_score: 0.4,
            title_weight: 0.7,
            author_weight: 0.3,
            exact_title_bonus: 0.5,
            published_bonus: 0.1,
        }
    }
}

/// A candidate that cleared the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate<'a> {
    pub volume: &'a CatalogVolume,
    pub score: f64,
}

fn significant(token: &str) -> bool {
    token.chars().count() >= MIN_TOKEN_CHARS
}

/// Fraction of significant title words found in `candidate_title`.
fn title_overlap(title: &str, candidate_title: &str) -> f64 {
    let words: Vec<&str> = title.split(' ').filter(|w| significant(w)).collect();
    if words.is_empty() {
        return 0.0;
    }
    let matched = words.iter().filter(|w| candidate_title.contains(*w)).count();
    ratio(matched, words.len())
}

/// Fraction of significant author tokens contained in any token of `candidate_author`.
fn author_overlap(author: &str, candidate_author: &str) -> f64 {
    let tokens: Vec<&str> = author.split(' ').filter(|t| significant(t)).collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let candidate_tokens: Vec<&str> = candidate_author.split(' ').collect();
    let matched = tokens
        .iter()
        .filter(|token| candidate_tokens.iter().any(|c| c.contains(*token)))
        .count();
    ratio(matched, tokens.len()).min(1.0)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    numerator as f64 / denominator as f64
}

/// Scores one catalog candidate against a bestseller title and author.
///
/// Comparison is case-insensitive; only the candidate's first author counts.
#[must_use]
pub fn score_candidate(
    title: &str,
    author: &str,
    candidate: &CatalogVolume,
    weights: &MatchWeights,
) -> f64 {
    let title = title.to_lowercase();
    let author = author.to_lowercase();
    let candidate_title = candidate
        .title
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let candidate_author = candidate
        .authors
        .first()
        .map(|a| a.to_lowercase())
        .unwrap_or_default();

    let mut score = title_overlap(&title, &candidate_title) * weights.title_weight
        + author_overlap(&author, &candidate_author) * weights.author_weight;

    if candidate_title == title {
        score += weights.exact_title_bonus;
    }
    if candidate.published_date.is_some() {
        score += weights.published_bonus;
    }
    score
}

/// Picks the highest-scoring candidate strictly above `min_score`.
///
/// Ties keep the earlier candidate.
#[must_use]
pub fn best_candidate<'a>(
    title: &str,
    author: &str,
    candidates: &'a [CatalogVolume],
    weights: &MatchWeights,
) -> Option<ScoredCandidate<'a>> {
    let mut best: Option<ScoredCandidate<'a>> = None;
    for volume in candidates {
        let score = score_candidate(title, author, volume, weights);
        if score <= weights.min_score {
            continue;
        }
        if best.is_none_or(|current| score > current.score) {
            best = Some(ScoredCandidate { volume, score });
        }
    }
    best
}

/// Strips punctuation for use inside a search query.
#[must_use]
pub fn clean_for_search(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn volume(title: &str, author: Option<&str>, published: bool) -> CatalogVolume {
        CatalogVolume {
            id: format!("id-{}", title.to_lowercase().replace(' ', "-")),
            title: Some(title.to_string()),
            authors: author.map(|a| vec![a.to_string()]).unwrap_or_default(),
            published_date: published.then(|| "2024".to_string()),
            ..CatalogVolume::default()
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[rstest]
    #[case::exact_everything(
        "Example",
        "A. Writer",
        volume("Example", Some("A. Writer"), true),
        0.7 + 0.3 + 0.5 + 0.1
    )]
    #[case::exact_title_no_date(
        "Example",
        "A. Writer",
        volume("EXAMPLE", Some("Someone Else"), false),
        0.7 + 0.5
    )]
    #[case::half_title_only("Example Story", "A. Writer", volume("Example", None, false), 0.35)]
    #[case::author_only(
        "Example",
        "Jane Writer",
        volume("Unrelated", Some("Jane Writerly"), false),
        0.3
    )]
    #[case::half_author(
        "Example",
        "Jane Doe-Writer",
        volume("Other", Some("Jane Smith"), false),
        0.15
    )]
    #[case::short_words_ignored("It Is", "Al Bo", volume("It Is Not", Some("Al Bo"), true), 0.1)]
    #[case::missing_title("Example", "A. Writer", CatalogVolume::default(), 0.0)]
    fn scores_candidates(
        #[case] title: &str,
        #[case] author: &str,
        #[case] candidate: CatalogVolume,
        #[case] expected: f64,
    ) {
        let score = score_candidate(title, author, &candidate, &MatchWeights::default());
        assert_close(score, expected);
    }

    #[test]
    fn only_first_candidate_author_counts() {
        let mut candidate = volume("Elsewhere", Some("Nobody"), false);
        candidate.authors.push("Writer".to_string());
        let score = score_candidate("Example", "Writer", &candidate, &MatchWeights::default());
        assert_close(score, 0.0);
    }

    #[test]
    fn low_scoring_candidates_are_never_selected() {
        let candidates = vec![
            volume("Example", None, false),
            volume("Story", Some("Nobody"), false),
        ];
        let best = best_candidate(
            "Example Story",
            "A. Writer",
            &candidates,
            &MatchWeights::default(),
        );
        assert!(best.is_none());
    }

    #[test]
    fn highest_score_wins_and_ties_keep_first() {
        let candidates = vec![
            volume("Example Story", Some("A. Writer"), false),
            volume("Example Story", Some("A. Writer"), true),
            volume("Example Story", Some("A. Writer"), true),
        ];
        let best = best_candidate(
            "Example Story",
            "A. Writer",
            &candidates,
            &MatchWeights::default(),
        )
        .expect("a candidate clears the threshold");

        assert!(std::ptr::eq(best.volume, &candidates[1]));
        assert_close(best.score, 0.7 + 0.3 + 0.5 + 0.1);
    }

    #[test]
    fn threshold_is_configurable() {
        let strict = MatchWeights {
            min_score: 2.0,
            ..MatchWeights::default()
        };
        let candidates = vec![volume("Example", Some("A. Writer"), false)];

        let lenient = MatchWeights::default();

        assert!(best_candidate("Example", "A. Writer", &candidates, &lenient).is_some());
        assert!(best_candidate("Example", "A. Writer", &candidates, &strict).is_none());
    }

    #[rstest]
    #[case("The Women: A Novel!", "The Women A Novel")]
    #[case("  Don't Stop  ", "Dont Stop")]
    #[case("J.R.R. Tolkien", "JRR Tolkien")]
    #[case("?!", "")]
    fn cleans_punctuation_for_search(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(clean_for_search(raw), expected);
    }
}
