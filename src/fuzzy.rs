//! Token-based string similarity on a 0-100 scale.
//!
//! Scores follow the conventions of the common Python fuzzy-matching
//! library: inputs are reduced to ASCII letters and digits, lower-cased and
//! trimmed; the base similarity is rapidfuzz's normalized indel similarity
//! scaled to 100 and rounded half-to-even. An empty side always scores 0.

use std::collections::BTreeSet;

use rapidfuzz::distance::indel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scorer {
    Ratio,
    PartialRatio,
    /// Sort tokens alphabetically, then compare. Used for line-item labels.
    TokenSort,
    /// Compare token-set intersections. Used for category and entity names.
    TokenSet,
    /// Best of the above with length-aware weighting.
    Weighted,
}

impl Scorer {
    pub fn score(&self, a: &str, b: &str) -> u8 {
        match self {
            Self::Ratio => ratio(a, b),
            Self::PartialRatio => partial_ratio(a, b),
            Self::TokenSort => token_sort_ratio(a, b),
            Self::TokenSet => token_set_ratio(a, b),
            Self::Weighted => weighted_ratio(a, b),
        }
    }
}

/// Best-scoring candidate for `query`, ties going to the earliest candidate.
/// Query and candidates are pre-processed before scoring.
pub fn best_match<'a, I>(query: &str, candidates: I, scorer: Scorer) -> Option<(&'a str, u8)>
where
    I: IntoIterator<Item = &'a str>,
{
    let query = full_process(query);
    let mut best: Option<(&'a str, u8)> = None;
    for candidate in candidates {
        let score = scorer.score(&query, &full_process(candidate));
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best
}

/// ASCII-only, non-alphanumerics to spaces, lower-case, trimmed.
pub fn full_process(s: &str) -> String {
    let mapped: String = s
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    mapped.trim().to_string()
}

fn intr(x: f64) -> u8 {
    x.round_ties_even().clamp(0.0, 100.0) as u8
}

/// Plain indel ratio, no pre-processing.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }
    intr(100.0 * indel::normalized_similarity(a.chars(), b.chars()))
}

/// Best ratio of the shorter string against every equal-length window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let mut best = 0.0f64;
    for window in longer.windows(shorter.len()) {
        let r = indel::normalized_similarity(shorter.iter().copied(), window.iter().copied());
        if r > 0.995 {
            return 100;
        }
        best = best.max(r);
    }
    intr(100.0 * best)
}

fn sorted_tokens(s: &str) -> String {
    let processed = full_process(s);
    let mut tokens: Vec<&str> = processed.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn partial_token_sort_ratio(a: &str, b: &str) -> u8 {
    partial_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn token_set(a: &str, b: &str, partial: bool) -> u8 {
    let p1 = full_process(a);
    let p2 = full_process(b);
    if p1.is_empty() || p2.is_empty() {
        return 0;
    }
    let t1: BTreeSet<&str> = p1.split_whitespace().collect();
    let t2: BTreeSet<&str> = p2.split_whitespace().collect();

    let join = |set: Vec<&str>| set.join(" ");
    let sect = join(t1.intersection(&t2).copied().collect());
    let diff_1to2 = join(t1.difference(&t2).copied().collect());
    let diff_2to1 = join(t2.difference(&t1).copied().collect());

    let combined_1to2 = format!("{sect} {diff_1to2}").trim().to_string();
    let combined_2to1 = format!("{sect} {diff_2to1}").trim().to_string();

    let score = if partial { partial_ratio } else { ratio };
    [
        score(&sect, &combined_1to2),
        score(&sect, &combined_2to1),
        score(&combined_1to2, &combined_2to1),
    ]
    .into_iter()
    .max()
    .unwrap_or(0)
}

pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    token_set(a, b, false)
}

fn partial_token_set_ratio(a: &str, b: &str) -> u8 {
    token_set(a, b, true)
}

pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let p1 = full_process(a);
    let p2 = full_process(b);
    if p1.is_empty() || p2.is_empty() {
        return 0;
    }
    const UNBASE_SCALE: f64 = 0.95;
    let mut partial_scale = 0.90;

    let base = ratio(&p1, &p2) as f64;
    let (l1, l2) = (p1.chars().count() as f64, p2.chars().count() as f64);
    let len_ratio = l1.max(l2) / l1.min(l2);
    if len_ratio > 8.0 {
        partial_scale = 0.6;
    }

    if len_ratio < 1.5 {
        let tsor = token_sort_ratio(&p1, &p2) as f64 * UNBASE_SCALE;
        let tser = token_set_ratio(&p1, &p2) as f64 * UNBASE_SCALE;
        return intr(base.max(tsor).max(tser));
    }

    let partial = partial_ratio(&p1, &p2) as f64 * partial_scale;
    let ptsor = partial_token_sort_ratio(&p1, &p2) as f64 * UNBASE_SCALE * partial_scale;
    let ptser = partial_token_set_ratio(&p1, &p2) as f64 * UNBASE_SCALE * partial_scale;
    intr(base.max(partial).max(ptsor).max(ptser))
}
