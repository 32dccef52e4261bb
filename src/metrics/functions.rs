//! Similarity functions
//!
//! Pure string-similarity functions over `&str` pairs, all returning scores
//! in [0, 1]. N-gram based functions signal [`InputTooShort`] when an input
//! has fewer characters than the n-gram size; the harness records that
//! outcome as degenerate rather than scoring it.

use std::collections::HashSet;

use super::InputTooShort;

/// Lowercased whitespace tokens.
fn tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(|t| t.to_lowercase()).collect()
}

fn token_set(s: &str) -> HashSet<String> {
    tokens(s).into_iter().collect()
}

/// Character n-grams (sliding window over Unicode scalar values).
fn ngram_set(s: &str, n: usize) -> Result<HashSet<String>, InputTooShort> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < n {
        return Err(InputTooShort);
    }
    Ok(chars.windows(n).map(|w| w.iter().collect()).collect())
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        1.0
    } else {
        intersection as f64 / union as f64
    }
}

fn dice(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    2.0 * intersection as f64 / (a.len() + b.len()) as f64
}

fn overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let min = a.len().min(b.len());
    if min == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / min as f64
}

// --- edit based ---

/// Normalized Levenshtein similarity: `1 - distance / max_len`.
pub fn levenshtein(a: &str, b: &str) -> Result<f64, InputTooShort> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return Ok(1.0);
    }

    // single-row dynamic programming
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut previous_diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let value = (previous_diagonal + cost).min(row[j] + 1).min(row[j + 1] + 1);
            previous_diagonal = row[j + 1];
            row[j + 1] = value;
        }
    }

    Ok(1.0 - row[b.len()] as f64 / max_len as f64)
}

/// Normalized longest-common-subsequence similarity: `lcs_len / max_len`.
pub fn longest_common_subsequence(a: &str, b: &str) -> Result<f64, InputTooShort> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return Ok(1.0);
    }

    let mut row = vec![0usize; b.len() + 1];
    for ca in &a {
        let mut previous_diagonal = 0;
        for (j, cb) in b.iter().enumerate() {
            let current = row[j + 1];
            row[j + 1] = if ca == cb {
                previous_diagonal + 1
            } else {
                row[j + 1].max(row[j])
            };
            previous_diagonal = current;
        }
    }

    Ok(row[b.len()] as f64 / max_len as f64)
}

// --- set based, tokens ---

pub fn token_jaccard(a: &str, b: &str) -> Result<f64, InputTooShort> {
    Ok(jaccard(&token_set(a), &token_set(b)))
}

pub fn token_dice(a: &str, b: &str) -> Result<f64, InputTooShort> {
    Ok(dice(&token_set(a), &token_set(b)))
}

pub fn token_overlap(a: &str, b: &str) -> Result<f64, InputTooShort> {
    Ok(overlap(&token_set(a), &token_set(b)))
}

// --- profile based ---

/// Token cosine similarity over boolean profiles.
pub fn token_cosine(a: &str, b: &str) -> Result<f64, InputTooShort> {
    let a = token_set(a);
    let b = token_set(b);
    if a.is_empty() && b.is_empty() {
        return Ok(1.0);
    }
    if a.is_empty() || b.is_empty() {
        return Ok(0.0);
    }
    let dot = a.intersection(&b).count() as f64;
    Ok(dot / ((a.len() * b.len()) as f64).sqrt())
}

// --- set based, character n-grams ---

pub fn ngram_jaccard(a: &str, b: &str, n: usize) -> Result<f64, InputTooShort> {
    Ok(jaccard(&ngram_set(a, n)?, &ngram_set(b, n)?))
}

pub fn ngram_dice(a: &str, b: &str, n: usize) -> Result<f64, InputTooShort> {
    Ok(dice(&ngram_set(a, n)?, &ngram_set(b, n)?))
}

pub fn ngram_overlap(a: &str, b: &str, n: usize) -> Result<f64, InputTooShort> {
    Ok(overlap(&ngram_set(a, n)?, &ngram_set(b, n)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("abc", "abc").unwrap(), 1.0);
        assert_eq!(levenshtein("", "").unwrap(), 1.0);
        assert_eq!(levenshtein("abc", "xyz").unwrap(), 0.0);
        // one substitution out of four characters
        let score = levenshtein("abcd", "abxd").unwrap();
        assert!((score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_longest_common_subsequence() {
        assert_eq!(longest_common_subsequence("abc", "abc").unwrap(), 1.0);
        let score = longest_common_subsequence("abcd", "acd").unwrap();
        assert!((score - 0.75).abs() < 1e-9);
        assert_eq!(longest_common_subsequence("abc", "xyz").unwrap(), 0.0);
    }

    #[test]
    fn test_token_jaccard() {
        assert_eq!(token_jaccard("a b c", "a b c").unwrap(), 1.0);
        let score = token_jaccard("a b", "b c").unwrap();
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
        // case-insensitive tokens
        assert_eq!(token_jaccard("Foo", "foo").unwrap(), 1.0);
    }

    #[test]
    fn test_ngram_too_short() {
        assert!(matches!(ngram_jaccard("ab", "abcd", 3), Err(InputTooShort)));
        assert!(matches!(ngram_jaccard("abcd", "ab", 3), Err(InputTooShort)));
        assert_eq!(ngram_jaccard("abc", "abc", 3).unwrap(), 1.0);
    }

    #[test]
    fn test_overlap_coefficient() {
        // "ab" grams of "abc" = {ab, bc}; of "abcd" = {ab, bc, cd}
        let score = ngram_overlap("abc", "abcd", 2).unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_token_cosine() {
        assert_eq!(token_cosine("a b", "a b").unwrap(), 1.0);
        assert_eq!(token_cosine("a", "b").unwrap(), 0.0);
        let score = token_cosine("a b", "a").unwrap();
        assert!((score - 1.0 / 2.0_f64.sqrt()).abs() < 1e-9);
    }
}
