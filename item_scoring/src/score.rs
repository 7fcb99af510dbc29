use log::{debug, info};

use crate::clean::{parse_number, Catalog, CatalogItem};
use crate::config::*;

/// Brings an answer to the form used for key comparisons.
pub fn normalize_answer(answer: &str, matching: KeyMatching) -> String {
    let trimmed = answer.trim();
    match matching {
        KeyMatching::Trimmed => trimmed.to_string(),
        KeyMatching::CaseInsensitive => trimmed.to_lowercase(),
    }
}

/// Compares an answer with the key of an item.
///
/// Numbers compare by value, so "1", "1.0" and " 1 " all match a key of "1".
pub fn key_matches(answer: &str, key: &str, matching: KeyMatching) -> bool {
    if let (Some(a), Some(k)) = (parse_number(answer), parse_number(key)) {
        return a == k;
    }
    normalize_answer(answer, matching) == normalize_answer(key, matching)
}

/// Reverse-codes a value against the bounds of its item.
///
/// Applying it twice with the same bounds gives back the original value.
pub fn reverse_code(value: f64, bounds: ScaleBounds) -> f64 {
    bounds.reverse(value)
}

fn score_one(answer: &str, ci: &CatalogItem, rules: &ScoringRules) -> Option<f64> {
    if let Some(key) = ci.item.key_correct.as_deref() {
        let score = if key_matches(answer, key, rules.key_matching) {
            1.0
        } else {
            0.0
        };
        return Some(score);
    }
    let value = parse_number(answer)?;
    if ci.item.reverse_scored {
        // Items without bounds were rejected by the catalog.
        ci.bounds.map(|b| reverse_code(value, b))
    } else {
        Some(value)
    }
}

/// Fills in the score of every valid response whose item can be scored.
pub(crate) fn score_responses(rows: &mut [ScoredResponse], catalog: &Catalog, rules: &ScoringRules) {
    let mut num_scored: usize = 0;
    for row in rows.iter_mut() {
        row.score = None;
        if row.flag != ValidityFlag::Valid {
            continue;
        }
        let ci = match catalog.get(&row.response.item_id) {
            Some(ci) if ci.is_scorable() => ci,
            _ => continue,
        };
        let answer = match row.response.response.as_deref() {
            Some(a) => a,
            None => continue,
        };
        row.score = score_one(answer, ci, rules);
        debug!(
            "score_responses: respondent {:?} item {:?}: {:?} -> {:?}",
            row.response.respondent_id, row.response.item_id, answer, row.score
        );
        if row.score.is_some() {
            num_scored += 1;
        }
    }
    info!("score_responses: {} responses scored", num_scored);
}
