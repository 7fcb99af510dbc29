/*!
Cleaning and scoring of survey and test responses.

This crate takes raw responses in long format (one row per respondent and item),
the catalog of items and the participant records, and derives:

- the long scored table: every response with a validity flag and a score,
- the wide scored table: one row per respondent, one column per item,
- descriptive statistics per item, including the corrected item-total correlation,
- one score per respondent and scale,
- Cronbach's alpha per scale.

All the tables are recomputed from the inputs on every call. The rules that
govern a run (missing data policy, key matching, aggregation) are passed
explicitly in [`ScoringRules`].

See the [manual](manual/index.html) for the policies applied at each stage.
 */
mod aggregate;
pub mod builder;
mod clean;
mod config;
pub mod manual;
mod pivot;
pub mod reliability;
pub mod score;
pub mod stats;

use log::{debug, info, warn};

use std::collections::{BTreeMap, HashSet};

pub use crate::config::*;
pub use crate::reliability::cronbach_alpha;
pub use crate::score::{key_matches, reverse_code};

/// Runs the cleaning and scoring stages on one batch.
///
/// Arguments:
/// * `responses` the raw responses, in any order
/// * `participants` the participant records. Consenting participants without
/// any response still get a row in the wide table. Responses of participants
/// who did not consent are left out.
/// * `items` the item catalog
/// * `rules` the rules that govern this run
///
/// Items with an unusable scoring configuration are reported in the cleaning
/// report and left out of the statistics, unless `rules.abort_on_error` is set.
pub fn clean_and_score(
    responses: &[Response],
    participants: &[Participant],
    items: &[Item],
    rules: &ScoringRules,
) -> Result<ScoredOutput, ScoringErrors> {
    info!(
        "clean_and_score: processing {:?} responses, {:?} participants, {:?} items, rules: {:?}",
        responses.len(),
        participants.len(),
        items.len(),
        rules
    );

    let catalog = clean::build_catalog(items, rules)?;
    let config_errors = catalog.config_errors();
    if !config_errors.is_empty() {
        warn!(
            "clean_and_score: {} items cannot be scored: {:?}",
            config_errors.len(),
            config_errors
        );
        if rules.abort_on_error {
            return Err(ScoringErrors::ScoringConfig(config_errors));
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for p in participants.iter() {
        if !seen.insert(p.respondent_id.as_str()) {
            return Err(ScoringErrors::DuplicateParticipant(p.respondent_id.clone()));
        }
    }
    let no_consent: HashSet<&str> = participants
        .iter()
        .filter(|p| !p.consent)
        .map(|p| p.respondent_id.as_str())
        .collect();
    let consented: Vec<Response> = responses
        .iter()
        .filter(|r| !no_consent.contains(r.respondent_id.as_str()))
        .cloned()
        .collect();
    let excluded_without_consent = responses.len() - consented.len();
    if excluded_without_consent > 0 {
        info!(
            "clean_and_score: {} responses excluded, no consent",
            excluded_without_consent
        );
    }

    let mut long_scored = clean::clean_responses(&consented, &catalog);
    score::score_responses(&mut long_scored, &catalog, rules);

    let roster = pivot::roster(&long_scored, participants);
    let wide_scored = pivot::pivot_wide(&long_scored, &roster, &catalog.scorable_item_ids());

    let scales = catalog.scales();
    debug!("clean_and_score: scales: {:?}", scales);
    let matrices = reliability::scale_matrices(&wide_scored, &scales, rules.missing_data_policy);
    let item_stats = stats::compute_item_stats(&long_scored, &catalog, &matrices);
    let respondent_scores = aggregate::respondent_scores(&wide_scored, &scales, rules.aggregation);
    let alpha: BTreeMap<String, Reliability> = matrices
        .iter()
        .map(|m| (m.scale_id.clone(), m.reliability()))
        .collect();
    for r in alpha.values() {
        info!(
            "Scale {}: {} items, {} respondents, alpha: {:?}",
            r.scale_id, r.items, r.respondents, r.alpha
        );
    }

    let report = clean::build_report(&long_scored, &catalog, excluded_without_consent);

    Ok(ScoredOutput {
        long_scored,
        wide_scored,
        item_stats,
        respondent_scores,
        alpha,
        report,
    })
}
