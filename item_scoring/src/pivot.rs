use log::info;

use std::collections::{BTreeMap, HashMap};

use crate::config::*;

/// The respondents of a batch, sorted, with their cohort.
///
/// Consenting participants are listed even when they did not answer anything.
pub(crate) fn roster(
    long_scored: &[ScoredResponse],
    participants: &[Participant],
) -> BTreeMap<String, Option<String>> {
    let mut res: BTreeMap<String, Option<String>> = BTreeMap::new();
    for p in participants.iter().filter(|p| p.consent) {
        res.insert(p.respondent_id.clone(), p.cohort.clone());
    }
    for row in long_scored.iter() {
        res.entry(row.response.respondent_id.clone()).or_insert(None);
    }
    res
}

/// Pivots the scored responses to one row per respondent and one column per item.
pub(crate) fn pivot_wide(
    long_scored: &[ScoredResponse],
    roster: &BTreeMap<String, Option<String>>,
    item_ids: &[String],
) -> WideTable {
    let col_index: HashMap<&str, usize> = item_ids
        .iter()
        .enumerate()
        .map(|(idx, i)| (i.as_str(), idx))
        .collect();

    let mut cells: HashMap<&str, Vec<Option<f64>>> = HashMap::new();
    for row in long_scored.iter() {
        let score = match row.score {
            Some(s) => s,
            None => continue,
        };
        if let Some(col) = col_index.get(row.response.item_id.as_str()) {
            let scores = cells
                .entry(row.response.respondent_id.as_str())
                .or_insert_with(|| vec![None; item_ids.len()]);
            scores[*col] = Some(score);
        }
    }

    let rows: Vec<WideRow> = roster
        .iter()
        .map(|(rid, cohort)| WideRow {
            respondent_id: rid.clone(),
            cohort: cohort.clone(),
            scores: cells
                .get(rid.as_str())
                .cloned()
                .unwrap_or_else(|| vec![None; item_ids.len()]),
        })
        .collect();
    let non_responders = rows
        .iter()
        .filter(|r| r.scores.iter().all(|s| s.is_none()))
        .count();
    info!(
        "pivot_wide: {} respondents ({} without any score), {} items",
        rows.len(),
        non_responders,
        item_ids.len()
    );
    WideTable {
        item_ids: item_ids.to_vec(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(rid: &str, item: &str, score: Option<f64>) -> ScoredResponse {
        ScoredResponse {
            response: Response::simple(rid, item, "x"),
            scale_id: Some("S".to_string()),
            flag: if score.is_some() {
                ValidityFlag::Valid
            } else {
                ValidityFlag::MissingResponse
            },
            score,
        }
    }

    #[test]
    fn non_responders_get_an_empty_row() {
        let long = vec![scored("r2", "A", Some(1.0)), scored("r1", "B", None)];
        let participants = vec![
            Participant {
                respondent_id: "r3".to_string(),
                consent: true,
                cohort: Some("c".to_string()),
                started_at: None,
            },
            Participant {
                respondent_id: "r4".to_string(),
                consent: false,
                cohort: None,
                started_at: None,
            },
        ];
        let items = vec!["A".to_string(), "B".to_string()];
        let w = pivot_wide(&long, &roster(&long, &participants), &items);
        let ids: Vec<&str> = w.rows.iter().map(|r| r.respondent_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        assert_eq!(w.row("r1").unwrap().scores, vec![None, None]);
        assert_eq!(w.row("r2").unwrap().scores, vec![Some(1.0), None]);
        assert_eq!(w.row("r3").unwrap().cohort, Some("c".to_string()));
        assert_eq!(w.get("r2", "A"), Some(1.0));
    }

    #[test]
    fn stable_under_reordering() {
        let mut long = vec![
            scored("r2", "A", Some(1.0)),
            scored("r1", "B", Some(3.0)),
            scored("r1", "A", Some(2.0)),
        ];
        let items = vec!["A".to_string(), "B".to_string()];
        let w1 = pivot_wide(&long, &roster(&long, &[]), &items);
        long.reverse();
        let w2 = pivot_wide(&long, &roster(&long, &[]), &items);
        assert_eq!(w1, w2);
    }
}
