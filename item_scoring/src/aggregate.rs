use crate::config::*;

/// Aggregates the item scores of every respondent into one score per scale.
///
/// Only scored items count. A respondent without any scored item in a scale
/// gets no score for it, never zero.
pub(crate) fn respondent_scores(
    wide: &WideTable,
    scales: &[(String, Vec<String>)],
    aggregation: ScaleAggregation,
) -> Vec<RespondentScores> {
    let scale_cols: Vec<(&String, Vec<usize>)> = scales
        .iter()
        .map(|(scale_id, items)| {
            let cols = items.iter().filter_map(|i| wide.column(i)).collect();
            (scale_id, cols)
        })
        .collect();

    wide.rows
        .iter()
        .map(|wr| {
            let scales = scale_cols
                .iter()
                .map(|(scale_id, cols)| {
                    let values: Vec<f64> = cols.iter().filter_map(|c| wr.scores[*c]).collect();
                    ScaleScore {
                        scale_id: (*scale_id).clone(),
                        score: aggregate(&values, aggregation),
                        items_answered: values.len(),
                    }
                })
                .collect();
            RespondentScores {
                respondent_id: wr.respondent_id.clone(),
                cohort: wr.cohort.clone(),
                scales,
            }
        })
        .collect()
}

fn aggregate(values: &[f64], aggregation: ScaleAggregation) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let total: f64 = values.iter().sum();
    match aggregation {
        ScaleAggregation::Sum => Some(total),
        ScaleAggregation::Mean => Some(total / values.len() as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> WideTable {
        WideTable {
            item_ids: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            rows: vec![
                WideRow {
                    respondent_id: "r1".to_string(),
                    cohort: Some("x".to_string()),
                    scores: vec![Some(2.0), Some(4.0), Some(1.0)],
                },
                WideRow {
                    respondent_id: "r2".to_string(),
                    cohort: None,
                    scores: vec![None, Some(3.0), None],
                },
                WideRow {
                    respondent_id: "r3".to_string(),
                    cohort: None,
                    scores: vec![None, None, Some(1.0)],
                },
            ],
        }
    }

    fn scales() -> Vec<(String, Vec<String>)> {
        vec![
            ("S".to_string(), vec!["A".to_string(), "B".to_string()]),
            ("T".to_string(), vec!["C".to_string()]),
        ]
    }

    #[test]
    fn mean_uses_answered_items_only() {
        let res = respondent_scores(&table(), &scales(), ScaleAggregation::Mean);
        assert_eq!(res[0].scale("S").unwrap().score, Some(3.0));
        assert_eq!(res[0].cohort, Some("x".to_string()));
        assert_eq!(res[1].scale("S").unwrap().score, Some(3.0));
        assert_eq!(res[1].scale("S").unwrap().items_answered, 1);
        assert_eq!(res[1].scale("T").unwrap().score, None);
        assert_eq!(res[2].scale("S").unwrap().score, None);
        assert_eq!(res[2].scale("S").unwrap().items_answered, 0);
    }

    #[test]
    fn sum() {
        let res = respondent_scores(&table(), &scales(), ScaleAggregation::Sum);
        assert_eq!(res[0].scale("S").unwrap().score, Some(6.0));
        assert_eq!(res[1].scale("S").unwrap().score, Some(3.0));
        assert_eq!(res[2].scale("T").unwrap().score, Some(1.0));
    }
}
