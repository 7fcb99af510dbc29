use log::{debug, info};

use crate::config::*;
use crate::stats::{pearson, sample_variance};

/// The scores of one scale, one row per retained respondent, no gaps.
#[derive(PartialEq, Debug, Clone)]
pub struct ScaleMatrix {
    pub scale_id: String,
    pub item_ids: Vec<String>,
    pub respondent_ids: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl ScaleMatrix {
    /// Restricts the wide table to the items of a scale and resolves gaps per the policy.
    pub fn from_wide(
        wide: &WideTable,
        scale_id: &str,
        scale_items: &[String],
        policy: MissingDataPolicy,
    ) -> ScaleMatrix {
        let cols: Vec<(String, usize)> = scale_items
            .iter()
            .filter_map(|i| wide.column(i).map(|c| (i.clone(), c)))
            .collect();

        let (item_ids, respondent_ids, rows) = match policy {
            MissingDataPolicy::ListwiseDeletion => {
                let mut respondent_ids = Vec::new();
                let mut rows = Vec::new();
                for wr in wide.rows.iter() {
                    let row: Option<Vec<f64>> = cols.iter().map(|(_, c)| wr.scores[*c]).collect();
                    if let Some(row) = row {
                        respondent_ids.push(wr.respondent_id.clone());
                        rows.push(row);
                    }
                }
                let item_ids = cols.iter().map(|(i, _)| i.clone()).collect();
                (item_ids, respondent_ids, rows)
            }
            MissingDataPolicy::MeanImputation => {
                // Items nobody answered cannot be imputed and are left out.
                let mut kept: Vec<(String, usize, f64)> = Vec::new();
                for (item_id, c) in cols.iter() {
                    let observed: Vec<f64> = wide.rows.iter().filter_map(|wr| wr.scores[*c]).collect();
                    if observed.is_empty() {
                        debug!(
                            "ScaleMatrix::from_wide: scale {:?}: item {:?} has no scores, left out",
                            scale_id, item_id
                        );
                        continue;
                    }
                    let m = observed.iter().sum::<f64>() / observed.len() as f64;
                    kept.push((item_id.clone(), *c, m));
                }
                let mut respondent_ids = Vec::new();
                let mut rows = Vec::new();
                for wr in wide.rows.iter() {
                    if kept.iter().all(|(_, c, _)| wr.scores[*c].is_none()) {
                        continue;
                    }
                    let row: Vec<f64> = kept
                        .iter()
                        .map(|(_, c, m)| wr.scores[*c].unwrap_or(*m))
                        .collect();
                    respondent_ids.push(wr.respondent_id.clone());
                    rows.push(row);
                }
                let item_ids = kept.into_iter().map(|(i, _, _)| i).collect();
                (item_ids, respondent_ids, rows)
            }
        };
        ScaleMatrix {
            scale_id: scale_id.to_string(),
            item_ids,
            respondent_ids,
            rows,
        }
    }

    fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[idx]).collect()
    }

    pub fn alpha(&self) -> Estimate {
        cronbach_alpha(&self.rows)
    }

    /// Correlation between an item and the sum of the other items of the scale.
    pub fn corrected_item_total(&self, item_id: &str) -> Estimate {
        let idx = match self.item_ids.iter().position(|i| i == item_id) {
            Some(idx) => idx,
            // Not in the matrix: nobody answered it.
            None => return Estimate::Undefined(UndefinedReason::NoResponses),
        };
        if self.item_ids.len() < 2 {
            return Estimate::Undefined(UndefinedReason::InsufficientItems);
        }
        let item = self.column(idx);
        let rest: Vec<f64> = self
            .rows
            .iter()
            .map(|r| {
                r.iter()
                    .enumerate()
                    .filter(|(j, _)| *j != idx)
                    .map(|(_, x)| x)
                    .sum()
            })
            .collect();
        pearson(&item, &rest)
    }

    pub fn reliability(&self) -> Reliability {
        Reliability {
            scale_id: self.scale_id.clone(),
            items: self.item_ids.len(),
            respondents: self.rows.len(),
            alpha: self.alpha(),
        }
    }
}

/// Cronbach's alpha of a complete matrix (one row per respondent, one column per item).
///
/// alpha = k / (k - 1) * (1 - sum(item variances) / variance(total))
///
/// Returns an undefined estimate when there are fewer than 2 items, fewer than
/// 2 respondents, or fewer than 2 items that vary.
pub fn cronbach_alpha(rows: &[Vec<f64>]) -> Estimate {
    let k = rows.first().map(|r| r.len()).unwrap_or(0);
    if k < 2 {
        return Estimate::Undefined(UndefinedReason::InsufficientItems);
    }
    if rows.len() < 2 {
        return Estimate::Undefined(UndefinedReason::InsufficientRespondents);
    }
    let mut item_vars: Vec<f64> = Vec::with_capacity(k);
    for idx in 0..k {
        let col: Vec<f64> = rows.iter().map(|r| r[idx]).collect();
        match sample_variance(&col) {
            Estimate::Value(v) => item_vars.push(v),
            e => return e,
        }
    }
    if item_vars.iter().filter(|v| **v > 0.0).count() < 2 {
        return Estimate::Undefined(UndefinedReason::ZeroVariance);
    }
    let totals: Vec<f64> = rows.iter().map(|r| r.iter().sum()).collect();
    let total_var = match sample_variance(&totals) {
        Estimate::Value(v) if v > 0.0 => v,
        Estimate::Value(_) => return Estimate::Undefined(UndefinedReason::ZeroVariance),
        e => return e,
    };
    let kf = k as f64;
    let sum_item_vars: f64 = item_vars.iter().sum();
    Estimate::Value(kf / (kf - 1.0) * (1.0 - sum_item_vars / total_var))
}

/// Builds the matrix of every scale, in the order of `scales`.
pub(crate) fn scale_matrices(
    wide: &WideTable,
    scales: &[(String, Vec<String>)],
    policy: MissingDataPolicy,
) -> Vec<ScaleMatrix> {
    scales
        .iter()
        .map(|(scale_id, items)| {
            let m = ScaleMatrix::from_wide(wide, scale_id, items, policy);
            info!(
                "scale_matrices: scale {:?}: {} items, {} respondents retained ({:?})",
                scale_id,
                m.item_ids.len(),
                m.rows.len(),
                policy
            );
            m
        })
        .collect()
}
