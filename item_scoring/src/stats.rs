use log::debug;

use std::collections::HashMap;

use crate::clean::Catalog;
use crate::config::*;
use crate::reliability::ScaleMatrix;

pub fn mean(values: &[f64]) -> Estimate {
    if values.is_empty() {
        return Estimate::Undefined(UndefinedReason::NoResponses);
    }
    Estimate::Value(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 in the denominator).
pub fn sample_variance(values: &[f64]) -> Estimate {
    if values.len() < 2 {
        return Estimate::Undefined(UndefinedReason::InsufficientResponses);
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let ss: f64 = values.iter().map(|x| (x - m) * (x - m)).sum();
    Estimate::Value(ss / (values.len() - 1) as f64)
}

pub fn sample_sd(values: &[f64]) -> Estimate {
    match sample_variance(values) {
        Estimate::Value(v) => Estimate::Value(v.sqrt()),
        e => e,
    }
}

/// Pearson correlation of two paired series.
///
/// Series of different lengths are not paired and have no correlation.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Estimate {
    if xs.len() < 2 || xs.len() != ys.len() {
        return Estimate::Undefined(UndefinedReason::InsufficientRespondents);
    }
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return Estimate::Undefined(UndefinedReason::ZeroVariance);
    }
    Estimate::Value(sxy / (sxx * syy).sqrt())
}

/// Descriptive statistics for every item of the catalog, sorted by item id.
///
/// Counts only include scored responses. The item-total correlations are read
/// from the scale matrices so that they follow the same missing data policy as alpha.
pub(crate) fn compute_item_stats(
    long_scored: &[ScoredResponse],
    catalog: &Catalog,
    matrices: &[ScaleMatrix],
) -> Vec<ItemStats> {
    let mut scores: HashMap<&str, Vec<f64>> = HashMap::new();
    for row in long_scored.iter() {
        if let Some(s) = row.score {
            scores.entry(row.response.item_id.as_str()).or_default().push(s);
        }
    }

    let mut item_ids: Vec<&String> = catalog.items.keys().collect();
    item_ids.sort();

    let mut res: Vec<ItemStats> = Vec::new();
    for item_id in item_ids {
        let ci = &catalog.items[item_id];
        let scale_id = ci.item.scale_id.clone();
        if !ci.is_scorable() {
            let undefined = Estimate::Undefined(UndefinedReason::ScoringFailed);
            res.push(ItemStats {
                item_id: item_id.clone(),
                scale_id,
                status: ItemStatus::ScoringFailed,
                count: 0,
                mean: undefined,
                sd: undefined,
                item_total_correlation: undefined,
            });
            continue;
        }
        let values: &[f64] = scores.get(item_id.as_str()).map(|v| v.as_slice()).unwrap_or(&[]);
        let stats = if values.len() < 2 {
            let reason = if values.is_empty() {
                UndefinedReason::NoResponses
            } else {
                UndefinedReason::InsufficientResponses
            };
            ItemStats {
                item_id: item_id.clone(),
                scale_id,
                status: ItemStatus::InsufficientData,
                count: values.len(),
                mean: Estimate::Undefined(reason),
                sd: Estimate::Undefined(reason),
                item_total_correlation: Estimate::Undefined(reason),
            }
        } else {
            let item_total_correlation = matrices
                .iter()
                .find(|m| m.scale_id == scale_id)
                .map(|m| m.corrected_item_total(item_id))
                .unwrap_or(Estimate::Undefined(UndefinedReason::InsufficientItems));
            ItemStats {
                item_id: item_id.clone(),
                scale_id,
                status: ItemStatus::Ok,
                count: values.len(),
                mean: mean(values),
                sd: sample_sd(values),
                item_total_correlation,
            }
        };
        debug!("compute_item_stats: {:?}", stats);
        res.push(stats);
    }
    res
}
