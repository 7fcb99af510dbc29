use log::{debug, info, warn};

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::config::*;

/// An item of the catalog with its effective bounds.
#[derive(PartialEq, Debug, Clone)]
pub(crate) struct CatalogItem {
    pub(crate) item: Item,
    pub(crate) bounds: Option<ScaleBounds>,
    /// Set when the scoring configuration of this item is unusable.
    pub(crate) issue: Option<ConfigIssue>,
}

impl CatalogItem {
    pub(crate) fn is_scorable(&self) -> bool {
        self.issue.is_none()
    }
}

#[derive(PartialEq, Debug, Clone)]
pub(crate) struct Catalog {
    pub(crate) items: HashMap<String, CatalogItem>,
}

impl Catalog {
    pub(crate) fn get(&self, item_id: &str) -> Option<&CatalogItem> {
        self.items.get(item_id)
    }

    /// The ids of the items that can be scored, sorted.
    pub(crate) fn scorable_item_ids(&self) -> Vec<String> {
        let ids: BTreeSet<&String> = self
            .items
            .iter()
            .filter(|(_, ci)| ci.is_scorable())
            .map(|(id, _)| id)
            .collect();
        ids.into_iter().cloned().collect()
    }

    /// Scales that have at least one scorable item, with their scorable items. Both sorted.
    pub(crate) fn scales(&self) -> Vec<(String, Vec<String>)> {
        let mut scales: HashMap<String, Vec<String>> = HashMap::new();
        for item_id in self.scorable_item_ids() {
            let scale_id = self.items[&item_id].item.scale_id.clone();
            scales.entry(scale_id).or_default().push(item_id);
        }
        let mut res: Vec<(String, Vec<String>)> = scales.into_iter().collect();
        res.sort();
        res
    }

    pub(crate) fn config_errors(&self) -> Vec<ScoringConfigError> {
        let mut errs: Vec<ScoringConfigError> = self
            .items
            .values()
            .filter_map(|ci| {
                ci.issue.map(|issue| ScoringConfigError {
                    item_id: ci.item.item_id.clone(),
                    issue,
                })
            })
            .collect();
        errs.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        errs
    }
}

/// Indexes the catalog and checks the scoring configuration of every item.
pub(crate) fn build_catalog(items: &[Item], rules: &ScoringRules) -> Result<Catalog, ScoringErrors> {
    if items.is_empty() {
        return Err(ScoringErrors::EmptyItemCatalog);
    }
    let mut res: HashMap<String, CatalogItem> = HashMap::new();
    for item in items.iter() {
        if res.contains_key(&item.item_id) {
            return Err(ScoringErrors::DuplicateItem(item.item_id.clone()));
        }
        let bounds = item.bounds.or_else(|| rules.bounds_for_scale(&item.scale_id));
        let issue = check_item(item, bounds, rules);
        if let Some(issue) = issue {
            warn!(
                "build_catalog: item {:?} cannot be scored: {}",
                item.item_id,
                issue.as_str()
            );
        }
        if item.key_correct.is_some() && item.reverse_scored {
            debug!(
                "build_catalog: item {:?} is keyed, ignoring the reverse scoring flag",
                item.item_id
            );
        }
        res.insert(
            item.item_id.clone(),
            CatalogItem {
                item: item.clone(),
                bounds,
                issue,
            },
        );
    }
    Ok(Catalog { items: res })
}

fn check_item(item: &Item, bounds: Option<ScaleBounds>, rules: &ScoringRules) -> Option<ConfigIssue> {
    if let Some(b) = bounds {
        if !b.is_valid() {
            return Some(ConfigIssue::InvalidBounds);
        }
    }
    if item.key_correct.is_none() && item.reverse_scored && bounds.is_none() {
        return Some(ConfigIssue::MissingBounds);
    }
    if rules.require_time_limits && item.time_limit_sec.is_none() {
        return Some(ConfigIssue::MissingTimeLimit);
    }
    None
}

/// Orders the attempts of a respondent at an item, oldest first.
///
/// Every field takes part so that the order does not depend on the input order.
fn compare_attempts(a: &Response, b: &Response) -> Ordering {
    a.respondent_id
        .cmp(&b.respondent_id)
        .then_with(|| a.item_id.cmp(&b.item_id))
        .then_with(|| a.response_ts.cmp(&b.response_ts))
        .then_with(|| a.session_id.cmp(&b.session_id))
        .then_with(|| a.response.cmp(&b.response))
        .then_with(|| a.response_time_ms.cmp(&b.response_time_ms))
        .then_with(|| a.attributes.cmp(&b.attributes))
}

pub(crate) fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Flags a response that survived deduplication.
fn assess(resp: &Response, ci: &CatalogItem) -> ValidityFlag {
    let value = match resp.response.as_deref().map(str::trim) {
        None | Some("") => return ValidityFlag::MissingResponse,
        Some(v) => v,
    };

    if ci.item.key_correct.is_none() {
        match parse_number(value) {
            None => {
                debug!(
                    "assess: respondent {:?} item {:?}: not a number: {:?}",
                    resp.respondent_id, resp.item_id, value
                );
                return ValidityFlag::MissingResponse;
            }
            Some(x) => {
                if let Some(b) = ci.bounds.filter(|b| b.is_valid()) {
                    if !b.contains(x) {
                        debug!(
                            "assess: respondent {:?} item {:?}: {} is out of bounds {:?}",
                            resp.respondent_id, resp.item_id, x, b
                        );
                        return ValidityFlag::MissingResponse;
                    }
                }
            }
        }
    }

    if let (Some(limit), Some(latency)) = (ci.item.time_limit_sec, resp.response_time_ms) {
        if (latency as f64) > limit * 1000.0 {
            return ValidityFlag::TimedOut;
        }
    }
    ValidityFlag::Valid
}

/// Deduplicates and flags the responses.
///
/// The output is sorted by respondent, item and attempt, and carries no score yet.
pub(crate) fn clean_responses(responses: &[Response], catalog: &Catalog) -> Vec<ScoredResponse> {
    let mut sorted: Vec<&Response> = responses.iter().collect();
    sorted.sort_by(|a, b| compare_attempts(a, b));

    let mut res: Vec<ScoredResponse> = Vec::with_capacity(sorted.len());
    let mut start = 0;
    while start < sorted.len() {
        let head = sorted[start];
        let mut end = start + 1;
        while end < sorted.len()
            && sorted[end].respondent_id == head.respondent_id
            && sorted[end].item_id == head.item_id
        {
            end += 1;
        }
        let group = &sorted[start..end];

        match catalog.get(&head.item_id) {
            None => {
                for resp in group.iter() {
                    res.push(ScoredResponse {
                        response: (*resp).clone(),
                        scale_id: None,
                        flag: ValidityFlag::UnknownItem,
                        score: None,
                    });
                }
            }
            Some(ci) => {
                if group.len() > 1 {
                    debug!(
                        "clean_responses: respondent {:?} item {:?}: {} attempts, keeping the most recent",
                        head.respondent_id,
                        head.item_id,
                        group.len()
                    );
                }
                let last = group.len() - 1;
                for (idx, resp) in group.iter().enumerate() {
                    let flag = if idx < last {
                        ValidityFlag::DuplicateDiscarded
                    } else {
                        assess(resp, ci)
                    };
                    res.push(ScoredResponse {
                        response: (*resp).clone(),
                        scale_id: Some(ci.item.scale_id.clone()),
                        flag,
                        score: None,
                    });
                }
            }
        }
        start = end;
    }
    info!(
        "clean_responses: {} responses, {} valid",
        res.len(),
        res.iter().filter(|r| r.flag == ValidityFlag::Valid).count()
    );
    res
}

pub(crate) fn build_report(
    rows: &[ScoredResponse],
    catalog: &Catalog,
    excluded_without_consent: usize,
) -> CleaningReport {
    let mut report = CleaningReport {
        excluded_without_consent,
        config_errors: catalog.config_errors(),
        ..CleaningReport::default()
    };
    for flag in ValidityFlag::ALL.iter() {
        report.flag_counts.insert(*flag, 0);
    }
    let mut orphans: BTreeSet<String> = BTreeSet::new();
    for row in rows.iter() {
        *report.flag_counts.entry(row.flag).or_insert(0) += 1;
        if row.flag == ValidityFlag::UnknownItem {
            orphans.insert(row.response.item_id.clone());
        }
    }
    report.orphan_item_ids = orphans.into_iter().collect();
    if !report.orphan_item_ids.is_empty() {
        warn!(
            "build_report: {} responses reference unknown items {:?}",
            report.count(ValidityFlag::UnknownItem),
            report.orphan_item_ids
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn resp(rid: &str, item: &str, value: Option<&str>, ts: Option<i64>, ms: Option<u64>) -> Response {
        Response {
            respondent_id: rid.to_string(),
            session_id: "s1".to_string(),
            item_id: item.to_string(),
            response: value.map(|s| s.to_string()),
            response_ts: ts,
            response_time_ms: ms,
            attributes: vec![],
        }
    }

    fn catalog() -> Catalog {
        let mut timed = Item::keyed("K1", "REA", "B");
        timed.time_limit_sec = Some(10.0);
        let items = vec![timed, Item::likert("L1", "EXT", 1.0, 5.0, true)];
        build_catalog(&items, &ScoringRules::DEFAULT_RULES).unwrap()
    }

    #[test]
    fn keeps_most_recent_attempt() {
        init();
        let responses = vec![
            resp("r1", "L1", Some("4"), Some(2_000), None),
            resp("r1", "L1", Some("2"), Some(1_000), None),
            resp("r1", "L1", Some("3"), None, None),
        ];
        let rows = clean_responses(&responses, &catalog());
        let flags: Vec<(Option<String>, ValidityFlag)> = rows
            .iter()
            .map(|r| (r.response.response.clone(), r.flag))
            .collect();
        assert_eq!(
            flags,
            vec![
                (Some("3".to_string()), ValidityFlag::DuplicateDiscarded),
                (Some("2".to_string()), ValidityFlag::DuplicateDiscarded),
                (Some("4".to_string()), ValidityFlag::Valid),
            ]
        );
    }

    #[test]
    fn most_recent_attempt_is_kept_even_if_blank() {
        let responses = vec![
            resp("r1", "L1", Some("4"), Some(1_000), None),
            resp("r1", "L1", Some(" "), Some(2_000), None),
        ];
        let rows = clean_responses(&responses, &catalog());
        assert_eq!(rows[0].flag, ValidityFlag::DuplicateDiscarded);
        assert_eq!(rows[1].flag, ValidityFlag::MissingResponse);
    }

    #[test]
    fn flags_are_independent_of_input_order() {
        let mut responses = vec![
            resp("r2", "K1", Some("A"), Some(5), Some(200)),
            resp("r1", "L1", Some("4"), Some(2), None),
            resp("r1", "L1", Some("4"), Some(2), None),
            resp("r1", "X", Some("4"), Some(2), None),
            resp("r1", "K1", None, Some(3), None),
        ];
        let rows1 = clean_responses(&responses, &catalog());
        responses.reverse();
        let rows2 = clean_responses(&responses, &catalog());
        assert_eq!(rows1, rows2);
    }

    #[test]
    fn unknown_items_are_never_deduplicated() {
        let responses = vec![
            resp("r1", "X", Some("4"), Some(1), None),
            resp("r1", "X", Some("5"), Some(2), None),
        ];
        let rows = clean_responses(&responses, &catalog());
        assert!(rows.iter().all(|r| r.flag == ValidityFlag::UnknownItem));
        assert!(rows.iter().all(|r| r.scale_id.is_none()));
        let report = build_report(&rows, &catalog(), 0);
        assert_eq!(report.count(ValidityFlag::UnknownItem), 2);
        assert_eq!(report.orphan_item_ids, vec!["X".to_string()]);
    }

    #[test]
    fn timeout_uses_milliseconds() {
        let responses = vec![
            resp("r1", "K1", Some("B"), None, Some(10_000)),
            resp("r2", "K1", Some("B"), None, Some(10_001)),
            resp("r3", "K1", Some("B"), None, None),
        ];
        let rows = clean_responses(&responses, &catalog());
        assert_eq!(rows[0].flag, ValidityFlag::Valid);
        assert_eq!(rows[1].flag, ValidityFlag::TimedOut);
        assert_eq!(rows[2].flag, ValidityFlag::Valid);
    }

    #[test]
    fn unusable_likert_values_are_missing() {
        let responses = vec![
            resp("r1", "L1", Some("often"), None, None),
            resp("r2", "L1", Some("7"), None, None),
            resp("r3", "L1", None, None, None),
            resp("r4", "L1", Some(" 5 "), None, None),
        ];
        let rows = clean_responses(&responses, &catalog());
        let flags: Vec<ValidityFlag> = rows.iter().map(|r| r.flag).collect();
        assert_eq!(
            flags,
            vec![
                ValidityFlag::MissingResponse,
                ValidityFlag::MissingResponse,
                ValidityFlag::MissingResponse,
                ValidityFlag::Valid
            ]
        );
    }

    #[test]
    fn catalog_reports_configuration_issues() {
        let mut no_limit = Item::likert("A", "S", 1.0, 5.0, false);
        no_limit.time_limit_sec = None;
        let mut reversed = Item::likert("B", "S", 1.0, 5.0, true);
        reversed.bounds = None;
        let inverted = Item::likert("C", "S", 5.0, 1.0, false);
        let mut rules = ScoringRules::DEFAULT_RULES;
        let c = build_catalog(&[no_limit.clone(), reversed.clone(), inverted.clone()], &rules).unwrap();
        assert_eq!(
            c.config_errors(),
            vec![
                ScoringConfigError {
                    item_id: "B".to_string(),
                    issue: ConfigIssue::MissingBounds
                },
                ScoringConfigError {
                    item_id: "C".to_string(),
                    issue: ConfigIssue::InvalidBounds
                },
            ]
        );

        rules.require_time_limits = true;
        rules.scale_bounds = vec![("S".to_string(), ScaleBounds::new(1.0, 7.0))];
        let c = build_catalog(&[no_limit, reversed], &rules).unwrap();
        assert_eq!(c.get("B").unwrap().bounds, Some(ScaleBounds::new(1.0, 7.0)));
        assert_eq!(c.config_errors().len(), 2);
        assert!(c
            .config_errors()
            .iter()
            .all(|e| e.issue == ConfigIssue::MissingTimeLimit));
    }

    #[test]
    fn catalog_rejects_duplicates_and_empty() {
        let rules = ScoringRules::DEFAULT_RULES;
        assert_eq!(
            build_catalog(&[], &rules),
            Err(ScoringErrors::EmptyItemCatalog)
        );
        let i = Item::keyed("A", "S", "x");
        assert_eq!(
            build_catalog(&[i.clone(), i], &rules),
            Err(ScoringErrors::DuplicateItem("A".to_string()))
        );
    }
}
