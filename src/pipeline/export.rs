// Writing the scored tables and the summary of a run.

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::pipeline::*;

pub fn format_number(x: f64) -> String {
    format!("{:.6}", x)
}

pub fn format_estimate(e: &Estimate) -> String {
    match e {
        Estimate::Value(v) => format_number(*v),
        Estimate::Undefined(r) => format!("undefined:{}", r.as_str()),
    }
}

fn format_opt(x: Option<f64>) -> String {
    x.map(format_number).unwrap_or_default()
}

fn format_ts(ts: Option<i64>) -> String {
    ts.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn policy_name(p: MissingDataPolicy) -> &'static str {
    match p {
        MissingDataPolicy::ListwiseDeletion => "listwise",
        MissingDataPolicy::MeanImputation => "mean",
    }
}

fn write_csv(dir: &Path, name: &str, header: &[String], rows: &[Vec<String>]) -> PipelineResult<()> {
    let path = dir.join(name);
    let path_s = path.display().to_string();
    let mut wtr = csv::Writer::from_path(&path).context(CsvWriteSnafu { path: &path_s })?;
    wtr.write_record(header)
        .context(CsvWriteSnafu { path: &path_s })?;
    for row in rows.iter() {
        wtr.write_record(row).context(CsvWriteSnafu { path: &path_s })?;
    }
    wtr.flush().context(WritingSnafu { path: &path_s })?;
    debug!("write_csv: {}: {} rows", path_s, rows.len());
    Ok(())
}

/// Attribute names, in order of first appearance.
fn attribute_columns(long: &[ScoredResponse]) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for sr in long.iter() {
        for (name, _) in sr.response.attributes.iter() {
            if !res.contains(name) {
                res.push(name.clone());
            }
        }
    }
    res
}

fn long_table(long: &[ScoredResponse]) -> (Vec<String>, Vec<Vec<String>>) {
    let attrs = attribute_columns(long);
    let mut header: Vec<String> = [
        "respondent_id",
        "session_id",
        "item_id",
        "scale_id",
        "response",
        "response_ts",
        "response_time_ms",
        "flag",
        "score",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(attrs.iter().cloned());

    let rows = long
        .iter()
        .map(|sr| {
            let r = &sr.response;
            let mut row = vec![
                r.respondent_id.clone(),
                r.session_id.clone(),
                r.item_id.clone(),
                sr.scale_id.clone().unwrap_or_default(),
                r.response.clone().unwrap_or_default(),
                format_ts(r.response_ts),
                r.response_time_ms.map(|x| x.to_string()).unwrap_or_default(),
                sr.flag.as_str().to_string(),
                format_opt(sr.score),
            ];
            for name in attrs.iter() {
                let v = r
                    .attributes
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone());
                row.push(v.unwrap_or_default());
            }
            row
        })
        .collect();
    (header, rows)
}

fn wide_table(wide: &WideTable) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header = vec!["respondent_id".to_string(), "cohort".to_string()];
    header.extend(wide.item_ids.iter().cloned());
    let rows = wide
        .rows
        .iter()
        .map(|wr| {
            let mut row = vec![wr.respondent_id.clone(), wr.cohort.clone().unwrap_or_default()];
            row.extend(wr.scores.iter().map(|x| format_opt(*x)));
            row
        })
        .collect();
    (header, rows)
}

fn item_stats_table(stats: &[ItemStats]) -> (Vec<String>, Vec<Vec<String>>) {
    let header = [
        "item_id",
        "scale_id",
        "status",
        "n",
        "mean",
        "sd",
        "item_total_correlation",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let rows = stats
        .iter()
        .map(|s| {
            vec![
                s.item_id.clone(),
                s.scale_id.clone(),
                s.status.as_str().to_string(),
                s.count.to_string(),
                format_estimate(&s.mean),
                format_estimate(&s.sd),
                format_estimate(&s.item_total_correlation),
            ]
        })
        .collect();
    (header, rows)
}

fn respondent_scores_table(scores: &[RespondentScores]) -> (Vec<String>, Vec<Vec<String>>) {
    let scale_ids: Vec<String> = scores
        .first()
        .map(|rs| rs.scales.iter().map(|s| s.scale_id.clone()).collect())
        .unwrap_or_default();
    let mut header = vec!["respondent_id".to_string(), "cohort".to_string()];
    for scale_id in scale_ids.iter() {
        header.push(scale_id.clone());
        header.push(format!("{}_items", scale_id));
    }
    let rows = scores
        .iter()
        .map(|rs| {
            let mut row = vec![rs.respondent_id.clone(), rs.cohort.clone().unwrap_or_default()];
            for scale_id in scale_ids.iter() {
                match rs.scale(scale_id) {
                    Some(s) => {
                        row.push(format_opt(s.score));
                        row.push(s.items_answered.to_string());
                    }
                    None => {
                        row.push("".to_string());
                        row.push("0".to_string());
                    }
                }
            }
            row
        })
        .collect();
    (header, rows)
}

fn alpha_table(alpha: &BTreeMap<String, Reliability>) -> (Vec<String>, Vec<Vec<String>>) {
    let header = ["scale_id", "items", "respondents", "alpha"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows = alpha
        .values()
        .map(|r| {
            vec![
                r.scale_id.clone(),
                r.items.to_string(),
                r.respondents.to_string(),
                format_estimate(&r.alpha),
            ]
        })
        .collect();
    (header, rows)
}

/// Writes the five scored tables as CSV files in the given directory.
pub fn write_tables(dir: &Path, output: &ScoredOutput) -> PipelineResult<()> {
    let tables = [
        ("long_scored.csv", long_table(&output.long_scored)),
        ("wide_scored.csv", wide_table(&output.wide_scored)),
        ("item_stats.csv", item_stats_table(&output.item_stats)),
        (
            "respondent_scores.csv",
            respondent_scores_table(&output.respondent_scores),
        ),
        ("alpha.csv", alpha_table(&output.alpha)),
    ];
    for (name, (header, rows)) in tables.iter() {
        write_csv(dir, name, header, rows)?;
    }
    Ok(())
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
struct SummaryConfig {
    #[serde(rename = "runName")]
    run_name: String,
    #[serde(rename = "missingDataPolicy")]
    missing_data_policy: String,
}

/// The summary of a run. All the values are strings.
pub fn build_summary_js(
    config: &PipelineConfig,
    rules: &ScoringRules,
    output: &ScoredOutput,
) -> JSValue {
    let c = SummaryConfig {
        run_name: config.output_settings.run_name.clone(),
        missing_data_policy: policy_name(rules.missing_data_policy).to_string(),
    };

    let report = &output.report;
    let mut counts = serde_json::Map::new();
    counts.insert(
        "responses".to_string(),
        json!(output.long_scored.len().to_string()),
    );
    for flag in ValidityFlag::ALL {
        counts.insert(
            flag.as_str().to_string(),
            json!(report.count(flag).to_string()),
        );
    }
    counts.insert(
        "excludedWithoutConsent".to_string(),
        json!(report.excluded_without_consent.to_string()),
    );
    counts.insert(
        "respondents".to_string(),
        json!(output.wide_scored.rows.len().to_string()),
    );
    counts.insert(
        "items".to_string(),
        json!(output.item_stats.len().to_string()),
    );

    let scales: Vec<JSValue> = output
        .alpha
        .values()
        .map(|r| {
            json!({
                "scale": r.scale_id,
                "items": r.items.to_string(),
                "respondents": r.respondents.to_string(),
                "alpha": format_estimate(&r.alpha),
            })
        })
        .collect();

    let items: Vec<JSValue> = output
        .item_stats
        .iter()
        .map(|s| {
            json!({
                "item": s.item_id,
                "scale": s.scale_id,
                "status": s.status.as_str(),
                "n": s.count.to_string(),
                "mean": format_estimate(&s.mean),
                "sd": format_estimate(&s.sd),
                "itemTotal": format_estimate(&s.item_total_correlation),
            })
        })
        .collect();

    let config_errors: Vec<JSValue> = report
        .config_errors
        .iter()
        .map(|e| json!({"item": e.item_id, "issue": e.issue.as_str()}))
        .collect();

    json!({
        "config": c,
        "counts": counts,
        "scales": scales,
        "items": items,
        "orphanItems": report.orphan_item_ids,
        "configErrors": config_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> ScoredOutput {
        let mut b = item_scoring::builder::Builder::new(&ScoringRules::DEFAULT_RULES)
            .unwrap()
            .likert_items("EXT", &["E1".to_string(), "E2".to_string()], 1.0, 5.0)
            .unwrap();
        let mut r = Response::simple("p1", "E1", "4");
        r.attributes.push(("device".to_string(), "phone".to_string()));
        r.response_ts = Some(1_759_312_800_000);
        b.add_response(&r).unwrap();
        b.add_response(&Response::simple("p1", "E2", "4")).unwrap();
        b.add_answers_simple("p2", &["5".to_string(), "5".to_string()])
            .unwrap();
        b.add_response(&Response::simple("p2", "Z", "1")).unwrap();
        b.run().unwrap()
    }

    #[test]
    fn estimates() {
        assert_eq!(format_estimate(&Estimate::Value(2.0 / 3.0)), "0.666667");
        assert_eq!(
            format_estimate(&Estimate::Undefined(UndefinedReason::ZeroVariance)),
            "undefined:zero_variance"
        );
        assert_eq!(format_opt(None), "");
        assert_eq!(format_ts(Some(1_759_312_800_000)), "2025-10-01T10:00:00.000Z");
    }

    #[test]
    fn long_table_carries_attributes() {
        let (header, rows) = long_table(&output().long_scored);
        assert_eq!(header.last(), Some(&"device".to_string()));
        assert_eq!(rows.len(), 5);
        let p1_e1 = rows
            .iter()
            .find(|r| r[0] == "p1" && r[2] == "E1")
            .unwrap();
        assert_eq!(p1_e1[5], "2025-10-01T10:00:00.000Z");
        assert_eq!(p1_e1[7], "valid");
        assert_eq!(p1_e1[8], "4.000000");
        assert_eq!(p1_e1[9], "phone");
        let orphan = rows.iter().find(|r| r[2] == "Z").unwrap();
        assert_eq!(orphan[3], "");
        assert_eq!(orphan[7], "unknown_item");
        assert_eq!(orphan[8], "");
    }

    #[test]
    fn summary() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
            "outputSettings": {"runName": "unit"},
            "sources": {
                "responses": {"provider": "csv", "filePath": "r.csv"},
                "participants": {"provider": "csv", "filePath": "p.csv"},
                "items": {"provider": "csv", "filePath": "i.csv"}
            }
        }"#,
        )
        .unwrap();
        let js = build_summary_js(&config, &ScoringRules::DEFAULT_RULES, &output());
        assert_eq!(js["config"]["runName"], "unit");
        assert_eq!(js["config"]["missingDataPolicy"], "listwise");
        assert_eq!(js["counts"]["responses"], "5");
        assert_eq!(js["counts"]["valid"], "4");
        assert_eq!(js["counts"]["unknown_item"], "1");
        assert_eq!(js["counts"]["respondents"], "2");
        assert_eq!(js["orphanItems"][0], "Z");
        // p1 (4, 4) and p2 (5, 5)
        assert_eq!(js["scales"][0]["alpha"], "1.000000");
        assert_eq!(js["items"][0]["item"], "E1");
        assert_eq!(js["items"][0]["mean"], "4.500000");
    }

    #[test]
    fn writes_files() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path(), &output()).unwrap();
        let wide = fs::read_to_string(dir.path().join("wide_scored.csv")).unwrap();
        let mut lines = wide.lines();
        assert_eq!(lines.next(), Some("respondent_id,cohort,E1,E2"));
        assert_eq!(lines.next(), Some("p1,,4.000000,4.000000"));
        let scores = fs::read_to_string(dir.path().join("respondent_scores.csv")).unwrap();
        assert_eq!(scores.lines().next(), Some("respondent_id,cohort,EXT,EXT_items"));
        let alpha = fs::read_to_string(dir.path().join("alpha.csv")).unwrap();
        assert_eq!(alpha.lines().nth(1), Some("EXT,2,2,1.000000"));
    }
}
