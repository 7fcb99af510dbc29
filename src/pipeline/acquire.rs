// Loading a batch of responses, participants and items from files.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::pipeline::{
    io_common::Table, io_csv::read_csv_table, io_excel::read_excel_table, *,
};

/// The three input tables of a run, typed but not yet cleaned.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    pub responses: Vec<Response>,
    pub participants: Vec<Participant>,
    pub items: Vec<Item>,
    /// Responses dropped because their respondent has no participant record.
    pub without_participant: usize,
}

/// Anything that can provide a batch to score.
pub trait DataSource {
    fn fetch(&self) -> PipelineResult<RawBatch>;
}

const RESPONSE_COLUMNS: [&str; 6] = [
    "respondent_id",
    "session_id",
    "item_id",
    "response",
    "response_ts",
    "response_time_ms",
];
const PARTICIPANT_COLUMNS: [&str; 4] = ["respondent_id", "consent", "cohort", "started_at"];

/// Reads the tables from CSV or Excel files, as described by a configuration.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    responses: (String, FileSource),
    participants: (String, FileSource),
    items: (String, FileSource),
    drop_columns: Vec<String>,
    consent_value: String,
    /// Inclusive range, in milliseconds since the epoch.
    from_ms: Option<i64>,
    to_ms: Option<i64>,
}

impl FileDataSource {
    pub fn new(root_path: &Path, config: &PipelineConfig) -> PipelineResult<FileDataSource> {
        let resolve = |fs: &FileSource| -> (String, FileSource) {
            (
                root_path.join(&fs.file_path).display().to_string(),
                fs.clone(),
            )
        };
        let filter = config.filter();
        let (from, to) = filter.date_range()?;
        let day_start = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(to_millis);
        Ok(FileDataSource {
            responses: resolve(&config.sources.responses),
            participants: resolve(&config.sources.participants),
            items: resolve(&config.sources.items),
            drop_columns: config.drop_columns(),
            consent_value: filter.consent_value().trim().to_lowercase(),
            from_ms: from.and_then(day_start),
            // The last day is included.
            to_ms: to
                .and_then(|d| d.succ_opt())
                .and_then(day_start)
                .map(|ms| ms - 1),
        })
    }

    fn read_table(&self, source: &(String, FileSource)) -> PipelineResult<Table> {
        let (path, cfs) = source;
        let mut table = match cfs.provider.as_str() {
            "csv" => read_csv_table(path, cfs)?,
            "xlsx" | "excel" => read_excel_table(path, cfs)?,
            x => whatever!("Provider not implemented {:?}", x),
        };
        table.drop_columns(&self.drop_columns);
        Ok(table)
    }

    fn in_range(&self, ts: Option<i64>) -> bool {
        if self.from_ms.is_none() && self.to_ms.is_none() {
            return true;
        }
        match ts {
            None => false,
            Some(t) => {
                self.from_ms.map(|f| t >= f).unwrap_or(true)
                    && self.to_ms.map(|e| t <= e).unwrap_or(true)
            }
        }
    }
}

impl DataSource for FileDataSource {
    fn fetch(&self) -> PipelineResult<RawBatch> {
        let items = read_items(&self.read_table(&self.items)?)?;
        let (participants, extras) =
            read_participants(&self.read_table(&self.participants)?, &self.consent_value)?;
        let all_responses = read_responses(&self.read_table(&self.responses)?)?;

        let known: HashSet<&str> = participants
            .iter()
            .map(|p| p.respondent_id.as_str())
            .collect();
        let total = all_responses.len();
        let mut out_of_range = 0;
        let mut without_participant = 0;
        let mut responses: Vec<Response> = Vec::with_capacity(total);
        for mut r in all_responses.into_iter() {
            if !self.in_range(r.response_ts) {
                out_of_range += 1;
                continue;
            }
            // Consent cannot be established without a participant record.
            if !known.contains(r.respondent_id.as_str()) {
                debug!("fetch: no participant record for {}", r.respondent_id);
                without_participant += 1;
                continue;
            }
            // Participant columns ride along with each response.
            if let Some(attrs) = extras.get(&r.respondent_id) {
                r.attributes.extend(attrs.iter().cloned());
            }
            responses.push(r);
        }
        if out_of_range > 0 {
            info!("fetch: {} responses outside of the date range", out_of_range);
        }
        if without_participant > 0 {
            info!(
                "fetch: {} responses excluded, no participant record",
                without_participant
            );
        }
        Ok(RawBatch {
            responses,
            participants,
            items,
            without_participant,
        })
    }
}

fn invalid(table: &Table, idx: usize, column: &str, value: &str) -> PipelineError {
    InvalidCellSnafu {
        path: table.source.clone(),
        // Line 1 is the header.
        lineno: idx + 2,
        column,
        value,
    }
    .build()
}

pub fn read_items(table: &Table) -> PipelineResult<Vec<Item>> {
    let id_idx = table.require_column("item_id")?;
    let scale_idx = table.require_column("scale_id")?;
    let key_idx = table.column_index("key_correct");
    let rev_idx = table.column_index("reverse_scored");
    let limit_idx = table.column_index("time_limit_sec");
    let min_idx = table.column_index("scale_min");
    let max_idx = table.column_index("scale_max");

    let mut res: Vec<Item> = Vec::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let item_id = match Table::cell(row, Some(id_idx)) {
            Some(x) => x,
            None => {
                debug!("read_items: skipping line {} without item id", idx + 2);
                continue;
            }
        };
        let scale_id =
            Table::cell(row, Some(scale_idx)).ok_or_else(|| invalid(table, idx, "scale_id", ""))?;
        let reverse_scored = match Table::cell(row, rev_idx) {
            None => false,
            Some(s) => parse_bool(&s).ok_or_else(|| invalid(table, idx, "reverse_scored", &s))?,
        };
        let number = |col: &str, i: Option<usize>| -> PipelineResult<Option<f64>> {
            match Table::cell(row, i) {
                None => Ok(None),
                Some(s) => match s.parse::<f64>() {
                    Ok(x) if x.is_finite() => Ok(Some(x)),
                    _ => Err(invalid(table, idx, col, &s)),
                },
            }
        };
        let time_limit_sec = number("time_limit_sec", limit_idx)?;
        let bounds = match (number("scale_min", min_idx)?, number("scale_max", max_idx)?) {
            (Some(min), Some(max)) => Some(ScaleBounds::new(min, max)),
            (None, None) => None,
            (Some(_), None) => return Err(invalid(table, idx, "scale_max", "")),
            (None, Some(_)) => return Err(invalid(table, idx, "scale_min", "")),
        };
        res.push(Item {
            item_id,
            scale_id,
            key_correct: Table::cell(row, key_idx),
            reverse_scored,
            time_limit_sec,
            bounds,
        });
    }
    debug!("read_items: {} items", res.len());
    Ok(res)
}

/// The participants, and for each of them the extra columns of their record.
pub fn read_participants(
    table: &Table,
    consent_value: &str,
) -> PipelineResult<(Vec<Participant>, HashMap<String, Vec<(String, String)>>)> {
    let id_idx = table.require_column("respondent_id")?;
    let consent_idx = table.require_column("consent")?;
    let cohort_idx = table.column_index("cohort");
    let started_idx = table.column_index("started_at");
    let others = table.other_columns(&PARTICIPANT_COLUMNS);

    let mut participants: Vec<Participant> = Vec::new();
    let mut extras: HashMap<String, Vec<(String, String)>> = HashMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let respondent_id = match Table::cell(row, Some(id_idx)) {
            Some(x) => x,
            None => continue,
        };
        let consent = Table::cell(row, Some(consent_idx))
            .map(|s| s.to_lowercase() == consent_value)
            .unwrap_or(false);
        let started_at = match Table::cell(row, started_idx) {
            None => None,
            Some(s) => {
                Some(parse_timestamp(&s).ok_or_else(|| invalid(table, idx, "started_at", &s))?)
            }
        };
        let attrs = others
            .iter()
            .map(|(i, name)| (name.clone(), Table::cell(row, Some(*i)).unwrap_or_default()))
            .collect();
        extras.insert(respondent_id.clone(), attrs);
        participants.push(Participant {
            respondent_id,
            consent,
            cohort: Table::cell(row, cohort_idx),
            started_at,
        });
    }
    debug!("read_participants: {} participants", participants.len());
    Ok((participants, extras))
}

pub fn read_responses(table: &Table) -> PipelineResult<Vec<Response>> {
    let rid_idx = table.require_column("respondent_id")?;
    let item_idx = table.require_column("item_id")?;
    let resp_idx = table.require_column("response")?;
    let session_idx = table.column_index("session_id");
    let ts_idx = table.column_index("response_ts");
    let latency_idx = table.column_index("response_time_ms");
    let others = table.other_columns(&RESPONSE_COLUMNS);

    let mut res: Vec<Response> = Vec::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let (respondent_id, item_id) = match (
            Table::cell(row, Some(rid_idx)),
            Table::cell(row, Some(item_idx)),
        ) {
            (Some(r), Some(i)) => (r, i),
            _ => {
                warn!(
                    "read_responses: {}: skipping line {} without respondent or item",
                    table.source,
                    idx + 2
                );
                continue;
            }
        };
        let response_ts = match Table::cell(row, ts_idx) {
            None => None,
            Some(s) => {
                Some(parse_timestamp(&s).ok_or_else(|| invalid(table, idx, "response_ts", &s))?)
            }
        };
        let response_time_ms = match Table::cell(row, latency_idx) {
            None => None,
            Some(s) => match s.parse::<f64>() {
                Ok(x) if x.is_finite() && x >= 0.0 => Some(x.round() as u64),
                _ => return Err(invalid(table, idx, "response_time_ms", &s)),
            },
        };
        res.push(Response {
            respondent_id,
            session_id: Table::cell(row, session_idx).unwrap_or_default(),
            item_id,
            // The raw answer is kept as is, blanks become None.
            response: row
                .get(resp_idx)
                .filter(|s| !s.trim().is_empty())
                .cloned(),
            response_ts,
            response_time_ms,
            attributes: others
                .iter()
                .map(|(i, name)| (name.clone(), Table::cell(row, Some(*i)).unwrap_or_default()))
                .collect(),
        });
    }
    debug!("read_responses: {} responses", res.len());
    Ok(res)
}

fn to_millis(ndt: NaiveDateTime) -> i64 {
    Utc.from_utc_datetime(&ndt).timestamp_millis()
}

/// Milliseconds since the epoch. Naive date times are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(to_millis(ndt));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(to_millis);
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i64>().ok();
    }
    None
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "t" | "y" => Some(true),
        "false" | "no" | "0" | "f" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            "test.csv",
            header.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn timestamps() {
        let expected = Some(1_759_312_800_000);
        assert_eq!(parse_timestamp("2025-10-01T10:00:00Z"), expected);
        assert_eq!(parse_timestamp("2025-10-01T12:00:00+02:00"), expected);
        assert_eq!(parse_timestamp("2025-10-01 10:00:00"), expected);
        assert_eq!(parse_timestamp("2025-10-01 10:00:00.000"), expected);
        assert_eq!(parse_timestamp("2025-10-01T10:00:00"), expected);
        assert_eq!(parse_timestamp(" 1759312800000 "), expected);
        assert_eq!(parse_timestamp("2025-10-01"), Some(1_759_276_800_000));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("-5"), None);
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool(" Yes"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("F"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn items() {
        let t = table(
            &[
                "item_id",
                "scale_id",
                "key_correct",
                "reverse_scored",
                "time_limit_sec",
                "scale_min",
                "scale_max",
            ],
            &[
                &["E1", "EXT", "", "no", "30", "1", "5"],
                &["E2", "EXT", "", "TRUE", "", "1", "5"],
                &["R1", "REA", "B", "", "20", "", ""],
                &["", "", "", "", "", "", ""],
            ],
        );
        let items = read_items(&t).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], {
            let mut i = Item::likert("E1", "EXT", 1.0, 5.0, false);
            i.time_limit_sec = Some(30.0);
            i
        });
        assert!(items[1].reverse_scored);
        assert_eq!(items[1].time_limit_sec, None);
        assert_eq!(items[2].key_correct, Some("B".to_string()));
        assert_eq!(items[2].bounds, None);
    }

    #[test]
    fn items_with_half_bounds() {
        let t = table(
            &["item_id", "scale_id", "scale_min", "scale_max"],
            &[&["E1", "EXT", "1", ""]],
        );
        let res = read_items(&t);
        assert!(
            matches!(res, Err(PipelineError::InvalidCell { lineno: 2, ref column, .. }) if column == "scale_max")
        );
        let t = table(&["item_id"], &[&["E1"]]);
        assert!(matches!(
            read_items(&t),
            Err(PipelineError::MissingColumn { .. })
        ));
    }

    #[test]
    fn participants() {
        let t = table(
            &["respondent_id", "consent", "cohort", "started_at", "site"],
            &[
                &["p1", " YES ", "A", "2025-10-01", "paris"],
                &["p2", "no", "", "", "lyon"],
                &["p3", "", "B", "", ""],
            ],
        );
        let (ps, extras) = read_participants(&t, "yes").unwrap();
        assert_eq!(ps.len(), 3);
        assert!(ps[0].consent);
        assert!(!ps[1].consent);
        assert!(!ps[2].consent);
        assert_eq!(ps[0].cohort, Some("A".to_string()));
        assert_eq!(ps[1].cohort, None);
        assert_eq!(ps[0].started_at, Some(1_759_276_800_000));
        assert_eq!(
            extras.get("p2"),
            Some(&vec![("site".to_string(), "lyon".to_string())])
        );
    }

    #[test]
    fn responses() {
        let t = table(
            &[
                "respondent_id",
                "item_id",
                "response",
                "response_ts",
                "response_time_ms",
                "device",
            ],
            &[
                &["p1", "E1", " 4", "2025-10-01 10:00:00", "1200", "phone"],
                &["p1", "E2", "  ", "", "", ""],
                &["", "E3", "5", "", "", ""],
            ],
        );
        let rs = read_responses(&t).unwrap();
        assert_eq!(rs.len(), 2);
        assert_eq!(rs[0].response, Some(" 4".to_string()));
        assert_eq!(rs[0].response_time_ms, Some(1200));
        assert_eq!(rs[0].session_id, "");
        assert_eq!(
            rs[0].attributes,
            vec![("device".to_string(), "phone".to_string())]
        );
        assert_eq!(rs[1].response, None);
        assert_eq!(rs[1].response_ts, None);

        let bad = table(
            &["respondent_id", "item_id", "response", "response_time_ms"],
            &[&["p1", "E1", "4", "-3"]],
        );
        assert!(read_responses(&bad).is_err());
    }

    #[test]
    fn date_range_is_inclusive() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
            "outputSettings": {"runName": "t"},
            "sources": {
                "responses": {"provider": "csv", "filePath": "r.csv"},
                "participants": {"provider": "csv", "filePath": "p.csv"},
                "items": {"provider": "csv", "filePath": "i.csv"}
            },
            "filter": {"responsesFrom": "2025-10-01", "responsesTo": "2025-10-31"}
        }"#,
        )
        .unwrap();
        let src = FileDataSource::new(Path::new("."), &config).unwrap();
        assert!(src.in_range(parse_timestamp("2025-10-01 00:00:00")));
        assert!(src.in_range(parse_timestamp("2025-10-31 23:59:59")));
        assert!(!src.in_range(parse_timestamp("2025-11-01 00:00:00")));
        assert!(!src.in_range(parse_timestamp("2025-09-30 23:59:59")));
        assert!(!src.in_range(None));
    }

    #[test]
    fn responses_need_a_participant_record() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("i.csv"), "item_id,scale_id,key_correct\nK,S,B\n").unwrap();
        fs::write(dir.path().join("p.csv"), "respondent_id,consent\np1,yes\n").unwrap();
        fs::write(
            dir.path().join("r.csv"),
            "respondent_id,item_id,response\np1,K,B\np9,K,B\n",
        )
        .unwrap();
        let config: PipelineConfig = serde_json::from_str(
            r#"{
            "outputSettings": {"runName": "t"},
            "sources": {
                "responses": {"provider": "csv", "filePath": "r.csv"},
                "participants": {"provider": "csv", "filePath": "p.csv"},
                "items": {"provider": "csv", "filePath": "i.csv"}
            }
        }"#,
        )
        .unwrap();
        let batch = FileDataSource::new(dir.path(), &config)
            .unwrap()
            .fetch()
            .unwrap();
        assert_eq!(batch.without_participant, 1);
        let ids: Vec<&str> = batch
            .responses
            .iter()
            .map(|r| r.respondent_id.as_str())
            .collect();
        assert_eq!(ids, vec!["p1"]);

        let out = clean_and_score(
            &batch.responses,
            &batch.participants,
            &batch.items,
            &ScoringRules::DEFAULT_RULES,
        )
        .unwrap();
        let rows: Vec<&str> = out
            .wide_scored
            .rows
            .iter()
            .map(|r| r.respondent_id.as_str())
            .collect();
        assert_eq!(rows, vec!["p1"]);
    }
}
