// Primitives for reading CSV files.

use crate::pipeline::{
    io_common::{simplify_file_name, Table},
    *,
};

pub fn read_csv_table(path: &str, cfs: &FileSource) -> PipelineResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(cfs.delimiter_byte()?)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let header: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|s| s.trim_start_matches('\u{feff}').to_string())
        .collect();
    debug!("read_csv_table: {}: header: {:?}", path, header);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        // The header is line 1
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        rows.push(line.iter().map(|s| s.to_string()).collect());
    }
    debug!("read_csv_table: {}: {} rows", path, rows.len());
    Ok(Table::new(&simplify_file_name(path), header, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_with_delimiter() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "\u{feff}item_id;scale_id;key_correct\nQ1;EXT;\nQ2;REA;\"B;C\"\n").unwrap();
        let mut cfs = FileSource::new("csv", "ignored");
        cfs.delimiter = Some(";".to_string());
        let t = read_csv_table(f.path().to_str().unwrap(), &cfs).unwrap();
        assert_eq!(t.header, vec!["item_id", "scale_id", "key_correct"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[1][2], "B;C");
        assert_eq!(Table::cell(&t.rows[0], Some(2)), None);
    }

    #[test]
    fn missing_file() {
        let cfs = FileSource::new("csv", "ignored");
        let res = read_csv_table("/nonexistent/responses.csv", &cfs);
        assert!(matches!(res, Err(PipelineError::CsvOpen { .. })));
    }
}
