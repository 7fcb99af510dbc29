// A rectangular table of text cells, as read from a CSV file or a worksheet.

use std::path::Path;

use crate::pipeline::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Short name of the file the table comes from, for error messages.
    pub source: String,
}

impl Table {
    pub fn new(source: &str, header: Vec<String>, rows: Vec<Vec<String>>) -> Table {
        Table {
            header: header.iter().map(|h| h.trim().to_string()).collect(),
            rows,
            source: source.to_string(),
        }
    }

    /// Removes the given columns. Names that are not in the table are ignored.
    pub fn drop_columns(&mut self, names: &[String]) {
        let keep: Vec<usize> = (0..self.header.len())
            .filter(|idx| !names.contains(&self.header[*idx]))
            .collect();
        if keep.len() == self.header.len() {
            return;
        }
        debug!(
            "drop_columns: {}: dropping {} column(s)",
            self.source,
            self.header.len() - keep.len()
        );
        self.header = keep.iter().map(|idx| self.header[*idx].clone()).collect();
        for row in self.rows.iter_mut() {
            *row = keep
                .iter()
                .map(|idx| row.get(*idx).cloned().unwrap_or_default())
                .collect();
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> PipelineResult<usize> {
        self.column_index(name).context(MissingColumnSnafu {
            column: name,
            path: self.source.clone(),
        })
    }

    /// The trimmed content of a cell. Empty cells and short rows read as None.
    pub fn cell(row: &[String], idx: Option<usize>) -> Option<String> {
        let s = row.get(idx?)?.trim();
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    }

    /// Columns other than the given ones, with their index.
    pub fn other_columns(&self, known: &[&str]) -> Vec<(usize, String)> {
        self.header
            .iter()
            .enumerate()
            .filter(|(_, h)| !known.contains(&h.as_str()))
            .map(|(idx, h)| (idx, h.clone()))
            .collect()
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(
            "t.csv",
            vec!["id".to_string(), " email ".to_string(), "x".to_string()],
            vec![
                vec!["a".to_string(), "a@x.org".to_string(), " 1 ".to_string()],
                vec!["b".to_string()],
            ],
        )
    }

    #[test]
    fn drops_columns_everywhere() {
        let mut t = table();
        t.drop_columns(&["email".to_string(), "absent".to_string()]);
        assert_eq!(t.header, vec!["id", "x"]);
        assert_eq!(t.rows[0], vec!["a", " 1 "]);
        assert_eq!(t.rows[1], vec!["b", ""]);
    }

    #[test]
    fn cells() {
        let t = table();
        assert_eq!(Table::cell(&t.rows[0], t.column_index("x")), Some("1".to_string()));
        assert_eq!(Table::cell(&t.rows[1], t.column_index("x")), None);
        assert_eq!(Table::cell(&t.rows[0], None), None);
        assert!(t.require_column("missing").is_err());
        assert_eq!(t.other_columns(&["id"]), vec![(1, "email".to_string()), (2, "x".to_string())]);
    }

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("/tmp/data/responses.csv"), "responses.csv");
        assert_eq!(simplify_file_name("responses.csv"), "responses.csv");
    }
}
