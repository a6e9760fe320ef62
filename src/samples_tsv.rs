//! Tab-separated samples table: the training input of the classifier.
//!
//! One header row, then one row per entity:
//!
//!   ent  class_0 .. class_{N-1}  sent_0 .. sent_{M-1}
//!   1    0       0  1            Foo.    Bar.
//!
//! The writer always emits the header and the reader requires it.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::base::{tmp_path, DataFile};
use crate::error::{DaoError, Result};

/// One raw row: entity id, binary class memberships, untokenized sentences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRow {
    pub ent: i64,
    pub classes: Vec<u8>,
    pub sents: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SamplesTsv {
    name: String,
    path: PathBuf,
    class_count: usize,
    sent_count: usize,
}

impl DataFile for SamplesTsv {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl SamplesTsv {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        class_count: usize,
        sent_count: usize,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            class_count,
            sent_count,
        }
    }

    /// Column names in file order.
    pub fn header(&self) -> Vec<String> {
        let mut cols = Vec::with_capacity(1 + self.class_count + self.sent_count);
        cols.push("ent".to_string());
        cols.extend((0..self.class_count).map(|i| format!("class_{i}")));
        cols.extend((0..self.sent_count).map(|i| format!("sent_{i}")));
        cols
    }

    fn field_count(&self) -> usize {
        1 + self.class_count + self.sent_count
    }

    /// Validate every row, then write the table to a sibling temp file and
    /// rename it into place. A rejected row leaves any existing table as it
    /// was.
    pub fn write(&self, rows: &[SampleRow]) -> Result<()> {
        for (idx, row) in rows.iter().enumerate() {
            // header occupies line 1
            self.validate_row(row, idx + 2)?;
        }

        let tmp = tmp_path(&self.path);
        let io_err = |e: std::io::Error| DaoError::io(&tmp, e);
        let file = File::create(&tmp).map_err(io_err)?;
        let mut out = BufWriter::new(file);

        writeln!(out, "{}", self.header().join("\t")).map_err(io_err)?;
        for row in rows {
            write!(out, "{}", row.ent).map_err(io_err)?;
            for class in &row.classes {
                write!(out, "\t{class}").map_err(io_err)?;
            }
            for sent in &row.sents {
                write!(out, "\t{sent}").map_err(io_err)?;
            }
            writeln!(out).map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;
        drop(out);
        fs::rename(&tmp, &self.path).map_err(|e| DaoError::io(&self.path, e))?;

        tracing::debug!("wrote {} samples to {}", rows.len(), self.path.display());
        Ok(())
    }

    fn validate_row(&self, row: &SampleRow, line_no: usize) -> Result<()> {
        if row.classes.len() != self.class_count || row.sents.len() != self.sent_count {
            return Err(DaoError::format(
                &self.path,
                line_no,
                format!(
                    "entity {} has {} classes and {} sentences, table declares {} and {}",
                    row.ent,
                    row.classes.len(),
                    row.sents.len(),
                    self.class_count,
                    self.sent_count
                ),
            ));
        }
        if let Some(class) = row.classes.iter().find(|c| **c > 1) {
            return Err(DaoError::format(
                &self.path,
                line_no,
                format!("entity {}: class value {class} is not binary", row.ent),
            ));
        }
        if row.sents.iter().any(|s| s.contains(['\t', '\n', '\r'])) {
            return Err(DaoError::format(
                &self.path,
                line_no,
                format!("entity {}: sentence contains a tab or line break", row.ent),
            ));
        }
        Ok(())
    }

    /// Parse the whole table. The header must match `header()` exactly and
    /// every data row must have `1 + N + M` fields.
    pub fn read(&self) -> Result<Vec<SampleRow>> {
        let text = fs::read_to_string(&self.path).map_err(|e| DaoError::io(&self.path, e))?;
        let mut lines = text.lines().enumerate();

        match lines.next() {
            Some((_, header)) => {
                let found: Vec<&str> = header.trim_end_matches('\r').split('\t').collect();
                if found != self.header() {
                    return Err(DaoError::format(
                        &self.path,
                        1,
                        format!("unexpected header {:?}", found.join(" ")),
                    ));
                }
            }
            None => return Err(DaoError::format(&self.path, 1, "missing header row")),
        }

        let mut rows = Vec::new();
        for (idx, line) in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            rows.push(self.parse_row(line, idx + 1)?);
        }

        tracing::debug!("read {} samples from {}", rows.len(), self.path.display());
        Ok(rows)
    }

    fn parse_row(&self, line: &str, line_no: usize) -> Result<SampleRow> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != self.field_count() {
            return Err(DaoError::format(
                &self.path,
                line_no,
                format!(
                    "expected {} fields, found {}",
                    self.field_count(),
                    fields.len()
                ),
            ));
        }

        let ent = fields[0].trim().parse::<i64>().map_err(|_| {
            DaoError::format(&self.path, line_no, format!("bad entity id {:?}", fields[0]))
        })?;

        let class_fields = &fields[1..1 + self.class_count];
        let mut classes = Vec::with_capacity(self.class_count);
        for field in class_fields {
            match field.trim() {
                "0" => classes.push(0),
                "1" => classes.push(1),
                other => {
                    return Err(DaoError::format(
                        &self.path,
                        line_no,
                        format!("class value {other:?} is not 0 or 1"),
                    ));
                }
            }
        }

        let sents = fields[1 + self.class_count..]
            .iter()
            .map(|s| s.to_string())
            .collect();

        Ok(SampleRow { ent, classes, sents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(dir: &tempfile::TempDir) -> SamplesTsv {
        SamplesTsv::new("Test Samples TSV", dir.path().join("train.tsv"), 4, 3)
    }

    fn rows() -> Vec<SampleRow> {
        vec![
            SampleRow {
                ent: 1,
                classes: vec![0, 0, 0, 0],
                sents: vec!["Foo.".into(), "Bar.".into(), "Baz.".into()],
            },
            SampleRow {
                ent: 2,
                classes: vec![0, 1, 0, 1],
                sents: vec!["Lorem.".into(), "Ypsum.".into(), "".into()],
            },
        ]
    }

    #[test]
    fn writes_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        tsv.write(&rows()).unwrap();

        let text = fs::read_to_string(tsv.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("ent\tclass_0\tclass_1\tclass_2\tclass_3\tsent_0\tsent_1\tsent_2")
        );
        assert_eq!(lines.next(), Some("1\t0\t0\t0\t0\tFoo.\tBar.\tBaz."));
        assert_eq!(lines.next(), Some("2\t0\t1\t0\t1\tLorem.\tYpsum.\t"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn reads_back_written_rows() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        tsv.write(&rows()).unwrap();
        assert_eq!(tsv.read().unwrap(), rows());
    }

    #[test]
    fn short_row_is_rejected_with_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        let header = tsv.header().join("\t");
        fs::write(
            tsv.path(),
            format!("{header}\n1\t0\t0\t0\t0\ta\tb\tc\n2\t0\t1\t0\t1\ta\tb\n"),
        )
        .unwrap();

        match tsv.read() {
            Err(DaoError::Format { line, message, .. }) => {
                assert_eq!(line, 3);
                assert!(message.contains("expected 8 fields, found 7"));
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn long_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        let header = tsv.header().join("\t");
        fs::write(tsv.path(), format!("{header}\n1\t0\t0\t0\t0\ta\tb\tc\td\n")).unwrap();

        assert!(matches!(tsv.read(), Err(DaoError::Format { line: 2, .. })));
    }

    #[test]
    fn wrong_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        fs::write(
            tsv.path(),
            "entity\tclass_1\tclass_2\tclass_3\tclass_4\tsent_1\tsent_2\tsent_3\n",
        )
        .unwrap();

        assert!(matches!(tsv.read(), Err(DaoError::Format { line: 1, .. })));
    }

    #[test]
    fn non_binary_class_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        let header = tsv.header().join("\t");
        fs::write(tsv.path(), format!("{header}\n1\t0\t2\t0\t0\ta\tb\tc\n")).unwrap();

        assert!(matches!(tsv.read(), Err(DaoError::Format { line: 2, .. })));
    }

    #[test]
    fn writer_rejects_mismatched_row() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        let mut bad = rows();
        bad[1].sents.pop();

        assert!(matches!(tsv.write(&bad), Err(DaoError::Format { line: 3, .. })));
    }

    #[test]
    fn writer_rejects_tab_in_sentence() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        let mut bad = rows();
        bad[0].sents[0] = "two\tcolumns".into();

        assert!(matches!(tsv.write(&bad), Err(DaoError::Format { line: 2, .. })));
    }

    #[test]
    fn rejected_write_keeps_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        tsv.write(&rows()).unwrap();
        let before = fs::read_to_string(tsv.path()).unwrap();

        let mut bad = rows();
        bad.push(SampleRow {
            ent: 3,
            classes: vec![1, 0, 0, 0],
            sents: vec!["a\tb".into(), "c".into(), "d".into()],
        });
        assert!(matches!(tsv.write(&bad), Err(DaoError::Format { line: 4, .. })));

        assert_eq!(fs::read_to_string(tsv.path()).unwrap(), before);
        assert_eq!(tsv.read().unwrap(), rows());
        assert!(!dir.path().join("train.tsv.tmp").exists());
    }

    #[test]
    fn rejected_first_write_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = table(&dir);
        let mut bad = rows();
        bad[1].classes[0] = 3;

        assert!(tsv.write(&bad).is_err());
        assert!(!tsv.path().exists());
    }
}
