//! Labels TSV: human-readable labels of entities or relations.
//!
//!   id  lbl
//!   0   Dominican Republic
//!   1   republic
//!   2   Mighty Morphin Power Rangers

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::base::DataFile;
use crate::error::{DaoError, Result};

const HEADER: &str = "id\tlbl";

#[derive(Debug, Clone)]
pub struct LabelsTsv {
    name: String,
    path: PathBuf,
}

impl DataFile for LabelsTsv {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl LabelsTsv {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Write the header and one row per entry, in the order given.
    pub fn save(&self, id_to_lbl: &[(i64, String)]) -> Result<()> {
        let mut seen = HashSet::with_capacity(id_to_lbl.len());
        for (idx, (id, lbl)) in id_to_lbl.iter().enumerate() {
            let line_no = idx + 2;
            if !seen.insert(*id) {
                return Err(DaoError::format(&self.path, line_no, format!("duplicate id {id}")));
            }
            if lbl.contains(['\t', '\n', '\r']) {
                return Err(DaoError::format(
                    &self.path,
                    line_no,
                    format!("label of {id} contains a tab or line break"),
                ));
            }
        }

        let file = File::create(&self.path).map_err(|e| DaoError::io(&self.path, e))?;
        let mut out = BufWriter::new(file);
        let io_err = |e: std::io::Error| DaoError::io(&self.path, e);

        writeln!(out, "{HEADER}").map_err(io_err)?;
        for (id, lbl) in id_to_lbl {
            writeln!(out, "{id}\t{lbl}").map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;

        tracing::debug!("saved {} labels to {}", id_to_lbl.len(), self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<BTreeMap<i64, String>> {
        let text = fs::read_to_string(&self.path).map_err(|e| DaoError::io(&self.path, e))?;
        let mut lines = text.lines().enumerate();

        match lines.next() {
            Some((_, header)) if header.trim_end_matches('\r') == HEADER => {}
            Some((_, header)) => {
                return Err(DaoError::format(
                    &self.path,
                    1,
                    format!("unexpected header {header:?}"),
                ));
            }
            None => return Err(DaoError::format(&self.path, 1, "missing header row")),
        }

        let mut id_to_lbl = BTreeMap::new();
        for (idx, line) in lines {
            let line_no = idx + 1;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let [id, lbl] = fields.as_slice() else {
                return Err(DaoError::format(
                    &self.path,
                    line_no,
                    format!("expected 2 fields, found {}", fields.len()),
                ));
            };
            let id = id.trim().parse::<i64>().map_err(|_| {
                DaoError::format(&self.path, line_no, format!("id {id:?} is not an integer"))
            })?;
            if id_to_lbl.insert(id, lbl.to_string()).is_some() {
                return Err(DaoError::format(&self.path, line_no, format!("duplicate id {id}")));
            }
        }
        Ok(id_to_lbl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels_file(dir: &tempfile::TempDir) -> LabelsTsv {
        LabelsTsv::new("Test Labels TSV", dir.path().join("ent_labels.tsv"))
    }

    #[test]
    fn save_then_load_returns_same_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = labels_file(&dir);
        tsv.save(&[(0, "Dominican Republic".into()), (1, "republic".into())])
            .unwrap();

        let loaded = tsv.load().unwrap();
        assert_eq!(
            loaded,
            BTreeMap::from([(0, "Dominican Republic".to_string()), (1, "republic".to_string())])
        );
    }

    #[test]
    fn save_keeps_given_order() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = labels_file(&dir);
        tsv.save(&[(2, "Mighty Morphin Power Rangers".into()), (0, "Dominican Republic".into())])
            .unwrap();

        let text = fs::read_to_string(tsv.path()).unwrap();
        assert_eq!(
            text,
            "id\tlbl\n2\tMighty Morphin Power Rangers\n0\tDominican Republic\n"
        );
    }

    #[test]
    fn load_rejects_three_fields() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = labels_file(&dir);
        fs::write(tsv.path(), "id\tlbl\n0\tok\n1\tnot\tok\n").unwrap();

        assert!(matches!(tsv.load(), Err(DaoError::Format { line: 3, .. })));
    }

    #[test]
    fn load_rejects_non_integer_id() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = labels_file(&dir);
        fs::write(tsv.path(), "id\tlbl\nQ42\tDouglas Adams\n").unwrap();

        assert!(matches!(tsv.load(), Err(DaoError::Format { line: 2, .. })));
    }

    #[test]
    fn load_rejects_missing_header() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = labels_file(&dir);
        fs::write(tsv.path(), "0\tDominican Republic\n").unwrap();

        assert!(matches!(tsv.load(), Err(DaoError::Format { line: 1, .. })));
    }

    #[test]
    fn save_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = labels_file(&dir);
        let err = tsv
            .save(&[(0, "a".into()), (0, "b".into())])
            .unwrap_err();

        assert!(matches!(err, DaoError::Format { line: 3, .. }));
        assert!(!tsv.path().exists());
    }
}
