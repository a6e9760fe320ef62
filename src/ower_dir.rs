//! OWER directory: everything the classifier needs for training.
//!
//!   ower/
//!       train.db     OWER Train Triples DB
//!       valid.db     OWER Valid Triples DB
//!       test.db      OWER Test Triples DB
//!       train.tsv    OWER Train Samples TSV
//!       valid.tsv    OWER Valid Samples TSV
//!       test.tsv     OWER Test Samples TSV

use std::path::{Path, PathBuf};

use crate::base::{DataDir, DataFile};
use crate::error::Result;
use crate::samples_tsv::{SampleRow, SamplesTsv};
use crate::triples_db::TriplesDb;
use crate::vocab::{tokenize, PretrainedVectors, Vocab};

/// A sample with its sentences encoded as vocabulary indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub ent: i64,
    pub classes: Vec<u8>,
    pub sents: Vec<Vec<usize>>,
}

/// The three encoded splits plus the vocabulary built from `train`.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub train: Vec<Sample>,
    pub valid: Vec<Sample>,
    pub test: Vec<Sample>,
    pub vocab: Vocab,
}

#[derive(Debug, Clone)]
pub struct OwerDir {
    name: String,
    path: PathBuf,

    pub train_triples_db: TriplesDb,
    pub valid_triples_db: TriplesDb,
    pub test_triples_db: TriplesDb,

    pub train_samples_tsv: SamplesTsv,
    pub valid_samples_tsv: SamplesTsv,
    pub test_samples_tsv: SamplesTsv,
}

impl DataDir for OwerDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn members(&self) -> Vec<&dyn DataFile> {
        vec![
            &self.train_triples_db as &dyn DataFile,
            &self.valid_triples_db,
            &self.test_triples_db,
            &self.train_samples_tsv,
            &self.valid_samples_tsv,
            &self.test_samples_tsv,
        ]
    }
}

impl OwerDir {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        class_count: usize,
        sent_count: usize,
    ) -> Self {
        let path = path.into();
        let samples = |label: &str, file: &str| {
            SamplesTsv::new(
                format!("OWER {label} Samples TSV"),
                path.join(file),
                class_count,
                sent_count,
            )
        };
        Self {
            name: name.into(),
            train_triples_db: TriplesDb::new("OWER Train Triples DB", path.join("train.db")),
            valid_triples_db: TriplesDb::new("OWER Valid Triples DB", path.join("valid.db")),
            test_triples_db: TriplesDb::new("OWER Test Triples DB", path.join("test.db")),
            train_samples_tsv: samples("Train", "train.tsv"),
            valid_samples_tsv: samples("Valid", "valid.tsv"),
            test_samples_tsv: samples("Test", "test.tsv"),
            path,
        }
    }

    /// Check the directory, read all three splits, build the vocabulary
    /// from the training sentences only and encode every split with it.
    pub fn read_datasets(&self, vectors: Option<&PretrainedVectors>) -> Result<Datasets> {
        self.check()?;

        let train_rows = tokenize_rows(self.train_samples_tsv.read()?);
        let valid_rows = tokenize_rows(self.valid_samples_tsv.read()?);
        let test_rows = tokenize_rows(self.test_samples_tsv.read()?);

        let train_tokens = train_rows
            .iter()
            .flat_map(|row| row.sents.iter().flatten().map(String::as_str));
        let vocab = Vocab::build(train_tokens, vectors);

        let datasets = Datasets {
            train: encode_rows(train_rows, &vocab),
            valid: encode_rows(valid_rows, &vocab),
            test: encode_rows(test_rows, &vocab),
            vocab,
        };

        tracing::info!(
            "{}: train={} valid={} test={} vocab={}",
            self.name,
            datasets.train.len(),
            datasets.valid.len(),
            datasets.test.len(),
            datasets.vocab.len()
        );
        Ok(datasets)
    }
}

struct TokenizedRow {
    ent: i64,
    classes: Vec<u8>,
    sents: Vec<Vec<String>>,
}

fn tokenize_rows(rows: Vec<SampleRow>) -> Vec<TokenizedRow> {
    rows.into_iter()
        .map(|row| TokenizedRow {
            ent: row.ent,
            classes: row.classes,
            sents: row.sents.iter().map(|s| tokenize(s)).collect(),
        })
        .collect()
}

fn encode_rows(rows: Vec<TokenizedRow>, vocab: &Vocab) -> Vec<Sample> {
    rows.into_iter()
        .map(|row| Sample {
            ent: row.ent,
            classes: row.classes,
            sents: row.sents.iter().map(|tokens| vocab.encode(tokens)).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaoError;
    use crate::triples_db::Triple;
    use crate::vocab::UNK_INDEX;

    fn row(ent: i64, classes: [u8; 2], sents: [&str; 2]) -> SampleRow {
        SampleRow {
            ent,
            classes: classes.to_vec(),
            sents: sents.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn build_dir(root: &Path) -> OwerDir {
        let dir = OwerDir::new("OWER Directory", root, 2, 2);
        for db in [&dir.train_triples_db, &dir.valid_triples_db, &dir.test_triples_db] {
            db.create_schema().unwrap();
            db.insert_many(&[Triple::new(1, 5, 99)]).unwrap();
        }
        dir.train_samples_tsv
            .write(&[
                row(1, [1, 0], ["Foo bar", "bar BAZ"]),
                row(2, [0, 1], ["baz", "Bar"]),
            ])
            .unwrap();
        dir.valid_samples_tsv
            .write(&[row(3, [1, 1], ["foo qux", ""])])
            .unwrap();
        dir.test_samples_tsv
            .write(&[row(4, [0, 0], ["BAR", "unseen words"])])
            .unwrap();
        dir
    }

    #[test]
    fn check_passes_on_complete_directory() {
        let tmp = tempfile::tempdir().unwrap();
        build_dir(tmp.path()).check().unwrap();
    }

    #[test]
    fn check_names_first_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = build_dir(tmp.path());
        std::fs::remove_file(tmp.path().join("valid.tsv")).unwrap();
        std::fs::remove_file(tmp.path().join("test.tsv")).unwrap();

        match dir.check() {
            Err(DaoError::MissingFile { name, .. }) => assert_eq!(name, "OWER Valid Samples TSV"),
            other => panic!("expected missing file, got {other:?}"),
        }
    }

    #[test]
    fn check_fails_on_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = OwerDir::new("OWER Directory", tmp.path().join("nope"), 2, 2);
        assert!(matches!(dir.check(), Err(DaoError::MissingFile { .. })));
    }

    #[test]
    fn read_datasets_encodes_all_splits_with_train_vocab() {
        let tmp = tempfile::tempdir().unwrap();
        let datasets = build_dir(tmp.path()).read_datasets(None).unwrap();
        let vocab = &datasets.vocab;

        assert_eq!(vocab.itos(), &["<unk>", "<pad>", "bar", "baz", "foo"]);

        assert_eq!(
            datasets.train[0],
            Sample {
                ent: 1,
                classes: vec![1, 0],
                sents: vec![vec![4, 2], vec![2, 3]],
            }
        );
        assert_eq!(datasets.valid[0].sents, vec![vec![4, UNK_INDEX], vec![]]);
        assert_eq!(datasets.test[0].ent, 4);
        assert_eq!(datasets.test[0].sents[1], vec![UNK_INDEX, UNK_INDEX]);
    }

    #[test]
    fn read_datasets_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = build_dir(tmp.path());
        let first = dir.read_datasets(None).unwrap();
        let second = dir.read_datasets(None).unwrap();

        assert_eq!(first.vocab, second.vocab);
        assert_eq!(first.train, second.train);
    }

    #[test]
    fn read_datasets_surfaces_malformed_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = build_dir(tmp.path());
        std::fs::write(
            tmp.path().join("test.tsv"),
            "ent\tclass_0\tclass_1\tsent_0\tsent_1\n4\t0\t0\tonly one\n",
        )
        .unwrap();

        assert!(matches!(
            dir.read_datasets(None),
            Err(DaoError::Format { line: 2, .. })
        ));
    }
}
