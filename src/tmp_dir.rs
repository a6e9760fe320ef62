//! Temporary directory that keeps the per-split triples databases around
//! for debugging:
//!
//!   tmp/
//!       train.db
//!       valid.db
//!       test.db

use std::path::{Path, PathBuf};

use crate::base::{DataDir, DataFile};
use crate::triples_db::TriplesDb;

#[derive(Debug, Clone)]
pub struct TmpDir {
    name: String,
    path: PathBuf,

    pub train_triples_db: TriplesDb,
    pub valid_triples_db: TriplesDb,
    pub test_triples_db: TriplesDb,
}

impl DataDir for TmpDir {
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
        ]
    }
}

impl TmpDir {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: name.into(),
            train_triples_db: TriplesDb::new("Train Triples DB", path.join("train.db")),
            valid_triples_db: TriplesDb::new("Valid Triples DB", path.join("valid.db")),
            test_triples_db: TriplesDb::new("Test Triples DB", path.join("test.db")),
            path,
        }
    }

    pub fn triples_dbs(&self) -> [&TriplesDb; 3] {
        [
            &self.train_triples_db,
            &self.valid_triples_db,
            &self.test_triples_db,
        ]
    }
}
