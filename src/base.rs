//! Presence checks shared by every file and directory object.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::{DaoError, Result};

/// A named file with a fixed location. The name is what shows up in
/// error messages ("OWER Train Triples DB" rather than a bare path).
pub trait DataFile {
    fn name(&self) -> &str;
    fn path(&self) -> &Path;

    /// Fails with `MissingFile` unless the path is a readable, non-empty
    /// regular file.
    fn check(&self) -> Result<()> {
        let present = fs::metadata(self.path())
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);
        if !present || File::open(self.path()).is_err() {
            return Err(missing(self.name(), self.path()));
        }
        Ok(())
    }
}

/// A named directory whose members are checked in a fixed order.
pub trait DataDir {
    fn name(&self) -> &str;
    fn path(&self) -> &Path;

    /// Members in the order `check()` visits them.
    fn members(&self) -> Vec<&dyn DataFile>;

    fn check(&self) -> Result<()> {
        if !self.path().is_dir() {
            return Err(missing(self.name(), self.path()));
        }
        for member in self.members() {
            member.check()?;
        }
        Ok(())
    }
}

/// `<path>.tmp`, the staging file for a write that is renamed into place.
/// The full file name is kept so `a.bin` and `a.pkl` never share one.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn missing(name: &str, path: &Path) -> DaoError {
    DaoError::MissingFile {
        name: name.to_string(),
        path: path.to_path_buf(),
    }
}
