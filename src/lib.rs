//! Data access for OWER/POWER training directories: triples databases,
//! samples and labels tables, model artifacts and tensor heatmaps.

pub mod artifact;
pub mod base;
pub mod config_file;
pub mod diagnostics;
pub mod error;
pub mod labels_tsv;
pub mod ower_dir;
pub mod samples_tsv;
pub mod tmp_dir;
pub mod triples_db;
pub mod vocab;

pub use error::{DaoError, Result};
