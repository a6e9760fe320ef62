//! Versioned binary artifacts for trained models.
//!
//! File layout:
//!
//!   "OWRA"                 4-byte magic
//!   ArtifactEnvelope       bincode, fixed-int little-endian
//!     format_version       container layout version
//!     kind                 model type tag, e.g. "power.ruler"
//!     schema_version       version of that model's serialized shape
//!     created_at           unix seconds
//!     checksum             blake3 of `payload`
//!     payload              bincode encoding of the model
//!
//! A model type opts in by implementing `ModelArtifact`. Loading checks the
//! tag and schema version before touching the payload, so an artifact from
//! an incompatible model version fails loudly instead of half-decoding.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::base::{tmp_path, DataFile};
use crate::error::{DaoError, Result};

pub const MAGIC: [u8; 4] = *b"OWRA";
pub const FORMAT_VERSION: u16 = 1;

const MAX_ARTIFACT_BYTES: usize = 1 << 30;

fn artifact_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
        .with_limit::<MAX_ARTIFACT_BYTES>()
}

/// A model that can be persisted as an artifact. Bump `SCHEMA_VERSION`
/// whenever the serialized shape changes.
pub trait ModelArtifact: Serialize + DeserializeOwned {
    const KIND: &'static str;
    const SCHEMA_VERSION: u32;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    pub format_version: u16,
    pub kind: String,
    pub schema_version: u32,
    pub created_at: i64,
    pub checksum: [u8; 32],
    pub payload: Vec<u8>,
}

/// Envelope metadata without the payload, as shown by `artifact-info`.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub format_version: u16,
    pub kind: String,
    pub schema_version: u32,
    pub created_at: String,
    pub payload_bytes: usize,
    pub checksum: String,
    pub checksum_ok: bool,
}

#[derive(Debug, Clone)]
pub struct ArtifactFile<T> {
    name: String,
    path: PathBuf,
    _model: PhantomData<fn() -> T>,
}

impl<T> DataFile for ArtifactFile<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: ModelArtifact> ArtifactFile<T> {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            _model: PhantomData,
        }
    }

    pub fn save(&self, model: &T) -> Result<()> {
        let encode_err = |e: bincode::error::EncodeError| DaoError::Encode {
            path: self.path.clone(),
            reason: e.to_string(),
        };
        let payload = bincode::serde::encode_to_vec(model, artifact_config()).map_err(encode_err)?;
        let envelope = ArtifactEnvelope {
            format_version: FORMAT_VERSION,
            kind: T::KIND.to_string(),
            schema_version: T::SCHEMA_VERSION,
            created_at: Utc::now().timestamp(),
            checksum: *blake3::hash(&payload).as_bytes(),
            payload,
        };
        let body = bincode::serde::encode_to_vec(&envelope, artifact_config()).map_err(encode_err)?;

        let mut bytes = Vec::with_capacity(MAGIC.len() + body.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&body);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DaoError::io(parent, e))?;
        }
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, &bytes).map_err(|e| DaoError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| DaoError::io(&self.path, e))?;

        tracing::info!(
            "saved {} v{} ({} bytes) to {}",
            T::KIND,
            T::SCHEMA_VERSION,
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn load(&self) -> Result<T> {
        let envelope = read_envelope(&self.path)?;
        let corrupt = |reason: String| DaoError::corrupt(&self.path, reason);

        if envelope.kind != T::KIND {
            return Err(corrupt(format!(
                "holds {:?}, expected {:?}",
                envelope.kind,
                T::KIND
            )));
        }
        if envelope.schema_version != T::SCHEMA_VERSION {
            return Err(corrupt(format!(
                "{} schema v{} is incompatible with v{}",
                T::KIND,
                envelope.schema_version,
                T::SCHEMA_VERSION
            )));
        }
        if blake3::hash(&envelope.payload).as_bytes() != &envelope.checksum {
            return Err(corrupt("payload checksum mismatch".to_string()));
        }

        let (model, read) =
            bincode::serde::decode_from_slice::<T, _>(&envelope.payload, artifact_config())
                .map_err(|e| corrupt(format!("payload decode failed: {e}")))?;
        if read != envelope.payload.len() {
            return Err(corrupt(format!(
                "{} trailing payload bytes",
                envelope.payload.len() - read
            )));
        }

        tracing::debug!("loaded {} from {}", T::KIND, self.path.display());
        Ok(model)
    }
}

/// Read and validate magic, container version and envelope framing.
fn read_envelope(path: &Path) -> Result<ArtifactEnvelope> {
    let bytes = fs::read(path).map_err(|e| DaoError::corrupt(path, format!("unreadable: {e}")))?;
    let Some(body) = bytes.strip_prefix(&MAGIC) else {
        return Err(DaoError::corrupt(path, "bad magic"));
    };

    let (envelope, read) =
        bincode::serde::decode_from_slice::<ArtifactEnvelope, _>(body, artifact_config())
            .map_err(|e| DaoError::corrupt(path, format!("envelope decode failed: {e}")))?;
    if read != body.len() {
        return Err(DaoError::corrupt(
            path,
            format!("{} trailing bytes after envelope", body.len() - read),
        ));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(DaoError::corrupt(
            path,
            format!("unsupported container version {}", envelope.format_version),
        ));
    }
    Ok(envelope)
}

/// Describe an artifact without knowing which model type it holds.
pub fn inspect(path: &Path) -> Result<ArtifactInfo> {
    let envelope = read_envelope(path)?;
    let actual = blake3::hash(&envelope.payload);
    let created_at = DateTime::<Utc>::from_timestamp(envelope.created_at, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| envelope.created_at.to_string());
    Ok(ArtifactInfo {
        format_version: envelope.format_version,
        kind: envelope.kind,
        schema_version: envelope.schema_version,
        created_at,
        payload_bytes: envelope.payload.len(),
        checksum: actual.to_hex().to_string(),
        checksum_ok: actual.as_bytes() == &envelope.checksum,
    })
}
