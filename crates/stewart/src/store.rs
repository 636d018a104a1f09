// Persistent key/value storage for calibration and cueing tuning

use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};
use stewart_core::{kinematics::GeometryConfig, scaling::BitDepth, supervisor::SlewSteps};
use thiserror::Error;

use crate::output::ServoCalibration;

pub const CALIBRATION_KEY: &str = "calibration";
pub const CUEING_KEY: &str = "mca_cfg";

pub const CALIBRATION_SCHEMA: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access blob '{key}'")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode blob '{key}'")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("blob '{key}' is malformed")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("blob '{key}' has schema version {found}, expected {expected}")]
    Schema {
        key: String,
        found: u32,
        expected: u32,
    },
}

pub trait BlobStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn save(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;
}

/// One `<key>.json` file per blob under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn save(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        // Write then rename so a reader never sees half a blob
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, data).map_err(io_err)?;
        fs::rename(&tmp, self.path(key)).map_err(io_err)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    fn save(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.blobs.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

#[derive(Deserialize)]
struct Header {
    schema_version: u32,
}

/// Decode a blob, checking its schema version before any other field.
pub fn decode_versioned<T: DeserializeOwned>(
    key: &str,
    data: &[u8],
    expected: u32,
) -> Result<T, StoreError> {
    let decode_err = |source| StoreError::Decode {
        key: key.to_string(),
        source,
    };
    let header: Header = serde_json::from_slice(data).map_err(decode_err)?;
    if header.schema_version != expected {
        return Err(StoreError::Schema {
            key: key.to_string(),
            found: header.schema_version,
            expected,
        });
    }
    serde_json::from_slice(data).map_err(decode_err)
}

pub fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}

/// Everything the device needs to drive its own hardware. Axis scales are
/// derived from the geometry on load, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBlob {
    pub schema_version: u32,
    pub geometry: GeometryConfig,
    pub bits: BitDepth,
    pub servo: ServoCalibration,
    pub slew: SlewSteps,
}
