/// Error types for the few fallible surfaces: config files, level catalog
/// files, and save slots. Gameplay itself never fails: invalid requests
/// are ignored and numeric state is clamped.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("could not read level catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("level catalog parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("level catalog has no levels")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("save I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("save file is corrupt: {0}")]
    Decode(#[from] toml::de::Error),
    #[error("could not encode save: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("slot {0} is empty")]
    EmptySlot(u8),
    #[error("save does not match the loaded levels: {0}")]
    Mismatch(String),
}
