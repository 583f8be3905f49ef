// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Crash-safe file persistence
//!
//! Every save writes a sibling temp file, syncs it and renames it over the
//! target, so a reader sees either the old file or the new one, never a torn
//! write. Saves overwrite; nothing is appended.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::StorageError;

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn save_json<T: Serialize>(path: &Path, what: &'static str, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StorageError::encode(what, e))?;
    write_atomic(path, &bytes)
}

pub fn load_json<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<T, StorageError> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| StorageError::decode(what, e))
}

pub fn save_bincode<T: Serialize>(path: &Path, what: &'static str, value: &T) -> Result<(), StorageError> {
    let bytes = bincode::serialize(value).map_err(|e| StorageError::encode(what, e))?;
    write_atomic(path, &bytes)
}

pub fn load_bincode<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<T, StorageError> {
    let bytes = fs::read(path)?;
    bincode::deserialize(&bytes).map_err(|e| StorageError::decode(what, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        name: String,
        values: Vec<f32>,
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file.bin");

        write_atomic(&path, b"first version, longer").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_bincode_and_json() {
        let dir = TempDir::new().unwrap();
        let blob = Blob {
            name: "w".to_string(),
            values: vec![0.5, -0.25],
        };

        let bin = dir.path().join("blob.bin");
        save_bincode(&bin, "blob", &blob).unwrap();
        assert_eq!(load_bincode::<Blob>(&bin, "blob").unwrap(), blob);

        let json = dir.path().join("blob.json");
        save_json(&json, "blob", &blob).unwrap();
        assert_eq!(load_json::<Blob>(&json, "blob").unwrap(), blob);
    }

    #[test]
    fn test_decode_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.json");
        fs::write(&path, b"not json").unwrap();

        let err = load_json::<Blob>(&path, "blob").unwrap_err();
        assert!(matches!(err, StorageError::Decode { what: "blob", .. }));
    }
}
