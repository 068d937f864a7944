//! Dataset descriptors.
//!
//! This module provides `DatasetDescriptor`, the `data.yaml` companion
//! file of a YOLO-style training layout: split directories under one
//! root, a class count, and the class name list. Class names are
//! derived from the immediate subfolders of the root, sorted by name so
//! repeated scans of the same tree agree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Contents of a `data.yaml`. Keys serialize in declaration order.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DatasetDescriptor {
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: usize,
    pub names: Vec<String>,
}

impl DatasetDescriptor {
    /// Build a descriptor for a dataset root: split paths under the
    /// root, classes named after its immediate subfolders.
    pub fn from_root(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Open(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let entries = std::fs::read_dir(root)
            .map_err(|e| Error::Open(format!("read {}: {}", root.display(), e)))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Open(format!("read {}: {}", root.display(), e)))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        Ok(Self {
            train: root.join("train").to_string_lossy().into_owned(),
            val: root.join("val").to_string_lossy().into_owned(),
            test: root.join("test").to_string_lossy().into_owned(),
            nc: names.len(),
            names,
        })
    }

    /// Write `data.yaml` into the given directory and return its path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let text = serde_yaml::to_string(self)
            .map_err(|e| Error::Export(format!("serialize dataset descriptor: {}", e)))?;
        let path = dir.join("data.yaml");
        std::fs::write(&path, text)
            .map_err(|e| Error::Export(format!("write {}: {}", path.display(), e)))?;
        log::info!("dataset descriptor saved: {}", path.display());
        Ok(path)
    }

    /// Parse a descriptor file, checking that `nc` matches the class
    /// list length.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Open(format!("read {}: {}", path.display(), e)))?;
        let descriptor: Self = serde_yaml::from_str(&text)
            .map_err(|e| Error::Read(format!("parse {}: {}", path.display(), e)))?;
        if descriptor.nc != descriptor.names.len() {
            return Err(Error::Read(format!(
                "{}: nc is {} but names lists {} entries",
                path.display(),
                descriptor.nc,
                descriptor.names.len()
            )));
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_root_names_sorted_subfolders() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir(dir.path().join("dog"))?;
        std::fs::create_dir(dir.path().join("cat"))?;
        std::fs::write(dir.path().join("notes.txt"), b"not a class")?;

        let descriptor = DatasetDescriptor::from_root(dir.path())?;
        assert_eq!(descriptor.nc, 2);
        assert_eq!(descriptor.names, ["cat", "dog"]);
        assert!(descriptor.train.ends_with("train"));
        assert!(descriptor.val.ends_with("val"));
        assert!(descriptor.test.ends_with("test"));
        Ok(())
    }

    #[test]
    fn from_root_rejects_non_directories() {
        let err = DatasetDescriptor::from_root(Path::new("/nonexistent/dataset")).unwrap_err();
        assert_eq!(err.kind(), "open");
    }

    #[test]
    fn save_and_load_round_trip_preserves_unicode() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir(dir.path().join("行人"))?;
        std::fs::create_dir(dir.path().join("车辆"))?;

        let descriptor = DatasetDescriptor::from_root(dir.path())?;
        let path = descriptor.save(dir.path())?;
        assert!(path.ends_with("data.yaml"));

        let text = std::fs::read_to_string(&path)?;
        assert!(text.starts_with("train:"));

        let loaded = DatasetDescriptor::load(&path)?;
        assert_eq!(loaded, descriptor);
        assert_eq!(loaded.names, ["行人", "车辆"]);
        Ok(())
    }

    #[test]
    fn load_rejects_class_count_mismatch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data.yaml");
        std::fs::write(
            &path,
            "train: t\nval: v\ntest: s\nnc: 3\nnames:\n- cat\n- dog\n",
        )?;

        let err = DatasetDescriptor::load(&path).unwrap_err();
        assert_eq!(err.kind(), "read");
        Ok(())
    }
}
