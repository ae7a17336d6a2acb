//! Asset bundle
//!
//! Models, the character dictionary and the bundled test image all live in
//! one directory. Lookups that miss explain what *is* there so the operator
//! can tell a missing export from a misnamed file.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::vision::error::{COMPILED_MODEL_EXTENSION, SOURCE_MODEL_EXTENSION};
use crate::vision::{DetectionError, ModelDiagnosis, SourceImage};

/// Errors loading non-model assets
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Test image '{name}' not found in assets")]
    TestImageNotFound { name: String },

    #[error(transparent)]
    Image(#[from] DetectionError),
}

/// Model and dictionary files found by [`AssetBundle::discover_models`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInventory {
    /// `.onnx` file names, sorted
    pub compiled: Vec<String>,
    /// `.pt` file names, sorted
    pub sources: Vec<String>,
}

/// Directory holding the bundled resources
#[derive(Debug, Clone)]
pub struct AssetBundle {
    root: PathBuf,
}

impl AssetBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a compiled model by exact file name.
    ///
    /// When it is missing, the bundle is searched for other model artifacts
    /// and the error carries the resulting [`ModelDiagnosis`].
    pub fn locate_model(&self, file_name: &str) -> Result<PathBuf, DetectionError> {
        let path = self.root.join(file_name);
        if path.is_file() {
            debug!("Located model {:?}", path);
            return Ok(path);
        }

        let inventory = self.discover_models();
        warn!(
            "Model {} missing; bundle has compiled {:?}, sources {:?}",
            file_name, inventory.compiled, inventory.sources
        );

        Err(DetectionError::ModelUnavailable {
            artifact: file_name.to_string(),
            diagnosis: ModelDiagnosis::from_discovery(inventory.compiled, inventory.sources),
        })
    }

    /// Resolve a non-model support file (e.g. the character dictionary)
    pub fn locate_file(&self, file_name: &str) -> Result<PathBuf, DetectionError> {
        let path = self.root.join(file_name);
        if path.is_file() {
            return Ok(path);
        }

        warn!("Support file {} missing from {:?}", file_name, self.root);
        Err(DetectionError::SupportFileMissing {
            file: file_name.to_string(),
            dir: self.root.display().to_string(),
        })
    }

    /// Walk the bundle recursively, skipping hidden entries, and collect the
    /// names of compiled and source model artifacts
    pub fn discover_models(&self) -> ModelInventory {
        let mut inventory = ModelInventory::default();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping {:?}: {}", dir, e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }

                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }

                match path.extension().and_then(|ext| ext.to_str()) {
                    Some(ext) if ext.eq_ignore_ascii_case(COMPILED_MODEL_EXTENSION) => inventory.compiled.push(name),
                    Some(ext) if ext.eq_ignore_ascii_case(SOURCE_MODEL_EXTENSION) => inventory.sources.push(name),
                    _ => {}
                }
            }
        }

        inventory.compiled.sort();
        inventory.sources.sort();
        inventory
    }

    /// Decode the named test image from the bundle
    pub fn load_test_image(&self, name: &str) -> Result<SourceImage, AssetError> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(AssetError::TestImageNotFound { name: name.to_string() });
        }
        Ok(SourceImage::open(&path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::describe;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"stub").unwrap();
    }

    #[test]
    fn test_locate_existing_model() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "yolov11n.onnx");

        let bundle = AssetBundle::new(dir.path());
        assert_eq!(bundle.locate_model("yolov11n.onnx").unwrap(), dir.path().join("yolov11n.onnx"));
    }

    #[test]
    fn test_empty_bundle_reports_nothing_found() {
        let dir = TempDir::new().unwrap();
        let bundle = AssetBundle::new(dir.path());

        match bundle.locate_model("yolov11n.onnx").unwrap_err() {
            DetectionError::ModelUnavailable { artifact, diagnosis } => {
                assert_eq!(artifact, "yolov11n.onnx");
                assert_eq!(diagnosis, ModelDiagnosis::NothingFound);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_uncompiled_source_is_diagnosed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("weights")).unwrap();
        touch(&dir.path().join("weights"), "yolov11n.pt");

        let err = AssetBundle::new(dir.path()).locate_model("yolov11n.onnx").unwrap_err();
        assert!(matches!(
            err,
            DetectionError::ModelUnavailable {
                diagnosis: ModelDiagnosis::UncompiledOnly { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_misnamed_compiled_lists_both_kinds() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "best.onnx");
        touch(dir.path(), "best.pt");
        touch(dir.path(), "det.ONNX");
        std::fs::create_dir(dir.path().join(".cache")).unwrap();
        touch(&dir.path().join(".cache"), "hidden.onnx");

        let bundle = AssetBundle::new(dir.path());
        let inventory = bundle.discover_models();
        assert_eq!(inventory.compiled, vec!["best.onnx", "det.ONNX"]);
        assert_eq!(inventory.sources, vec!["best.pt"]);

        let message = bundle.locate_model("yolov11n.onnx").unwrap_err().to_string();
        assert!(message.contains("best.onnx"));
        assert!(message.contains("best.pt"));
    }

    #[test]
    fn test_missing_dictionary_next_to_models() {
        let dir = TempDir::new().unwrap();
        for model in ["yolov11n.onnx", "det.onnx", "rec.onnx"] {
            touch(dir.path(), model);
        }

        let bundle = AssetBundle::new(dir.path());
        let err = bundle.locate_file("dict.txt").unwrap_err();
        match &err {
            DetectionError::SupportFileMissing { file, dir: missing_from } => {
                assert_eq!(file, "dict.txt");
                assert_eq!(missing_from, &dir.path().display().to_string());
            }
            other => panic!("unexpected error {:?}", other),
        }

        let message = describe(&err);
        assert!(message.contains("Support file 'dict.txt' missing"));
        assert!(!message.contains("No .onnx or .pt"));
        assert!(!message.contains("Export"));

        touch(dir.path(), "dict.txt");
        assert_eq!(bundle.locate_file("dict.txt").unwrap(), dir.path().join("dict.txt"));
    }

    #[test]
    fn test_missing_test_image_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = AssetBundle::new(dir.path()).load_test_image("bus.jpg").unwrap_err();
        assert_eq!(err.to_string(), "Test image 'bus.jpg' not found in assets");
    }

    #[test]
    fn test_load_test_image() {
        let dir = TempDir::new().unwrap();
        RgbImage::from_pixel(8, 4, Rgb([10, 20, 30]))
            .save(dir.path().join("bus.png"))
            .unwrap();

        let image = AssetBundle::new(dir.path()).load_test_image("bus.png").unwrap();
        assert_eq!((image.width(), image.height()), (8, 4));
    }

    #[test]
    fn test_corrupt_test_image_is_invalid_image() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "bus.png");

        let err = AssetBundle::new(dir.path()).load_test_image("bus.png").unwrap_err();
        assert!(matches!(err, AssetError::Image(DetectionError::InvalidImage { .. })));
    }
}
