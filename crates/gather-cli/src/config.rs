//! Run configuration.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

pub const DEFAULT_DOWNLOAD_DIR: &str = "downloaded_images";
pub const DEFAULT_STAGING_DIR: &str = "matching_images";
pub const DEFAULT_ARCHIVE_PATH: &str = "matching_images.zip";

/// Values from an optional TOML config file. CLI flags take precedence.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub tolerance: Option<f32>,
    pub download_dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Load a config file; a missing file means defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&contents).map_err(|e| anyhow!("invalid config: {e}"))
    }
}

/// Fully-resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub reference: PathBuf,
    pub folder_link: String,
    pub tolerance: f32,
    pub download_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub archive_path: PathBuf,
    pub model_dir: PathBuf,
}

impl RunConfig {
    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir.join("det_10g.onnx").to_string_lossy().into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir.join("w600k_r50.onnx").to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file_is_default() {
        let config = FileConfig::load(Path::new("/nonexistent/gather.toml")).unwrap();
        assert!(config.tolerance.is_none());
        assert!(config.download_dir.is_none());
    }

    #[test]
    fn test_load_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gather.toml");
        std::fs::write(
            &path,
            "tolerance = 0.5\ndownload_dir = \"dl\"\nmodel_dir = \"/opt/models\"\n",
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.tolerance, Some(0.5));
        assert_eq!(config.download_dir.as_deref(), Some(Path::new("dl")));
        assert_eq!(config.model_dir.as_deref(), Some(Path::new("/opt/models")));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gather.toml");
        std::fs::write(&path, "tollerance = 0.5\n").unwrap();
        assert!(FileConfig::load(&path).is_err());
    }

    #[test]
    fn test_model_paths() {
        let config = RunConfig {
            reference: PathBuf::from("me.jpg"),
            folder_link: String::new(),
            tolerance: 0.6,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            archive_path: PathBuf::from(DEFAULT_ARCHIVE_PATH),
            model_dir: PathBuf::from("/m"),
        };
        assert_eq!(config.scrfd_model_path(), "/m/det_10g.onnx");
        assert_eq!(config.arcface_model_path(), "/m/w600k_r50.onnx");
    }
}
