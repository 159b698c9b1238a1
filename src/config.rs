//! Run Configuration
//!
//! Static for the whole run. Loaded from JSON, then overridden field by field
//! from the command line.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::params::{ConfigError, TransformParameters};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// When set, output goes to `<outputDir>/<animationName>`.
    #[serde(default)]
    pub animation_name: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: i64,
    #[serde(default)]
    pub shift_x: i32,
    #[serde(default)]
    pub shift_y: i32,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
}

fn default_input_dir() -> PathBuf { PathBuf::from("Inputs") }
fn default_output_dir() -> PathBuf { PathBuf::from("Assets") }
fn default_threshold() -> i64 { 200 }
fn default_scale_factor() -> f64 { 0.5 }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            animation_name: None,
            threshold: default_threshold(),
            shift_x: 0,
            shift_y: 0,
            scale_factor: default_scale_factor(),
        }
    }
}

impl RunConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Directory that receives sequence folders and manifest.txt.
    pub fn output_root(&self) -> PathBuf {
        match &self.animation_name {
            Some(name) => self.output_dir.join(name),
            None => self.output_dir.clone(),
        }
    }

    pub fn transform_parameters(&self) -> Result<TransformParameters, ConfigError> {
        TransformParameters::new(self.threshold, self.shift_x, self.shift_y, self.scale_factor)
    }

    /// Check everything that can be checked before touching the filesystem.
    pub fn validate(&self) -> Result<TransformParameters, ConfigError> {
        if self.input_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("input"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("output"));
        }
        if let Some(name) = &self.animation_name {
            let mut parts = Path::new(name).components();
            let single = matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None));
            if !single {
                return Err(ConfigError::InvalidName(name.clone()));
            }
        }
        self.transform_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let cfg: RunConfig = serde_json::from_value(json!({"threshold": 90})).unwrap();
        assert_eq!(cfg.threshold, 90);
        assert_eq!(cfg.scale_factor, 0.5);
        assert_eq!(cfg.input_dir, PathBuf::from("Inputs"));
        assert_eq!(cfg.output_root(), PathBuf::from("Assets"));
    }

    #[test]
    fn test_animation_name_nests_output() {
        let cfg = RunConfig {
            animation_name: Some("Coela".into()),
            ..RunConfig::default()
        };
        assert_eq!(cfg.output_root(), Path::new("Assets").join("Coela"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_scale = RunConfig { scale_factor: 0.0, ..RunConfig::default() };
        assert!(matches!(bad_scale.validate(), Err(ConfigError::NonPositiveScale(_))));

        let bad_threshold = RunConfig { threshold: 300, ..RunConfig::default() };
        assert!(matches!(bad_threshold.validate(), Err(ConfigError::ThresholdOutOfRange(300))));

        let bad_name = RunConfig { animation_name: Some("../up".into()), ..RunConfig::default() };
        assert!(matches!(bad_name.validate(), Err(ConfigError::InvalidName(_))));

        let empty = RunConfig { output_dir: PathBuf::new(), ..RunConfig::default() };
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyPath("output"))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{"shiftX": -4, "scaleFactor": 1.5}"#).unwrap();
        let cfg = RunConfig::load_from_file(&path).unwrap();
        assert_eq!(cfg.shift_x, -4);
        assert_eq!(cfg.scale_factor, 1.5);

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(RunConfig::load_from_file(&path), Err(ConfigError::Parse { .. })));
    }
}
