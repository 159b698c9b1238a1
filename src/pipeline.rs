//! Batch Pipeline - Single Entry Point
//!
//! Configuration is validated before anything is read or written, and the
//! scale factor is checked against every image header before the first
//! sequence is emitted. After that, failures are isolated: a bad image skips
//! the image, an empty folder skips the sequence, a write failure drops that
//! sequence. Only configuration, discovery and the final manifest write can
//! abort the batch.

use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::descriptor::{Manifest, ManifestEntry};
use crate::discovery::{discover_sequences, DiscoveryError, SequenceSource};
use crate::emitter::{EmitError, EmittedSequence, SequenceEmitter};
use crate::hashing::compute_config_hash;
use crate::params::{ConfigError, TransformParameters};
use crate::transform::{transform, CanvasFrame};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to write manifest: {0}")]
    Manifest(#[source] EmitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedImage {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceReport {
    pub name: String,
    pub frame_count: usize,
    pub frame_hashes: Vec<String>,
    pub skipped_images: Vec<SkippedImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSequence {
    pub name: String,
    pub reason: String,
    pub skipped_images: Vec<SkippedImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSequence {
    pub name: String,
    pub error: String,
}

/// What happened to one input folder.
#[derive(Debug)]
pub enum SequenceOutcome {
    Emitted {
        sequence: EmittedSequence,
        skipped_images: Vec<SkippedImage>,
    },
    Skipped(SkippedSequence),
    Failed(FailedSequence),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub config_hash: String,
    pub output_root: PathBuf,
    pub manifest_path: PathBuf,
    pub sequences: Vec<SequenceReport>,
    pub skipped_sequences: Vec<SkippedSequence>,
    pub failed_sequences: Vec<FailedSequence>,
}

impl BatchReport {
    /// True when no sequence failed to write.
    pub fn is_clean(&self) -> bool {
        self.failed_sequences.is_empty()
    }

    pub fn frames_written(&self) -> usize {
        self.sequences.iter().map(|s| s.frame_count).sum()
    }
}

pub struct BatchPipeline {
    config: RunConfig,
    params: TransformParameters,
    emitter: SequenceEmitter,
}

impl BatchPipeline {
    /// Validate `config` up front. Nothing touches the filesystem on failure.
    pub fn new(config: RunConfig) -> Result<Self, PipelineError> {
        let params = config.validate()?;
        let emitter = SequenceEmitter::new(config.output_root());
        Ok(Self { config, params, emitter })
    }

    pub fn params(&self) -> &TransformParameters {
        &self.params
    }

    pub fn emitter(&self) -> &SequenceEmitter {
        &self.emitter
    }

    /// Process every discovered sequence and write the manifest once at the end.
    pub fn run(&self) -> Result<BatchReport, PipelineError> {
        let config_hash = compute_config_hash(&self.config, ENGINE_VERSION)?;
        let sources = discover_sequences(&self.config.input_dir)?;
        info!(
            "Processing {} folders from {}",
            sources.len(),
            self.config.input_dir.display()
        );
        self.check_scale(&sources)?;

        let mut manifest = Manifest::new();
        let mut sequences = vec![];
        let mut skipped_sequences = vec![];
        let mut failed_sequences = vec![];

        for source in &sources {
            match self.run_sequence(source)? {
                SequenceOutcome::Emitted { sequence, skipped_images } => {
                    if let Err(e) = manifest.push(ManifestEntry::new(&sequence.name)) {
                        error!("{}", e);
                        failed_sequences.push(FailedSequence {
                            name: sequence.name,
                            error: e.to_string(),
                        });
                        continue;
                    }
                    sequences.push(SequenceReport {
                        frame_count: sequence.descriptor.active_frames,
                        name: sequence.name,
                        frame_hashes: sequence.frame_hashes,
                        skipped_images,
                    });
                }
                SequenceOutcome::Skipped(skipped) => skipped_sequences.push(skipped),
                SequenceOutcome::Failed(failed) => failed_sequences.push(failed),
            }
        }

        let manifest_path = self
            .emitter
            .finalize_manifest(&manifest)
            .map_err(PipelineError::Manifest)?;

        Ok(BatchReport {
            run_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            config_hash,
            output_root: self.emitter.output_root().to_path_buf(),
            manifest_path,
            sequences,
            skipped_sequences,
            failed_sequences,
        })
    }

    /// Reject a scale that collapses any discovered image, before anything is written.
    ///
    /// Reads image headers only. Unreadable headers are left for the decode step to report.
    pub fn check_scale(&self, sources: &[SequenceSource]) -> Result<(), ConfigError> {
        for path in sources.iter().flat_map(|s| s.images.iter()) {
            if let Ok((width, height)) = read_dimensions(path) {
                self.params.scaled_size(width, height).map_err(|e| {
                    error!("{} cannot be scaled: {}", path.display(), e);
                    e
                })?;
            }
        }
        Ok(())
    }

    /// Convert and write one folder. Only a configuration error is returned as `Err`.
    #[tracing::instrument(skip(self, source), fields(sequence = %source.name))]
    pub fn run_sequence(&self, source: &SequenceSource) -> Result<SequenceOutcome, PipelineError> {
        let (frames, skipped_images) = self.convert_images(&source.images)?;

        if frames.is_empty() {
            warn!("No usable images in {:?}, skipping sequence", source.name);
            return Ok(SequenceOutcome::Skipped(SkippedSequence {
                name: source.name.clone(),
                reason: "no usable images".to_string(),
                skipped_images,
            }));
        }

        match self.emitter.emit_sequence(&source.name, &frames) {
            Ok(sequence) => Ok(SequenceOutcome::Emitted { sequence, skipped_images }),
            Err(e) => {
                error!("Failed to write sequence {:?}: {}", source.name, e);
                Ok(SequenceOutcome::Failed(FailedSequence {
                    name: source.name.clone(),
                    error: e.to_string(),
                }))
            }
        }
    }

    /// Decode and transform images in order. Indices are dense over successes.
    pub fn convert_images(
        &self,
        paths: &[PathBuf],
    ) -> Result<(Vec<CanvasFrame>, Vec<SkippedImage>), ConfigError> {
        let mut frames = Vec::with_capacity(paths.len());
        let mut skipped = vec![];

        for path in paths {
            let source = match decode_image(path) {
                Ok(img) => img,
                Err(e) => {
                    warn!("Failed to decode {}: {}", path.display(), e);
                    skipped.push(SkippedImage {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            frames.push(transform(&source, &self.params)?);
        }

        Ok((frames, skipped))
    }
}

pub fn decode_image(path: &Path) -> Result<DynamicImage, image::ImageError> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// Image size from the header, using the same format detection as `decode_image`.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32), image::ImageError> {
    ImageReader::open(path)?.with_guessed_format()?.into_dimensions()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &Path) -> RunConfig {
        RunConfig {
            input_dir: root.join("in"),
            output_dir: root.join("out"),
            threshold: 128,
            scale_factor: 1.0,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_new_rejects_bad_config_without_io() {
        let dir = TempDir::new().unwrap();
        let cfg = RunConfig { scale_factor: 0.0, ..config(dir.path()) };
        assert!(matches!(
            BatchPipeline::new(cfg),
            Err(PipelineError::Configuration(ConfigError::NonPositiveScale(_)))
        ));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_convert_skips_corrupt_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.png");
        let bad = dir.path().join("b.png");
        let c = dir.path().join("c.png");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])).save(&a).unwrap();
        fs::write(&bad, b"definitely not a png").unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])).save(&c).unwrap();

        let pipeline = BatchPipeline::new(config(dir.path())).unwrap();
        let (frames, skipped) = pipeline.convert_images(&[a, bad.clone(), c]).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].path, bad);
        assert_eq!(frames[0].pixel(63, 31), crate::BLACK);
        assert_eq!(frames[1].pixel(63, 31), crate::WHITE);
    }

    #[test]
    fn test_degenerate_scale_aborts_sequence() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("tiny.png");
        RgbImage::new(2, 2).save(&a).unwrap();

        let cfg = RunConfig { scale_factor: 0.25, ..config(dir.path()) };
        let pipeline = BatchPipeline::new(cfg).unwrap();
        assert!(matches!(
            pipeline.convert_images(&[a]),
            Err(ConfigError::DegenerateScale { .. })
        ));
    }

    #[test]
    fn test_check_scale_ignores_unreadable_headers() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("in/Cat/bad.png");
        fs::create_dir_all(bad.parent().unwrap()).unwrap();
        fs::write(&bad, b"nope").unwrap();
        let ok = dir.path().join("in/Cat/ok.png");
        RgbImage::new(8, 8).save(&ok).unwrap();

        let cfg = RunConfig { scale_factor: 0.25, ..config(dir.path()) };
        let pipeline = BatchPipeline::new(cfg).unwrap();
        let sources = vec![SequenceSource { name: "Cat".into(), images: vec![bad, ok.clone()] }];
        assert!(pipeline.check_scale(&sources).is_ok());

        let tiny = dir.path().join("in/Cat/tiny.png");
        RgbImage::new(2, 2).save(&tiny).unwrap();
        let sources = vec![SequenceSource { name: "Cat".into(), images: vec![ok, tiny] }];
        assert!(matches!(
            pipeline.check_scale(&sources),
            Err(ConfigError::DegenerateScale { width: 2, height: 2, .. })
        ));
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let pipeline = BatchPipeline::new(config(dir.path())).unwrap();
        assert!(matches!(pipeline.run(), Err(PipelineError::Discovery(_))));
    }
}
