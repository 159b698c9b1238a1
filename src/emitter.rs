//! Sequence Emitter - Frames and Descriptors on Disk
//!
//! A sequence is written into a hidden staging directory first and moved into
//! place only after every frame and meta.txt succeeded. A failed sequence
//! leaves nothing behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::descriptor::{DescriptorError, Manifest, SequenceDescriptor};
use crate::hashing::sha256_hex;
use crate::transform::CanvasFrame;

pub const ANIMS_DIR: &str = "Anims";
pub const META_FILE: &str = "meta.txt";
pub const MANIFEST_FILE: &str = "manifest.txt";

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Sequence {0:?} has no frames to write")]
    EmptySequence(String),

    #[error("Sequence name {0:?} must be a single path component")]
    InvalidSequenceName(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
}

trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T, EmitError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T, EmitError> {
        self.map_err(|source| EmitError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Result of a fully committed sequence.
#[derive(Debug, Clone)]
pub struct EmittedSequence {
    pub name: String,
    pub anims_dir: PathBuf,
    pub descriptor: SequenceDescriptor,
    /// SHA-256 of each frame file, by index.
    pub frame_hashes: Vec<String>,
}

pub fn frame_file_name(index: usize) -> String {
    format!("frame_{index}.png")
}

/// Writes sequences under one output root.
pub struct SequenceEmitter {
    output_root: PathBuf,
}

impl SequenceEmitter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Directory that holds a committed sequence's frames and meta.txt.
    pub fn anims_dir(&self, name: &str) -> PathBuf {
        self.output_root.join(name).join(ANIMS_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_root.join(MANIFEST_FILE)
    }

    /// Write `frames` as `frame_0.png..` plus meta.txt under `<root>/<name>/Anims`.
    ///
    /// Frame order is slice order. On error nothing from this call remains on disk.
    #[tracing::instrument(skip(self, frames), fields(frames = frames.len()))]
    pub fn emit_sequence(&self, name: &str, frames: &[CanvasFrame]) -> Result<EmittedSequence, EmitError> {
        check_sequence_name(name)?;
        if frames.is_empty() {
            return Err(EmitError::EmptySequence(name.to_string()));
        }

        let staging = self.output_root.join(format!(".{name}.staging"));
        let result = self
            .write_staged(&staging, frames)
            .and_then(|(descriptor, frame_hashes)| {
                let anims_dir = self.commit(name, &staging)?;
                Ok(EmittedSequence {
                    name: name.to_string(),
                    anims_dir,
                    descriptor,
                    frame_hashes,
                })
            });

        if staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!("Could not remove staging dir {}: {}", staging.display(), e);
            }
        }

        if let Ok(emitted) = &result {
            info!(
                "Wrote {} frames and {} to {}",
                emitted.descriptor.active_frames,
                META_FILE,
                emitted.anims_dir.display()
            );
        }
        result
    }

    fn write_staged(
        &self,
        staging: &Path,
        frames: &[CanvasFrame],
    ) -> Result<(SequenceDescriptor, Vec<String>), EmitError> {
        if staging.exists() {
            fs::remove_dir_all(staging).at(staging)?;
        }
        let anims = staging.join(ANIMS_DIR);
        fs::create_dir_all(&anims).at(&anims)?;

        let mut written = Vec::with_capacity(frames.len());
        let mut hashes = Vec::with_capacity(frames.len());

        for (index, frame) in frames.iter().enumerate() {
            let path = anims.join(frame_file_name(index));
            let bytes = frame
                .encode_png()
                .map_err(|source| EmitError::Encode { path: path.clone(), source })?;
            fs::write(&path, &bytes).at(&path)?;
            debug!("Wrote {}", path.display());

            written.push(index);
            hashes.push(sha256_hex(&bytes));
        }

        let descriptor = SequenceDescriptor::from_written_indices(&written)?;
        let meta_path = anims.join(META_FILE);
        fs::write(&meta_path, descriptor.to_string()).at(&meta_path)?;

        Ok((descriptor, hashes))
    }

    fn commit(&self, name: &str, staging: &Path) -> Result<PathBuf, EmitError> {
        let sequence_dir = self.output_root.join(name);
        let created = !sequence_dir.exists();
        fs::create_dir_all(&sequence_dir).at(&sequence_dir)?;

        let target = sequence_dir.join(ANIMS_DIR);
        let moved = (|| {
            if target.exists() {
                fs::remove_dir_all(&target)?;
            }
            fs::rename(staging.join(ANIMS_DIR), &target)
        })();

        if let Err(source) = moved {
            if created {
                let _ = fs::remove_dir_all(&sequence_dir);
            }
            return Err(EmitError::Io { path: target, source });
        }
        Ok(target)
    }

    /// Write manifest.txt at the output root. Called once, after every sequence.
    pub fn finalize_manifest(&self, manifest: &Manifest) -> Result<PathBuf, EmitError> {
        fs::create_dir_all(&self.output_root).at(&self.output_root)?;

        let path = self.manifest_path();
        let tmp = self.output_root.join(format!(".{MANIFEST_FILE}.tmp"));
        fs::write(&tmp, manifest.to_string()).at(&tmp)?;
        fs::rename(&tmp, &path).at(&path)?;

        info!("Wrote {} with {} entries", path.display(), manifest.len());
        Ok(path)
    }
}

fn check_sequence_name(name: &str) -> Result<(), EmitError> {
    let mut parts = Path::new(name).components();
    let single = matches!(
        (parts.next(), parts.next()),
        (Some(std::path::Component::Normal(_)), None)
    );
    if !single || name.starts_with('.') {
        return Err(EmitError::InvalidSequenceName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ManifestEntry;
    use crate::params::TransformParameters;
    use crate::transform::transform;
    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::TempDir;

    fn frames(n: usize) -> Vec<CanvasFrame> {
        let params = TransformParameters::new(128, 0, 0, 1.0).unwrap();
        (0..n)
            .map(|i| {
                let img = RgbImage::from_pixel(8 + i as u32, 8, Rgb([0, 0, 0]));
                transform(&DynamicImage::ImageRgb8(img), &params).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_emit_writes_frames_and_meta() {
        let dir = TempDir::new().unwrap();
        let emitter = SequenceEmitter::new(dir.path());

        let out = emitter.emit_sequence("Cat", &frames(3)).unwrap();
        assert_eq!(out.descriptor.active_frames, 3);
        assert_eq!(out.frame_hashes.len(), 3);

        let anims = dir.path().join("Cat").join("Anims");
        for i in 0..3 {
            assert!(anims.join(format!("frame_{i}.png")).is_file());
        }
        let meta = fs::read_to_string(anims.join("meta.txt")).unwrap();
        assert!(meta.contains("Active frames: 3\n"));
        assert!(meta.contains("Frames order: 0 1 2\n"));
        assert!(!dir.path().join(".Cat.staging").exists());
    }

    #[test]
    fn test_emit_empty_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let emitter = SequenceEmitter::new(dir.path());
        assert!(matches!(
            emitter.emit_sequence("Empty", &[]),
            Err(EmitError::EmptySequence(_))
        ));
        assert!(!dir.path().join("Empty").exists());
    }

    #[test]
    fn test_emit_rejects_path_names() {
        let dir = TempDir::new().unwrap();
        let emitter = SequenceEmitter::new(dir.path());
        for bad in ["../x", "a/b", "", ".hidden"] {
            assert!(matches!(
                emitter.emit_sequence(bad, &frames(1)),
                Err(EmitError::InvalidSequenceName(_))
            ));
        }
    }

    #[test]
    fn test_reemit_replaces_previous_frames() {
        let dir = TempDir::new().unwrap();
        let emitter = SequenceEmitter::new(dir.path());
        emitter.emit_sequence("Cat", &frames(4)).unwrap();
        emitter.emit_sequence("Cat", &frames(2)).unwrap();

        let anims = emitter.anims_dir("Cat");
        assert!(anims.join("frame_1.png").is_file());
        assert!(!anims.join("frame_2.png").exists());
    }

    #[test]
    fn test_failed_emit_leaves_no_sequence_dir() {
        let dir = TempDir::new().unwrap();
        // Output root is a file, so nothing can be created under it.
        let root = dir.path().join("not-a-dir");
        fs::write(&root, b"x").unwrap();
        let emitter = SequenceEmitter::new(&root);

        assert!(matches!(
            emitter.emit_sequence("Cat", &frames(1)),
            Err(EmitError::Io { .. })
        ));
        assert!(fs::read_dir(dir.path()).unwrap().count() == 1);
    }

    #[test]
    fn test_manifest_written_even_when_empty() {
        let dir = TempDir::new().unwrap();
        let emitter = SequenceEmitter::new(dir.path().join("out"));
        let path = emitter.finalize_manifest(&Manifest::new()).unwrap();
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "Filetype: Flipper Animation Manifest\nVersion: 1\n\n"
        );
    }

    #[test]
    fn test_manifest_lists_entries() {
        let dir = TempDir::new().unwrap();
        let emitter = SequenceEmitter::new(dir.path());
        let mut manifest = Manifest::new();
        manifest.push(ManifestEntry::new("Cat")).unwrap();
        let path = emitter.finalize_manifest(&manifest).unwrap();
        assert!(fs::read_to_string(path).unwrap().contains("Name: Cat\n"));
    }
}
