//! Input Discovery
//!
//! One sequence per immediate subfolder of the input root. Both folders and
//! images are returned in lexical order so frame indices are reproducible.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Extensions accepted as source images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Input folder {0} does not exist")]
    MissingRoot(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSource {
    pub name: String,
    pub images: Vec<PathBuf>,
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map_or(false, |e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

/// List `(name, images)` for every subfolder of `input_root`.
///
/// Folders with no matching images are still returned with an empty list;
/// deciding what to do with them is the caller's concern.
pub fn discover_sequences(input_root: &Path) -> Result<Vec<SequenceSource>, DiscoveryError> {
    if !input_root.is_dir() {
        return Err(DiscoveryError::MissingRoot(input_root.to_path_buf()));
    }

    let mut folders = sorted_entries(input_root)?;
    folders.retain(|p| p.is_dir());

    let mut sequences = Vec::with_capacity(folders.len());
    for folder in folders {
        let name = match folder.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => continue,
        };

        let mut images = sorted_entries(&folder)?;
        images.retain(|p| p.is_file() && is_image_path(p));
        debug!("Found {} images in {}", images.len(), folder.display());

        sequences.push(SequenceSource { name, images });
    }

    Ok(sequences)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let read_err = |source: std::io::Error| DiscoveryError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = vec![];
    for entry in fs::read_dir(dir).map_err(read_err)? {
        paths.push(entry.map_err(read_err)?.path());
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extension_filter() {
        assert!(is_image_path(Path::new("a.PNG")));
        assert!(is_image_path(Path::new("a.tiff")));
        assert!(is_image_path(Path::new("dir/b.JpEg")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("png")));
    }

    #[test]
    fn test_discovery_order_and_filter() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("b_seq")).unwrap();
        fs::create_dir(root.join("a_seq")).unwrap();
        fs::write(root.join("stray.png"), b"").unwrap();
        fs::write(root.join("a_seq/2.png"), b"").unwrap();
        fs::write(root.join("a_seq/10.png"), b"").unwrap();
        fs::write(root.join("a_seq/1.jpg"), b"").unwrap();
        fs::write(root.join("a_seq/readme.md"), b"").unwrap();

        let found = discover_sequences(root).unwrap();
        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a_seq", "b_seq"]);

        let files: Vec<_> = found[0]
            .images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(files, ["1.jpg", "10.png", "2.png"]);
        assert!(found[1].images.is_empty());
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_sequences(&dir.path().join("nope")),
            Err(DiscoveryError::MissingRoot(_))
        ));
    }
}
