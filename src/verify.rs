//! Output Verification
//!
//! Re-reads a finished output tree and checks that descriptors agree with the
//! frames on disk. Problems are collected, not raised.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::descriptor::{Manifest, SequenceDescriptor};
use crate::emitter::{ANIMS_DIR, MANIFEST_FILE, META_FILE};
use crate::pipeline::decode_image;
use crate::{BLACK, CANVAS_HEIGHT, CANVAS_WIDTH, WHITE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIssue {
    pub sequence: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub root: PathBuf,
    pub sequences_checked: usize,
    pub frames_checked: usize,
    pub issues: Vec<VerifyIssue>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    fn issue(&mut self, sequence: Option<&str>, message: impl Into<String>) {
        self.issues.push(VerifyIssue {
            sequence: sequence.map(str::to_string),
            message: message.into(),
        });
    }
}

/// Parse `frame_<n>.png` into `n`.
pub fn frame_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("frame_")?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

pub fn verify_output(root: &Path) -> VerifyReport {
    let mut report = VerifyReport {
        root: root.to_path_buf(),
        sequences_checked: 0,
        frames_checked: 0,
        issues: vec![],
    };

    let manifest_path = root.join(MANIFEST_FILE);
    let manifest = match fs::read_to_string(&manifest_path) {
        Ok(text) => match Manifest::parse(&text) {
            Ok(m) => m,
            Err(e) => {
                report.issue(None, format!("{}: {}", manifest_path.display(), e));
                return report;
            }
        },
        Err(e) => {
            report.issue(None, format!("{}: {}", manifest_path.display(), e));
            return report;
        }
    };

    for entry in manifest.entries() {
        verify_sequence(root, &entry.name, &mut report);
        report.sequences_checked += 1;
    }

    // Sequence folders on disk that the manifest does not list.
    if let Ok(dirs) = fs::read_dir(root) {
        let listed: BTreeSet<&str> = manifest.entries().iter().map(|e| e.name.as_str()).collect();
        let mut orphans: Vec<String> = dirs
            .filter_map(Result::ok)
            .filter(|d| d.path().join(ANIMS_DIR).join(META_FILE).is_file())
            .map(|d| d.file_name().to_string_lossy().to_string())
            .filter(|name| !listed.contains(name.as_str()))
            .collect();
        orphans.sort();
        for name in orphans {
            report.issue(Some(name.as_str()), "sequence folder is not listed in the manifest");
        }
    }

    report
}

fn verify_sequence(root: &Path, name: &str, report: &mut VerifyReport) {
    let anims = root.join(name).join(ANIMS_DIR);
    let seq = Some(name);

    let meta_path = anims.join(META_FILE);
    let meta = match fs::read_to_string(&meta_path)
        .map_err(|e| e.to_string())
        .and_then(|t| SequenceDescriptor::parse(&t).map_err(|e| e.to_string()))
    {
        Ok(m) => m,
        Err(e) => {
            report.issue(seq, format!("{}: {}", meta_path.display(), e));
            return;
        }
    };

    let mut indices = BTreeSet::new();
    if let Ok(entries) = fs::read_dir(&anims) {
        for entry in entries.filter_map(Result::ok) {
            if let Some(i) = frame_index(&entry.file_name().to_string_lossy()) {
                indices.insert(i);
            }
        }
    }

    let count = indices.len();
    if meta.active_frames != count {
        report.issue(seq, format!("Active frames is {} but {} frame files exist", meta.active_frames, count));
    }
    if meta.frames_order.len() != count {
        report.issue(seq, format!("Frames order has {} entries but {} frame files exist", meta.frames_order.len(), count));
    }
    if !meta.frames_order.iter().copied().eq(0..meta.frames_order.len()) {
        report.issue(seq, "Frames order is not 0..N-1");
    }
    if !indices.iter().copied().eq(0..count) {
        report.issue(seq, "frame file indices are not dense");
    }

    for i in indices {
        let path = anims.join(format!("frame_{i}.png"));
        report.frames_checked += 1;
        match decode_image(&path) {
            Ok(img) => {
                if (img.width(), img.height()) != (CANVAS_WIDTH, CANVAS_HEIGHT) {
                    report.issue(seq, format!("frame_{i}.png is {}x{}", img.width(), img.height()));
                }
                if !img.to_luma8().as_raw().iter().all(|&v| v == BLACK || v == WHITE) {
                    report.issue(seq, format!("frame_{i}.png is not two-level"));
                }
            }
            Err(e) => report.issue(seq, format!("frame_{i}.png: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_parsing() {
        assert_eq!(frame_index("frame_0.png"), Some(0));
        assert_eq!(frame_index("frame_17.png"), Some(17));
        assert_eq!(frame_index("frame_.png"), None);
        assert_eq!(frame_index("frame_1.jpg"), None);
        assert_eq!(frame_index("meta.txt"), None);
    }

    #[test]
    fn test_missing_manifest_is_an_issue() {
        let dir = tempfile::TempDir::new().unwrap();
        let report = verify_output(dir.path());
        assert!(!report.is_ok());
        assert_eq!(report.sequences_checked, 0);
    }
}
