//! Descriptors - meta.txt and manifest.txt
//!
//! A sequence descriptor can only be built from the indices of frames that
//! were actually written. There is no constructor taking a bare count.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::{CANVAS_HEIGHT, CANVAS_WIDTH};

pub const META_FILETYPE: &str = "Flipper Animation";
pub const MANIFEST_FILETYPE: &str = "Flipper Animation Manifest";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Sequence has no frames")]
    NoFrames,

    #[error("Frame indices are not dense: expected {expected}, found {found}")]
    NonDenseIndices { expected: usize, found: usize },

    #[error("Sequence {0:?} is already in the manifest")]
    DuplicateSequence(String),

    #[error("Line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unexpected filetype {found:?}, expected {expected:?}")]
    WrongFiletype { expected: &'static str, found: String },
}

/// Contents of a sequence's meta.txt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDescriptor {
    pub width: u32,
    pub height: u32,
    pub passive_frames: usize,
    pub active_frames: usize,
    pub frames_order: Vec<usize>,
    pub active_cycles: u32,
    pub frame_rate: u32,
    pub duration: u32,
    pub active_cooldown: u32,
    pub bubble_slots: u32,
}

impl SequenceDescriptor {
    /// Build from the indices of the frames written, in write order.
    ///
    /// Indices must be exactly `0..N` with `N > 0`.
    pub fn from_written_indices(indices: &[usize]) -> Result<Self, DescriptorError> {
        if indices.is_empty() {
            return Err(DescriptorError::NoFrames);
        }
        for (expected, &found) in indices.iter().enumerate() {
            if expected != found {
                return Err(DescriptorError::NonDenseIndices { expected, found });
            }
        }

        Ok(Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            passive_frames: 0,
            active_frames: indices.len(),
            frames_order: indices.to_vec(),
            active_cycles: 1,
            frame_rate: 10,
            duration: 100,
            active_cooldown: 3,
            bubble_slots: 0,
        })
    }

    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        let fields = parse_fields(text)?;
        let header = FieldReader { fields: &fields };

        let filetype = header.text("Filetype")?;
        if filetype != META_FILETYPE {
            return Err(DescriptorError::WrongFiletype {
                expected: META_FILETYPE,
                found: filetype.to_string(),
            });
        }
        header.number::<u32>("Version")?;

        let frames_order = header
            .text("Frames order")?
            .split_whitespace()
            .map(|s| s.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DescriptorError::Malformed {
                line: header.line_of("Frames order"),
                message: e.to_string(),
            })?;

        Ok(Self {
            width: header.number("Width")?,
            height: header.number("Height")?,
            passive_frames: header.number("Passive frames")?,
            active_frames: header.number("Active frames")?,
            frames_order,
            active_cycles: header.number("Active cycles")?,
            frame_rate: header.number("Frame rate")?,
            duration: header.number("Duration")?,
            active_cooldown: header.number("Active cooldown")?,
            bubble_slots: header.number("Bubble slots")?,
        })
    }
}

impl fmt::Display for SequenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order: Vec<String> = self.frames_order.iter().map(|i| i.to_string()).collect();

        writeln!(f, "Filetype: {}", META_FILETYPE)?;
        writeln!(f, "Version: {}", FORMAT_VERSION)?;
        writeln!(f)?;
        writeln!(f, "Width: {}", self.width)?;
        writeln!(f, "Height: {}", self.height)?;
        writeln!(f, "Passive frames: {}", self.passive_frames)?;
        writeln!(f, "Active frames: {}", self.active_frames)?;
        writeln!(f, "Frames order: {}", order.join(" "))?;
        writeln!(f, "Active cycles: {}", self.active_cycles)?;
        writeln!(f, "Frame rate: {}", self.frame_rate)?;
        writeln!(f, "Duration: {}", self.duration)?;
        writeln!(f, "Active cooldown: {}", self.active_cooldown)?;
        writeln!(f)?;
        writeln!(f, "Bubble slots: {}", self.bubble_slots)
    }
}

/// One manifest block. Only the name varies; the rest are device defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    pub min_butthurt: u32,
    pub max_butthurt: u32,
    pub min_level: u32,
    pub max_level: u32,
    pub weight: u32,
}

impl ManifestEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_butthurt: 0,
            max_butthurt: 18,
            min_level: 1,
            max_level: 30,
            weight: 3,
        }
    }
}

/// Batch-wide accumulator. Appended once per completed sequence, written once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ManifestEntry) -> Result<(), DescriptorError> {
        if self.entries.iter().any(|e| e.name == entry.name) {
            return Err(DescriptorError::DuplicateSequence(entry.name));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let (_, first) = lines.next().ok_or(DescriptorError::MissingField("Filetype"))?;
        let (key, filetype) = split_field(1, first)?;
        if key != "Filetype" || filetype != MANIFEST_FILETYPE {
            return Err(DescriptorError::WrongFiletype {
                expected: MANIFEST_FILETYPE,
                found: filetype.to_string(),
            });
        }

        let mut manifest = Manifest::new();
        let mut current: Option<ManifestEntry> = None;

        for (idx, raw) in lines {
            let (key, value) = split_field(idx + 1, raw)?;
            let number = || {
                value.parse::<u32>().map_err(|e| DescriptorError::Malformed {
                    line: idx + 1,
                    message: format!("{key}: {e}"),
                })
            };

            match key {
                "Version" => {
                    number()?;
                }
                "Name" => {
                    if let Some(done) = current.take() {
                        manifest.push(done)?;
                    }
                    current = Some(ManifestEntry::new(value));
                }
                _ => {
                    let entry = current.as_mut().ok_or_else(|| DescriptorError::Malformed {
                        line: idx + 1,
                        message: format!("{key} before any Name"),
                    })?;
                    match key {
                        "Min butthurt" => entry.min_butthurt = number()?,
                        "Max butthurt" => entry.max_butthurt = number()?,
                        "Min level" => entry.min_level = number()?,
                        "Max level" => entry.max_level = number()?,
                        "Weight" => entry.weight = number()?,
                        other => {
                            return Err(DescriptorError::Malformed {
                                line: idx + 1,
                                message: format!("unknown field {other:?}"),
                            })
                        }
                    }
                }
            }
        }

        if let Some(done) = current {
            manifest.push(done)?;
        }
        Ok(manifest)
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filetype: {}", MANIFEST_FILETYPE)?;
        writeln!(f, "Version: {}", FORMAT_VERSION)?;
        writeln!(f)?;
        for e in &self.entries {
            writeln!(f, "Name: {}", e.name)?;
            writeln!(f, "Min butthurt: {}", e.min_butthurt)?;
            writeln!(f, "Max butthurt: {}", e.max_butthurt)?;
            writeln!(f, "Min level: {}", e.min_level)?;
            writeln!(f, "Max level: {}", e.max_level)?;
            writeln!(f, "Weight: {}", e.weight)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

fn split_field(line: usize, raw: &str) -> Result<(&str, &str), DescriptorError> {
    raw.split_once(':')
        .map(|(k, v)| (k.trim(), v.trim()))
        .ok_or_else(|| DescriptorError::Malformed {
            line,
            message: format!("expected `Key: value`, got {raw:?}"),
        })
}

// key -> (1-based line, value)
fn parse_fields(text: &str) -> Result<HashMap<&str, (usize, &str)>, DescriptorError> {
    let mut fields = HashMap::new();
    for (idx, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let (key, value) = split_field(idx + 1, raw)?;
        if fields.insert(key, (idx + 1, value)).is_some() {
            return Err(DescriptorError::Malformed {
                line: idx + 1,
                message: format!("duplicate field {key:?}"),
            });
        }
    }
    Ok(fields)
}

struct FieldReader<'a> {
    fields: &'a HashMap<&'a str, (usize, &'a str)>,
}

impl<'a> FieldReader<'a> {
    fn text(&self, key: &'static str) -> Result<&'a str, DescriptorError> {
        self.fields
            .get(key)
            .map(|(_, v)| *v)
            .ok_or(DescriptorError::MissingField(key))
    }

    fn line_of(&self, key: &str) -> usize {
        self.fields.get(key).map(|(l, _)| *l).unwrap_or(0)
    }

    fn number<T: std::str::FromStr>(&self, key: &'static str) -> Result<T, DescriptorError>
    where
        T::Err: fmt::Display,
    {
        self.text(key)?.parse::<T>().map_err(|e| DescriptorError::Malformed {
            line: self.line_of(key),
            message: format!("{key}: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META_THREE: &str = "Filetype: Flipper Animation\n\
Version: 1\n\
\n\
Width: 128\n\
Height: 64\n\
Passive frames: 0\n\
Active frames: 3\n\
Frames order: 0 1 2\n\
Active cycles: 1\n\
Frame rate: 10\n\
Duration: 100\n\
Active cooldown: 3\n\
\n\
Bubble slots: 0\n";

    #[test]
    fn test_meta_is_line_exact() {
        let d = SequenceDescriptor::from_written_indices(&[0, 1, 2]).unwrap();
        assert_eq!(d.to_string(), META_THREE);
    }

    #[test]
    fn test_meta_rejects_gaps_and_empty() {
        assert_eq!(
            SequenceDescriptor::from_written_indices(&[]),
            Err(DescriptorError::NoFrames)
        );
        assert_eq!(
            SequenceDescriptor::from_written_indices(&[0, 2]),
            Err(DescriptorError::NonDenseIndices { expected: 1, found: 2 })
        );
    }

    #[test]
    fn test_meta_parse_matches_render() {
        let d = SequenceDescriptor::parse(META_THREE).unwrap();
        assert_eq!(d.active_frames, 3);
        assert_eq!(d.frames_order, vec![0, 1, 2]);
        assert_eq!(d, SequenceDescriptor::from_written_indices(&[0, 1, 2]).unwrap());
    }

    #[test]
    fn test_meta_parse_wrong_filetype() {
        let text = META_THREE.replace("Flipper Animation", "Something Else");
        assert!(matches!(
            SequenceDescriptor::parse(&text),
            Err(DescriptorError::WrongFiletype { .. })
        ));
    }

    #[test]
    fn test_empty_manifest_is_header_only() {
        let m = Manifest::new();
        assert_eq!(m.to_string(), "Filetype: Flipper Animation Manifest\nVersion: 1\n\n");
    }

    #[test]
    fn test_manifest_blocks_in_push_order() {
        let mut m = Manifest::new();
        m.push(ManifestEntry::new("Cat")).unwrap();
        m.push(ManifestEntry::new("Dog")).unwrap();
        let text = m.to_string();
        let expected = "Filetype: Flipper Animation Manifest\n\
Version: 1\n\
\n\
Name: Cat\n\
Min butthurt: 0\n\
Max butthurt: 18\n\
Min level: 1\n\
Max level: 30\n\
Weight: 3\n\
\n\
Name: Dog\n\
Min butthurt: 0\n\
Max butthurt: 18\n\
Min level: 1\n\
Max level: 30\n\
Weight: 3\n\
\n";
        assert_eq!(text, expected);

        let parsed = Manifest::parse(&text).unwrap();
        let names: Vec<_> = parsed.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Cat", "Dog"]);
    }

    #[test]
    fn test_manifest_rejects_duplicates() {
        let mut m = Manifest::new();
        m.push(ManifestEntry::new("Cat")).unwrap();
        assert_eq!(
            m.push(ManifestEntry::new("Cat")),
            Err(DescriptorError::DuplicateSequence("Cat".into()))
        );
        assert_eq!(m.len(), 1);
    }
}
