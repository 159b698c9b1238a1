//! FlipAnim Core - Flipper Animation Compiler
//!
//! # Guarantees
//! 1. Every frame is 128x64 and strictly two-level
//! 2. Descriptors are built from the frames actually written
//! 3. Frame indices are dense and follow discovery order
//! 4. Same input and parameters produce byte-identical frames
//! 5. The manifest lists exactly the sequences that fully succeeded

pub mod params;
pub mod transform;
pub mod descriptor;
pub mod emitter;
pub mod discovery;
pub mod config;
pub mod hashing;
pub mod pipeline;
pub mod verify;

pub use params::{ConfigError, TransformParameters};
pub use transform::{transform, CanvasFrame};
pub use descriptor::{Manifest, ManifestEntry, SequenceDescriptor, DescriptorError};
pub use emitter::{EmitError, EmittedSequence, SequenceEmitter};
pub use discovery::{discover_sequences, DiscoveryError, SequenceSource};
pub use config::RunConfig;
pub use hashing::{canonical_json, compute_config_hash, sha256_hex};
pub use pipeline::{BatchPipeline, BatchReport, PipelineError, SequenceReport};
pub use verify::{verify_output, VerifyIssue, VerifyReport};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Device display width in pixels.
pub const CANVAS_WIDTH: u32 = 128;
/// Device display height in pixels.
pub const CANVAS_HEIGHT: u32 = 64;

/// Foreground (ink) level.
pub const BLACK: u8 = 0;
/// Background level.
pub const WHITE: u8 = 255;
