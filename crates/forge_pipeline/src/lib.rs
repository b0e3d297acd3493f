//! # forge_pipeline
//!
//! The live generation pipeline of AppForge: plan a project, generate each
//! file with character-level streaming, write it safely, validate it, and
//! detect and recover from errors.
//!
//! # Architecture
//!
//! - **Planner**: model plan with a template fallback and missing-file scan
//! - **Generator**: the per-file announce/stream/write/validate state machine
//! - **Streamer**: character events paced by a [`forge_core::Pacer`]
//! - **Writer**: atomic, idempotent writes under the project root
//! - **Validator**: light syntax checks per file extension
//! - **Detector**: parsers for compiler, interpreter and package-manager output
//! - **Recovery**: severity-driven recovery plans and the snapshot ring

pub mod codeblock;
pub mod detector;
pub mod error;
pub mod generator;
pub mod planner;
pub mod recovery;
pub mod settings;
pub mod streamer;
pub mod validator;
pub mod writer;

pub use codeblock::{extract_code_block, extract_for_path, CodeBlock};
pub use detector::ErrorDetector;
pub use error::{PipelineError, PipelineResult};
pub use generator::{GeneratedFile, LiveGenerator, PlatformFixer};
pub use planner::{missing_files, parse_file_list, scan_project, GenerationPlan, PlanSource, ProjectPlanner};
pub use recovery::{records_for, FileFixer, RecoveryContext, RecoveryEngine, RecoveryHost, RecoveryPlan, RecoveryStrategy};
pub use settings::ModelSettings;
pub use streamer::{CodeStreamer, StreamOutcome, CHUNK_EVERY};
pub use validator::SyntaxValidator;
pub use writer::{sha256_hex, FileWriter, WriteOutcome, PRESERVE_THRESHOLD};
