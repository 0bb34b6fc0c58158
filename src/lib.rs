//! Gaussian splat ingestion, texture encoding and back-to-front ordering.
//!
//! Scenes arrive as `.ply` or `.splat` buffers, are normalized into
//! [`splat::Splat`] records, packed into an RGBA32UI texture and re-sorted by
//! view depth on a background worker reached through [`engine::EngineHandle`].

pub mod camera;
pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod math;
pub mod parser;
pub mod sort;
pub mod splat;
pub mod store;
pub mod texture;

pub use config::EngineConfig;
pub use engine::{spawn_engine, EngineHandle, EngineMessage, HostMessage};
pub use error::{EngineError, FormatError};
pub use splat::Splat;
