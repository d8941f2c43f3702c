//! Concrete feed sources and configuration.
//!
//! [`tfl::TflClient`] talks to the live TfL unified API.
//! [`sample::SampleDirectory`] replays snapshots saved by `ingest`.
//! [`fallback::WithFallback`] chains a primary source to an offline one.

pub mod config;
pub mod fallback;
pub mod sample;
pub mod tfl;

pub use config::AppConfig;
