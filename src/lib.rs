//! Lexis: Resumable Vocabulary Enrichment
//!
//! Batch pipeline that asks a generative model for word lists and dictionary
//! entries, then a speech service for audio clips. Every stage checkpoints
//! after each item so an interrupted run picks up where it stopped.

pub mod audio;
pub mod catalog;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod provider;
pub mod retry;
pub mod schema;
pub mod stats;
