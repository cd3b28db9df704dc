//! Integration tests module
//!
//! Tests that drive whole stages against scripted providers and real files.

pub mod test_utils;

mod audio_pipeline;
mod checkpoint_store;
mod config_integration;
mod resume_pipeline;
