//! Pipeline orchestration.
//!
//! [`Pipeline`] runs acquisition, validation, processing, build and
//! inference strictly in order. [`Action`] selects the whole chain or a
//! single stage working from the files of the previous one.

mod action;
mod orchestrator;

#[cfg(test)]
mod integration_tests;

pub use action::Action;
pub use orchestrator::{Pipeline, PipelineReport};
