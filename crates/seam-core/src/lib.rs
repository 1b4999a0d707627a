//! Core infrastructure for seam.
//!
//! This crate provides the language-agnostic pieces:
//! - Report data model (the JSON consumer contract)
//! - Error taxonomy and exit codes
//! - Report serialization and the diagnostic summary

pub mod error;
pub mod output;
pub mod report;
