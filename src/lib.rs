//! Seam: static analysis for Go modules.
//!
//! Maps every interface a module defines to the concrete types that satisfy
//! it (value and pointer form recorded independently) and enumerates every
//! call site in the module's functions, classified by dispatch flavor.

// Core infrastructure - re-exported from seam-core
pub use seam_core::error;
pub use seam_core::output;
pub use seam_core::report;

// Analysis passes and orchestration
pub mod analyze;

// Front door for the binary
pub mod cli;

// Go front end
pub use seam_go as golang;
