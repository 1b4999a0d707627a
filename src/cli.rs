//! CLI front door: runs the analysis and routes output.
//!
//! The report goes to the given stdout writer, diagnostics and the summary
//! line to the stderr writer, and the return value is the process exit code.

use std::io::Write;

use seam_core::output::{write_report, write_summary};

use crate::analyze;

/// Analyze `target` and emit the report. Returns the exit code.
pub fn run_analyze<O: Write, E: Write>(target: &str, stdout: &mut O, stderr: &mut E) -> u8 {
    match analyze::analyze(target) {
        Ok(report) => {
            if let Err(err) = write_report(&report, stdout) {
                let _ = writeln!(stderr, "seam: {}", err);
                return err.error_code().code();
            }
            let _ = write_summary(&report, stderr);
            0
        }
        Err(err) => {
            let _ = writeln!(stderr, "seam: {}", err);
            err.error_code().code()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_maps_to_loader_exit_code() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run_analyze("/definitely/not/here", &mut out, &mut err);
        assert_eq!(code, 3);
        assert!(out.is_empty());
        let msg = String::from_utf8(err).unwrap();
        assert!(msg.starts_with("seam: loader failure"));
    }
}
