//! Report serialization and the diagnostic summary line.
//!
//! The report goes to stdout as pretty-printed JSON; the one-line summary
//! (package/interface/implementation/call counts) goes to the diagnostic
//! stream. Keeping the two apart means `seam <path> | jq` always sees valid
//! JSON.

use std::io::{self, Write};

use crate::error::SeamResult;
use crate::report::ProjectReport;

// ============================================================================
// Report Writer
// ============================================================================

/// Serialize the report as pretty JSON followed by a newline.
pub fn write_report<W: Write>(report: &ProjectReport, writer: &mut W) -> SeamResult<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Render the report to a pretty JSON string.
pub fn report_to_string(report: &ProjectReport) -> SeamResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

// ============================================================================
// Summary
// ============================================================================

/// Aggregate counts for the post-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub packages: usize,
    pub interfaces: usize,
    pub implementations: usize,
    pub calls: usize,
}

impl Summary {
    /// Compute the summary from a finished report.
    pub fn from_report(report: &ProjectReport) -> Self {
        let (packages, interfaces, implementations, calls) = report.counts();
        Summary {
            packages,
            interfaces,
            implementations,
            calls,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "analyzed {} packages: {} interfaces, {} implementations, {} call sites",
            self.packages, self.interfaces, self.implementations, self.calls
        )
    }
}

/// Write the summary line to the given diagnostic stream.
pub fn write_summary<W: Write>(report: &ProjectReport, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{}", Summary::from_report(report))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CallSite, CallType, Location, PackageReport};

    fn sample_report() -> ProjectReport {
        ProjectReport {
            module_path: "example.com/mod".to_string(),
            module_dir: "/abs/mod".to_string(),
            packages: vec![PackageReport {
                name: "demo".to_string(),
                path: "example.com/mod/demo".to_string(),
                files: vec!["demo/demo.go".to_string()],
                calls: vec![CallSite {
                    caller_func_desc: "example.com/mod/demo.main".to_string(),
                    callee_desc: "example.com/mod/demo.helper".to_string(),
                    call_type: CallType::Static,
                    location: Location::new("demo/demo.go", 7),
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn write_report_emits_trailing_newline() {
        let mut buf = Vec::new();
        write_report(&sample_report(), &mut buf).unwrap();
        assert_eq!(buf.last(), Some(&b'\n'));
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["ModulePath"], "example.com/mod");
    }

    #[test]
    fn report_string_is_valid_json() {
        let text = report_to_string(&sample_report()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["Packages"][0]["Name"], "demo");
    }

    #[test]
    fn summary_counts_and_format() {
        let summary = Summary::from_report(&sample_report());
        assert_eq!(summary.packages, 1);
        assert_eq!(summary.calls, 1);
        assert_eq!(
            summary.to_string(),
            "analyzed 1 packages: 0 interfaces, 0 implementations, 1 call sites"
        );
    }

    #[test]
    fn summary_writes_to_stream() {
        let mut buf = Vec::new();
        write_summary(&sample_report(), &mut buf).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert!(line.starts_with("analyzed 1 packages"));
    }
}
