//! Analysis orchestration.
//!
//! `analyze` drives the whole pipeline: load the package universe, extract
//! interfaces, enumerate call sites (fatal on failure, the call data is part
//! of the contract), discover satisfactions, then assemble one report with
//! module-relative paths and deterministic ordering.

pub mod calls;
pub mod impls;
pub mod interfaces;

use std::path::Path;

use tracing::{debug, warn};

use seam_core::error::{SeamError, SeamResult};
use seam_core::report::{PackageReport, ProjectReport};
use seam_go::loader;
use seam_go::types::Universe;

/// Analyze the module rooted at `target` and produce the full report.
pub fn analyze(target: &str) -> SeamResult<ProjectReport> {
    let universe = loader::load(target).map_err(|e| SeamError::loader(e.to_string()))?;
    debug!(packages = universe.packages.len(), "universe loaded");

    let (module_path, module_dir) = module_root(&universe);

    let mut interfaces = interfaces::extract_interfaces(&universe);
    debug!(interfaces = interfaces.len(), "interfaces extracted");

    let mut calls = calls::extract_calls(&universe)
        .map_err(|e| SeamError::call_analysis(e.to_string()))?;

    impls::find_implementations(&universe, &mut interfaces);

    // Group interfaces by defining package.
    let mut grouped: std::collections::BTreeMap<String, Vec<_>> =
        std::collections::BTreeMap::new();
    for ((path, _), iface) in interfaces {
        grouped.entry(path).or_default().push(iface);
    }

    let mut packages = Vec::new();
    for pkg in &universe.packages {
        packages.push(PackageReport {
            name: pkg.name.clone(),
            path: pkg.import_path.clone(),
            files: pkg.files.clone(),
            imports: pkg.imports.clone(),
            embed_files: pkg.embed_files.clone(),
            embed_patterns: pkg.embed_patterns.clone(),
            interfaces: grouped.remove(&pkg.import_path).unwrap_or_default(),
            calls: calls.remove(&pkg.import_path).unwrap_or_default(),
        });
    }
    for (path, _) in grouped {
        warn!(package = %path, "interfaces defined in a package missing from the universe");
    }

    let mut report = ProjectReport {
        module_path,
        module_dir: module_dir.clone(),
        packages,
    };
    relativize_report(&mut report, &module_dir);
    report.normalize();
    Ok(report)
}

/// Module metadata from the first package that carries it.
fn module_root(universe: &Universe) -> (String, String) {
    for pkg in &universe.packages {
        if let Some(meta) = &pkg.module {
            return (meta.path.clone(), meta.dir.display().to_string());
        }
    }
    warn!("no package carries module metadata; paths stay absolute");
    (String::new(), String::new())
}

/// Rewrite absolute paths under the module root to module-relative,
/// forward-slash form. Paths outside the root are left untouched.
fn relativize_report(report: &mut ProjectReport, module_dir: &str) {
    if module_dir.is_empty() {
        return;
    }
    let root = Path::new(module_dir);
    let fix = |s: &mut String| {
        if let Ok(rel) = Path::new(s.as_str()).strip_prefix(root) {
            let joined = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !joined.is_empty() {
                *s = joined;
            }
        }
    };
    for pkg in &mut report.packages {
        for f in &mut pkg.files {
            fix(f);
        }
        for f in &mut pkg.embed_files {
            fix(f);
        }
        for iface in &mut pkg.interfaces {
            fix(&mut iface.location.filename);
            for m in &mut iface.methods {
                fix(&mut m.location.filename);
            }
            for imp in &mut iface.implementations {
                fix(&mut imp.location.filename);
            }
        }
        for call in &mut pkg.calls {
            fix(&mut call.location.filename);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use seam_core::report::{CallSite, CallType, Interface, Location};

    fn report_with_paths(module_dir: &str) -> ProjectReport {
        ProjectReport {
            module_path: "example.com/mod".to_string(),
            module_dir: module_dir.to_string(),
            packages: vec![PackageReport {
                name: "pkg".to_string(),
                path: "example.com/mod/pkg".to_string(),
                files: vec![
                    "/abs/root/pkg/a.go".to_string(),
                    "/elsewhere/outside.go".to_string(),
                ],
                interfaces: vec![Interface {
                    name: "I".to_string(),
                    package_name: "pkg".to_string(),
                    package_path: "example.com/mod/pkg".to_string(),
                    location: Location::new("/abs/root/pkg/a.go", 3),
                    doc_comment: String::new(),
                    methods: Vec::new(),
                    embeds: Vec::new(),
                    implementations: Vec::new(),
                }],
                calls: vec![CallSite {
                    caller_func_desc: "f".to_string(),
                    callee_desc: "g".to_string(),
                    call_type: CallType::Static,
                    location: Location::new("/abs/root/pkg/a.go", 9),
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn paths_under_the_root_become_relative() {
        let mut report = report_with_paths("/abs/root");
        relativize_report(&mut report, "/abs/root");
        let pkg = &report.packages[0];
        assert_eq!(pkg.files[0], "pkg/a.go");
        assert_eq!(pkg.interfaces[0].location.filename, "pkg/a.go");
        assert_eq!(pkg.calls[0].location.filename, "pkg/a.go");
    }

    #[test]
    fn paths_outside_the_root_are_untouched() {
        let mut report = report_with_paths("/abs/root");
        relativize_report(&mut report, "/abs/root");
        assert_eq!(report.packages[0].files[1], "/elsewhere/outside.go");
    }

    #[test]
    fn empty_module_dir_leaves_everything_alone() {
        let mut report = report_with_paths("");
        relativize_report(&mut report, "");
        assert_eq!(report.packages[0].files[0], "/abs/root/pkg/a.go");
    }
}
