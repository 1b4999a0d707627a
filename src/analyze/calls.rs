//! Call-site enumeration.
//!
//! Lowers the universe to control-flow form, then renders one [`CallSite`]
//! per call-shaped instruction, grouped by the owning package's import path.
//! Lowered functions are matched back to loader packages by import path, and
//! iterated in canonical-name order so the output is stable run to run.

use std::collections::BTreeMap;

use tracing::warn;

use seam_core::report::{CallSite, CallType};
use seam_go::ir::{self, Callee, CallKind, LowerError};
use seam_go::types::Universe;

/// Extract every call site in the universe.
///
/// Fails only when lowering cannot build a program at all; individual
/// unresolvable instructions are skipped with warnings.
pub fn extract_calls(universe: &Universe) -> Result<BTreeMap<String, Vec<CallSite>>, LowerError> {
    let program = ir::lower(universe)?;

    let mut functions: Vec<&ir::Function> = program.functions.iter().collect();
    functions.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out: BTreeMap<String, Vec<CallSite>> = BTreeMap::new();
    for func in functions {
        if func.is_empty() {
            continue;
        }
        // Match by import path, not by position in any list.
        if universe.by_path(&func.package_path).is_none() {
            warn!(
                function = %func.name,
                package = %func.package_path,
                "lowered function has no loader package"
            );
            continue;
        }
        for block in &func.blocks {
            for instr in &block.instrs {
                let location = match universe.fset.location(instr.pos) {
                    Some(loc) => loc,
                    None => {
                        warn!(function = %func.name, "call instruction without a position");
                        continue;
                    }
                };
                let call_type = match (instr.kind, &instr.callee) {
                    (CallKind::Go, _) => CallType::Goroutine,
                    (CallKind::Defer, _) => CallType::Defer,
                    (CallKind::Call, Callee::Static { .. }) => CallType::Static,
                    (CallKind::Call, Callee::Dynamic { .. }) => CallType::Dynamic,
                    (CallKind::Call, Callee::Interface { .. }) => CallType::Interface,
                };
                out.entry(func.package_path.clone())
                    .or_default()
                    .push(CallSite {
                        caller_func_desc: func.name.clone(),
                        callee_desc: callee_desc(&instr.callee),
                        call_type,
                        location,
                    });
            }
        }
    }
    Ok(out)
}

/// Render the callee description for a classified instruction.
fn callee_desc(callee: &Callee) -> String {
    match callee {
        Callee::Static { name } => name.clone(),
        Callee::Dynamic {
            operand,
            type_display,
        } => format!("Dynamic via {} ({})", operand, type_display),
        Callee::Interface {
            method,
            recv_display,
        } => format!("Interface method {} on {}", method, recv_display),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use seam_go::ast::FileSet;
    use seam_go::parser::parse_file;
    use seam_go::resolve::resolve_package;
    use seam_go::types::Package;
    use std::path::PathBuf;

    fn universe_of(src: &str) -> Universe {
        let mut fset = FileSet::new();
        let id = fset.add_file("/m/demo/main.go");
        let ast = parse_file(id, src);
        let mut pkg = Package {
            name: "demo".to_string(),
            import_path: "m/demo".to_string(),
            dir: PathBuf::from("/m/demo"),
            files: vec!["/m/demo/main.go".to_string()],
            imports: Vec::new(),
            ast_files: vec![ast],
            scope: BTreeMap::new(),
            types: BTreeMap::new(),
            var_types: BTreeMap::new(),
            parse_errors: 0,
            embed_patterns: Vec::new(),
            embed_files: Vec::new(),
            module: None,
        };
        resolve_package(&mut pkg);
        Universe::new(vec![pkg], fset)
    }

    #[test]
    fn four_flavors_in_source_order() {
        let src = r#"package demo

type Greeter interface {
	Greet()
}

func helper() {}

func cleanup() {}

func run(g Greeter) {
	helper()
	g.Greet()
	go helper()
	defer cleanup()
}
"#;
        let universe = universe_of(src);
        let calls = extract_calls(&universe).unwrap();
        let sites = calls.get("m/demo").unwrap();
        let run_sites: Vec<&CallSite> = sites
            .iter()
            .filter(|c| c.caller_func_desc == "m/demo.run")
            .collect();
        assert_eq!(run_sites.len(), 4);
        assert_eq!(run_sites[0].call_type, CallType::Static);
        assert_eq!(run_sites[0].callee_desc, "m/demo.helper");
        assert_eq!(run_sites[1].call_type, CallType::Interface);
        assert_eq!(
            run_sites[1].callee_desc,
            "Interface method Greet on Greeter"
        );
        assert_eq!(run_sites[2].call_type, CallType::Goroutine);
        assert_eq!(run_sites[3].call_type, CallType::Defer);
        // Same caller on all four, and positions ascend in source order.
        assert!(run_sites.windows(2).all(|w| {
            w[0].caller_func_desc == w[1].caller_func_desc
                && w[0].location.line < w[1].location.line
        }));
    }

    #[test]
    fn dynamic_call_renders_operand_and_type() {
        let src = r#"package demo

func run() {
	f := func(n int) {}
	f(1)
}
"#;
        let universe = universe_of(src);
        let calls = extract_calls(&universe).unwrap();
        let sites = calls.get("m/demo").unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].call_type, CallType::Dynamic);
        assert_eq!(sites[0].callee_desc, "Dynamic via f (func(n int))");
    }

    #[test]
    fn package_without_calls_is_absent() {
        let universe = universe_of("package demo\n\ntype T struct{}\n");
        let calls = extract_calls(&universe).unwrap();
        assert!(calls.is_empty());
    }

    #[test]
    fn callers_iterate_in_sorted_order() {
        let src = r#"package demo

func target() {}

func zeta() { target() }

func alpha() { target() }
"#;
        let universe = universe_of(src);
        let calls = extract_calls(&universe).unwrap();
        let sites = calls.get("m/demo").unwrap();
        let callers: Vec<&str> = sites.iter().map(|c| c.caller_func_desc.as_str()).collect();
        assert_eq!(callers, vec!["m/demo.alpha", "m/demo.zeta"]);
    }
}
