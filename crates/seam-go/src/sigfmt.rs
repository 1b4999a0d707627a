//! Signature formatting: type expressions and function signatures rendered
//! as stable display strings and structured records.
//!
//! All functions here are pure over the syntax node. Qualifiers are rendered
//! exactly as written in source, which already encodes the rule that
//! same-package types carry no qualifier and cross-package types carry the
//! (possibly renamed) import name. Output is never empty; unknown constructs
//! render as `?<kind>` so downstream consumers need no nil checks.

use seam_core::report::Parameter;

use crate::ast::{ChanDir, FuncType, ParamGroup, TypeExpr};

// ============================================================================
// Type Display
// ============================================================================

/// Render a type expression in its conventional source form.
pub fn type_display(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Name {
            qualifier, name, ..
        } => {
            let name = if name.is_empty() { "?" } else { name.as_str() };
            match qualifier {
                Some(q) => format!("{}.{}", q, name),
                None => name.to_string(),
            }
        }
        TypeExpr::Pointer { elem, .. } => format!("*{}", type_display(elem)),
        TypeExpr::Slice { elem, .. } => format!("[]{}", type_display(elem)),
        TypeExpr::Array { len, elem, .. } => format!("[{}]{}", len, type_display(elem)),
        TypeExpr::Map { key, value, .. } => {
            format!("map[{}]{}", type_display(key), type_display(value))
        }
        TypeExpr::Chan { dir, elem, .. } => match dir {
            ChanDir::Both => format!("chan {}", type_display(elem)),
            ChanDir::Send => format!("chan<- {}", type_display(elem)),
            ChanDir::Recv => format!("<-chan {}", type_display(elem)),
        },
        TypeExpr::Func { sig, .. } => format!("func{}", func_type_display(sig)),
        TypeExpr::Struct { fields, .. } => {
            if fields.is_empty() {
                "struct{}".to_string()
            } else {
                "struct{...}".to_string()
            }
        }
        TypeExpr::Interface { elems, .. } => {
            if elems.is_empty() {
                "interface{}".to_string()
            } else {
                "interface{...}".to_string()
            }
        }
        TypeExpr::Variadic { elem, .. } => format!("...{}", type_display(elem)),
        TypeExpr::Paren { inner, .. } => format!("({})", type_display(inner)),
        TypeExpr::Generic { base, args, .. } => {
            let rendered: Vec<String> = args.iter().map(type_display).collect();
            format!("{}[{}]", type_display(base), rendered.join(", "))
        }
        TypeExpr::Unsupported { kind, .. } => format!("?{}", kind),
    }
}

/// Whether the type is a direct pointer; returns the pointee display when so.
pub fn is_pointer(ty: &TypeExpr) -> (bool, String) {
    match ty {
        TypeExpr::Pointer { elem, .. } => (true, type_display(elem)),
        _ => (false, String::new()),
    }
}

// ============================================================================
// Function Signatures
// ============================================================================

fn group_display(group: &ParamGroup) -> String {
    let ty = type_display(&group.ty);
    if group.names.is_empty() {
        ty
    } else {
        let names: Vec<&str> = group.names.iter().map(|n| n.name.as_str()).collect();
        format!("{} {}", names.join(", "), ty)
    }
}

/// Render `(param-list) result-list`.
///
/// A single unnamed result omits its parentheses; named results or multiple
/// results are wrapped.
pub fn func_type_display(sig: &FuncType) -> String {
    let params: Vec<String> = sig.params.iter().map(group_display).collect();
    let rendered_params = format!("({})", params.join(", "));
    if sig.results.is_empty() {
        return rendered_params;
    }
    let single_unnamed = sig.results.len() == 1 && sig.results[0].names.is_empty();
    if single_unnamed {
        format!("{} {}", rendered_params, type_display(&sig.results[0].ty))
    } else {
        let results: Vec<String> = sig.results.iter().map(group_display).collect();
        format!("{} ({})", rendered_params, results.join(", "))
    }
}

/// One record per declared parameter position.
pub fn parameters(sig: &FuncType) -> Vec<Parameter> {
    let mut out = Vec::new();
    for group in &sig.params {
        let display = type_display(&group.ty);
        let (pointer, _) = is_pointer(&group.ty);
        if group.names.is_empty() {
            out.push(Parameter {
                name: String::new(),
                type_display: display,
                is_pointer: pointer,
            });
        } else {
            for name in &group.names {
                out.push(Parameter {
                    name: name.name.clone(),
                    type_display: display.clone(),
                    is_pointer: pointer,
                });
            }
        }
    }
    out
}

/// One display entry per returned value; grouped names expand to preserve
/// arity.
pub fn return_types(sig: &FuncType) -> Vec<String> {
    let mut out = Vec::new();
    for group in &sig.results {
        let display = type_display(&group.ty);
        if group.names.is_empty() {
            out.push(display);
        } else {
            for _ in &group.names {
                out.push(display.clone());
            }
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
