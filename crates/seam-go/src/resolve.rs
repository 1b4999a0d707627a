//! Package-level resolution.
//!
//! Fills a package's symbol scope and type table from its parsed files:
//! named types with their underlying shapes, methods attached to their
//! receiver's type, and canonical signature strings used for method-set
//! comparison across packages.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Decl, File, FuncType, InterfaceElem, ParamGroup, TypeExpr};
use crate::types::{
    EmbedRef, InterfaceShape, MethodDef, NamedDef, Package, StructShape, SymbolKind, Underlying,
};

// ============================================================================
// Predeclared Identifiers
// ============================================================================

/// Go's predeclared type identifiers; these never get a package qualifier.
pub fn is_predeclared(name: &str) -> bool {
    matches!(
        name,
        "bool"
            | "byte"
            | "complex64"
            | "complex128"
            | "error"
            | "float32"
            | "float64"
            | "int"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "rune"
            | "string"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
            | "any"
            | "comparable"
    )
}

// ============================================================================
// Import Maps
// ============================================================================

/// Map a file's imports to `local name -> import path`, honoring renames.
/// Blank and dot imports contribute no usable qualifier.
pub fn file_imports(file: &File) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for spec in &file.imports {
        let local = match &spec.local_name {
            Some(n) if n == "_" || n == "." => continue,
            Some(n) => n.clone(),
            None => spec
                .path
                .rsplit('/')
                .next()
                .unwrap_or(spec.path.as_str())
                .to_string(),
        };
        map.insert(local, spec.path.clone());
    }
    map
}

// ============================================================================
// Canonical Rendering
// ============================================================================

/// Render a type with package-path-qualified names, so signatures compare
/// equal across packages regardless of import renames.
pub fn canonical_type(ty: &TypeExpr, imports: &HashMap<String, String>, self_path: &str) -> String {
    match ty {
        TypeExpr::Name {
            qualifier, name, ..
        } => match qualifier {
            None => {
                if is_predeclared(name) {
                    name.clone()
                } else {
                    format!("{}.{}", self_path, name)
                }
            }
            Some(q) => match imports.get(q) {
                Some(path) => format!("{}.{}", path, name),
                None => format!("{}.{}", q, name),
            },
        },
        TypeExpr::Pointer { elem, .. } => format!("*{}", canonical_type(elem, imports, self_path)),
        TypeExpr::Slice { elem, .. } => format!("[]{}", canonical_type(elem, imports, self_path)),
        TypeExpr::Array { len, elem, .. } => {
            format!("[{}]{}", len, canonical_type(elem, imports, self_path))
        }
        TypeExpr::Map { key, value, .. } => format!(
            "map[{}]{}",
            canonical_type(key, imports, self_path),
            canonical_type(value, imports, self_path)
        ),
        TypeExpr::Chan { dir, elem, .. } => {
            let prefix = match dir {
                crate::ast::ChanDir::Both => "chan ",
                crate::ast::ChanDir::Send => "chan<- ",
                crate::ast::ChanDir::Recv => "<-chan ",
            };
            format!("{}{}", prefix, canonical_type(elem, imports, self_path))
        }
        TypeExpr::Func { sig, .. } => format!("func{}", canonical_sig(sig, imports, self_path)),
        TypeExpr::Struct { fields, .. } => {
            let mut parts = Vec::new();
            for field in fields {
                let rendered = canonical_type(&field.ty, imports, self_path);
                let count = field.names.len().max(1);
                for _ in 0..count {
                    parts.push(rendered.clone());
                }
            }
            format!("struct{{{}}}", parts.join(","))
        }
        TypeExpr::Interface { elems, .. } => {
            let mut parts = Vec::new();
            for elem in elems {
                match elem {
                    InterfaceElem::Method { name, sig, .. } => {
                        parts.push(format!("{}{}", name.name, canonical_sig(sig, imports, self_path)));
                    }
                    InterfaceElem::Embedded { ty, .. } => {
                        parts.push(canonical_type(ty, imports, self_path));
                    }
                }
            }
            format!("interface{{{}}}", parts.join(";"))
        }
        TypeExpr::Variadic { elem, .. } => {
            format!("...{}", canonical_type(elem, imports, self_path))
        }
        TypeExpr::Paren { inner, .. } => canonical_type(inner, imports, self_path),
        TypeExpr::Generic { base, args, .. } => {
            let rendered: Vec<String> = args
                .iter()
                .map(|a| canonical_type(a, imports, self_path))
                .collect();
            format!(
                "{}[{}]",
                canonical_type(base, imports, self_path),
                rendered.join(",")
            )
        }
        TypeExpr::Unsupported { .. } => "?".to_string(),
    }
}

/// Canonical signature: `(params)(results)` with grouped names expanded so
/// arity is part of the comparison.
pub fn canonical_sig(
    sig: &FuncType,
    imports: &HashMap<String, String>,
    self_path: &str,
) -> String {
    fn expand(
        groups: &[ParamGroup],
        imports: &HashMap<String, String>,
        self_path: &str,
    ) -> String {
        let mut parts = Vec::new();
        for group in groups {
            let rendered = canonical_type(&group.ty, imports, self_path);
            let count = group.names.len().max(1);
            for _ in 0..count {
                parts.push(rendered.clone());
            }
        }
        parts.join(",")
    }
    format!(
        "({})({})",
        expand(&sig.params, imports, self_path),
        expand(&sig.results, imports, self_path)
    )
}

// ============================================================================
// Embedding References
// ============================================================================

/// Resolve an embedded type expression to its defining package path and
/// name. Returns an unresolvable marker for shapes outside the model.
fn embed_ref(
    ty: &TypeExpr,
    imports: &HashMap<String, String>,
    self_path: &str,
) -> EmbedRef {
    let mut pointer = false;
    let mut core = ty.core();
    if let TypeExpr::Pointer { elem, .. } = core {
        pointer = true;
        core = elem.core();
    }
    if let TypeExpr::Generic { base, .. } = core {
        core = base.core();
    }
    match core {
        TypeExpr::Name {
            qualifier, name, ..
        } => {
            let package_path = match qualifier {
                None => Some(self_path.to_string()),
                Some(q) => imports.get(q).cloned(),
            };
            EmbedRef {
                package_path,
                name: name.clone(),
                pointer,
            }
        }
        _ => EmbedRef {
            package_path: None,
            name: "?".to_string(),
            pointer,
        },
    }
}

// ============================================================================
// Package Resolution
// ============================================================================

/// Build the package's scope, type table, and method attachments from its
/// parsed files. Files are processed in order; the first declaration of a
/// name wins and later duplicates are dropped with a log line.
pub fn resolve_package(pkg: &mut Package) {
    let files = std::mem::take(&mut pkg.ast_files);

    // Pass 1: types, package-level values, function names.
    for file in &files {
        let imports = file_imports(file);
        for decl in &file.decls {
            match decl {
                Decl::Type(type_decl) => {
                    for spec in &type_decl.specs {
                        let underlying =
                            resolve_underlying(&spec.ty, &imports, &pkg.import_path);
                        let def = NamedDef {
                            name: spec.name.name.clone(),
                            pos: spec.name.pos,
                            underlying,
                            methods: Vec::new(),
                            alias: spec.alias,
                        };
                        if pkg.types.contains_key(&def.name) {
                            debug!(
                                package = %pkg.import_path,
                                name = %def.name,
                                "duplicate type declaration dropped"
                            );
                            continue;
                        }
                        pkg.scope.insert(def.name.clone(), SymbolKind::Type);
                        pkg.types.insert(def.name.clone(), def);
                    }
                }
                Decl::Func(func) => {
                    if func.receiver.is_none() && func.name.name != "_" {
                        pkg.scope
                            .entry(func.name.name.clone())
                            .or_insert(SymbolKind::Func);
                    }
                }
                Decl::Var(var_decl) => {
                    for spec in &var_decl.specs {
                        for name in &spec.names {
                            if name.name == "_" {
                                continue;
                            }
                            pkg.scope
                                .entry(name.name.clone())
                                .or_insert(SymbolKind::Var);
                            if let Some(ty) = &spec.ty {
                                pkg.var_types
                                    .entry(name.name.clone())
                                    .or_insert_with(|| ty.clone());
                            }
                        }
                    }
                }
                Decl::Const(const_decl) => {
                    for spec in &const_decl.specs {
                        for name in &spec.names {
                            if name.name != "_" {
                                pkg.scope
                                    .entry(name.name.clone())
                                    .or_insert(SymbolKind::Const);
                            }
                        }
                    }
                }
            }
        }
    }

    // Pass 2: attach methods to their receiver types.
    for file in &files {
        let imports = file_imports(file);
        for decl in &file.decls {
            let func = match decl {
                Decl::Func(f) => f,
                _ => continue,
            };
            let recv = match &func.receiver {
                Some(r) => r,
                None => continue,
            };
            let method = MethodDef {
                name: func.name.name.clone(),
                pointer_recv: recv.pointer,
                canonical_sig: canonical_sig(&func.sig, &imports, &pkg.import_path),
                pos: func.name.pos,
            };
            match pkg.types.get_mut(&recv.type_name) {
                Some(def) => def.methods.push(method),
                None => debug!(
                    package = %pkg.import_path,
                    receiver = %recv.type_name,
                    method = %func.name.name,
                    "method receiver type not found in package"
                ),
            }
        }
    }

    pkg.ast_files = files;
}

fn resolve_underlying(
    ty: &TypeExpr,
    imports: &HashMap<String, String>,
    self_path: &str,
) -> Underlying {
    match ty.core() {
        TypeExpr::Interface { elems, .. } => {
            let mut shape = InterfaceShape::default();
            for elem in elems {
                match elem {
                    InterfaceElem::Method { name, sig, .. } => {
                        shape.methods.push((
                            name.name.clone(),
                            canonical_sig(sig, imports, self_path),
                        ));
                    }
                    InterfaceElem::Embedded { ty, .. } => {
                        if matches!(ty, TypeExpr::Unsupported { .. }) {
                            shape.has_unmodeled = true;
                            continue;
                        }
                        shape.embeds.push(embed_ref(ty, imports, self_path));
                    }
                }
            }
            Underlying::Interface(shape)
        }
        TypeExpr::Struct { fields, .. } => {
            let embedded = fields
                .iter()
                .filter(|f| f.is_embedded())
                .map(|f| embed_ref(&f.ty, imports, self_path))
                .collect();
            Underlying::Struct(StructShape { embedded })
        }
        _ => Underlying::Other,
    }
}

// ============================================================================
// Tests
// ============================================================================
