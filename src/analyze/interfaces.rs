//! Interface extraction.
//!
//! Walks every analyzable package's syntax trees and emits one [`Interface`]
//! record per interface type declaration, keyed by
//! `(package import path, interface name)`. Implementations are filled in
//! later by the satisfaction pass.

use std::collections::BTreeMap;

use tracing::warn;

use seam_core::report::{Interface, Method};
use seam_go::ast::{Decl, InterfaceElem, TypeExpr};
use seam_go::sigfmt;
use seam_go::types::Universe;

/// Primary key of an interface: `(package path, name)`.
pub type InterfaceKey = (String, String);

/// Extract all interface declarations from the universe.
///
/// Malformed declarations degrade to warnings; extraction itself never
/// fails. On a duplicate key the first declaration wins.
pub fn extract_interfaces(universe: &Universe) -> BTreeMap<InterfaceKey, Interface> {
    let mut out: BTreeMap<InterfaceKey, Interface> = BTreeMap::new();
    for pkg in &universe.packages {
        if !pkg.is_analyzable() {
            continue;
        }
        for file in &pkg.ast_files {
            for decl in &file.decls {
                let type_decl = match decl {
                    Decl::Type(d) => d,
                    _ => continue,
                };
                for spec in &type_decl.specs {
                    let elems = match spec.ty.core() {
                        TypeExpr::Interface { elems, .. } => elems,
                        _ => continue,
                    };
                    if spec.name.name.is_empty() {
                        warn!(package = %pkg.import_path, "interface spec without a name");
                        continue;
                    }
                    // The resolved entry must agree that this is an
                    // interface; a missing entry means resolution dropped
                    // the declaration.
                    match pkg.types.get(&spec.name.name) {
                        Some(def) if def.is_interface() => {}
                        Some(_) => continue,
                        None => {
                            warn!(
                                package = %pkg.import_path,
                                name = %spec.name.name,
                                "interface has no resolved type entry"
                            );
                            continue;
                        }
                    }
                    let location = match universe.fset.location(spec.name.pos) {
                        Some(loc) => loc,
                        None => {
                            warn!(
                                package = %pkg.import_path,
                                name = %spec.name.name,
                                "interface position cannot be resolved"
                            );
                            continue;
                        }
                    };

                    let key = (pkg.import_path.clone(), spec.name.name.clone());
                    if out.contains_key(&key) {
                        warn!(
                            package = %pkg.import_path,
                            name = %spec.name.name,
                            "duplicate interface declaration kept first"
                        );
                        continue;
                    }

                    let mut methods = Vec::new();
                    let mut embeds: Vec<String> = Vec::new();
                    for elem in elems {
                        match elem {
                            InterfaceElem::Method { name, sig, doc } => {
                                let location = universe
                                    .fset
                                    .location(name.pos)
                                    .unwrap_or_default();
                                methods.push(Method {
                                    name: name.name.clone(),
                                    signature: format!(
                                        "{}{}",
                                        name.name,
                                        sigfmt::func_type_display(sig)
                                    ),
                                    parameters: sigfmt::parameters(sig),
                                    return_types: sigfmt::return_types(sig),
                                    doc_comment: doc.trim().to_string(),
                                    location,
                                });
                            }
                            InterfaceElem::Embedded { ty, .. } => {
                                let display = sigfmt::type_display(ty);
                                if !embeds.contains(&display) {
                                    embeds.push(display);
                                }
                            }
                        }
                    }

                    out.insert(
                        key,
                        Interface {
                            name: spec.name.name.clone(),
                            package_name: pkg.name.clone(),
                            package_path: pkg.import_path.clone(),
                            location,
                            doc_comment: spec.doc.trim().to_string(),
                            methods,
                            embeds,
                            implementations: Vec::new(),
                        },
                    );
                }
            }
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
