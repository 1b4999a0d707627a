//! Satisfaction discovery.
//!
//! For every named concrete type in the universe and every extracted
//! interface, asks the satisfaction engine whether the type's value and
//! pointer forms cover the interface, and appends an [`Implementation`]
//! record for each form that does. Existing records are kept; duplicates
//! are suppressed on `(type name, package path, pointer form)`.

use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use seam_core::report::Implementation;
use seam_go::types::{ImplementsEngine, SymbolKind, Universe};

use crate::analyze::interfaces::InterfaceKey;
use seam_core::report::Interface;

/// Populate each interface's implementation list in place.
///
/// Failures to resolve a single type or position degrade to warnings; the
/// pass itself never fails.
pub fn find_implementations(
    universe: &Universe,
    interfaces: &mut BTreeMap<InterfaceKey, Interface>,
) {
    let mut engine = ImplementsEngine::new();

    // Interfaces whose name does not resolve to a type in the defining
    // package's scope cannot be tested.
    let keys: Vec<InterfaceKey> = interfaces
        .keys()
        .filter(|(path, name)| {
            let ok = universe
                .by_path(path)
                .map(|pkg| pkg.scope.get(name) == Some(&SymbolKind::Type))
                .unwrap_or(false);
            if !ok {
                warn!(package = %path, name = %name, "interface name does not resolve; skipping");
            }
            ok
        })
        .cloned()
        .collect();

    for pkg in &universe.packages {
        if !pkg.is_analyzable() {
            continue;
        }
        for (type_name, def) in &pkg.types {
            // Only concrete named types can satisfy; aliases are not
            // distinct types.
            if def.alias || def.is_interface() {
                continue;
            }
            let location = match universe.fset.location(def.pos) {
                Some(loc) => loc,
                None => {
                    warn!(
                        package = %pkg.import_path,
                        name = %type_name,
                        "cannot resolve type position; omitting its satisfactions"
                    );
                    continue;
                }
            };
            for key in &keys {
                let (value_ok, pointer_ok) =
                    engine.implements(universe, &pkg.import_path, type_name, &key.0, &key.1);
                if !value_ok && !pointer_ok {
                    continue;
                }
                let iface = match interfaces.get_mut(key) {
                    Some(i) => i,
                    None => continue,
                };
                let mut existing: HashSet<(String, String, bool)> = iface
                    .implementations
                    .iter()
                    .map(Implementation::key)
                    .collect();
                for is_pointer in [false, true] {
                    let ok = if is_pointer { pointer_ok } else { value_ok };
                    if !ok {
                        continue;
                    }
                    let dedup_key = (type_name.clone(), pkg.import_path.clone(), is_pointer);
                    if !existing.insert(dedup_key) {
                        continue;
                    }
                    iface.implementations.push(Implementation {
                        type_name: type_name.clone(),
                        package_path: pkg.import_path.clone(),
                        package_name: pkg.name.clone(),
                        is_pointer,
                        location: location.clone(),
                    });
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
