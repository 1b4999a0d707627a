//! Resolved type information and the interface-satisfaction engine.
//!
//! The model is deliberately shallow: satisfaction needs each named type's
//! method set (split by receiver form), each interface's required method
//! set, and struct/interface embedding edges to drive method promotion.
//! Method signatures are compared through canonical strings rendered with
//! package-path-qualified type names, so two packages agree on what
//! `Write(p []byte) (int, error)` means.
//!
//! # Satisfaction rules
//!
//! - A value method set contains methods with value receivers plus methods
//!   promoted from embedded fields per Go's rules.
//! - A pointer method set contains all declared methods plus promotions.
//! - `T` satisfies an interface iff the interface's full method set is a
//!   subset of `T`'s value set; `*T` checks against the pointer set.
//! - An interface whose embedded interfaces cannot all be resolved in the
//!   loaded universe has an incomplete method set and nothing satisfies it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use crate::ast::{File, FileSet, Pos, TypeExpr};

/// Embedding depth bound; deeper chains are treated as unresolvable.
pub const MAX_EMBED_DEPTH: usize = 8;

// ============================================================================
// Symbols and Named Types
// ============================================================================

/// Kind of a package-level symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Type,
    Func,
    Var,
    Const,
}

/// Package-level symbol scope.
pub type Scope = BTreeMap<String, SymbolKind>;

/// A method declared on a named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: String,
    pub pointer_recv: bool,
    /// Canonical signature string, package-path qualified.
    pub canonical_sig: String,
    pub pos: Pos,
}

/// A reference to an embedded type, resolved to its defining package path
/// where possible. `package_path: None` marks an unresolvable embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedRef {
    pub package_path: Option<String>,
    pub name: String,
    pub pointer: bool,
}

/// The method requirements of an interface type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceShape {
    /// Declared methods as `(name, canonical signature)`, source order.
    pub methods: Vec<(String, String)>,
    pub embeds: Vec<EmbedRef>,
    /// True when the body contains constructs outside the method-set model
    /// (type-set terms); such interfaces are never satisfied.
    pub has_unmodeled: bool,
}

/// Embedding structure of a struct type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructShape {
    pub embedded: Vec<EmbedRef>,
}

/// Underlying shape of a named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Underlying {
    Interface(InterfaceShape),
    Struct(StructShape),
    Other,
}

/// A package-level named type with its resolved shape and methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedDef {
    pub name: String,
    /// Position of the defining identifier.
    pub pos: Pos,
    pub underlying: Underlying,
    pub methods: Vec<MethodDef>,
    /// True for `type X = Y`; aliases are not distinct named types.
    pub alias: bool,
}

impl NamedDef {
    pub fn is_interface(&self) -> bool {
        matches!(self.underlying, Underlying::Interface(_))
    }
}

/// Named types of one package, keyed by name.
pub type TypeTable = BTreeMap<String, NamedDef>;

// ============================================================================
// Packages and the Universe
// ============================================================================

/// Module manifest metadata carried by every loaded package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMeta {
    pub path: String,
    pub dir: PathBuf,
}

/// One loaded, resolved package.
#[derive(Debug, Clone)]
pub struct Package {
    /// Short package name from the package clauses.
    pub name: String,
    pub import_path: String,
    /// Absolute package directory.
    pub dir: PathBuf,
    /// Absolute source file paths, sorted.
    pub files: Vec<String>,
    /// Import paths used by any file of the package, sorted and unique.
    pub imports: Vec<String>,
    pub ast_files: Vec<File>,
    pub scope: Scope,
    pub types: TypeTable,
    /// Declared types of package-level `var`s, for call classification.
    pub var_types: BTreeMap<String, TypeExpr>,
    pub parse_errors: usize,
    pub embed_patterns: Vec<String>,
    /// Absolute paths of files matched by embed patterns.
    pub embed_files: Vec<String>,
    pub module: Option<ModuleMeta>,
}

impl Package {
    /// A package participates in analysis only with resolved symbols or a
    /// clean parse.
    pub fn is_analyzable(&self) -> bool {
        !self.scope.is_empty() || self.parse_errors == 0
    }
}

/// The loaded package universe plus the shared position table.
#[derive(Debug)]
pub struct Universe {
    pub packages: Vec<Package>,
    pub fset: FileSet,
    by_path: HashMap<String, usize>,
}

impl Universe {
    pub fn new(packages: Vec<Package>, fset: FileSet) -> Self {
        let by_path = packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.import_path.clone(), i))
            .collect();
        Universe {
            packages,
            fset,
            by_path,
        }
    }

    pub fn by_path(&self, path: &str) -> Option<&Package> {
        self.by_path.get(path).map(|&i| &self.packages[i])
    }

    /// Look up a named type by defining package path and name.
    pub fn named_def(&self, pkg_path: &str, name: &str) -> Option<&NamedDef> {
        self.by_path(pkg_path).and_then(|p| p.types.get(name))
    }
}

// ============================================================================
// Satisfaction Engine
// ============================================================================

/// Value and pointer method sets of a named type, keyed by method name.
#[derive(Debug, Clone, Default)]
pub struct MethodSets {
    pub value: BTreeMap<String, String>,
    pub pointer: BTreeMap<String, String>,
}

/// Memoizing `implements` oracle.
///
/// Verdicts are cached on `(qualified type, qualified interface)`, and the
/// intermediate method sets on the qualified type, so repeated queries across
/// packages sharing imports do not recompute promotion chains.
#[derive(Debug, Default)]
pub struct ImplementsEngine {
    sets: HashMap<String, MethodSets>,
    iface_sets: HashMap<String, Option<BTreeMap<String, String>>>,
    verdicts: HashMap<(String, String), (bool, bool)>,
}

fn qualify(pkg_path: &str, name: &str) -> String {
    format!("{}.{}", pkg_path, name)
}

impl ImplementsEngine {
    pub fn new() -> Self {
        ImplementsEngine::default()
    }

    /// Decide whether `pkg_path.type_name` satisfies the interface, in value
    /// and in pointer form.
    pub fn implements(
        &mut self,
        universe: &Universe,
        pkg_path: &str,
        type_name: &str,
        iface_path: &str,
        iface_name: &str,
    ) -> (bool, bool) {
        let key = (qualify(pkg_path, type_name), qualify(iface_path, iface_name));
        if let Some(&verdict) = self.verdicts.get(&key) {
            return verdict;
        }
        let verdict = self.compute(universe, pkg_path, type_name, iface_path, iface_name);
        self.verdicts.insert(key, verdict);
        verdict
    }

    fn compute(
        &mut self,
        universe: &Universe,
        pkg_path: &str,
        type_name: &str,
        iface_path: &str,
        iface_name: &str,
    ) -> (bool, bool) {
        let mut seen = HashSet::new();
        let required = match self.interface_set(universe, iface_path, iface_name, &mut seen, 0) {
            Some(set) => set,
            None => return (false, false),
        };
        let mut seen_types = HashSet::new();
        let sets = self.method_sets(universe, pkg_path, type_name, &mut seen_types, 0);
        let value_ok = required
            .iter()
            .all(|(name, sig)| sets.value.get(name) == Some(sig));
        let pointer_ok = required
            .iter()
            .all(|(name, sig)| sets.pointer.get(name) == Some(sig));
        (value_ok, pointer_ok)
    }

    /// Full required method set of an interface, embeds resolved
    /// transitively. `None` when any embed cannot be resolved in the loaded
    /// universe, or the interface uses type-set constraints.
    pub fn interface_set(
        &mut self,
        universe: &Universe,
        pkg_path: &str,
        name: &str,
        seen: &mut HashSet<String>,
        depth: usize,
    ) -> Option<BTreeMap<String, String>> {
        let key = qualify(pkg_path, name);
        if let Some(cached) = self.iface_sets.get(&key) {
            return cached.clone();
        }
        if depth > MAX_EMBED_DEPTH || !seen.insert(key.clone()) {
            // Cycles cannot add methods.
            return Some(BTreeMap::new());
        }
        let result = self.interface_set_uncached(universe, pkg_path, name, seen, depth);
        self.iface_sets.insert(key, result.clone());
        result
    }

    fn interface_set_uncached(
        &mut self,
        universe: &Universe,
        pkg_path: &str,
        name: &str,
        seen: &mut HashSet<String>,
        depth: usize,
    ) -> Option<BTreeMap<String, String>> {
        let def = universe.named_def(pkg_path, name)?;
        let shape = match &def.underlying {
            Underlying::Interface(shape) => shape,
            _ => return None,
        };
        if shape.has_unmodeled {
            return None;
        }
        let mut set: BTreeMap<String, String> = shape
            .methods
            .iter()
            .map(|(n, sig)| (n.clone(), sig.clone()))
            .collect();
        for embed in &shape.embeds {
            let target_path = embed.package_path.as_deref()?;
            let inner = self.interface_set(universe, target_path, &embed.name, seen, depth + 1)?;
            for (n, sig) in inner {
                set.entry(n).or_insert(sig);
            }
        }
        Some(set)
    }

    /// Value and pointer method sets of a named type, with promotion through
    /// embedded struct fields and embedded interfaces.
    pub fn method_sets(
        &mut self,
        universe: &Universe,
        pkg_path: &str,
        type_name: &str,
        seen: &mut HashSet<String>,
        depth: usize,
    ) -> MethodSets {
        let key = qualify(pkg_path, type_name);
        if let Some(cached) = self.sets.get(&key) {
            return cached.clone();
        }
        if depth > MAX_EMBED_DEPTH || !seen.insert(key.clone()) {
            return MethodSets::default();
        }
        let sets = self.method_sets_uncached(universe, pkg_path, type_name, seen, depth);
        self.sets.insert(key, sets.clone());
        sets
    }

    fn method_sets_uncached(
        &mut self,
        universe: &Universe,
        pkg_path: &str,
        type_name: &str,
        seen: &mut HashSet<String>,
        depth: usize,
    ) -> MethodSets {
        let mut sets = MethodSets::default();
        let def = match universe.named_def(pkg_path, type_name) {
            Some(def) => def,
            None => return sets,
        };
        for m in &def.methods {
            sets.pointer
                .insert(m.name.clone(), m.canonical_sig.clone());
            if !m.pointer_recv {
                sets.value.insert(m.name.clone(), m.canonical_sig.clone());
            }
        }
        let embedded = match &def.underlying {
            Underlying::Struct(shape) => shape.embedded.clone(),
            _ => Vec::new(),
        };
        for embed in embedded {
            let target_path = match embed.package_path.as_deref() {
                Some(path) => path.to_string(),
                None => continue,
            };
            let target_is_iface = universe
                .named_def(&target_path, &embed.name)
                .is_some_and(NamedDef::is_interface);
            if target_is_iface {
                let mut iface_seen = HashSet::new();
                if let Some(iface) =
                    self.interface_set(universe, &target_path, &embed.name, &mut iface_seen, 0)
                {
                    for (n, sig) in iface {
                        sets.value.entry(n.clone()).or_insert_with(|| sig.clone());
                        sets.pointer.entry(n).or_insert(sig);
                    }
                }
                continue;
            }
            let inner = self.method_sets(universe, &target_path, &embed.name, seen, depth + 1);
            if embed.pointer {
                // Embedded *E promotes E's full method set to both forms.
                for (n, sig) in &inner.pointer {
                    sets.value
                        .entry(n.clone())
                        .or_insert_with(|| sig.clone());
                    sets.pointer.entry(n.clone()).or_insert_with(|| sig.clone());
                }
            } else {
                for (n, sig) in &inner.value {
                    sets.value.entry(n.clone()).or_insert_with(|| sig.clone());
                }
                for (n, sig) in &inner.pointer {
                    sets.pointer.entry(n.clone()).or_insert_with(|| sig.clone());
                }
            }
        }
        sets
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, underlying: Underlying, methods: Vec<MethodDef>) -> NamedDef {
        NamedDef {
            name: name.to_string(),
            pos: Pos::new(0, 1),
            underlying,
            methods,
            alias: false,
        }
    }

    fn method(name: &str, pointer_recv: bool, sig: &str) -> MethodDef {
        MethodDef {
            name: name.to_string(),
            pointer_recv,
            canonical_sig: sig.to_string(),
            pos: Pos::new(0, 1),
        }
    }

    fn package(path: &str, types: Vec<NamedDef>) -> Package {
        let table: TypeTable = types.into_iter().map(|d| (d.name.clone(), d)).collect();
        let scope: Scope = table
            .keys()
            .map(|k| (k.clone(), SymbolKind::Type))
            .collect();
        Package {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            import_path: path.to_string(),
            dir: PathBuf::from("/tmp"),
            files: Vec::new(),
            imports: Vec::new(),
            ast_files: Vec::new(),
            scope,
            types: table,
            var_types: BTreeMap::new(),
            parse_errors: 0,
            embed_patterns: Vec::new(),
            embed_files: Vec::new(),
            module: None,
        }
    }

    fn iface_shape(methods: &[(&str, &str)], embeds: Vec<EmbedRef>) -> Underlying {
        Underlying::Interface(InterfaceShape {
            methods: methods
                .iter()
                .map(|(n, s)| (n.to_string(), s.to_string()))
                .collect(),
            embeds,
            has_unmodeled: false,
        })
    }

    mod satisfaction {
        use super::*;

        #[test]
        fn value_receiver_satisfies_both_forms() {
            let pkg = package(
                "m/demo",
                vec![
                    named("Doer", iface_shape(&[("Do", "()()")], vec![]), vec![]),
                    named(
                        "Impl",
                        Underlying::Struct(StructShape::default()),
                        vec![method("Do", false, "()()")],
                    ),
                ],
            );
            let universe = Universe::new(vec![pkg], FileSet::new());
            let mut engine = ImplementsEngine::new();
            assert_eq!(
                engine.implements(&universe, "m/demo", "Impl", "m/demo", "Doer"),
                (true, true)
            );
        }

        #[test]
        fn pointer_receiver_satisfies_pointer_only() {
            let pkg = package(
                "m/demo",
                vec![
                    named("Doer", iface_shape(&[("Do", "()()")], vec![]), vec![]),
                    named(
                        "PtrImpl",
                        Underlying::Struct(StructShape::default()),
                        vec![method("Do", true, "()()")],
                    ),
                ],
            );
            let universe = Universe::new(vec![pkg], FileSet::new());
            let mut engine = ImplementsEngine::new();
            assert_eq!(
                engine.implements(&universe, "m/demo", "PtrImpl", "m/demo", "Doer"),
                (false, true)
            );
        }

        #[test]
        fn signature_mismatch_fails() {
            let pkg = package(
                "m/demo",
                vec![
                    named("Doer", iface_shape(&[("Do", "(int)()")], vec![]), vec![]),
                    named(
                        "Impl",
                        Underlying::Struct(StructShape::default()),
                        vec![method("Do", false, "(string)()")],
                    ),
                ],
            );
            let universe = Universe::new(vec![pkg], FileSet::new());
            let mut engine = ImplementsEngine::new();
            assert_eq!(
                engine.implements(&universe, "m/demo", "Impl", "m/demo", "Doer"),
                (false, false)
            );
        }

        #[test]
        fn empty_interface_is_satisfied_by_anything() {
            let pkg = package(
                "m/demo",
                vec![
                    named("Empty", iface_shape(&[], vec![]), vec![]),
                    named("Plain", Underlying::Other, vec![]),
                ],
            );
            let universe = Universe::new(vec![pkg], FileSet::new());
            let mut engine = ImplementsEngine::new();
            assert_eq!(
                engine.implements(&universe, "m/demo", "Plain", "m/demo", "Empty"),
                (true, true)
            );
        }

        #[test]
        fn unresolved_embed_blocks_satisfaction() {
            let pkg = package(
                "m/demo",
                vec![
                    named(
                        "Wrapped",
                        iface_shape(
                            &[],
                            vec![EmbedRef {
                                package_path: None,
                                name: "Reader".to_string(),
                                pointer: false,
                            }],
                        ),
                        vec![],
                    ),
                    named("Plain", Underlying::Other, vec![]),
                ],
            );
            let universe = Universe::new(vec![pkg], FileSet::new());
            let mut engine = ImplementsEngine::new();
            assert_eq!(
                engine.implements(&universe, "m/demo", "Plain", "m/demo", "Wrapped"),
                (false, false)
            );
        }

        #[test]
        fn embedded_interface_methods_are_required() {
            let pkg = package(
                "m/demo",
                vec![
                    named("Base", iface_shape(&[("Close", "()()")], vec![]), vec![]),
                    named(
                        "Extended",
                        iface_shape(
                            &[("Extra", "()()")],
                            vec![EmbedRef {
                                package_path: Some("m/demo".to_string()),
                                name: "Base".to_string(),
                                pointer: false,
                            }],
                        ),
                        vec![],
                    ),
                    named(
                        "Full",
                        Underlying::Struct(StructShape::default()),
                        vec![method("Extra", false, "()()"), method("Close", false, "()()")],
                    ),
                    named(
                        "Partial",
                        Underlying::Struct(StructShape::default()),
                        vec![method("Extra", false, "()()")],
                    ),
                ],
            );
            let universe = Universe::new(vec![pkg], FileSet::new());
            let mut engine = ImplementsEngine::new();
            assert_eq!(
                engine.implements(&universe, "m/demo", "Full", "m/demo", "Extended"),
                (true, true)
            );
            assert_eq!(
                engine.implements(&universe, "m/demo", "Partial", "m/demo", "Extended"),
                (false, false)
            );
        }
    }

    mod promotion {
        use super::*;

        fn base_and_outer(pointer_embed: bool, base_method_ptr: bool) -> Universe {
            let base = named(
                "Base",
                Underlying::Struct(StructShape::default()),
                vec![method("Do", base_method_ptr, "()()")],
            );
            let outer = named(
                "Outer",
                Underlying::Struct(StructShape {
                    embedded: vec![EmbedRef {
                        package_path: Some("m/demo".to_string()),
                        name: "Base".to_string(),
                        pointer: pointer_embed,
                    }],
                }),
                vec![],
            );
            let doer = named("Doer", iface_shape(&[("Do", "()()")], vec![]), vec![]);
            Universe::new(
                vec![package("m/demo", vec![base, outer, doer])],
                FileSet::new(),
            )
        }

        #[test]
        fn value_embed_promotes_value_methods() {
            let universe = base_and_outer(false, false);
            let mut engine = ImplementsEngine::new();
            assert_eq!(
                engine.implements(&universe, "m/demo", "Outer", "m/demo", "Doer"),
                (true, true)
            );
        }

        #[test]
        fn value_embed_keeps_pointer_methods_on_pointer_form() {
            let universe = base_and_outer(false, true);
            let mut engine = ImplementsEngine::new();
            assert_eq!(
                engine.implements(&universe, "m/demo", "Outer", "m/demo", "Doer"),
                (false, true)
            );
        }

        #[test]
        fn pointer_embed_promotes_everything() {
            let universe = base_and_outer(true, true);
            let mut engine = ImplementsEngine::new();
            assert_eq!(
                engine.implements(&universe, "m/demo", "Outer", "m/demo", "Doer"),
                (true, true)
            );
        }

        #[test]
        fn verdicts_are_cached() {
            let universe = base_and_outer(false, false);
            let mut engine = ImplementsEngine::new();
            let first = engine.implements(&universe, "m/demo", "Outer", "m/demo", "Doer");
            let second = engine.implements(&universe, "m/demo", "Outer", "m/demo", "Doer");
            assert_eq!(first, second);
            assert_eq!(engine.verdicts.len(), 1);
        }
    }
}
