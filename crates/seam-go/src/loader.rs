//! Package loader: turns a directory rooted at a `go.mod` manifest into a
//! resolved [`Universe`].
//!
//! The loader walks the module tree, groups `.go` files by directory into
//! packages (test files included), parses and resolves each, and filters out
//! packages that are unusable for analysis. Directory order is sorted, so
//! package order and file-set indices are stable across runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;
use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::opt;
use winnow::error::ErrMode;
use winnow::prelude::*;
use winnow::token::take_while;
use winnow::ModalResult;

use crate::ast::FileSet;
use crate::parser::parse_file;
use crate::resolve::resolve_package;
use crate::types::{ModuleMeta, Package, Universe};

// ============================================================================
// Error Types
// ============================================================================

/// Loader failure; all variants are fatal for the run.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The target directory does not exist.
    #[error("directory not found: {path}")]
    NotFound { path: String },

    /// No `go.mod` at the module root.
    #[error("no go.mod found under {root}")]
    NoManifest { root: String },

    /// The manifest exists but carries no module directive.
    #[error("go.mod at {root} has no module directive")]
    BadManifest { root: String },

    /// Everything was filtered out.
    #[error("no usable packages under {root}")]
    NoPackages { root: String },

    /// IO error while reading sources.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for loading.
pub type LoadResult<T> = Result<T, LoadError>;

// ============================================================================
// Target Normalization
// ============================================================================

/// Strip a trailing separator and the recursive `/...` suffix from a load
/// target. Returns the root directory and the pattern used for it.
pub fn normalize_target(path: &str) -> (PathBuf, String) {
    let trimmed = path.trim_end_matches('/');
    if let Some(root) = trimmed.strip_suffix("/...") {
        let root = if root.is_empty() { "/" } else { root };
        (PathBuf::from(root), "./...".to_string())
    } else {
        (PathBuf::from(trimmed), trimmed.to_string())
    }
}

// ============================================================================
// Manifest Parsing
// ============================================================================

fn module_directive(input: &mut &str) -> ModalResult<String> {
    let _ = multispace0.parse_next(input)?;
    let checkpoint = *input;
    let keyword: &str = take_while(1.., |c: char| c.is_alphabetic()).parse_next(input)?;
    if keyword != "module" {
        *input = checkpoint;
        return Err(ErrMode::from_input(input));
    }
    let _ = multispace1.parse_next(input)?;
    let _ = opt('"').parse_next(input)?;
    let path: &str =
        take_while(1.., |c: char| !c.is_whitespace() && c != '"').parse_next(input)?;
    Ok(path.to_string())
}

/// Extract the module path from `go.mod` contents.
pub fn parse_module_path(content: &str) -> Option<String> {
    for line in content.lines() {
        let line = line.split("//").next().unwrap_or("");
        if line.trim_start().starts_with("module") {
            let mut input = line;
            if let Ok(path) = module_directive(&mut input) {
                return Some(path);
            }
        }
    }
    None
}

// ============================================================================
// Loading
// ============================================================================

/// Load and resolve every package under the module rooted at `target`.
///
/// The target may carry a trailing `/...`; loading is recursive from the
/// module root either way.
pub fn load(target: &str) -> LoadResult<Universe> {
    let (root, pattern) = normalize_target(target);
    debug!(root = %root.display(), %pattern, "loading module");
    if !root.is_dir() {
        return Err(LoadError::NotFound {
            path: root.display().to_string(),
        });
    }
    let root = root.canonicalize()?;
    let manifest = root.join("go.mod");
    if !manifest.is_file() {
        return Err(LoadError::NoManifest {
            root: root.display().to_string(),
        });
    }
    let module_path =
        parse_module_path(&fs::read_to_string(&manifest)?).ok_or(LoadError::BadManifest {
            root: root.display().to_string(),
        })?;
    let meta = ModuleMeta {
        path: module_path.clone(),
        dir: root.clone(),
    };

    // Group .go files by directory, sorted for determinism.
    let mut dirs: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !skip_dir(e))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if !name.ends_with(".go") || name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        let dir = match path.parent() {
            Some(d) => d.to_path_buf(),
            None => continue,
        };
        dirs.entry(dir).or_default().push(path.to_path_buf());
    }

    let mut fset = FileSet::new();
    let mut packages = Vec::new();
    for (dir, files) in dirs {
        match load_package(&mut fset, &root, &module_path, &meta, &dir, &files)? {
            Some(pkg) if pkg.is_analyzable() => packages.push(pkg),
            Some(pkg) => {
                warn!(
                    package = %pkg.import_path,
                    errors = pkg.parse_errors,
                    "dropping package without usable type information"
                );
            }
            None => {}
        }
    }

    if packages.is_empty() {
        return Err(LoadError::NoPackages {
            root: root.display().to_string(),
        });
    }
    Ok(Universe::new(packages, fset))
}

fn skip_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    if entry.depth() == 0 {
        return false;
    }
    match entry.file_name().to_str() {
        Some(name) => {
            name.starts_with('.') || name.starts_with('_') || name == "vendor" || name == "testdata"
        }
        None => true,
    }
}

fn load_package(
    fset: &mut FileSet,
    root: &Path,
    module_path: &str,
    meta: &ModuleMeta,
    dir: &Path,
    files: &[PathBuf],
) -> LoadResult<Option<Package>> {
    let mut ast_files = Vec::new();
    let mut file_paths = Vec::new();
    let mut parse_errors = 0;
    let mut embed_patterns = Vec::new();
    for path in files {
        let src = fs::read_to_string(path)?;
        let abs = path.display().to_string();
        let file_id = fset.add_file(abs.clone());
        let ast = parse_file(file_id, &src);
        parse_errors += ast.errors;
        embed_patterns.extend(ast.embed_patterns.iter().cloned());
        file_paths.push(abs);
        ast_files.push(ast);
    }

    // The package name comes from the first file with a usable clause;
    // external test packages (`foo_test`) are folded out.
    let base_name = ast_files
        .iter()
        .map(|f| f.package_name.name.trim_end_matches("_test"))
        .find(|n| !n.is_empty())
        .unwrap_or("")
        .to_string();
    if base_name.is_empty() {
        debug!(dir = %dir.display(), "no package clause in directory");
        return Ok(None);
    }
    let keep: Vec<bool> = ast_files
        .iter()
        .map(|f| {
            let n = &f.package_name.name;
            n == &base_name || n.trim_end_matches("_test") == base_name
        })
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        warn!(
            dir = %dir.display(),
            dropped,
            "dropping files with mismatched package clause"
        );
    }
    let mut kept_files = Vec::new();
    let mut kept_asts = Vec::new();
    for (i, ast) in ast_files.into_iter().enumerate() {
        if keep[i] {
            kept_files.push(file_paths[i].clone());
            kept_asts.push(ast);
        }
    }

    let rel = dir.strip_prefix(root).unwrap_or(dir);
    let import_path = if rel.as_os_str().is_empty() {
        module_path.to_string()
    } else {
        format!("{}/{}", module_path, slash_path(rel))
    };

    let mut imports: Vec<String> = kept_asts
        .iter()
        .flat_map(|f| f.imports.iter().map(|i| i.path.clone()))
        .collect();
    imports.sort();
    imports.dedup();

    let embed_files = resolve_embed_files(dir, &embed_patterns);

    let mut pkg = Package {
        name: base_name,
        import_path,
        dir: dir.to_path_buf(),
        files: kept_files,
        imports,
        ast_files: kept_asts,
        scope: BTreeMap::new(),
        types: BTreeMap::new(),
        var_types: BTreeMap::new(),
        parse_errors,
        embed_patterns,
        embed_files,
        module: Some(meta.clone()),
    };
    resolve_package(&mut pkg);
    Ok(Some(pkg))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve literal embed patterns against the package directory. Patterns
/// naming a directory pull in its files recursively; glob patterns are kept
/// as patterns only.
fn resolve_embed_files(dir: &Path, patterns: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            debug!(%pattern, "embed glob pattern left unresolved");
            continue;
        }
        let target = dir.join(pattern);
        if target.is_file() {
            out.push(target.display().to_string());
        } else if target.is_dir() {
            for entry in WalkDir::new(&target)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() {
                    out.push(entry.path().display().to_string());
                }
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn module(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "go.mod", "module example.com/mod\n\ngo 1.22\n");
        for (rel, content) in files {
            write(tmp.path(), rel, content);
        }
        tmp
    }

    mod normalization {
        use super::*;

        #[test]
        fn strips_recursive_suffix() {
            let (root, pattern) = normalize_target("/src/mod/...");
            assert_eq!(root, PathBuf::from("/src/mod"));
            assert_eq!(pattern, "./...");
        }

        #[test]
        fn strips_trailing_separator() {
            let (root, pattern) = normalize_target("/src/mod/");
            assert_eq!(root, PathBuf::from("/src/mod"));
            assert_eq!(pattern, "/src/mod");
        }
    }

    mod manifest {
        use super::*;

        #[test]
        fn parses_module_directive() {
            assert_eq!(
                parse_module_path("module example.com/mod\n\ngo 1.22\n"),
                Some("example.com/mod".to_string())
            );
        }

        #[test]
        fn parses_quoted_module_directive() {
            assert_eq!(
                parse_module_path("module \"example.com/q\"\n"),
                Some("example.com/q".to_string())
            );
        }

        #[test]
        fn ignores_comments_and_other_directives() {
            let content = "// the manifest\ngo 1.22\nmodule example.com/mod // trailing\n";
            assert_eq!(
                parse_module_path(content),
                Some("example.com/mod".to_string())
            );
        }

        #[test]
        fn missing_directive_is_none() {
            assert_eq!(parse_module_path("go 1.22\n"), None);
        }
    }

    mod loading {
        use super::*;

        #[test]
        fn loads_root_and_sub_packages() {
            let tmp = module(&[
                ("main.go", "package main\n\nfunc main() {}\n"),
                ("kv/store.go", "package kv\n\ntype Store interface{ Get() }\n"),
            ]);
            let universe = load(tmp.path().to_str().unwrap()).unwrap();
            assert_eq!(universe.packages.len(), 2);
            let paths: Vec<&str> = universe
                .packages
                .iter()
                .map(|p| p.import_path.as_str())
                .collect();
            assert!(paths.contains(&"example.com/mod"));
            assert!(paths.contains(&"example.com/mod/kv"));
            let kv = universe.by_path("example.com/mod/kv").unwrap();
            assert_eq!(kv.name, "kv");
            assert!(kv.types.contains_key("Store"));
            assert_eq!(kv.module.as_ref().unwrap().path, "example.com/mod");
        }

        #[test]
        fn recursive_suffix_loads_the_same_tree() {
            let tmp = module(&[("a/a.go", "package a\n\nfunc A() {}\n")]);
            let target = format!("{}/...", tmp.path().display());
            let universe = load(&target).unwrap();
            assert_eq!(universe.packages.len(), 1);
        }

        #[test]
        fn test_files_are_included() {
            let tmp = module(&[
                ("kv/store.go", "package kv\n\nfunc Get() {}\n"),
                ("kv/store_test.go", "package kv\n\nfunc helperForTests() {}\n"),
            ]);
            let universe = load(tmp.path().to_str().unwrap()).unwrap();
            let kv = universe.by_path("example.com/mod/kv").unwrap();
            assert_eq!(kv.files.len(), 2);
            assert!(kv.scope.contains_key("helperForTests"));
        }

        #[test]
        fn vendor_and_hidden_dirs_are_skipped() {
            let tmp = module(&[
                ("a/a.go", "package a\n"),
                ("vendor/x/x.go", "package x\n"),
                (".hidden/h.go", "package h\n"),
                ("_skip/s.go", "package s\n"),
            ]);
            let universe = load(tmp.path().to_str().unwrap()).unwrap();
            assert_eq!(universe.packages.len(), 1);
            assert_eq!(universe.packages[0].import_path, "example.com/mod/a");
        }

        #[test]
        fn missing_directory_fails() {
            let err = load("/definitely/not/a/real/dir").unwrap_err();
            assert!(matches!(err, LoadError::NotFound { .. }));
        }

        #[test]
        fn missing_manifest_fails() {
            let tmp = TempDir::new().unwrap();
            write(tmp.path(), "a/a.go", "package a\n");
            let err = load(tmp.path().to_str().unwrap()).unwrap_err();
            assert!(matches!(err, LoadError::NoManifest { .. }));
        }

        #[test]
        fn module_without_go_files_fails() {
            let tmp = module(&[]);
            let err = load(tmp.path().to_str().unwrap()).unwrap_err();
            assert!(matches!(err, LoadError::NoPackages { .. }));
        }

        #[test]
        fn embed_patterns_and_files_are_collected() {
            let tmp = module(&[
                (
                    "web/assets.go",
                    "package web\n\nimport \"embed\"\n\n//go:embed index.html\nvar content embed.FS\n",
                ),
                ("web/index.html", "<html></html>\n"),
            ]);
            let universe = load(tmp.path().to_str().unwrap()).unwrap();
            let web = universe.by_path("example.com/mod/web").unwrap();
            assert_eq!(web.embed_patterns, vec!["index.html"]);
            assert_eq!(web.embed_files.len(), 1);
            assert!(web.embed_files[0].ends_with("index.html"));
        }
    }
}
