//! Report data model for seam analysis output.
//!
//! These types are the **consumer contract**: the JSON written to stdout is
//! exactly these structs, serialized with the PascalCase key names declared
//! here. Struct declaration order fixes key order; collection ordering is
//! fixed by [`ProjectReport::normalize`].
//!
//! ## Field presence rules
//!
//! - `Location` carries `Filename` and `Line` only; there is no column.
//! - `EmbedFiles`, `EmbedPatterns`, and `Calls` are omitted when empty.
//! - Every other collection field is always present, even when empty.

use serde::{Deserialize, Serialize};

// ============================================================================
// Location
// ============================================================================

/// A source location: filename plus 1-based line.
///
/// Filenames are module-relative (forward-slash form) in the final report;
/// absolute paths survive only for files outside the module root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "Line")]
    pub line: u32,
}

impl Location {
    /// Create a new location.
    pub fn new(filename: impl Into<String>, line: u32) -> Self {
        Location {
            filename: filename.into(),
            line,
        }
    }
}

// ============================================================================
// Method Signatures
// ============================================================================

/// A single parameter of an interface method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name; empty for unnamed parameters.
    #[serde(rename = "Name")]
    pub name: String,
    /// Display form of the parameter type.
    #[serde(rename = "Type")]
    pub type_display: String,
    /// True when the parameter type is a direct pointer.
    #[serde(rename = "IsPointer")]
    pub is_pointer: bool,
}

/// A method required by an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    #[serde(rename = "Name")]
    pub name: String,
    /// Conventional display form, e.g. `Read(p []byte) (n int, err error)`.
    #[serde(rename = "Signature")]
    pub signature: String,
    #[serde(rename = "Parameters")]
    pub parameters: Vec<Parameter>,
    /// One entry per returned value (arity, not declaration slots).
    #[serde(rename = "ReturnTypes")]
    pub return_types: Vec<String>,
    #[serde(rename = "DocComment")]
    pub doc_comment: String,
    #[serde(rename = "Location")]
    pub location: Location,
}

// ============================================================================
// Interfaces and Implementations
// ============================================================================

/// A concrete named type that satisfies an interface.
///
/// Value- and pointer-satisfaction are recorded independently: a type whose
/// value method set covers the interface appears once with `IsPointer: false`
/// and once with `IsPointer: true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    #[serde(rename = "TypeName")]
    pub type_name: String,
    #[serde(rename = "PackagePath")]
    pub package_path: String,
    #[serde(rename = "PackageName")]
    pub package_name: String,
    #[serde(rename = "IsPointer")]
    pub is_pointer: bool,
    #[serde(rename = "Location")]
    pub location: Location,
}

impl Implementation {
    /// Identity key for duplicate suppression within one interface.
    pub fn key(&self) -> (String, String, bool) {
        (
            self.type_name.clone(),
            self.package_path.clone(),
            self.is_pointer,
        )
    }
}

/// An interface defined by a package in the analyzed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(rename = "Name")]
    pub name: String,
    /// Short name of the defining package.
    #[serde(rename = "PackageName")]
    pub package_name: String,
    /// Import path of the defining package; `(PackagePath, Name)` is the
    /// primary key.
    #[serde(rename = "PackagePath")]
    pub package_path: String,
    #[serde(rename = "Location")]
    pub location: Location,
    #[serde(rename = "DocComment")]
    pub doc_comment: String,
    /// Methods in source order.
    #[serde(rename = "Methods")]
    pub methods: Vec<Method>,
    /// Embedded interface display strings, first occurrence wins.
    #[serde(rename = "Embeds")]
    pub embeds: Vec<String>,
    #[serde(rename = "Implementations")]
    pub implementations: Vec<Implementation>,
}

// ============================================================================
// Call Sites
// ============================================================================

/// Dispatch flavor of a call site. Closed set; mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallType {
    /// A concrete static callee is known.
    #[serde(rename = "static")]
    Static,
    /// No static callee; the call goes through a function value.
    #[serde(rename = "dynamic")]
    Dynamic,
    /// Dynamic dispatch through an interface method.
    #[serde(rename = "interface")]
    Interface,
    /// A `go` statement spawning a goroutine.
    #[serde(rename = "goroutine")]
    Goroutine,
    /// A `defer` statement.
    #[serde(rename = "defer")]
    Defer,
}

impl std::fmt::Display for CallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallType::Static => "static",
            CallType::Dynamic => "dynamic",
            CallType::Interface => "interface",
            CallType::Goroutine => "goroutine",
            CallType::Defer => "defer",
        };
        f.write_str(s)
    }
}

/// One classified call instruction from a lowered function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Canonical name of the calling function.
    #[serde(rename = "CallerFuncDesc")]
    pub caller_func_desc: String,
    /// Description of the callee; grammar depends on `CallType`.
    #[serde(rename = "CalleeDesc")]
    pub callee_desc: String,
    #[serde(rename = "CallType")]
    pub call_type: CallType,
    #[serde(rename = "Location")]
    pub location: Location,
}

// ============================================================================
// Package and Project Reports
// ============================================================================

/// Everything the analysis found for one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReport {
    /// Short package name, e.g. `demo`.
    #[serde(rename = "Name")]
    pub name: String,
    /// Import path, e.g. `example.com/mod/demo`.
    #[serde(rename = "Path")]
    pub path: String,
    /// Module-relative source files.
    #[serde(rename = "Files")]
    pub files: Vec<String>,
    /// Sorted import paths.
    #[serde(rename = "Imports")]
    pub imports: Vec<String>,
    /// Files pulled in by `//go:embed` directives.
    #[serde(rename = "EmbedFiles", skip_serializing_if = "Vec::is_empty", default)]
    pub embed_files: Vec<String>,
    /// Raw `//go:embed` patterns.
    #[serde(
        rename = "EmbedPatterns",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub embed_patterns: Vec<String>,
    #[serde(rename = "Interfaces")]
    pub interfaces: Vec<Interface>,
    #[serde(rename = "Calls", skip_serializing_if = "Vec::is_empty", default)]
    pub calls: Vec<CallSite>,
}

/// The whole-module analysis report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    /// Module path from the manifest, e.g. `example.com/mod`.
    #[serde(rename = "ModulePath")]
    pub module_path: String,
    /// Absolute module root directory.
    #[serde(rename = "ModuleDir")]
    pub module_dir: String,
    #[serde(rename = "Packages")]
    pub packages: Vec<PackageReport>,
}

impl ProjectReport {
    /// Apply the deterministic ordering contract.
    ///
    /// Packages sort by import path; interfaces by name; implementations by
    /// `(PackagePath, TypeName, IsPointer)`; calls by
    /// `(Filename, Line, CallerFuncDesc)`; imports lexicographically.
    /// Method order and embed order are source-derived and left untouched.
    pub fn normalize(&mut self) {
        self.packages.sort_by(|a, b| a.path.cmp(&b.path));
        for pkg in &mut self.packages {
            pkg.imports.sort();
            pkg.interfaces.sort_by(|a, b| a.name.cmp(&b.name));
            for iface in &mut pkg.interfaces {
                iface.implementations.sort_by(|a, b| {
                    (&a.package_path, &a.type_name, a.is_pointer).cmp(&(
                        &b.package_path,
                        &b.type_name,
                        b.is_pointer,
                    ))
                });
            }
            pkg.calls.sort_by(|a, b| {
                (&a.location.filename, a.location.line, &a.caller_func_desc).cmp(&(
                    &b.location.filename,
                    b.location.line,
                    &b.caller_func_desc,
                ))
            });
        }
    }

    /// Total counts for the stderr summary:
    /// `(packages, interfaces, implementations, calls)`.
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let mut interfaces = 0;
        let mut impls = 0;
        let mut calls = 0;
        for pkg in &self.packages {
            interfaces += pkg.interfaces.len();
            impls += pkg
                .interfaces
                .iter()
                .map(|i| i.implementations.len())
                .sum::<usize>();
            calls += pkg.calls.len();
        }
        (self.packages.len(), interfaces, impls, calls)
    }
}

// ============================================================================
// Tests
// ============================================================================
