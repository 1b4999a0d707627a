//! Serialization contract tests.
//!
//! The JSON report is the consumer contract: these tests pin field names,
//! omission rules, and the cross-field invariants (satisfier and call
//! positions land in their owning package's file list, no duplicate
//! satisfier keys, signature/parameter/return agreement).

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tempfile::TempDir;

use seam::analyze::analyze;
use seam::report::ProjectReport;

// ============================================================================
// Test Infrastructure
// ============================================================================

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A module exercising every report feature: docs, methods, embeds,
/// satisfaction in both forms, all call flavors, and embed directives.
fn fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "go.mod", "module example.com/fix\n\ngo 1.22\n");
    write(
        tmp.path(),
        "kv/store.go",
        r#"package kv

// Store persists blobs.
type Store interface {
	// Get fetches one key.
	Get(key string) ([]byte, error)
	Put(key string, value []byte) error
}

type MemStore struct{}

func (m MemStore) Get(key string) ([]byte, error) { return nil, nil }

func (m *MemStore) Put(key string, value []byte) error { return nil }
"#,
    );
    write(
        tmp.path(),
        "app/app.go",
        r#"package app

import "example.com/fix/kv"

func helper() {}

func run(store kv.Store) {
	helper()
	store.Get("k")
	go helper()
	defer helper()
}
"#,
    );
    write(
        tmp.path(),
        "web/assets.go",
        "package web\n\nimport \"embed\"\n\n//go:embed index.html\nvar content embed.FS\n",
    );
    write(tmp.path(), "web/index.html", "<html></html>\n");
    tmp
}

fn report_and_json() -> (ProjectReport, Value) {
    let tmp = fixture();
    let report = analyze(tmp.path().to_str().unwrap()).expect("analysis failed");
    let json = serde_json::to_value(&report).unwrap();
    (report, json)
}

fn packages(json: &Value) -> &Vec<Value> {
    json["Packages"].as_array().unwrap()
}

fn find_package<'v>(json: &'v Value, path: &str) -> &'v Value {
    packages(json)
        .iter()
        .find(|p| p["Path"] == path)
        .unwrap_or_else(|| panic!("package {} not serialized", path))
}

// ============================================================================
// Field Presence
// ============================================================================

#[test]
fn top_level_keys_are_stable() {
    let (report, json) = report_and_json();
    let obj = json.as_object().unwrap();
    let keys: HashSet<&str> = obj.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        HashSet::from(["ModulePath", "ModuleDir", "Packages"])
    );
    assert_eq!(json["ModulePath"], "example.com/fix");
    // Struct serialization fixes key order by declaration.
    let text = serde_json::to_string(&report).unwrap();
    let module_path = text.find("\"ModulePath\"").unwrap();
    let module_dir = text.find("\"ModuleDir\"").unwrap();
    let packages = text.find("\"Packages\"").unwrap();
    assert!(module_path < module_dir && module_dir < packages);
}

#[test]
fn column_never_appears_anywhere() {
    let (_, json) = report_and_json();
    let text = serde_json::to_string(&json).unwrap();
    assert!(!text.contains("\"Column\""));
}

#[test]
fn locations_carry_exactly_filename_and_line() {
    let (_, json) = report_and_json();
    let kv = find_package(&json, "example.com/fix/kv");
    let loc = &kv["Interfaces"][0]["Location"];
    let obj = loc.as_object().unwrap();
    assert_eq!(obj.len(), 2);
    assert!(obj.contains_key("Filename"));
    assert!(obj.contains_key("Line"));
}

#[test]
fn empty_calls_and_embeds_are_omitted_but_nonempty_are_present() {
    let (_, json) = report_and_json();
    // kv defines types only; no calls, no embeds.
    let kv = find_package(&json, "example.com/fix/kv");
    assert!(!kv.as_object().unwrap().contains_key("Calls"));
    assert!(!kv.as_object().unwrap().contains_key("EmbedFiles"));
    assert!(!kv.as_object().unwrap().contains_key("EmbedPatterns"));
    // app makes calls.
    let app = find_package(&json, "example.com/fix/app");
    assert!(app.as_object().unwrap().contains_key("Calls"));
    // web embeds a file.
    let web = find_package(&json, "example.com/fix/web");
    assert_eq!(web["EmbedPatterns"][0], "index.html");
    assert_eq!(web["EmbedFiles"][0], "web/index.html");
    // Always-present collections stay present even when empty.
    assert!(web.as_object().unwrap().contains_key("Interfaces"));
    assert!(kv.as_object().unwrap().contains_key("Imports"));
}

#[test]
fn call_type_serializes_to_the_closed_lowercase_set() {
    let (_, json) = report_and_json();
    let app = find_package(&json, "example.com/fix/app");
    let mut seen = HashSet::new();
    for call in app["Calls"].as_array().unwrap() {
        seen.insert(call["CallType"].as_str().unwrap().to_string());
    }
    assert!(seen.contains("static"));
    assert!(seen.contains("interface"));
    assert!(seen.contains("goroutine"));
    assert!(seen.contains("defer"));
    let allowed: HashSet<&str> =
        ["static", "dynamic", "interface", "goroutine", "defer"].into();
    assert!(seen.iter().all(|s| allowed.contains(s.as_str())));
}

// ============================================================================
// Cross-Field Invariants
// ============================================================================

#[test]
fn satisfier_positions_land_in_the_owning_package_files() {
    let (report, _) = report_and_json();
    for pkg in &report.packages {
        for iface in &pkg.interfaces {
            for imp in &iface.implementations {
                let owner = report
                    .packages
                    .iter()
                    .find(|p| p.path == imp.package_path)
                    .expect("satisfier owner package missing");
                assert!(
                    owner.files.contains(&imp.location.filename),
                    "satisfier {} location {} not in {:?}",
                    imp.type_name,
                    imp.location.filename,
                    owner.files
                );
            }
        }
    }
}

#[test]
fn call_positions_land_in_the_owning_package_files() {
    let (report, _) = report_and_json();
    for pkg in &report.packages {
        for call in &pkg.calls {
            assert!(
                pkg.files.contains(&call.location.filename),
                "call at {} not in {:?}",
                call.location.filename,
                pkg.files
            );
        }
    }
}

#[test]
fn no_two_satisfiers_share_their_identity_key() {
    let (report, _) = report_and_json();
    for pkg in &report.packages {
        for iface in &pkg.interfaces {
            let mut seen = HashSet::new();
            for imp in &iface.implementations {
                assert!(
                    seen.insert((imp.type_name.clone(), imp.package_path.clone(), imp.is_pointer)),
                    "duplicate satisfier {:?} on {}",
                    imp.type_name,
                    iface.name
                );
            }
        }
    }
}

#[test]
fn signatures_agree_with_parameters_and_returns() {
    let (report, _) = report_and_json();
    let kv = report
        .packages
        .iter()
        .find(|p| p.path == "example.com/fix/kv")
        .unwrap();
    let store = &kv.interfaces[0];
    assert_eq!(store.name, "Store");
    assert_eq!(store.doc_comment, "Store persists blobs.");
    for method in &store.methods {
        assert!(
            method.signature.starts_with(&format!("{}(", method.name)),
            "signature {:?} does not open with the method name",
            method.signature
        );
    }
    let get = &store.methods[0];
    assert_eq!(get.parameters.len(), 1);
    assert_eq!(get.return_types.len(), 2);
    let put = &store.methods[1];
    assert_eq!(put.parameters.len(), 2);
    assert_eq!(put.return_types.len(), 1);
}

#[test]
fn value_and_pointer_satisfaction_are_both_present_when_both_hold() {
    let (report, _) = report_and_json();
    let kv = report
        .packages
        .iter()
        .find(|p| p.path == "example.com/fix/kv")
        .unwrap();
    let store = &kv.interfaces[0];
    // MemStore has a pointer-receiver Put, so only *MemStore satisfies.
    let forms: Vec<bool> = store
        .implementations
        .iter()
        .filter(|i| i.type_name == "MemStore")
        .map(|i| i.is_pointer)
        .collect();
    assert_eq!(forms, vec![true]);
}

#[test]
fn interfaces_within_a_package_are_sorted_by_name() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "go.mod", "module example.com/sorted\n");
    write(
        tmp.path(),
        "p/p.go",
        "package p\n\ntype Zeta interface{ Z() }\ntype Alpha interface{ A() }\ntype Mid interface{ M() }\n",
    );
    let report = analyze(tmp.path().to_str().unwrap()).unwrap();
    let names: Vec<&str> = report.packages[0]
        .interfaces
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
}
