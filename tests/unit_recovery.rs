// tests/unit_recovery.rs - Error taxonomy and best-effort recovery
use std::fs;

use flowprint_core::{
    analyze, analyze_file, AnalyzeOptions, CfgError, DiagnosticKind, StatementKind,
};
use tempfile::TempDir;

#[test]
fn missing_method_is_unresolved_target() {
    let src = "public class A { public void a() { x(); } }";
    let err = analyze(src, Some("nope"), None).unwrap_err();
    assert!(matches!(err, CfgError::UnresolvedTarget { .. }));
    assert_eq!(err.to_string(), "target method `nope` not found in source");
}

#[test]
fn missing_class_is_unresolved_target() {
    let src = "public class A { public void a() { x(); } }";
    let err = analyze(src, None, Some("Missing")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "target class `Missing` not found in source"
    );
}

#[test]
fn source_without_methods_is_empty() {
    let err = analyze("// nothing here\n", None, None).unwrap_err();
    assert!(matches!(err, CfgError::EmptySource));
}

#[test]
fn unbalanced_braces_yield_a_partial_graph() {
    // The file is cut off mid-method.
    let src = r#"
public class Broken {
    public void run() {
        a();
        if (x) {
            b();
"#;
    let graph = analyze(src, None, None).unwrap();
    assert!(graph.partial);
    assert!(graph
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::UnbalancedBraces));
    // Everything up to the damage is still analyzed.
    assert!(graph.blocks.iter().any(|b| b.code == "a();"));
    // And the partial graph still renders.
    assert!(graph.render().contains("Block 0"));
}

#[test]
fn stray_catch_degrades_to_an_expression_block() {
    let src = r#"
public class Odd {
    public void run() {
        a();
        catch (E e) {
            b();
        }
    }
}
"#;
    let graph = analyze(src, None, None).unwrap();
    assert!(graph
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::UnsupportedConstruct));
    // The fragment is kept, not dropped.
    let catch_block = graph
        .blocks
        .iter()
        .find(|b| b.code.starts_with("catch"))
        .expect("catch fragment kept");
    assert_eq!(catch_block.kind, StatementKind::Expression);
}

#[test]
fn no_statement_is_silently_lost() {
    let src = r#"
public class Odd {
    public void run() {
        a();
        @@strange@@;
        b();
    }
}
"#;
    let graph = analyze(src, None, None).unwrap();
    assert_eq!(graph.blocks.len(), 3);
    assert_eq!(graph.blocks[1].code, "@@strange@@;");
}

#[test]
fn analyze_file_reads_and_delegates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Demo.java");
    fs::write(
        &path,
        "public class Demo { public void go() { step(); } }",
    )
    .unwrap();

    let graph = analyze_file(&path, &AnalyzeOptions::default()).unwrap();
    assert_eq!(graph.signature, "Demo.go()");
    assert_eq!(graph.blocks.len(), 1);
}

#[test]
fn analyze_file_surfaces_io_errors_with_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.java");
    let err = analyze_file(&path, &AnalyzeOptions::default()).unwrap_err();
    let CfgError::Io { path: p, .. } = err else {
        panic!("expected an I/O error");
    };
    assert_eq!(p, path);
}
