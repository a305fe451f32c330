//! End-to-end tests for the `glintc` driver: each one writes a source file,
//! invokes the built binary, and asserts on its exit code and artifacts.

use std::path::PathBuf;
use std::process::Command;

/// Find the glintc binary in the target directory.
fn find_glintc() -> PathBuf {
    let mut path = std::env::current_exe()
        .expect("cannot find current exe")
        .parent()
        .expect("cannot find parent dir")
        .to_path_buf();

    if path.file_name().is_some_and(|n| n == "deps") {
        path = path.parent().unwrap().to_path_buf();
    }

    let glintc = path.join("glintc");
    assert!(glintc.exists(), "glintc binary not found at {}. Run `cargo build -p glintc` first.", glintc.display());
    glintc
}

fn write_source(dir: &std::path::Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn compiles_a_source_file_to_an_ll_file_next_to_it() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "main.sol", "function main() returns (int) { return 0; }");

    let output = Command::new(find_glintc()).arg(&source).output().expect("failed to invoke glintc");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let ll_path = source.with_extension("ll");
    let ir = std::fs::read_to_string(&ll_path).unwrap_or_else(|e| panic!("missing {}: {e}", ll_path.display()));
    assert!(ir.contains("define i32 @main()"), "{ir}");
}

#[test]
fn a_fatal_type_error_exits_nonzero_and_renders_a_diagnostic_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "main.sol", "function f() { int x; bool x; }");

    let output = Command::new(find_glintc()).arg(&source).output().expect("failed to invoke glintc");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR"), "{stderr}");
    assert!(stderr.contains("main.sol"), "{stderr}");
}

#[test]
fn a_recoverable_type_error_still_emits_ir_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "main.sol", "function f() { bool b; b = b + 1; }");

    let output = Command::new(find_glintc()).arg(&source).output().expect("failed to invoke glintc");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("WARNING"), "{stderr}");

    let ir = std::fs::read_to_string(source.with_extension("ll")).unwrap();
    assert_eq!(ir.matches("store").count(), 1, "{ir}");
}

#[test]
fn emit_flag_redirects_the_output_path() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "main.sol", "function main() returns (int) { return 0; }");
    let out_path = dir.path().join("custom_name.ll");

    let output = Command::new(find_glintc())
        .arg(&source)
        .arg("--emit")
        .arg(&out_path)
        .output()
        .expect("failed to invoke glintc");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(out_path.exists());
    assert!(!source.with_extension("ll").exists());
}

#[test]
fn dump_tokens_prints_the_token_stream_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "main.sol", "function main() returns (int) { return 0; }");

    let output = Command::new(find_glintc()).arg(&source).arg("--dump-tokens").output().expect("failed to invoke glintc");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Function"), "{stdout}");
    assert!(stdout.contains("Eos"), "{stdout}");
}

#[test]
fn dump_ast_prints_the_parsed_tree_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "main.sol", "function main() returns (int) { return 0; }");

    let output = Command::new(find_glintc()).arg(&source).arg("--dump-ast").output().expect("failed to invoke glintc");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FunctionDef"), "{stdout}");
    assert!(stdout.contains("ReturnStatement"), "{stdout}");
}

#[test]
fn compiling_the_same_source_twice_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        "main.sol",
        "function add(int a, int b) returns (int) { return a + b; } function main() returns (int) { return add(1, 2); }",
    );

    let glintc = find_glintc();
    let first = dir.path().join("first.ll");
    let second = dir.path().join("second.ll");

    let status1 = Command::new(&glintc).arg(&source).arg("--emit").arg(&first).status().unwrap();
    assert!(status1.success());
    let status2 = Command::new(&glintc).arg(&source).arg("--emit").arg(&second).status().unwrap();
    assert!(status2.success());

    let ir1 = std::fs::read_to_string(&first).unwrap();
    let ir2 = std::fs::read_to_string(&second).unwrap();
    assert_eq!(ir1, ir2);
}

#[test]
fn include_directive_pulls_in_the_included_file() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "helper.sol", "function helper() returns (int) { return 7; }");
    let source = write_source(
        dir.path(),
        "main.sol",
        "#include \"helper.sol\"\nfunction main() returns (int) { return helper(); }",
    );

    let output = Command::new(find_glintc()).arg(&source).output().expect("failed to invoke glintc");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let ir = std::fs::read_to_string(source.with_extension("ll")).unwrap();
    assert!(ir.contains("define i32 @helper()"), "{ir}");
    assert!(ir.contains("call i32 @helper()"), "{ir}");
}
