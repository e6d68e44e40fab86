//! Integration tests for tyfx
//!
//! Drives whole programs through the public API:
//! - loading descriptor sources
//! - evaluation against captured console streams
//! - driver outcomes and configuration
//! - the command-line binary

use serde_json::{Value, json};
use std::path::Path;
use std::process::Command;
use tyfx::config::{Config, UnhandledPolicy};
use tyfx::driver::{self, Outcome, RunOptions};
use tyfx::interp::{Capture, Console, EvalContext, Evaluator, InputLines};
use tyfx::oracle::{Oracle, TypeOracle};

struct Finished {
    outcome: Outcome,
    out: Capture,
    diag: Capture,
}

/// Run a program source through the driver with captured streams
async fn run_program(source: &str, config: Config, input: &'static [u8], args: &[&str]) -> Finished {
    let oracle = TypeOracle::from_source("test.tfx", source, &config.entry).expect("program should load");
    let out = Capture::new();
    let diag = Capture::new();
    let ctx = EvalContext::new(oracle, config)
        .with_console(Console::new(out.clone(), diag.clone()))
        .with_input(InputLines::from_reader(input))
        .with_args(args.iter().map(|a| a.to_string()).collect());
    let outcome = driver::execute(ctx).await;
    Finished { outcome, out, diag }
}

async fn run_default(source: &str) -> Finished {
    run_program(source, Config::default(), b"", &[]).await
}

/// Evaluate a program and decode its final result
async fn final_value(source: &str) -> Option<Value> {
    let oracle = TypeOracle::from_source("test.tfx", source, "main").expect("program should load");
    let ctx = EvalContext::new(oracle, Config::default())
        .with_console(Console::new(Capture::new(), Capture::new()))
        .with_input(InputLines::empty());
    let mut evaluator = Evaluator::new(ctx);
    let key = evaluator.run().await.expect("program should not fault")?;
    let oracle = &evaluator.context().oracle;
    oracle.literal_value(&oracle.project(key))
}

fn write_program(dir: &Path, source: &str) -> std::path::PathBuf {
    let path = dir.join("main.tfx");
    std::fs::write(&path, source).expect("write program");
    path
}

// ============================================
// Loading
// ============================================

#[test]
fn test_missing_entry_fails_to_load() {
    let err = TypeOracle::from_source("t.tfx", "type main = Pure<1>;", "main").unwrap_err();
    assert_eq!(err.message(), "No \"main\" entrypoint defined in source file");
}

#[test]
fn test_syntax_error_has_span() {
    let err = TypeOracle::from_source("t.tfx", "export type main = Pure<1;", "main").unwrap_err();
    assert!(err.span().is_some());
}

#[test]
fn test_comments_and_generics_load() {
    let source = "
        // greeting helpers
        type Greet<Name> = Print<Name>; /* generic alias */
        export type main = Greet<\"world\">;
    ";
    let oracle = TypeOracle::from_source("t.tfx", source, "main").unwrap();
    assert_eq!(oracle.stringify(&oracle.entry_node()), "Print<\"world\">");
}

// ============================================
// Sequencing
// ============================================

#[tokio::test]
async fn test_do_yields_last() {
    assert_eq!(final_value("export type main = Do<[Pure<1>, Pure<2>, Pure<3>]>;").await, Some(json!(3)));
}

#[tokio::test]
async fn test_seq_yields_composite() {
    assert_eq!(final_value("export type main = Seq<[Pure<1>, Pure<2>]>;").await, Some(json!([1, 2])));
}

#[tokio::test]
async fn test_print_lines_in_order() {
    let finished = run_default("export type main = Seq<[Print<\"a\">, Print<\"b\">]>;").await;
    assert_eq!(finished.outcome.exit_code(), 0);
    assert_eq!(finished.diag.lines(), vec![r#""a""#, r#""b""#]);
}

// ============================================
// Bind and continuations
// ============================================

#[tokio::test]
async fn test_bind_matches_direct_specialization() {
    let bound = "type Double = { return: Pure<[this[\"input\"], this[\"input\"]]> };
                 export type main = Bind<Pure<5>, Double>;";
    let direct = "type Double = { return: Pure<[this[\"input\"], this[\"input\"]]> };
                  export type main = (Double & { input: 5 })[\"return\"];";
    assert_eq!(final_value(bound).await, Some(json!([5, 5])));
    assert_eq!(final_value(bound).await, final_value(direct).await);
}

#[tokio::test]
async fn test_generic_continuation_builder() {
    let source = "type Tag<L> = { return: Pure<[L, this[\"input\"]]> };
                  export type main = Bind<Pure<1>, Tag<\"one\">>;";
    assert_eq!(final_value(source).await, Some(json!(["one", 1])));
}

#[tokio::test]
async fn test_echo_program() {
    let source = "type Echo = { return: Do<[PutString<this[\"input\"]>, PutString<\"\\n\">]> };
                  export type main = Bind<ReadLine, Echo>;";
    let finished = run_program(source, Config::default(), b"hello there\n", &[]).await;
    assert_eq!(finished.outcome.exit_code(), 0);
    assert_eq!(finished.out.contents(), "hello there\n");
}

#[tokio::test]
async fn test_counter_with_refs() {
    let source = "
        type Inc = { return: Bind<GetRef<this[\"input\"]>, Store<this[\"input\"]>> };
        type Store<K> = { return: SetRef<K, [this[\"input\"], \"again\"]> };
        type Show = { return: Print<this[\"input\"]> };
        type Run = { return: Do<[Bind<Pure<this[\"input\"]>, Inc>, Bind<GetRef<this[\"input\"]>, Show>]> };
        export type main = Bind<CreateRef<\"start\">, Run>;
    ";
    let finished = run_default(source).await;
    assert_eq!(finished.outcome.exit_code(), 0);
    assert_eq!(finished.diag.lines(), vec![r#"["start", "again"]"#]);
}

// ============================================
// Faults and exit
// ============================================

#[tokio::test]
async fn test_try_routes_message_to_catch() {
    let source = "type Catch = { return: Pure<this[\"input\"]> };
                  export type main = Try<Throw<\"boom\">, Catch>;";
    assert_eq!(final_value(source).await, Some(json!("boom")));
}

#[tokio::test]
async fn test_try_without_fault_keeps_body_result() {
    let source = "type Catch = { return: Pure<\"caught\"> };
                  export type main = Try<Pure<1>, Catch>;";
    assert_eq!(final_value(source).await, Some(json!(1)));
}

#[tokio::test]
async fn test_uncaught_fault_exits_one() {
    let finished = run_default("export type main = Do<[Throw<\"bad\">, Print<\"never\">]>;").await;
    assert_eq!(finished.outcome.exit_code(), 1);
    assert_eq!(finished.diag.lines(), vec!["Uncaught fault: bad"]);
}

#[tokio::test]
async fn test_exit_code_and_no_later_effects() {
    let finished = run_default("export type main = Do<[Exit<7>, Print<\"after\">]>;").await;
    assert_eq!(finished.outcome.exit_code(), 7);
    assert!(finished.diag.contents().is_empty());
}

#[tokio::test]
async fn test_exit_inside_try_is_not_caught() {
    let source = "type Catch = { return: Print<\"caught\"> };
                  export type main = Try<Exit<2>, Catch>;";
    let finished = run_default(source).await;
    assert_eq!(finished.outcome.exit_code(), 2);
    assert!(finished.diag.contents().is_empty());
}

#[tokio::test]
async fn test_runaway_recursion_faults() {
    let config = Config {
        max_depth: 64,
        ..Config::default()
    };
    let finished = run_program("type Loop = Do<[Loop]>; export type main = Loop;", config, b"", &[]).await;
    assert_eq!(finished.outcome.exit_code(), 1);
    assert!(finished.diag.contents().contains("maximum depth"));
}

// ============================================
// Custom and unhandled effects
// ============================================

#[tokio::test]
async fn test_custom_effect() {
    let source = "export type main = Do<[DefineEffect<\"Foo\", \"(args) => args[0] + 1\">, Foo<41>]>;";
    assert_eq!(final_value(source).await, Some(json!(42)));
}

#[tokio::test]
async fn test_custom_effect_result_feeds_bind() {
    let source = "type Shout = { return: PutString<this[\"input\"]> };
                  export type main = Do<[
                      DefineEffect<\"Upper\", \"(args) => args[0].toUpperCase() + '!'\">,
                      Bind<Upper<\"hey\">, Shout>,
                  ]>;";
    let finished = run_default(source).await;
    assert_eq!(finished.out.contents(), "HEY!");
}

#[tokio::test]
async fn test_unhandled_effect_lenient() {
    let finished = run_default("export type main = Do<[Bar<1>, Print<\"next\">]>;").await;
    assert_eq!(finished.outcome.exit_code(), 0);
    assert_eq!(finished.diag.lines(), vec!["Bar effect is not handled", "Bar<1>", r#""next""#]);
}

#[tokio::test]
async fn test_unhandled_effect_strict() {
    let config = Config {
        unhandled: UnhandledPolicy::Strict,
        ..Config::default()
    };
    let finished = run_program("export type main = Bar<1>;", config, b"", &[]).await;
    assert_eq!(finished.outcome.exit_code(), 1);
    assert_eq!(finished.diag.lines(), vec!["Uncaught fault: Bar effect is not handled"]);
}

// ============================================
// Files, environment and arguments
// ============================================

#[tokio::test]
async fn test_write_then_read_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = serde_json::to_string(&dir.path().join("x.txt").display().to_string()).unwrap();
    let source = format!("export type main = Do<[WriteFile<{path}, \"hi\">, ReadFile<{path}>]>;");
    assert_eq!(final_value(&source).await, Some(json!("hi")));
}

#[tokio::test]
async fn test_unset_env_is_empty() {
    let source = "export type main = GetEnv<\"TYFX_INTEGRATION_UNSET_VARIABLE\">;";
    assert_eq!(final_value(source).await, Some(json!("")));
}

#[tokio::test]
async fn test_program_arguments() {
    let source = "type Show = { return: Print<this[\"input\"]> };
                  export type main = Bind<GetArgs, Show>;";
    let finished = run_program(source, Config::default(), b"", &["one", "two"]).await;
    assert_eq!(finished.diag.lines(), vec![r#"["one", "two"]"#]);
}

#[tokio::test]
async fn test_js_expr() {
    let source = "export type main = JsExpr<\"JSON.stringify({ n: 1 + 2 })\">;";
    assert_eq!(final_value(source).await, Some(json!("{\"n\":3}")));
}

#[tokio::test]
async fn test_deeply_nested_js_expr_faults() {
    let depth = 20_000;
    let source = format!(
        "export type main = JsExpr<\"{}1{}\">;",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    let finished = run_default(&source).await;
    assert_eq!(finished.outcome.exit_code(), 1);
    assert!(finished.diag.contents().contains("nesting exceeds"));
}

// ============================================
// Driver
// ============================================

#[tokio::test]
async fn test_run_file_uses_config_entry() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tyfx.toml"), "entry = \"start\"\n").unwrap();
    let program = write_program(dir.path(), "export type start = Exit<5>;");
    let outcome = driver::run_file(&program, RunOptions::default()).await.unwrap();
    assert_eq!(outcome.exit_code(), 5);
}

#[tokio::test]
async fn test_run_file_missing_entry() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_program(dir.path(), "export type other = Pure<1>;");
    let err = driver::run_file(&program, RunOptions::default()).await.unwrap_err();
    assert!(err.message().contains("entrypoint"));
}

#[tokio::test]
async fn test_run_file_bad_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tyfx.toml"), "unhandled = \"sometimes\"\n").unwrap();
    let program = write_program(dir.path(), "export type main = Pure<1>;");
    assert!(driver::run_file(&program, RunOptions::default()).await.is_err());
}

// ============================================
// Binary
// ============================================

fn tyfx() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tyfx"))
}

#[test]
fn test_cli_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_program(dir.path(), "export type main = Do<[PutString<\"out\">, Exit<3>]>;");
    let output = tyfx().arg("run").arg(&program).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "out");
}

#[test]
fn test_cli_passes_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_program(
        dir.path(),
        "type Show = { return: PutString<this[\"input\"][1]> }; export type main = Bind<GetArgs, Show>;",
    );
    let output = tyfx().arg("run").arg(&program).args(["a", "--b"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "--b");
}

#[test]
fn test_cli_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_program(dir.path(), "export type main = ;");
    let output = tyfx().arg("run").arg(&program).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_cli_usage_error() {
    let output = tyfx().arg("run").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_check_prints_entry() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_program(dir.path(), "type Msg = \"hi\"; export type main = Print<Msg>;");
    let output = tyfx().arg("check").arg(&program).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Print<\"hi\">");
}

#[test]
fn test_cli_tokens_show_line_and_column() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_program(dir.path(), "export type\n  main");
    let output = tyfx().arg("tokens").arg(&program).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["Export @ 1:1", "Type @ 1:8", "Ident(\"main\") @ 2:3"]);
}

#[test]
fn test_cli_bind_loop_stops_at_default_depth() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_program(
        dir.path(),
        "type Loop = { return: Bind<Pure<1>, Loop> }; export type main = Bind<Pure<1>, Loop>;",
    );
    let output = tyfx().arg("run").arg(&program).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Uncaught fault"));
    assert!(stderr.contains("maximum depth"));
}

#[test]
fn test_cli_nested_recursion_stops_at_default_depth() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_program(
        dir.path(),
        "type R = { return: Do<[Pure<1>, Bind<Pure<1>, R>]> }; export type main = Bind<Pure<1>, R>;",
    );
    let output = tyfx().arg("run").arg(&program).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("maximum depth"));
}

#[test]
fn test_cli_deeply_nested_descriptor_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let depth = 20_000;
    let source = format!("export type main = Pure<{}1{}>;", "[".repeat(depth), "]".repeat(depth));
    let program = write_program(dir.path(), &source);
    let output = tyfx().arg("run").arg(&program).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}
