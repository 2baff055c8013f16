//! `--help` output checks.

use crate::common::{TestEnv, stdout};

fn help(args: &[&str]) -> String {
    let env = TestEnv::new();
    let output = env.command().args(args).output().unwrap();
    assert!(output.status.success());
    stdout(&output)
}

#[test]
fn test_help_root() {
    let out = help(&["--help"]);
    for subcommand in ["parse", "import", "search", "list", "summary", "remove", "config"] {
        assert!(out.contains(subcommand), "missing {subcommand}: {out}");
    }
    assert!(out.contains("Global Options"));
}

#[test]
fn test_help_search_explains_exact_suffix() {
    let out = help(&["search", "--help"]);
    assert!(out.contains("require an exact match"), "{out}");
}

#[test]
fn test_version() {
    let out = help(&["--version"]);
    assert!(out.starts_with("tracestats "), "{out}");
}
