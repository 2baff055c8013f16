use crate::common::{TestEnv, stderr, stdout};
use crate::integration_tests::import::document;
use serde_json::Value;

/// Two D3D9 traces and one OpenGL trace, all calling glClear.
fn corpus() -> TestEnv {
    let env = TestEnv::new();
    env.write(
        "corpus.json",
        &document(&[
            ("alpha", "D3D9", &[("api_calls", "glClear", 4), ("api_calls", "glDrawArrays", 6)]),
            ("beta", "D3D9", &[("api_calls", "glClear", 6)]),
            (
                "quake",
                "OpenGL",
                &[("api_calls", "glClear", 10), ("render_states", "GL_DEPTH_TEST", 2)],
            ),
        ]),
    );
    let output = env.store_cmd("import", &["corpus.json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    env
}

#[test]
fn test_search_per_api_percentages() {
    let env = corpus();
    let output = env.store_cmd("search", &["glclear"]);
    assert!(output.status.success(), "{}", stderr(&output));
    insta::assert_snapshot!(stdout(&output), @r"
    Application  API     Type       Name     Count  Trace %  API %
    quake        OpenGL  api_calls  glClear     10     100%   100%
    beta         D3D9    api_calls  glClear      6     100%  37.5%
    alpha        D3D9    api_calls  glClear      4      40%    25%
    ");
}

#[test]
fn test_search_corpus_scope() {
    let env = corpus();
    let output = env.store_cmd("search", &["glClear", "--scope", "corpus"]);
    assert!(output.status.success(), "{}", stderr(&output));
    insta::assert_snapshot!(stdout(&output), @r"
    Application  API     Type       Name     Count  Trace %  Corpus %
    quake        OpenGL  api_calls  glClear     10     100%    38.47%
    beta         D3D9    api_calls  glClear      6     100%    23.08%
    alpha        D3D9    api_calls  glClear      4      40%    15.39%
    ");
}

#[test]
fn test_search_scope_from_config() {
    let env = corpus();
    env.write("config/config.toml", "percentage-scope = \"corpus\"\n");
    let output = env.store_cmd("search", &["glClear", "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let hits: Vec<Value> = serde_json::from_str(&stdout(&output)).unwrap();
    let quake = &hits[0];
    assert_eq!(quake["application"], "quake");
    let corpus = quake["corpus_percentage"].as_f64().unwrap();
    assert!((corpus - 1000.0 / 26.0).abs() < 1e-9, "{corpus}");
}

#[test]
fn test_search_filters() {
    let env = corpus();
    let output = env.store_cmd("search", &["gl", "--api", "d3d9", "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let hits: Vec<Value> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|hit| hit["api"] == "D3D9"));

    let output = env.store_cmd("search", &["GL_", "--type", "render_states", "--format", "json"]);
    let hits: Vec<Value> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["stat_name"], "GL_DEPTH_TEST");
    // Render states are rated within their own category
    assert_eq!(hits[0]["trace_percentage"], 100.0);
}

#[test]
fn test_search_exact_match() {
    let env = corpus();
    let output = env.store_cmd("search", &["glDraw", "--format", "json"]);
    let hits: Vec<Value> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(hits.len(), 1);

    // "glDraw !" only matches a stat named exactly glDraw, then falls back
    // to application names, which don't match either
    let output = env.store_cmd("search", &["glDraw !"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("No results for glDraw"), "{}", stdout(&output));
}

#[test]
fn test_search_falls_back_to_application() {
    let env = corpus();
    let output = env.store_cmd("search", &["quak"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("showing applications matching it"), "{out}");
    assert!(out.contains("GL_DEPTH_TEST"), "{out}");
    assert!(!out.contains("alpha"), "{out}");
}

#[test]
fn test_search_limit() {
    let env = corpus();
    let output = env.store_cmd("search", &["glClear", "--limit", "2"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("quake"));
    assert!(!out.contains("alpha"));
    assert!(out.contains("Showing the first 2 results"), "{out}");
}

#[test]
fn test_search_rejects_short_query() {
    let env = corpus();
    let output = env.store_cmd("search", &["g"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Search text must be 2 to 68 characters"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn test_list_sorting() {
    let env = corpus();
    let output = env.store_cmd("list", &["--sort", "api", "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let traces: Vec<Value> = serde_json::from_str(&stdout(&output)).unwrap();
    let names: Vec<_> = traces.iter().map(|t| t["application"].clone()).collect();
    assert_eq!(names, ["alpha", "beta", "quake"]);
}
