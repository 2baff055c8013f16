use crate::common::{D3D9_TRACE, GL_TRACE, TestEnv, stderr, stdout};
use serde_json::Value;

fn document(env: &TestEnv, name: &str) -> Vec<Value> {
    let json: Value = serde_json::from_str(&env.read(name)).unwrap();
    json["tracestats"].as_array().unwrap().clone()
}

fn stat(entry: &Value, stat_type: &str, stat_name: &str) -> Option<u64> {
    entry["stats"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["stat_type"] == stat_type && row["stat_name"] == stat_name)
        .and_then(|row| row["stat_count"].as_u64())
}

#[test]
fn test_parse_single_trace() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);

    let output = env.parse(&["hl2.trace", "-o", "out.json", "-j", "2", "--chunk-calls", "3"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Parsed hl2 (D3D9): 9 calls"), "{out}");
    assert!(out.contains("Wrote 1 trace to out.json"), "{out}");

    let entries = document(&env, "out.json");
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry["binary_name"], "hl2");
    assert_eq!(entry["api"], "D3D9");
    assert_eq!(stat(entry, "api_calls", "IDirect3DDevice9::Clear"), Some(2));
    assert_eq!(stat(entry, "api_calls", "IDirect3DDevice9::SetRenderState"), Some(2));
    assert_eq!(stat(entry, "render_states", "D3DRS_ZENABLE"), Some(1));
    assert_eq!(stat(entry, "query_types", "D3DQUERYTYPE_EVENT"), Some(1));
}

#[test]
fn test_worker_count_does_not_change_document() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);

    let serial = env.parse(&["hl2.trace", "-o", "serial.json", "-j", "1"]);
    assert!(serial.status.success(), "{}", stderr(&serial));
    let parallel = env.parse(&["hl2.trace", "-o", "parallel.json", "-j", "3", "--chunk-calls", "2"]);
    assert!(parallel.status.success(), "{}", stderr(&parallel));

    assert_eq!(env.read("serial.json"), env.read("parallel.json"));
}

#[test]
fn test_default_output_name() {
    let env = TestEnv::new();
    env.write("quake.x86_64.trace", GL_TRACE);

    let output = env.parse(&["quake.x86_64.trace"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let entries = document(&env, "tracestats.json");
    assert_eq!(entries[0]["binary_name"], "quake");
    assert_eq!(entries[0]["api"], "OpenGL");
    assert_eq!(stat(&entries[0], "api_calls", "glDrawArrays"), Some(2));
    assert_eq!(stat(&entries[0], "api_calls", "glClear"), Some(1));
}

#[test]
fn test_multiple_traces_share_one_document() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);
    env.write("quake.trace", GL_TRACE);

    let output = env.parse(&["hl2.trace", "quake.trace", "-o", "out.json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Wrote 2 traces to out.json"));

    let entries = document(&env, "out.json");
    let names: Vec<_> = entries.iter().map(|e| e["binary_name"].clone()).collect();
    assert_eq!(names, ["hl2", "quake"]);
}

#[test]
fn test_name_and_link_are_recorded() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);

    let output = env.parse(&[
        "hl2.trace",
        "-o",
        "out.json",
        "--name",
        "Half-Life 2",
        "--link",
        "https://example.com/hl2",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let entries = document(&env, "out.json");
    assert_eq!(entries[0]["name"], "Half-Life 2");
    assert_eq!(entries[0]["link"], "https://example.com/hl2");
}

#[test]
fn test_missing_trace_fails_but_others_are_written() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);

    let output = env.parse(&["missing.trace", "hl2.trace", "-o", "out.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Trace file not found: missing.trace"),
        "{}",
        stderr(&output)
    );
    assert_eq!(document(&env, "out.json").len(), 1);
}

#[test]
fn test_failed_dump_discards_the_trace() {
    let env = TestEnv::new();
    env.write("broken.trace", &format!("#fail\n{D3D9_TRACE}"));
    env.write("quake.trace", GL_TRACE);

    // Skip the API probe so the failure happens inside a window
    let output = env.parse(&[
        "broken.trace",
        "quake.trace",
        "--api",
        "D3D9",
        "-j",
        "1",
        "-o",
        "out.json",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(
        err.contains("Processing broken.trace failed in calls 0-499999"),
        "{err}"
    );
    assert!(err.contains("exit status: 3"), "{err}");

    let entries = document(&env, "out.json");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["binary_name"], "quake");
}

#[test]
fn test_skipped_api_counts_as_success() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);

    let output = env.parse(&["hl2.trace", "--skip-api", "d3d9", "-o", "out.json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Skipped hl2.trace: D3D9 traces are excluded"), "{out}");
    assert!(out.contains("No statistics to write"), "{out}");
    assert!(!env.root().join("out.json").exists());
}

#[test]
fn test_undetected_api() {
    let env = TestEnv::new();
    env.write("tool.trace", "0 glClear(mask = GL_COLOR_BUFFER_BIT)\n");

    let output = env.parse(&["tool.trace", "-o", "out.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Could not determine the API of tool.trace"),
        "{}",
        stderr(&output)
    );

    let output = env.parse(&["tool.trace", "-o", "out.json", "--api", "OpenGL"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(document(&env, "out.json")[0]["api"], "OpenGL");
}

#[test]
fn test_old_apitrace_is_rejected() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);

    let mut cmd = env.command();
    cmd.arg("parse")
        .arg("-a")
        .arg(env.apitrace())
        .arg("hl2.trace")
        .env("MOCK_APITRACE_VERSION", "11.1");
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("apitrace 12.0 or newer is required"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn test_missing_apitrace() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);

    let mut cmd = env.command();
    cmd.args(["parse", "-a", "no-such-apitrace", "hl2.trace"]);
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Unable to find no-such-apitrace"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn test_shader_dump() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);

    let output = env.parse(&["hl2.trace", "-o", "out.json", "--shader-dump", "shaders"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Extracted 1 blob to shaders"));
    assert!(env.root().join("shaders/blob_1.bin").is_file());
}

#[test]
fn test_verbose_logs_dump_commands() {
    let env = TestEnv::new();
    env.write("hl2.trace", D3D9_TRACE);

    let output = env.parse(&["-v", "hl2.trace", "-o", "out.json", "-j", "1"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("dump --calls=0-9999 hl2.trace"), "{err}");
    assert!(err.contains("dump --calls=0-499999 hl2.trace"), "{err}");
    assert!(err.contains("[ts-trace]"), "{err}");
}
