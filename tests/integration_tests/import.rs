use crate::common::{TestEnv, stderr, stdout};
use serde_json::{Value, json};

/// A tracestats document with one entry per `(binary_name, api, rows)`.
pub fn document(entries: &[(&str, &str, &[(&str, &str, u64)])]) -> String {
    let entries: Vec<Value> = entries
        .iter()
        .map(|(binary_name, api, rows)| {
            let stats: Vec<Value> = rows
                .iter()
                .map(|(stat_type, stat_name, stat_count)| {
                    json!({"stat_type": stat_type, "stat_name": stat_name, "stat_count": stat_count})
                })
                .collect();
            json!({"binary_name": binary_name, "api": api, "stats": stats})
        })
        .collect();
    serde_json::to_string_pretty(&json!({ "tracestats": entries })).unwrap()
}

fn list_json(env: &TestEnv) -> Vec<Value> {
    let output = env.store_cmd("list", &["--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    serde_json::from_str(&stdout(&output)).unwrap()
}

#[test]
fn test_import_creates_store() {
    let env = TestEnv::new();
    env.write(
        "run.json",
        &document(&[
            ("hl2", "D3D9", &[("api_calls", "IDirect3DDevice9::Clear", 4)]),
            ("quake", "OpenGL", &[("api_calls", "glClear", 1)]),
        ]),
    );

    let output = env.store_cmd("import", &["run.json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(
        stdout(&output).contains("Imported run.json: 2 new, 0 replaced"),
        "{}",
        stdout(&output)
    );
    assert!(env.store_path().is_file());

    let traces = list_json(&env);
    let rows: Vec<_> = traces
        .iter()
        .map(|t| (t["id"].as_u64().unwrap(), t["application"].clone(), t["api"].clone()))
        .collect();
    assert_eq!(
        rows,
        [(1, json!("hl2"), json!("D3D9")), (2, json!("quake"), json!("OpenGL"))]
    );
    assert_eq!(traces[0]["calls"], 4);
}

#[test]
fn test_reimport_replaces_rows() {
    let env = TestEnv::new();
    env.write(
        "first.json",
        &document(&[(
            "hl2",
            "D3D9",
            &[("api_calls", "IDirect3DDevice9::Clear", 4), ("api_calls", "IDirect3DDevice9::Present", 2)],
        )]),
    );
    env.write(
        "second.json",
        &document(&[("hl2", "D3D9", &[("api_calls", "IDirect3DDevice9::Clear", 7)])]),
    );

    assert!(env.store_cmd("import", &["first.json"]).status.success());
    let output = env.store_cmd("import", &["second.json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("0 new, 1 replaced"));

    let traces = list_json(&env);
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0]["id"], 1);
    assert_eq!(traces[0]["calls"], 7);

    // The old Present row is gone, not merged
    let output = env.store_cmd("search", &["Present", "--format", "json"]);
    let hits: Vec<Value> = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(
        hits.iter().all(|hit| hit["matched_on"] != "stat_name"),
        "{hits:?}"
    );
}

#[test]
fn test_malformed_document_is_rejected_alone() {
    let env = TestEnv::new();
    env.write(
        "good.json",
        &document(&[("hl2", "D3D9", &[("api_calls", "IDirect3DDevice9::Clear", 4)])]),
    );
    env.write(
        "bad.json",
        r#"{"tracestats": [{"binary_name": "ok", "api": "D3D9", "stats": []}, {"api": "D3D9", "stats": []}]}"#,
    );

    let output = env.store_cmd("import", &["bad.json", "good.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Rejected bad.json: entry 1 is missing required field `binary_name`"),
        "{}",
        stderr(&output)
    );
    assert!(stdout(&output).contains("Imported good.json"));

    // Nothing from the bad document made it in, not even its valid entry
    let traces = list_json(&env);
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0]["application"], "hl2");
}

#[test]
fn test_missing_document() {
    let env = TestEnv::new();
    let output = env.store_cmd("import", &["absent.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("absent.json"), "{}", stderr(&output));
}

#[test]
fn test_legacy_document() {
    let env = TestEnv::new();
    env.write(
        "legacy.json",
        r#"{"tracestats": [{
            "binary_name": "morrowind",
            "api_calls": {"Direct3DCreate8": 1, "IDirect3DDevice8::Clear": 12},
            "render_states": {"D3DRS_ZENABLE": 3},
            "rastizer_states": {"D3D10_FILL_SOLID": 1}
        }]}"#,
    );

    let output = env.store_cmd("import", &["legacy.json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let traces = list_json(&env);
    assert_eq!(traces[0]["application"], "morrowind");
    assert_eq!(traces[0]["api"], "D3D8");
    assert_eq!(traces[0]["calls"], 13);
}

#[test]
fn test_remove() {
    let env = TestEnv::new();
    env.write(
        "run.json",
        &document(&[
            ("hl2", "D3D9", &[("api_calls", "IDirect3DDevice9::Clear", 4)]),
            ("hl2", "D3D9Ex", &[("api_calls", "IDirect3DDevice9Ex::Clear", 4)]),
        ]),
    );
    assert!(env.store_cmd("import", &["run.json"]).status.success());

    let output = env.store_cmd("remove", &["hl2", "d3d9"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Removed hl2 (D3D9)"));

    let traces = list_json(&env);
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0]["api"], "D3D9Ex");

    let output = env.store_cmd("remove", &["hl2", "D3D9"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No trace hl2 (D3D9) in the store"));
}

#[test]
fn test_summary() {
    let env = TestEnv::new();
    env.write(
        "run.json",
        &document(&[
            ("hl2", "D3D9", &[("api_calls", "IDirect3DDevice9::Clear", 4)]),
            ("portal", "D3D9", &[("api_calls", "IDirect3DDevice9::Clear", 6)]),
            ("quake", "OpenGL", &[("api_calls", "glClear", 1)]),
        ]),
    );
    assert!(env.store_cmd("import", &["run.json"]).status.success());

    let output = env.store_cmd("summary", &[]);
    assert!(output.status.success(), "{}", stderr(&output));
    insta::assert_snapshot!(stdout(&output), @r"
    API     Traces
    D3D9         2
    OpenGL       1
    Total        3
    ");
}

#[test]
fn test_empty_store() {
    let env = TestEnv::new();
    let output = env.store_cmd("list", &[]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("The store is empty"));
}
