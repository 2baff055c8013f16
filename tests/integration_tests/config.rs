use crate::common::{TestEnv, stderr, stdout};

#[test]
fn test_config_init_writes_example() {
    let env = TestEnv::new();
    let output = env.command().args(["config", "init"]).output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Created config file"));

    let written = std::fs::read_to_string(env.config_path()).unwrap();
    assert!(written.contains("chunk-calls = 500000"));

    // A second init leaves the file alone
    std::fs::write(env.config_path(), "threads = 2\n").unwrap();
    let output = env.command().args(["config", "init"]).output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("Config already exists"));
    assert_eq!(
        std::fs::read_to_string(env.config_path()).unwrap(),
        "threads = 2\n"
    );

    let output = env
        .command()
        .args(["config", "init", "--force"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(
        std::fs::read_to_string(env.config_path())
            .unwrap()
            .contains("chunk-calls")
    );
}

#[test]
fn test_config_show_layers_environment() {
    let env = TestEnv::new();
    env.write("config/config.toml", "threads = 2\nsearch-limit = 50\n");

    let output = env
        .command()
        .args(["config", "show"])
        .env("TRACESTATS_SEARCH_LIMIT", "20")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("threads = 2"), "{out}");
    assert!(out.contains("search-limit = 20"), "{out}");
    assert!(out.contains("percentage-scope = \"per-api\""), "{out}");
    assert!(out.contains("data/tracestats/store.json"), "{out}");
}

#[test]
fn test_config_show_without_file() {
    let env = TestEnv::new();
    let output = env.command().args(["config", "show"]).output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Not found (using defaults)"));
}

#[test]
fn test_invalid_config_is_reported() {
    let env = TestEnv::new();
    env.write("config/config.toml", "chunk-calls = 0\n");
    let output = env.store_cmd("list", &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("chunk-calls must be at least 1"), "{}", stderr(&output));
}
