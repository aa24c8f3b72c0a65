use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_docsift"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "docsift init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".docsift.toml");
    assert!(config_path.exists(), ".docsift.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[retrieval]"));
    assert!(content.contains("[embedding]"));
    assert!(content.contains("[answer]"));

    // Everything is commented out, so parsing yields the defaults
    let config: docsift_core::DocsiftConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.retrieval, docsift_core::RetrievalConfig::default());
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".docsift.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_docsift"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".docsift.toml")).unwrap();
    assert_eq!(content, "# existing");
}
