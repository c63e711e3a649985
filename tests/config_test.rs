use csvrunner::Config;

// Lives in its own test binary so the variable cannot leak into the
// file-layer tests in src/config.
#[test]
fn test_environment_overrides_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[runner]\nmax_workers = 9\nbatch_timeout_ms = 500\n").unwrap();

    std::env::set_var("CSVRUNNER_RUNNER__MAX_WORKERS", "12");
    std::env::set_var("CSVRUNNER_SHELL__PROGRAM", "bash");
    let config = Config::load(Some(&path));
    std::env::remove_var("CSVRUNNER_RUNNER__MAX_WORKERS");
    std::env::remove_var("CSVRUNNER_SHELL__PROGRAM");

    let config = config.unwrap();
    assert_eq!(config.runner.max_workers, 12);
    assert_eq!(config.runner.batch_timeout_ms, 500);
    assert_eq!(config.shell.program, "bash");
}
