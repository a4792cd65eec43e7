//! Configuration file handling

use super::{kinetic, stdout_lines};

#[test]
fn test_explicit_config_file_is_used() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("custom.toml");
    std::fs::write(
        &config,
        "[stream]\nname = \"from-file\"\n\n[logging]\nlevel = \"off\"\n",
    )
    .unwrap();

    let output = kinetic(home.path())
        .arg("--config-file")
        .arg(&config)
        .arg("configured")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_lines(&output), vec!["configured"]);
    assert!(output.stderr.is_empty());
}

#[test]
fn test_missing_config_file_fails() {
    let home = tempfile::tempdir().unwrap();
    let output = kinetic(home.path())
        .args(["--config-file", "/definitely/not/here.toml", "hello"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "stderr: {}", stderr);
}

#[test]
fn test_malformed_config_file_fails() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("broken.toml");
    std::fs::write(&config, "[producer]\nput_attempts = \"many\"\n").unwrap();

    let output = kinetic(home.path())
        .arg("--config-file")
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error parsing configuration file"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_value_fails() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("zero.toml");
    std::fs::write(&config, "[producer]\nput_attempts = 0\n").unwrap();

    let output = kinetic(home.path())
        .arg("--config-file")
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("put_attempts must be greater than 0"), "stderr: {}", stderr);
}

#[test]
fn test_command_line_overrides_file_log_level() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("quiet.toml");
    std::fs::write(&config, "[logging]\nlevel = \"off\"\n").unwrap();

    let output = kinetic(home.path())
        .arg("--config-file")
        .arg(&config)
        .args(["--log-level", "info", "--no-color", "loud"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("starting"));
}
