/// End-to-end tests driving the pvcast-config binary against a temp config file.
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cmd(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pvcast-config").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("PVCAST_CONFIG")
        .arg("--config")
        .arg(config);
    cmd
}

fn config_in(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("pvcast_config.yaml")
}

#[test]
fn init_creates_empty_document_and_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    cmd(&config).arg("init").assert().success();
    let text = fs::read_to_string(&config).unwrap();
    assert!(text.contains("plant: []"), "{text}");

    cmd(&config)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    cmd(&config).args(["init", "--force"]).assert().success();
}

#[test]
fn plant_and_array_workflow() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    cmd(&config)
        .args(["plant", "add", "EastWest", "--inverter", "SE4000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added plant 'EastWest'"));

    cmd(&config)
        .args([
            "array",
            "add",
            "EastWest",
            "--name",
            "East",
            "--tilt",
            "30",
            "--azimuth",
            "90",
            "--modules-per-string",
            "4",
            "--module",
            "Trina_Solar_TSM_330DD14A_II_",
        ])
        .assert()
        .success();
    cmd(&config)
        .args(["array", "add", "EastWest", "--azimuth", "270"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added array 'Array 1'"));

    cmd(&config)
        .args(["array", "edit", "EastWest", "Array 1", "--rename", "West"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Renamed array 'Array 1' to 'West'"));

    cmd(&config)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Number of configured PV plants: 1"))
        .stdout(predicate::str::contains("    West: tilt 30.0 az 270.0"));

    let text = fs::read_to_string(&config).unwrap();
    assert!(text.contains("name: EastWest"));
    assert!(text.contains("modules_per_string: 4"));
}

#[test]
fn duplicate_plant_is_rejected_without_touching_file() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    cmd(&config).args(["plant", "add", "South"]).assert().success();
    let before = fs::read_to_string(&config).unwrap();

    cmd(&config)
        .args(["plant", "add", "South"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(&config).unwrap(), before);
}

#[test]
fn out_of_range_tilt_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    cmd(&config).args(["plant", "add", "Roof"]).assert().success();
    cmd(&config)
        .args(["array", "add", "Roof", "--tilt", "95"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tilt 95 is outside 0..=90"));
}

#[test]
fn validate_reports_every_issue() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let yaml = r#"
plant:
  - name: P
    inverter: X
    arrays:
      - name: A
        tilt: 100
        azimuth: 400
        module: M
"#;
    fs::write(&config, yaml).unwrap();

    cmd(&config)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("plant[0].arrays[0].tilt"))
        .stdout(predicate::str::contains("plant[0].arrays[0].azimuth"))
        .stdout(predicate::str::contains("Configuration is invalid (2 errors, 0 warnings)"));
}

#[test]
fn validate_lists_duplicate_and_blank_plant_names() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let yaml = r#"
plant:
  - name: A
    arrays:
      - name: X
        tilt: 100
  - name: A
  - name: ''
"#;
    fs::write(&config, yaml).unwrap();

    cmd(&config)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "error: plant[0].arrays[0].tilt: tilt 100 is outside 0..=90 degrees",
        ))
        .stdout(predicate::str::contains(
            "error: plant[1].name: duplicate plant name 'A'",
        ))
        .stdout(predicate::str::contains(
            "error: plant[2].name: plant name must not be empty",
        ))
        .stdout(predicate::str::contains("Configuration is invalid (3 errors,"));

    // Mutations still refuse to load the file.
    cmd(&config)
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("a plant named 'A' already exists"));
}

#[test]
fn strict_validation_fails_on_warnings() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    cmd(&config).args(["plant", "add", "Bare"]).assert().success();

    cmd(&config).arg("validate").assert().success();
    cmd(&config)
        .args(["validate", "--strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("no inverter configured"));
}

#[test]
fn plant_edit_without_changes_leaves_file_alone() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    cmd(&config).args(["plant", "add", "Roof"]).assert().success();
    let before = fs::read_to_string(&config).unwrap();

    cmd(&config)
        .args(["plant", "edit", "Roof"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("nothing to change"));
    assert_eq!(fs::read_to_string(&config).unwrap(), before);
}

#[test]
fn show_single_plant() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    cmd(&config)
        .args(["plant", "add", "Roof", "--inverter", "SE4000"])
        .assert()
        .success();
    cmd(&config).args(["plant", "add", "Shed"]).assert().success();

    cmd(&config)
        .args(["show", "Roof"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PV plant: Roof"))
        .stdout(predicate::str::contains("SE4000"))
        .stdout(predicate::str::contains("Shed").not());

    cmd(&config)
        .args(["show", "Barn"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configured: Shed, Roof"));
}

#[test]
fn show_json_emits_document() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    cmd(&config).args(["plant", "add", "Roof"]).assert().success();

    let output = cmd(&config).args(["show", "--json"]).output().unwrap();
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["plant"][0]["name"], "Roof");
    assert_eq!(v["plant"][0]["microinverter"], false);
}

#[test]
fn compass_pointer_and_estimate() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let output = cmd(&config)
        .args([
            "compass", "--lat", "52.0", "--lon", "5.0", "--azimuth", "180", "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["geometry"]["type"], "LineString");
    let end_lat = v["geometry"]["coordinates"][1][1].as_f64().unwrap();
    assert!(end_lat < 52.0);

    cmd(&config)
        .args([
            "compass", "--lat", "0", "--lon", "0", "--to-lat", "0", "--to-lon", "-1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Estimated azimuth: 270.0"));
}

#[test]
fn compass_rejects_bad_latitude() {
    let dir = TempDir::new().unwrap();
    cmd(&config_in(&dir))
        .args(["compass", "--lat", "95", "--lon", "0", "--azimuth", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid map centre"));
}

#[test]
fn settings_reflect_environment() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let output = cmd(&config)
        .env("SERVER_NAME", "pvcast.local")
        .env("SERVER_PORT", "9000")
        .arg("settings")
        .output()
        .unwrap();
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["docs_host"], "pvcast.local");
    assert_eq!(v["docs_port"], 9000);
    assert_eq!(v["docs_timeout"], "2s");
}

#[cfg(feature = "docs")]
#[test]
fn docs_unreachable_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    cmd(&config_in(&dir))
        .args(["docs", "--docs-host", "127.0.0.1", "--docs-timeout", "1s"])
        .arg("--docs-port")
        .arg(port.to_string())
        .assert()
        .failure()
        .stdout(predicate::str::contains("Could not load API docs from"))
        .stderr(predicate::str::contains("API docs unavailable"));
}
