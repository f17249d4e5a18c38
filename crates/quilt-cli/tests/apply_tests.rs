//! End-to-end tests for `quilt apply`.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use fs4::fs_std::FileExt;
use predicates::prelude::*;
use tempfile::TempDir;

const TEMPLATE: &str = r#"[fragment]
name = "demo"

[[actions]]
type = "create-file"
path = "app/models/current.rb"
content = "class Current < ActiveSupport::CurrentAttributes\nend\n"

[[actions]]
type = "create-file"
path = "config/quilt.yml"
content = "app: {{APP_NAME_SNAKE}}\ndatabase: {{database}}\n"

[[actions]]
type = "add-dependency"
name = "rapidjson"
"#;

const GEMFILE: &str = "source \"https://rubygems.org\"\n\ngem \"rails\"\n";

/// A workspace holding an empty config file, a template dir and a target app.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(template: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("config.toml"), "").unwrap();
        fs::create_dir_all(root.join("template")).unwrap();
        fs::write(root.join("template/template.toml"), template).unwrap();
        fs::create_dir_all(root.join("demo_app")).unwrap();
        fs::write(root.join("demo_app/Gemfile"), GEMFILE).unwrap();
        Self { dir }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn target(&self) -> PathBuf {
        self.path("demo_app")
    }

    fn quilt(&self) -> Command {
        let mut cmd = Command::cargo_bin("quilt").unwrap();
        cmd.current_dir(self.dir.path())
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(self.path("config.toml"));
        cmd
    }

    fn apply(&self) -> Command {
        let mut cmd = self.quilt();
        cmd.arg("apply")
            .arg(self.path("template"))
            .arg("-C")
            .arg(self.target())
            .arg("--yes");
        cmd
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn apply_writes_files_and_dependencies() {
    let ws = Workspace::new(TEMPLATE);

    ws.apply()
        .args(["-o", "database=sqlite3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied"))
        .stdout(predicate::str::contains("Dependencies added: rapidjson"));

    let target = ws.target();
    assert!(target.join("app/models/current.rb").is_file());
    assert_eq!(
        read(&target.join("config/quilt.yml")),
        "app: demo_app\ndatabase: sqlite3\n"
    );
    let gemfile = read(&target.join("Gemfile"));
    assert!(gemfile.starts_with(GEMFILE));
    assert!(gemfile.contains("gem \"rapidjson\""));
    assert!(!target.join(".quilt.lock").exists());
}

#[test]
fn app_name_flag_feeds_placeholders() {
    let ws = Workspace::new(TEMPLATE);

    ws.apply()
        .args(["--app-name", "Billing Api", "-o", "database=postgresql"])
        .assert()
        .success();

    assert_eq!(
        read(&ws.target().join("config/quilt.yml")),
        "app: billing_api\ndatabase: postgresql\n"
    );
}

#[test]
fn config_options_are_defaults_for_runs() {
    let ws = Workspace::new(TEMPLATE);
    fs::write(
        ws.path("config.toml"),
        "[defaults.options]\ndatabase = \"mysql\"\n",
    )
    .unwrap();

    ws.apply().assert().success();
    assert!(read(&ws.target().join("config/quilt.yml")).contains("database: mysql"));
}

#[test]
fn second_run_adds_nothing() {
    let ws = Workspace::new(
        "[[actions]]\ntype = \"add-dependency\"\nname = \"rapidjson\"\n",
    );

    ws.apply().assert().success();
    let gemfile = read(&ws.target().join("Gemfile"));

    ws.apply()
        .assert()
        .success()
        .stdout(predicate::str::contains("Dependencies added").not());
    assert_eq!(read(&ws.target().join("Gemfile")), gemfile);
}

#[test]
fn dry_run_leaves_the_tree_untouched() {
    let ws = Workspace::new(TEMPLATE);

    ws.apply()
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run: 3 file(s) would change"))
        .stdout(predicate::str::contains("+ app/models/current.rb"))
        .stdout(predicate::str::contains("~ Gemfile"))
        .stdout(predicate::str::contains("Dependencies that would be added: rapidjson"));

    let target = ws.target();
    assert!(!target.join("app").exists());
    assert!(!target.join("config").exists());
    assert_eq!(read(&target.join("Gemfile")), GEMFILE);
    assert!(!target.join(".quilt.lock").exists());
}

#[test]
fn json_output_is_the_run_report() {
    let ws = Workspace::new(TEMPLATE);

    let assert = ws
        .apply()
        .args(["--output-format", "json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["dry_run"], false);
    assert_eq!(value["report"]["dependencies_added"][0], "rapidjson");
    assert!(value["report"]["applied"].as_u64().unwrap() >= 2);
    assert!(value["report"]["id"].is_string());
}

#[test]
fn json_dry_run_lists_changes() {
    let ws = Workspace::new(TEMPLATE);

    let assert = ws
        .apply()
        .args(["--dry-run", "--output-format", "json"])
        .assert()
        .success();

    let value: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(value["dry_run"], true);
    let changes = value["changes"].as_array().unwrap();
    assert!(changes.iter().any(|c| c["path"] == "Gemfile" && c["change"] == "modified"));
    assert!(
        changes
            .iter()
            .any(|c| c["path"] == "app/models/current.rb" && c["change"] == "created")
    );
}

#[test]
fn locked_target_is_refused() {
    let ws = Workspace::new(TEMPLATE);
    let held = fs::File::create(ws.target().join(".quilt.lock")).unwrap();
    assert!(held.try_lock_exclusive().unwrap());

    ws.apply()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("locked by another run"));

    assert!(!ws.target().join("app").exists());
    assert!(ws.target().join(".quilt.lock").exists());
}

#[test]
fn lock_file_left_by_a_dead_run_is_reclaimed() {
    let ws = Workspace::new(TEMPLATE);
    fs::write(ws.target().join(".quilt.lock"), "4242\n").unwrap();

    ws.apply().assert().success();

    assert!(ws.target().join("app/models/current.rb").is_file());
    assert!(!ws.target().join(".quilt.lock").exists());
}

#[test]
fn missing_target_exits_not_found() {
    let ws = Workspace::new(TEMPLATE);

    ws.quilt()
        .arg("apply")
        .arg(ws.path("template"))
        .args(["-C", "nowhere", "--yes"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Target directory not found"));
}

#[test]
fn missing_template_exits_not_found() {
    let ws = Workspace::new(TEMPLATE);

    ws.quilt()
        .arg("apply")
        .arg(ws.path("no-such-template"))
        .arg("-C")
        .arg(ws.target())
        .arg("--yes")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Template source unavailable"));
}

#[test]
fn malformed_option_is_a_user_error() {
    let ws = Workspace::new(TEMPLATE);

    ws.apply()
        .args(["-o", "database"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("expected key=value"));
}

#[test]
fn unknown_fragment_field_is_a_user_error() {
    let ws = Workspace::new(
        "[[actions]]\ntype = \"create-file\"\npath = \"a.txt\"\ncontent = \"\"\ncolour = \"red\"\n",
    );

    ws.apply().assert().code(2);
    assert!(!ws.target().join("a.txt").exists());
}

#[cfg(unix)]
#[test]
fn failing_deferred_action_keeps_the_tree_and_reports() {
    let ws = Workspace::new(
        r#"[[actions]]
type = "create-file"
path = "marker.txt"
content = "assembled\n"

[[actions]]
type = "defer"
label = "post install"

[[actions.actions]]
type = "run"
program = "sh"
args = ["-c", "exit 1"]
"#,
    );

    ws.apply()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Run failed with 1 error(s)"))
        .stderr(predicate::str::contains("Deferred action #1 (post install) failed"));

    assert_eq!(read(&ws.target().join("marker.txt")), "assembled\n");
    assert!(!ws.target().join(".quilt.lock").exists());
}

#[cfg(unix)]
#[test]
fn interrupt_during_fetch_releases_checkout_and_lock() {
    use std::os::unix::fs::PermissionsExt;
    use std::process::{Command as StdCommand, Stdio};
    use std::thread;
    use std::time::{Duration, Instant};

    let ws = Workspace::new(TEMPLATE);
    let marker = ws.path("clone-target");
    let slow_git = ws.path("slow-git");
    fs::write(
        &slow_git,
        format!(
            "#!/bin/sh\nfor a; do last=$a; done\necho \"$last\" > {}\nexec sleep 30\n",
            marker.display()
        ),
    )
    .unwrap();
    fs::set_permissions(&slow_git, fs::Permissions::from_mode(0o755)).unwrap();

    let mut child = StdCommand::new(env!("CARGO_BIN_EXE_quilt"))
        .current_dir(ws.path("."))
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .env("QUILT_GIT__PROGRAM", &slow_git)
        .arg("--config")
        .arg(ws.path("config.toml"))
        .args(["apply", "https://example.invalid/t.git", "--yes", "-C"])
        .arg(ws.target())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(20);
    while fs::read_to_string(&marker).map_or(true, |s| s.trim().is_empty()) {
        assert!(Instant::now() < deadline, "fetch never started");
        thread::sleep(Duration::from_millis(50));
    }
    assert!(ws.target().join(".quilt.lock").exists());

    StdCommand::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();

    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("quilt kept running after SIGINT");
        }
        thread::sleep(Duration::from_millis(50));
    };

    assert_eq!(status.code(), Some(130));
    assert!(!ws.target().join(".quilt.lock").exists());
    let clone_target = PathBuf::from(read(&marker).trim());
    let checkout = clone_target.parent().unwrap();
    assert!(!checkout.exists());
    assert!(!ws.target().join("app").exists());
}
