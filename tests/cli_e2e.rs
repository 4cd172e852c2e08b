//! End-to-end tests for the `server-autoconfig` binary.
//!
//! Exit codes follow the usual conventions:
//!
//! - Exit code 0: Success, including a declined `clear`
//! - Exit code 1: The action failed
//! - Exit code 2: Invalid command-line usage (handled by clap)
//!
//! Services here use the `command` restart method, which appends to a log
//! file, so no service manager is needed.

#[allow(dead_code)]
#[macro_use]
mod common;
use common::prelude::*;

fn deployed_fixture() -> TestFixture {
    TestFixture::new()
        .with_upstream(&[("conf/app.conf", "listen 8080\n")])
        .with_system_file("/etc/app/app.conf", "listen 80\n")
        .with_app_config()
}

// =============================================================================
// Usage and configuration errors
// =============================================================================

#[test]
fn test_exit_code_help() {
    let mut cmd = cargo_bin_cmd!("server-autoconfig");

    cmd.arg("--help")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("rollback"));
}

#[test]
fn test_exit_code_version() {
    let mut cmd = cargo_bin_cmd!("server-autoconfig");

    cmd.arg("--version").assert().code(0);
}

#[test]
fn test_exit_code_unknown_flag() {
    let mut cmd = cargo_bin_cmd!("server-autoconfig");

    cmd.arg("update").arg("--no-such-flag").assert().code(2);
}

#[test]
fn test_exit_code_unknown_action() {
    let mut cmd = cargo_bin_cmd!("server-autoconfig");

    cmd.arg("deploy").assert().code(2);
}

#[test]
fn test_conflicting_restart_flags() {
    let mut cmd = cargo_bin_cmd!("server-autoconfig");

    cmd.args(["update", "--no-restart", "--full-restart"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_config_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("server-autoconfig");

    cmd.env("NO_COLOR", "1")
        .arg("download")
        .arg("--config")
        .arg(temp.path().join("missing.yml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[ERR]"))
        .stderr(predicate::str::contains("Failed to open config file"));
}

#[test]
fn test_config_path_from_environment() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("server-autoconfig");

    cmd.env("NO_COLOR", "1")
        .env("SERVER_AUTOCONFIG_CONFIG", temp.path().join("from-env.yml"))
        .arg("download")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("from-env.yml"));
}

#[test]
fn test_file_pair_without_separator() {
    let fixture = TestFixture::new();
    let yaml = fixture.config_yaml(
        "  app:\n    restart-method: command\n    restart-command: 'true'\n    files:\n      - conf/app.conf\n",
    );
    let fixture = fixture.with_config(&yaml);

    fixture
        .command()
        .arg("download")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[ERR]"))
        .stderr(predicate::str::contains("missing ':' separator"))
        .stderr(predicate::str::contains("Nothing was changed"));
}

#[test]
fn test_missing_restart_method() {
    let fixture = TestFixture::new();
    let yaml = fixture.config_yaml("  app:\n    files:\n      - conf/app.conf:/etc/app.conf\n");
    let fixture = fixture.with_config(&yaml);

    fixture
        .command()
        .arg("update")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("services/app: restart-method is missing"));
    assert!(!fixture.data_dir().join("test").exists());
}

#[test]
fn test_unknown_service_filter() {
    let fixture = TestFixture::new().with_app_config();

    fixture
        .command()
        .args(["update", "--service", "mysql"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'mysql' is not defined"))
        .stderr(predicate::str::contains("Defined services: app"));
}

#[test]
fn test_service_options_need_a_name() {
    let fixture = TestFixture::new().with_app_config();

    fixture
        .command()
        .args(["update", "-m", "command", "--reload-command", "true"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--name"));
}

#[test]
fn test_reload_shell_from_command_line_must_exist() {
    let fixture = TestFixture::new().with_app_config();

    fixture
        .command()
        .args(["update", "-n", "app", "-m", "shell", "--reload-shell"])
        .arg(fixture.path().join("missing.sh"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("services/app/restart-shell"))
        .stderr(predicate::str::contains("Nothing was changed"));
    assert!(!fixture.data_dir().join("test").exists());
}

// =============================================================================
// Deploying
// =============================================================================

#[test]
fn test_update_deploys_and_reloads() {
    require_git!();
    let fixture = deployed_fixture();

    fixture
        .command()
        .arg("update")
        .assert()
        .success()
        .stderr(predicate::str::contains("[INFO]"))
        .stderr(predicate::str::contains("Reloaded: app"));

    assert_eq!(fixture.read_system_file("/etc/app/app.conf"), "listen 8080\n");
    assert_eq!(fixture.reload_count(), 1);
}

#[test]
fn test_second_update_reloads_nothing() {
    require_git!();
    let fixture = deployed_fixture();
    fixture.command().arg("update").assert().success();

    fixture
        .command()
        .arg("update")
        .assert()
        .success()
        .stderr(predicate::str::contains("No service needed a reload"));

    assert_eq!(fixture.reload_count(), 1);
}

#[test]
fn test_full_restart_reloads_unchanged_services() {
    require_git!();
    let fixture = deployed_fixture();
    fixture.command().arg("update").assert().success();

    fixture
        .command()
        .args(["update", "--full-restart"])
        .assert()
        .success();

    assert_eq!(fixture.reload_count(), 2);
}

#[test]
fn test_no_restart_deploys_only() {
    require_git!();
    let fixture = deployed_fixture();

    fixture
        .command()
        .args(["update", "--no-restart"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Not reloading changed services: app"));

    assert_eq!(fixture.read_system_file("/etc/app/app.conf"), "listen 8080\n");
    assert_eq!(fixture.reload_count(), 0);
}

#[test]
fn test_reload_command_overridden_on_command_line() {
    require_git!();
    let fixture = deployed_fixture();
    let override_log = fixture.path().join("override.log");

    fixture
        .command()
        .args(["update", "-n", "app", "--reload-command"])
        .arg(format!("echo override >> {}", override_log.display()))
        .assert()
        .success();

    assert_eq!(fixture.reload_count(), 0);
    assert!(override_log.is_file());
}

#[test]
fn test_service_added_on_command_line() {
    require_git!();
    let fixture = deployed_fixture();
    let extra_log = fixture.path().join("extra.log");
    let pair = format!(
        "conf/app.conf:{}",
        fixture.system_path("/etc/extra/extra.conf").display()
    );

    fixture
        .command()
        .args(["update", "-s", "extra", "-n", "extra", "-m", "command", "-f", &pair])
        .arg("--reload-command")
        .arg(format!("echo extra >> {}", extra_log.display()))
        .assert()
        .success()
        .stderr(predicate::str::contains("Reloaded: extra"));

    assert_eq!(fixture.read_system_file("/etc/extra/extra.conf"), "listen 8080\n");
    // The configured service is outside the run.
    assert_eq!(fixture.read_system_file("/etc/app/app.conf"), "listen 80\n");
    assert_eq!(fixture.reload_count(), 0);
    assert!(extra_log.is_file());
}

#[test]
fn test_rollback_restores_host_files() {
    require_git!();
    let fixture = deployed_fixture();
    fixture.command().arg("update").assert().success();

    fixture
        .command()
        .arg("rollback")
        .assert()
        .success()
        .stderr(predicate::str::contains("Rollback complete"));

    assert_eq!(fixture.read_system_file("/etc/app/app.conf"), "listen 80\n");
    assert_eq!(fixture.reload_count(), 2);
}

#[test]
fn test_branch_override_deploys_other_branch() {
    require_git!();
    let fixture = deployed_fixture();
    git(&fixture.seed(), &fixture.home(), &["checkout", "--quiet", "-b", "staging"]);
    std::fs::write(fixture.seed().join("conf/app.conf"), "listen 9090\n").unwrap();
    git(&fixture.seed(), &fixture.home(), &["commit", "--quiet", "-am", "staging"]);
    git(&fixture.seed(), &fixture.home(), &["push", "--quiet", "origin", "staging"]);

    fixture
        .command()
        .args(["update", "--branch", "staging"])
        .assert()
        .success();

    assert_eq!(fixture.read_system_file("/etc/app/app.conf"), "listen 9090\n");
}

#[test]
fn test_debug_flag_shows_notes() {
    require_git!();
    let fixture = deployed_fixture();

    fixture
        .command()
        .args(["download", "--debug"])
        .assert()
        .success()
        .stderr(predicate::str::contains("[NOTE]"));
}

#[test]
fn test_notes_hidden_by_default() {
    require_git!();
    let fixture = deployed_fixture();

    fixture
        .command()
        .arg("download")
        .assert()
        .success()
        .stderr(predicate::str::contains("[NOTE]").not());
}

// =============================================================================
// Mirror actions
// =============================================================================

#[test]
fn test_backup_and_push() {
    require_git!();
    let fixture = deployed_fixture();

    fixture
        .command()
        .arg("backup")
        .assert()
        .success()
        .stderr(predicate::str::contains("Backup recorded on backup: backup at "));
    fixture.command().arg("push").assert().success();

    let pushed = git(
        &fixture.upstream(),
        &fixture.home(),
        &["show", "backup:conf/app.conf"],
    );
    assert_eq!(pushed, "listen 80");
    // Backups never touch the host.
    assert_eq!(fixture.read_system_file("/etc/app/app.conf"), "listen 80\n");
}

#[test]
fn test_clear_with_yes_removes_instance() {
    require_git!();
    let fixture = deployed_fixture();
    fixture.command().arg("download").assert().success();
    assert!(fixture.mirror().exists());

    fixture
        .command()
        .args(["clear", "--yes"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));

    assert!(!fixture.data_dir().join("test").exists());
}

#[test]
fn test_clear_without_terminal_refuses() {
    let fixture = TestFixture::new().with_app_config();
    std::fs::create_dir_all(fixture.mirror()).unwrap();

    fixture
        .command()
        .arg("clear")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--yes"));

    assert!(fixture.mirror().exists());
}
