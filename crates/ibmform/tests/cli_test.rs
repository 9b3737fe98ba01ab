#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const MANIFEST: &str = r#"
provider "ibm" {
    region "us-south"
}

variable "prefix" "demo"

resource "ibm_is_vpc" "main" {
    name "${var.prefix}-vpc"
}

data "ibm_is_image" "ubuntu" {
    name "ibm-ubuntu-22-04-minimal-amd64-1"
}

resource "ibm_is_ssh_key" "admin" {
    name "${var.prefix}-key"
    public_key "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIB8mJQ admin@example.com"
}
"#;

fn ibmform() -> Command {
    let mut cmd = Command::cargo_bin("ibmform").unwrap();
    cmd.env_remove("IBMFORM_CONFIG")
        .env_remove("IC_API_KEY")
        .env_remove("IBMCLOUD_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn project(manifest: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.kdl"), manifest).unwrap();
    dir
}

#[test]
fn test_cli_help() {
    ibmform()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("import"));
}

#[test]
fn test_cli_version() {
    ibmform()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ibmform"));
}

#[test]
fn test_apply_help() {
    ibmform()
        .args(["apply", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn test_providers_lists_catalog() {
    ibmform()
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("ibm_is_vpc"))
        .stdout(predicate::str::contains("ibm_container_vpc_cluster"))
        .stdout(predicate::str::contains("ibm_is_dedicated_hosts"));
}

#[test]
fn test_schema_for_one_type() {
    ibmform()
        .args(["schema", "ibm_is_ssh_key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"public_key\""))
        .stdout(predicate::str::contains("\"attributes\""));
}

#[test]
fn test_schema_unknown_type() {
    ibmform()
        .args(["schema", "ibm_is_nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource or data source type"));
}

#[test]
fn test_validate_valid_manifest() {
    let dir = project(MANIFEST);
    ibmform()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Manifest is valid"))
        .stdout(predicate::str::contains("ibm_is_ssh_key.admin"))
        .stdout(predicate::str::contains("data.ibm_is_image.ubuntu"));
}

#[test]
fn test_validate_with_file_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.kdl");
    fs::write(&path, MANIFEST).unwrap();

    ibmform()
        .args(["validate", "--file"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_validate_reports_schema_errors() {
    let dir = project(
        r#"
        resource "ibm_is_vpc" "main" {
            name "Not_Valid"
            colour "blue"
        }
        "#,
    );
    ibmform()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ibm_is_vpc.main.colour"))
        .stderr(predicate::str::contains("ibm_is_vpc.main.name"));
}

#[test]
fn test_validate_reports_undeclared_reference() {
    let dir = project(
        r#"
        resource "ibm_is_subnet" "a" {
            name "a"
            vpc "${ibm_is_vpc.missing.id}"
        }
        "#,
    );
    ibmform()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ibm_is_vpc.missing"));
}

#[test]
fn test_missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    ibmform()
        .current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No manifest found"));
}

#[test]
fn test_state_list_empty() {
    let dir = project(MANIFEST);
    ibmform()
        .current_dir(dir.path())
        .args(["state", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No resources in state"));
}

#[test]
fn test_state_show_unknown_address() {
    let dir = project(MANIFEST);
    ibmform()
        .current_dir(dir.path())
        .args(["state", "show", "ibm_is_vpc.main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not in state"));
}

#[test]
fn test_plan_requires_credentials() {
    let dir = project(MANIFEST);
    ibmform()
        .current_dir(dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("IC_API_KEY"));
}
