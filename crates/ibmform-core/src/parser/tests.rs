use super::*;
use serde_json::json;
use serial_test::serial;

const MANIFEST: &str = r#"
    provider "ibm" {
        region "us-south"
        resource_group "${var.rg}"
    }

    variable "prefix" "demo"
    variable "rg" {
        default "rg-1234"
    }

    resource "ibm_is_vpc" "main" {
        name "${var.prefix}-vpc"
        tags "env:dev" "team:net"
    }

    data "ibm_is_image" "ubuntu" {
        name "ibm-ubuntu-22-04-minimal-amd64-1"
    }

    resource "ibm_is_subnet" "a" {
        name "${var.prefix}-a"
        vpc "${ibm_is_vpc.main.id}"
        zone "us-south-1"
        total_ipv4_address_count 256
        timeouts {
            create "20m"
        }
        depends_on "ibm_is_vpc.main"
    }
"#;

#[test]
#[serial]
fn test_parse_full_manifest() {
    let manifest = parse_manifest_str(MANIFEST).unwrap();

    let provider = manifest.provider.as_ref().unwrap();
    assert_eq!(provider.name, "ibm");
    assert_eq!(provider.get_str("region"), Some("us-south"));
    assert_eq!(provider.get_str("resource_group"), Some("rg-1234"));

    assert_eq!(manifest.variables["prefix"], json!("demo"));
    assert_eq!(manifest.nodes.len(), 3);
    assert_eq!(manifest.resources().count(), 2);
    assert_eq!(manifest.data_sources().count(), 1);

    let vpc = manifest.node("ibm_is_vpc.main").unwrap();
    assert_eq!(vpc.config["name"], json!("${var.prefix}-vpc"));
    assert_eq!(vpc.config["tags"], json!(["env:dev", "team:net"]));

    let subnet = manifest.node("ibm_is_subnet.a").unwrap();
    assert_eq!(subnet.config["total_ipv4_address_count"], json!(256));
    assert_eq!(subnet.timeouts["create"], json!("20m"));
    assert_eq!(subnet.depends_on, vec!["ibm_is_vpc.main"]);
    assert!(!subnet.config.contains_key("timeouts"));

    assert!(manifest.node("data.ibm_is_image.ubuntu").unwrap().is_data());
}

#[test]
fn test_repeated_blocks_become_list() {
    let manifest = parse_manifest_str(
        r#"
        resource "ibm_container_vpc_cluster" "k8s" {
            zones {
                name "us-south-1"
                subnet_id "s-1"
            }
            zones name="us-south-2" subnet_id="s-2"
        }
        "#,
    )
    .unwrap();
    let cluster = manifest.node("ibm_container_vpc_cluster.k8s").unwrap();
    assert_eq!(
        cluster.config["zones"],
        json!([
            {"name": "us-south-1", "subnet_id": "s-1"},
            {"name": "us-south-2", "subnet_id": "s-2"}
        ])
    );
}

#[test]
fn test_scalar_types() {
    let manifest = parse_manifest_str(
        r#"
        resource "ibm_cis_dns_record" "www" {
            proxied #true
            ttl 120
            weight 1.5
            data {
                port 443
            }
        }
        "#,
    )
    .unwrap();
    let record = &manifest.node("ibm_cis_dns_record.www").unwrap().config;
    assert_eq!(record["proxied"], json!(true));
    assert_eq!(record["ttl"], json!(120));
    assert_eq!(record["weight"], json!(1.5));
    assert_eq!(record["data"], json!({"port": 443}));
}

#[test]
fn test_duplicate_address_is_error() {
    let err = parse_manifest_str(
        r#"
        resource "ibm_is_vpc" "main" { name "a" }
        resource "ibm_is_vpc" "main" { name "b" }
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ManifestError::DuplicateAddress(a) if a == "ibm_is_vpc.main"));
}

#[test]
fn test_unknown_provider_is_error() {
    let err = parse_manifest_str(r#"provider "aws" { region "us-east-1" }"#).unwrap_err();
    assert!(matches!(err, ManifestError::UnknownProvider(p) if p == "aws"));
}

#[test]
fn test_provider_cannot_reference_resources() {
    let err = parse_manifest_str(
        r#"
        provider "ibm" { resource_group "${ibm_is_vpc.main.resource_group}" }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("provider settings"));
}

#[test]
fn test_mixed_arguments_and_block_is_error() {
    let err = parse_manifest_str(
        r#"
        resource "ibm_is_vpc" "main" {
            address_prefix "a" { cidr "10.0.0.0/24" }
        }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("mixes arguments"));
}

#[test]
fn test_missing_name_is_error() {
    let err = parse_manifest_str(r#"resource "ibm_is_vpc" { name "a" }"#).unwrap_err();
    assert!(err.to_string().contains("requires a type and a name"));
}

#[test]
#[serial]
fn test_env_overrides_variable() {
    temp_env::with_vars(
        [("IBMFORM_VAR_prefix", Some("prod")), ("IBMFORM_VAR_size", Some("3"))],
        || {
            let manifest = parse_manifest_str(
                r#"
                variable "prefix" "demo"
                variable "size" {}
                "#,
            )
            .unwrap();
            assert_eq!(manifest.variables["prefix"], json!("prod"));
            assert_eq!(manifest.variables["size"], json!(3));
        },
    );
}

#[test]
#[serial]
fn test_variable_without_value_is_error() {
    temp_env::with_var_unset("IBMFORM_VAR_region", || {
        let err = parse_manifest_str(r#"variable "region" {}"#).unwrap_err();
        assert!(matches!(err, ManifestError::UndefinedVariable(v) if v == "region"));
    });
}

#[test]
fn test_parse_manifest_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.kdl");
    std::fs::write(&path, r#"resource "ibm_is_ssh_key" "k" { name "key" }"#).unwrap();

    let manifest = parse_manifest_file(&path).unwrap();
    assert!(manifest.node("ibm_is_ssh_key.k").is_some());

    let err = parse_manifest_file(dir.path().join("missing.kdl")).unwrap_err();
    assert!(matches!(err, ManifestError::IoError { .. }));
}

#[test]
fn test_invalid_kdl_is_parse_error() {
    let err = parse_manifest_str("resource \"ibm_is_vpc\" \"main\" {").unwrap_err();
    assert!(matches!(err, ManifestError::KdlParse(_)));
}
