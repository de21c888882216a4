// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use quarry_adapters::FakeTokenMinter;
use quarry_core::{Config, Job};
use std::collections::HashMap;

fn config(vars: &[(&str, &str)]) -> Config {
    let map: HashMap<String, String> =
        vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    Config::from_lookup(&move |key: &str| map.get(key).cloned()).unwrap()
}

#[tokio::test]
async fn override_skipped_without_api_url() {
    let dir = tempfile::tempdir().unwrap();
    let job = Job::builder().build();

    let written = write_backend_override(&config(&[]), &job, dir.path()).await.unwrap();
    assert!(written.is_none());
    assert!(!dir.path().join(OVERRIDE_FILE).exists());
}

#[tokio::test]
async fn override_names_host_org_and_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let job = Job::builder().organization_id("acme").workspace_id("networking").build();
    let cfg = config(&[("QUARRY_API_URL", "https://api.example.com/base")]);

    let path = write_backend_override(&cfg, &job, dir.path()).await.unwrap().unwrap();
    assert_eq!(path, dir.path().join(OVERRIDE_FILE));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains(r#"hostname     = "api.example.com""#));
    assert!(content.contains(r#"organization = "acme""#));
    assert!(content.contains(r#"name = "networking""#));
    assert!(content.contains(r#"backend "remote""#));
}

#[tokio::test]
async fn override_fails_on_malformed_api_url() {
    let dir = tempfile::tempdir().unwrap();
    let job = Job::builder().build();
    let cfg = config(&[("QUARRY_API_URL", "https://")]);

    let err = write_backend_override(&cfg, &job, dir.path()).await.unwrap_err();
    assert!(matches!(err, ProvisionError::InvalidApiUrl(_)));
    assert!(!dir.path().join(OVERRIDE_FILE).exists());
}

#[tokio::test]
async fn credentials_noop_when_minting_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&[
        ("QUARRY_API_URL", "https://api.example.com"),
        ("QUARRY_REGISTRY_DOMAIN", "registry.example.com"),
    ]);

    let written = write_credentials(&FakeTokenMinter::failing(), &cfg, dir.path()).await.unwrap();
    assert!(written.is_none());
    assert!(!dir.path().join(CREDENTIALS_FILE).exists());
}

#[tokio::test]
async fn credentials_noop_without_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let minter = FakeTokenMinter::with_token("tok");

    let written = write_credentials(&minter, &config(&[]), dir.path()).await.unwrap();
    assert!(written.is_none());
}

#[tokio::test]
async fn credentials_map_registry_and_api_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&[
        ("QUARRY_API_URL", "https://api.example.com"),
        ("QUARRY_REGISTRY_DOMAIN", "registry.example.com"),
    ]);
    let minter = FakeTokenMinter::with_token("tok-1");

    let path = write_credentials(&minter, &cfg, dir.path()).await.unwrap().unwrap();
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    assert_eq!(doc["credentials"]["registry.example.com"]["token"], "tok-1");
    assert_eq!(doc["credentials"]["api.example.com"]["token"], "tok-1");
}

#[tokio::test]
async fn credentials_deduplicate_identical_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&[
        ("QUARRY_API_URL", "https://hub.example.com"),
        ("QUARRY_REGISTRY_DOMAIN", "hub.example.com"),
    ]);
    let minter = FakeTokenMinter::with_token("tok");

    let path = write_credentials(&minter, &cfg, dir.path()).await.unwrap().unwrap();
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    let map = doc["credentials"].as_object().unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(doc["credentials"]["hub.example.com"]["token"], "tok");
}

#[tokio::test]
async fn credentials_registry_only() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&[("QUARRY_REGISTRY_DOMAIN", "registry.example.com")]);
    let minter = FakeTokenMinter::with_token("tok");

    let path = write_credentials(&minter, &cfg, dir.path()).await.unwrap().unwrap();
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["credentials"].as_object().unwrap().len(), 1);
}
