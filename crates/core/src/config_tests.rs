// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn defaults_to_online_mode() {
    let cfg = Config::from_lookup(&lookup(&[])).unwrap();
    assert_eq!(cfg.mode, Mode::Online);
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.storage, StorageConfig::None);
    assert_eq!(cfg.max_jobs, 4);
    assert_eq!(cfg.stage_timeout.as_secs(), 3600);
    assert!(cfg.api_url.is_none());
    assert!(cfg.batch_job.is_none());
    assert_eq!(cfg.release_url, "https://releases.hashicorp.com");
}

#[test]
fn batch_mode_requires_job_data() {
    let err = Config::from_lookup(&lookup(&[("QUARRY_MODE", "BATCH")])).unwrap_err();
    assert!(matches!(err, ConfigError::MissingJobData));
}

#[test]
fn batch_mode_decodes_job_payload() {
    let json = r#"{"jobId":"7","organizationId":"o","workspaceId":"w","type":"customScript","commands":["true"]}"#;
    let encoded = {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;
        STANDARD.encode(json)
    };
    let cfg = Config::from_lookup(&lookup(&[
        ("QUARRY_MODE", "batch"),
        ("QUARRY_JOB_DATA", &encoded),
    ]))
    .unwrap();
    assert_eq!(cfg.mode, Mode::Batch);
    let job = cfg.batch_job.unwrap();
    assert_eq!(job.job_id, "7");
    assert_eq!(job.kind, crate::job::JobKind::CustomScript);
}

#[test]
fn batch_mode_rejects_bad_payload() {
    let err = Config::from_lookup(&lookup(&[
        ("QUARRY_MODE", "BATCH"),
        ("QUARRY_JOB_DATA", "%%%not-base64%%%"),
    ]))
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidJobData(_)));

    // valid base64, invalid json
    let err = Config::from_lookup(&lookup(&[
        ("QUARRY_MODE", "BATCH"),
        ("QUARRY_JOB_DATA", "bm90IGpzb24="),
    ]))
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidJobData(_)));
}

#[test]
fn local_storage_requires_root() {
    let err = Config::from_lookup(&lookup(&[("QUARRY_STORAGE_TYPE", "LOCAL")])).unwrap_err();
    assert!(matches!(err, ConfigError::MissingStorageRoot));

    let cfg = Config::from_lookup(&lookup(&[
        ("QUARRY_STORAGE_TYPE", "LOCAL"),
        ("QUARRY_STORAGE_ROOT", "/var/lib/quarry"),
    ]))
    .unwrap();
    assert_eq!(cfg.storage, StorageConfig::Local { root: "/var/lib/quarry".into() });
}

#[test]
fn remote_storage_requires_endpoint() {
    let err = Config::from_lookup(&lookup(&[("QUARRY_STORAGE_TYPE", "REMOTE")])).unwrap_err();
    assert!(matches!(err, ConfigError::MissingStorageEndpoint));
}

#[test]
fn unknown_storage_type_is_fatal() {
    let err = Config::from_lookup(&lookup(&[("QUARRY_STORAGE_TYPE", "FTP")])).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownStorageType(v) if v == "FTP"));
}

#[test]
fn rejects_zero_max_jobs() {
    let err = Config::from_lookup(&lookup(&[("QUARRY_MAX_JOBS", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "QUARRY_MAX_JOBS", .. }));
}
