// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn job_id_display() {
    let id = JobId::new("job-42");
    assert_eq!(id.to_string(), "job-42");
}

#[test]
fn job_id_equality() {
    let id1 = JobId::new("job-1");
    let id2 = JobId::new("job-1");
    let id3 = JobId::new("job-2");

    assert_eq!(id1, id2);
    assert_ne!(id1, id3);
    assert_eq!(id1, "job-1");
}

#[test]
fn job_id_from_str() {
    let id: JobId = "abc".into();
    assert_eq!(id.as_str(), "abc");
}

#[test]
fn job_id_serde_transparent() {
    let id = OrgId::new("my-org");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"my-org\"");

    let parsed: OrgId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn default_id_is_empty() {
    assert!(StepId::default().is_empty());
    assert!(!StepId::new("s").is_empty());
}
