// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job descriptor and classification.
//!
//! The job is the unit of work handed to the executor by the coordinator,
//! either as the body of an ONLINE submission or as the decoded BATCH
//! payload. Field names follow the coordinator's camelCase wire format.

use crate::id::{JobId, OrgId, StepId, WorkspaceId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the job is executed.
///
/// Anything the coordinator sends outside the known set deserializes to
/// `Unknown` and is rejected before any execution side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "plan")]
    Plan,
    #[serde(rename = "apply")]
    Apply,
    #[serde(rename = "destroy")]
    Destroy,
    #[serde(rename = "customScript")]
    CustomScript,
    #[serde(rename = "approval")]
    Approval,
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl JobKind {
    /// Jobs that run the Terraform toolchain (and therefore need version
    /// resolution and backend/credential artifacts).
    pub fn is_toolchain(&self) -> bool {
        matches!(self, JobKind::Plan | JobKind::Apply | JobKind::Destroy)
    }

    /// Jobs that run the job's own script commands.
    pub fn is_script(&self) -> bool {
        matches!(self, JobKind::CustomScript | JobKind::Approval)
    }
}

crate::simple_display! {
    JobKind {
        Plan => "plan",
        Apply => "apply",
        Destroy => "destroy",
        CustomScript => "customScript",
        Approval => "approval",
        Unknown => "unknown",
    }
}

/// Whether the source repository needs the access token embedded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum VcsKind {
    #[default]
    Public,
    Private,
}

impl From<String> for VcsKind {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("public") {
            VcsKind::Public
        } else {
            VcsKind::Private
        }
    }
}

impl Serialize for VcsKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            VcsKind::Public => "PUBLIC",
            VcsKind::Private => "PRIVATE",
        })
    }
}

/// Status reported for a job and, separately, for its step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn terminal(success: bool) -> Self {
        if success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        }
    }
}

crate::simple_display! {
    JobStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// One requested unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,
    #[serde(default)]
    pub step_id: StepId,
    pub organization_id: OrgId,
    pub workspace_id: WorkspaceId,
    #[serde(rename = "type")]
    pub kind: JobKind,
    /// Repository URL the job's source is fetched from.
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Optional subfolder within the checkout to execute from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// VCS access token; empty/absent for public repositories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub vcs_type: VcsKind,
    /// Requested toolchain version, e.g. "1.6.2".
    #[serde(default)]
    pub terraform_version: String,
    /// Execution environment; the runner injects additional entries
    /// (credential file location) before invoking the toolchain.
    #[serde(default)]
    pub environment_variables: HashMap<String, String>,
    /// Script fragments for customScript/approval jobs, run in order.
    #[serde(default)]
    pub commands: Vec<String>,
}

impl Job {
    /// Token to embed in the fetch URL, if the repository requires one.
    pub fn fetch_token(&self) -> Option<&str> {
        if self.vcs_type == VcsKind::Public {
            return None;
        }
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            job_id: JobId = "job-1",
            step_id: StepId = "step-1",
            organization_id: OrgId = "org-1",
            workspace_id: WorkspaceId = "ws-1",
            source: String = "",
            terraform_version: String = "1.6.2",
        }
        set {
            kind: JobKind = JobKind::Plan,
            vcs_type: VcsKind = VcsKind::Public,
            environment_variables: HashMap<String, String> = HashMap::new(),
            commands: Vec<String> = Vec::new(),
        }
        option {
            branch: String = None,
            folder: String = None,
            access_token: String = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
