//! Document and task round trips against the platform API.

use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::disk::DiskSpecDocument;
use crate::error::{Error, Result};
use crate::machine::Machine;
use crate::remote::task::{TaskHandle, TaskSnapshot, TaskStatus};
use crate::remote::{Credential, Transport, TransportOptions};

const SUBMISSION_CONTENT_TYPE: &str = "application/vnd.vmware.vcloud.vm+json";

/// Everything needed to address the API for one call: endpoint, negotiated
/// protocol version, credential and transport options.
#[derive(Debug, Clone)]
pub struct RequestContext {
    endpoint: Url,
    version: String,
    credential: Credential,
    options: TransportOptions,
}

impl RequestContext {
    pub fn new(
        endpoint: Url,
        version: impl Into<String>,
        credential: Credential,
        options: TransportOptions,
    ) -> Self {
        Self {
            endpoint,
            version: version.into(),
            credential,
            options,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn options(&self) -> TransportOptions {
        self.options
    }

    /// Headers for reading resources.
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Accept".to_string(),
                format!("application/*+json;version={}", self.version),
            ),
            self.credential.header(),
        ]
    }

    /// Headers for submitting a machine document.
    pub fn submission_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers();
        headers.push((
            "Content-Type".to_string(),
            format!("{SUBMISSION_CONTENT_TYPE};version={}", self.version),
        ));
        headers
    }
}

/// Task resource as returned by the platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskBody {
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<u32>,
    #[serde(default)]
    operation: Option<String>,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskError {
    #[serde(default)]
    message: Option<String>,
}

/// Typed access to machine documents and tasks over a [`Transport`].
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch the machine document.
    pub async fn fetch_document(
        &self,
        machine: &Machine,
        ctx: &RequestContext,
    ) -> Result<DiskSpecDocument> {
        let body = self
            .transport
            .get(machine.href().as_str(), &ctx.headers(), ctx.options())
            .await?;
        DiskSpecDocument::from_json(&body)
    }

    /// Submit a document as a whole-machine reconfiguration and return the
    /// handle of the task tracking it.
    pub async fn submit(
        &self,
        document: &DiskSpecDocument,
        ctx: &RequestContext,
    ) -> Result<TaskHandle> {
        let uri = document
            .reconfigure_href()
            .map_err(|e| Error::SubmissionFailed(e.to_string()))?;
        let body = document
            .to_submission()
            .and_then(|v| Ok(serde_json::to_string(&v)?))
            .map_err(|e| Error::SubmissionFailed(e.to_string()))?;

        debug!(uri = %uri, "submitting reconfiguration");
        let response = self
            .transport
            .post(&uri, &ctx.submission_headers(), body, ctx.options())
            .await
            .map_err(|e| Error::SubmissionFailed(e.to_string()))?;

        let task: TaskBody = serde_json::from_str(&response).map_err(|e| {
            Error::SubmissionFailed(format!("unreadable task in response: {e}"))
        })?;
        task.href
            .filter(|h| !h.is_empty())
            .map(TaskHandle::new)
            .ok_or_else(|| Error::SubmissionFailed("no operation handle returned".to_string()))
    }

    /// Fetch the current state of a task.
    pub async fn task_status(
        &self,
        handle: &TaskHandle,
        ctx: &RequestContext,
    ) -> Result<TaskSnapshot> {
        let failed = |message: String| Error::StatusCheckFailed {
            handle: handle.to_string(),
            message,
        };

        let body = self
            .transport
            .get(handle.as_str(), &ctx.headers(), ctx.options())
            .await
            .map_err(|e| failed(e.to_string()))?;
        let task: TaskBody = serde_json::from_str(&body).map_err(|e| failed(e.to_string()))?;

        let raw_status = task
            .status
            .ok_or_else(|| failed("task has no status".to_string()))?;
        let status = raw_status
            .parse::<TaskStatus>()
            .map_err(|_| failed(format!("unrecognized task status '{raw_status}'")))?;

        Ok(TaskSnapshot {
            status,
            progress: task.progress,
            operation: task.operation,
            error_message: task.error.and_then(|e| e.message),
        })
    }
}
