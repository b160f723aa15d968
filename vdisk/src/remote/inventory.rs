//! Read-only lookups of machine state outside the disk section.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::disk::StorageProfileRef;
use crate::error::{Error, Result};
use crate::machine::{Machine, PowerState};
use crate::remote::client::RequestContext;
use crate::remote::Transport;

/// Records requested per query page. The service may return fewer.
const PROFILE_PAGE_SIZE: usize = 128;
const NEXT_PAGE_REL: &str = "nextPage";

/// Answers questions about a machine's surroundings.
#[async_trait]
pub trait MachineInventory: Send + Sync {
    /// Storage profiles available to the machine.
    async fn storage_profiles(
        &self,
        machine: &Machine,
        ctx: &RequestContext,
    ) -> Result<Vec<StorageProfileRef>>;

    /// Current power state of the machine.
    async fn power_state(&self, machine: &Machine, ctx: &RequestContext) -> Result<PowerState>;
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(default)]
    rel: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct ReferencePage {
    #[serde(default)]
    reference: Vec<StorageProfileRef>,
    #[serde(default)]
    link: Vec<Link>,
}

impl ReferencePage {
    fn next_page(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.rel == NEXT_PAGE_REL)
            .map(|l| l.href.as_str())
    }
}

/// Inventory backed by the platform's query service.
///
/// Storage profiles are scoped to the VDC the machine lives in. The VDC is
/// taken from a link on the machine document, or failing that from the
/// parent vApp's `up` link.
#[derive(Clone)]
pub struct ApiInventory {
    transport: Arc<dyn Transport>,
}

impl ApiInventory {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn get_json(&self, uri: &str, ctx: &RequestContext) -> Result<Value> {
        let body = self
            .transport
            .get(uri, &ctx.headers(), ctx.options())
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn vdc_href(&self, machine: &Machine, ctx: &RequestContext) -> Result<String> {
        let document = self.get_json(machine.href().as_str(), ctx).await?;
        if let Some(vdc) = vdc_link(&document) {
            return Ok(vdc.to_string());
        }

        let parent = link_with_rel(&document, "up").ok_or_else(|| {
            Error::MalformedDocument("machine document has no vdc or parent link".into())
        })?;
        let parent = self.get_json(parent, ctx).await?;
        vdc_link(&parent).map(str::to_string).ok_or_else(|| {
            Error::MalformedDocument("machine's parent document has no vdc link".into())
        })
    }
}

#[async_trait]
impl MachineInventory for ApiInventory {
    async fn storage_profiles(
        &self,
        machine: &Machine,
        ctx: &RequestContext,
    ) -> Result<Vec<StorageProfileRef>> {
        let vdc = self.vdc_href(machine, ctx).await?;
        let mut uri = ctx
            .endpoint()
            .join("api/query")
            .map_err(|e| Error::transport(ctx.endpoint().as_str(), None, e.to_string()))?;
        uri.query_pairs_mut()
            .append_pair("type", "orgVdcStorageProfile")
            .append_pair("format", "references")
            .append_pair("pageSize", &PROFILE_PAGE_SIZE.to_string())
            .append_pair("filter", &format!("vdc=={vdc}"));

        let mut profiles = Vec::new();
        let mut next = Some(uri.to_string());
        while let Some(uri) = next.take() {
            let page: ReferencePage = serde_json::from_value(self.get_json(&uri, ctx).await?)?;
            next = page
                .next_page()
                .filter(|href| *href != uri)
                .map(str::to_string);
            profiles.extend(page.reference);
        }

        debug!(vdc = %vdc, count = profiles.len(), "listed storage profiles");
        Ok(profiles)
    }

    async fn power_state(&self, machine: &Machine, ctx: &RequestContext) -> Result<PowerState> {
        let document = self.get_json(machine.href().as_str(), ctx).await?;
        let status = document
            .get("status")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::MalformedDocument("machine has no status".to_string()))?;
        i32::try_from(status).map(PowerState::from_status).map_err(|_| {
            Error::MalformedDocument(format!("machine status {status} is out of range"))
        })
    }
}

fn links(document: &Value) -> impl Iterator<Item = &Value> {
    document
        .get("link")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn link_with_rel<'a>(document: &'a Value, rel: &str) -> Option<&'a str> {
    links(document)
        .find(|l| l.get("rel").and_then(Value::as_str) == Some(rel))
        .and_then(|l| l.get("href"))
        .and_then(Value::as_str)
}

// A VDC link is recognized by its media type or by the `/api/vdc/` path.
fn vdc_link(document: &Value) -> Option<&str> {
    links(document)
        .find(|l| {
            let media = l.get("type").and_then(Value::as_str).unwrap_or_default();
            let href = l.get("href").and_then(Value::as_str).unwrap_or_default();
            media.contains("vcloud.vdc+") || is_vdc_href(href)
        })
        .and_then(|l| l.get("href"))
        .and_then(Value::as_str)
}

fn is_vdc_href(href: &str) -> bool {
    Url::parse(href)
        .map(|url| url.path().starts_with("/api/vdc/"))
        .unwrap_or(false)
}
