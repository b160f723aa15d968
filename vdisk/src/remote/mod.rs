//! Remote platform collaborators.
//!
//! Everything that talks to the platform sits behind a trait so callers can
//! substitute their own implementations:
//!
//! - [`SessionProvider`] resolves credentials for an endpoint
//! - [`VersionNegotiator`] picks the protocol version
//! - [`Transport`] moves request and response bodies
//! - [`MachineInventory`] answers storage profile and power state lookups
//!
//! [`RemoteClient`] and [`TaskMonitor`] build typed document and task
//! operations on top of a transport.

mod client;
mod inventory;
mod session;
mod task;
mod transport;

pub use client::{RemoteClient, RequestContext};
pub use inventory::{ApiInventory, MachineInventory};
pub use session::{Credential, SessionProvider, StaticSession};
pub use task::{
    MonitorConfig, TaskHandle, TaskMonitor, TaskOutcome, TaskProgress, TaskSnapshot, TaskStatus,
    DEFAULT_GRACE_PERIOD, DEFAULT_POLL_INTERVAL, DEFAULT_TASK_TIMEOUT,
};
pub use transport::{
    highest_supported, Headers, HttpTransport, SupportedVersions, Transport, TransportOptions,
    VersionInfo, VersionNegotiator, DEFAULT_REQUEST_TIMEOUT,
};

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport for unit tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use reqwest::Url;
    use serde_json::{json, Value};

    use super::{Headers, Transport, TransportOptions};
    use crate::error::{Error, Result};

    #[derive(Default)]
    struct State {
        submissions: Vec<(String, String)>,
        submit_response: Option<String>,
        fail_submit: bool,
        documents: HashMap<String, Value>,
        profiles: Vec<(String, Value)>,
        max_page_size: Option<usize>,
        profile_queries: Vec<String>,
        tasks: VecDeque<String>,
        repeat_task: Option<String>,
        task_checks: usize,
        fail_task_checks_after: Option<usize>,
    }

    /// Serves one machine document, its parent vApp, a paged storage profile
    /// query and a scripted sequence of task bodies.
    pub(crate) struct ScriptedTransport {
        machine: Value,
        state: Mutex<State>,
    }

    impl ScriptedTransport {
        pub(crate) const TASK_HREF: &'static str = "https://vcd.example.com/api/task/t-1";
        pub(crate) const VAPP_HREF: &'static str = "https://vcd.example.com/api/vApp/vapp-1";
        pub(crate) const VDC_HREF: &'static str = "https://vcd.example.com/api/vdc/vdc-1";

        pub(crate) fn new(machine: Value) -> Self {
            let vapp = json!({
                "href": Self::VAPP_HREF,
                "link": [{
                    "rel": "up",
                    "href": Self::VDC_HREF,
                    "type": "application/vnd.vmware.vcloud.vdc+json"
                }]
            });
            let state = State {
                documents: HashMap::from([(Self::VAPP_HREF.to_string(), vapp)]),
                ..Default::default()
            };
            Self {
                machine,
                state: Mutex::new(state),
            }
        }


        /// Posted (uri, body) pairs in order.
        pub(crate) fn submissions(&self) -> Vec<(String, String)> {
            self.state.lock().unwrap().submissions.clone()
        }

        pub(crate) fn set_submit_response(&self, body: &str) {
            self.state.lock().unwrap().submit_response = Some(body.to_string());
        }

        pub(crate) fn fail_submit(&self) {
            self.state.lock().unwrap().fail_submit = true;
        }

        /// Profiles of the machine's own VDC.
        pub(crate) fn set_profiles(&self, names: &[&str]) {
            let mut state = self.state.lock().unwrap();
            state.profiles.retain(|(vdc, _)| vdc != Self::VDC_HREF);
            state
                .profiles
                .extend(names.iter().map(|name| (Self::VDC_HREF.to_string(), profile(name))));
        }

        /// Profiles of some other VDC in the same organization.
        pub(crate) fn add_foreign_profiles(&self, vdc: &str, names: &[&str]) {
            let mut state = self.state.lock().unwrap();
            state
                .profiles
                .extend(names.iter().map(|name| (vdc.to_string(), profile(name))));
        }

        /// Cap query pages at `n` records regardless of the requested size.
        pub(crate) fn limit_page_size(&self, n: usize) {
            self.state.lock().unwrap().max_page_size = Some(n);
        }

        /// Storage profile query URIs requested so far.
        pub(crate) fn profile_queries(&self) -> Vec<String> {
            self.state.lock().unwrap().profile_queries.clone()
        }

        /// Queue a task body for the next status check.
        pub(crate) fn push_task(&self, body: &str) {
            self.state.lock().unwrap().tasks.push_back(body.to_string());
        }

        /// Body served once the queue is drained.
        pub(crate) fn repeat_task(&self, body: &str) {
            self.state.lock().unwrap().repeat_task = Some(body.to_string());
        }

        /// Status checks after the first `n` fail.
        pub(crate) fn fail_task_checks_after(&self, n: usize) {
            self.state.lock().unwrap().fail_task_checks_after = Some(n);
        }

        pub(crate) fn task_checks(&self) -> usize {
            self.state.lock().unwrap().task_checks
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(
            &self,
            uri: &str,
            _headers: &Headers,
            _options: TransportOptions,
        ) -> Result<String> {
            let mut state = self.state.lock().unwrap();

            if Some(uri) == self.machine["href"].as_str() {
                return Ok(self.machine.to_string());
            }
            if let Some(document) = state.documents.get(uri) {
                return Ok(document.to_string());
            }
            if uri.contains("type=orgVdcStorageProfile") {
                state.profile_queries.push(uri.to_string());
                return Ok(profile_page(&state, uri)?.to_string());
            }
            if uri == Self::TASK_HREF {
                state.task_checks += 1;
                if let Some(limit) = state.fail_task_checks_after {
                    if state.task_checks > limit {
                        return Err(Error::transport(uri, Some(503), "unavailable"));
                    }
                }
                return state
                    .tasks
                    .pop_front()
                    .or_else(|| state.repeat_task.clone())
                    .ok_or_else(|| Error::transport(uri, Some(404), "no task scripted"));
            }

            Err(Error::transport(uri, Some(404), "not found"))
        }

        async fn post(
            &self,
            uri: &str,
            _headers: &Headers,
            body: String,
            _options: TransportOptions,
        ) -> Result<String> {
            let mut state = self.state.lock().unwrap();
            state.submissions.push((uri.to_string(), body));

            if state.fail_submit {
                return Err(Error::transport(uri, Some(500), "internal error"));
            }
            Ok(state.submit_response.clone().unwrap_or_else(|| {
                json!({ "href": Self::TASK_HREF, "status": "queued" }).to_string()
            }))
        }
    }

    fn profile(name: &str) -> Value {
        json!({
            "name": name,
            "href": format!(
                "https://vcd.example.com/api/vdcStorageProfile/{}",
                name.to_ascii_lowercase()
            ),
        })
    }

    // Mimics the query service: `filter=vdc==<href>` scopes the records,
    // `page` is 1-based and a `nextPage` link is present while more remain.
    fn profile_page(state: &State, uri: &str) -> Result<Value> {
        let url = Url::parse(uri).map_err(|e| Error::transport(uri, Some(400), e.to_string()))?;
        let param = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| *k == *key)
                .map(|(_, v)| v.into_owned())
        };
        let vdc = param("filter").and_then(|f| f.strip_prefix("vdc==").map(str::to_string));
        let page: usize = param("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let requested: usize = param("pageSize").and_then(|p| p.parse().ok()).unwrap_or(25);
        let page_size = state.max_page_size.map_or(requested, |max| requested.min(max));

        let matching: Vec<&Value> = state
            .profiles
            .iter()
            .filter(|(owner, _)| vdc.as_deref().map_or(true, |v| v == owner.as_str()))
            .map(|(_, profile)| profile)
            .collect();
        let records: Vec<&Value> = matching
            .iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .copied()
            .collect();

        let mut links = Vec::new();
        if page * page_size < matching.len() {
            let mut next = url.clone();
            let pairs: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| *k != "page")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            next.query_pairs_mut()
                .clear()
                .extend_pairs(pairs)
                .append_pair("page", &(page + 1).to_string());
            links.push(json!({"rel": "nextPage", "href": next.as_str()}));
        }

        Ok(json!({
            "page": page,
            "pageSize": page_size,
            "total": matching.len(),
            "reference": records,
            "link": links,
        }))
    }
}
