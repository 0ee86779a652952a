//! Scripted registry transport for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use drugmatch::cache::RegistryCache;
use drugmatch::config::Settings;
use drugmatch::registry::{Transport, TransportError};
use drugmatch::Pipeline;
use drugmatch_common::LocalNameDictionary;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OPENFDA: &str = "http://fda.test";
pub const MFDS_DETAIL: &str = "http://mfds.test/detail";
pub const MFDS_LIST: &str = "http://mfds.test/list";

type Route = Box<dyn Fn(&str, &[(String, String)]) -> Result<Value, TransportError> + Send + Sync>;

/// One recorded request
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Answers every request through `route` and keeps a log
pub struct FakeTransport {
    route: Route,
    requests: Mutex<Vec<Request>>,
    delay: Duration,
}

impl FakeTransport {
    pub fn new<F>(route: F) -> Arc<Self>
    where
        F: Fn(&str, &[(String, String)]) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Self::with_delay(Duration::ZERO, route)
    }

    /// Every request waits `delay` before `route` answers it
    pub fn with_delay<F>(delay: Duration, route: F) -> Arc<Self>
    where
        F: Fn(&str, &[(String, String)]) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            route: Box::new(route),
            requests: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose URL contains `fragment`
    pub fn calls_to(&self, fragment: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(fragment))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
        let query: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let response = (self.route)(url, &query);
        self.requests.lock().unwrap().push(Request {
            url: url.to_string(),
            query,
        });
        response
    }
}

pub fn param<'a>(query: &'a [(String, String)], name: &str) -> &'a str {
    query
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

pub fn settings() -> Settings {
    Settings {
        openfda_base_url: OPENFDA.into(),
        mfds_detail_url: MFDS_DETAIL.into(),
        mfds_list_url: MFDS_LIST.into(),
        mfds_service_key: "test-key".into(),
        ..Default::default()
    }
    .without_delays()
}

pub fn pipeline(transport: Arc<FakeTransport>) -> Pipeline {
    Pipeline::new(
        settings(),
        transport,
        Arc::new(LocalNameDictionary::builtin()),
        Arc::new(RegistryCache::new()),
    )
}

/// label.json with one result
pub fn label(brand: &str, generic: &str, active: &str) -> Value {
    json!({
        "results": [{
            "openfda": {
                "brand_name": [brand],
                "generic_name": [generic],
                "application_number": ["NDA000001"]
            },
            "active_ingredient": [active]
        }]
    })
}

/// openFDA's answer for a search without matches
pub fn no_match() -> Result<Value, TransportError> {
    Err(TransportError::Status(404))
}

/// Detail item: (item code, name, form, original?)
pub fn detail_item(code: &str, name: &str, form: &str, original: bool) -> Value {
    json!({
        "ITEM_SEQ": code,
        "ITEM_NAME": name,
        "ENTP_NAME": "제약",
        "FORM_CODE_NAME": form,
        "NEWDRUG_CLASS_NAME": if original { "신약" } else { "" },
        "CANCEL_DATE": null,
        "CANCEL_NAME": "정상",
        "MAIN_ITEM_INGR": ""
    })
}

pub fn envelope(total: usize, items: Vec<Value>) -> Value {
    json!({
        "response": {
            "header": { "resultCode": "00", "resultMsg": "NORMAL SERVICE." },
            "body": { "totalCount": total, "items": { "item": items } }
        }
    })
}

pub fn empty_envelope() -> Value {
    envelope(0, Vec::new())
}
