#![allow(dead_code)]

use async_trait::async_trait;
use marktplaats_watcher::{
    Listing, ListingAlert, ListingSource, Notifier, Result, SeenSet, SeenStore, WatcherError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

pub fn ad(id: &str, title: &str) -> Value {
    json!({
        "itemId": id,
        "title": title,
        "description": "",
        "vipUrl": format!("/v/fietsen/{}", id),
        "pictures": [{ "largeUrl": format!("https://img/{}.jpg", id) }]
    })
}

pub fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

pub enum Response {
    Listings(Vec<Value>),
    HttpStatus(u16),
    Malformed,
}

/// Serves canned responses per term and records every query.
#[derive(Default)]
pub struct FakeSource {
    responses: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with(self, term: &str, response: Response) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(term.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for FakeSource {
    async fn search(&self, term: &str) -> Result<Vec<Listing>> {
        self.calls.lock().unwrap().push(term.to_string());
        let responses = self.responses.lock().unwrap();
        match responses.get(term) {
            None => Ok(Vec::new()),
            Some(Response::Listings(entries)) => entries
                .iter()
                .cloned()
                .map(Listing::from_raw)
                .collect(),
            Some(Response::HttpStatus(status)) => Err(WatcherError::InvalidResponse(format!(
                "HTTP {}: unavailable",
                status
            ))),
            Some(Response::Malformed) => {
                Err(serde_json::from_str::<Value>("<html>").unwrap_err().into())
            }
        }
    }
}

/// Records alerts; optionally rejects every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<ListingAlert>>,
    reject: bool,
    unconfigured: bool,
}

impl RecordingNotifier {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            unconfigured: true,
            ..Self::default()
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.title.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &ListingAlert) -> Result<()> {
        if self.unconfigured {
            return Err(WatcherError::MissingWebhook);
        }
        self.sent.lock().unwrap().push(alert.clone());
        if self.reject {
            return Err(WatcherError::WebhookRejected {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory store that can be told to fail on save.
#[derive(Default)]
pub struct MemoryStore {
    seen: Mutex<SeenSet>,
    saves: Mutex<usize>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn seeded(seen: SeenSet) -> Self {
        Self {
            seen: Mutex::new(seen),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> SeenSet {
        self.seen.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl SeenStore for MemoryStore {
    async fn load(&self) -> SeenSet {
        self.seen.lock().unwrap().clone()
    }

    async fn save(&self, seen: &SeenSet) -> Result<()> {
        if self.fail_saves {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
        }
        *self.seen.lock().unwrap() = seen.clone();
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}
