//! In-memory stores and a scripted transport for engine tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoffice_common::{AppError, AppResult, PageRequest};
use backoffice_db::entities::webhook::{self, HttpMethod};
use backoffice_db::entities::webhook_execution;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::time::Instant;

use super::dispatch_client::{DispatchClient, DispatchResponse, OutboundRequest, TransportError};
use super::webhook_store::{ExecutionHistoryStore, ExecutionStats, SubscriptionStore};

pub fn subscription(id: &str, event_code: &str, url: &str, is_active: bool) -> webhook::Model {
    webhook::Model {
        id: id.to_string(),
        event_code: event_code.to_string(),
        url: url.to_string(),
        method: HttpMethod::Post,
        headers: json!([]),
        is_active,
        created_by: "admin".to_string(),
        created_at: Utc::now().into(),
        updated_by: None,
        updated_at: None,
    }
}

#[derive(Default)]
pub struct InMemorySubscriptions {
    rows: Mutex<Vec<webhook::Model>>,
}

impl InMemorySubscriptions {
    pub fn with(rows: Vec<webhook::Model>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptions {
    async fn find_active_by_event_code(&self, event_code: &str) -> AppResult<Vec<webhook::Model>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.is_active && w.event_code == event_code)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<webhook::Model>> {
        Ok(self.rows.lock().unwrap().iter().find(|w| w.id == id).cloned())
    }

    async fn exists_duplicate(
        &self,
        event_code: &str,
        url: &str,
        exclude_id: Option<&str>,
    ) -> AppResult<bool> {
        Ok(self.rows.lock().unwrap().iter().any(|w| {
            w.is_active && w.event_code == event_code && w.url == url && Some(w.id.as_str()) != exclude_id
        }))
    }
}

#[derive(Default)]
pub struct InMemoryHistory {
    rows: Mutex<Vec<webhook_execution::Model>>,
    failing: AtomicBool,
}

impl InMemoryHistory {
    /// Make every following append fail.
    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn records_for(&self, webhook_id: &str) -> Vec<webhook_execution::Model> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.webhook_id == webhook_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionHistoryStore for InMemoryHistory {
    async fn append(&self, record: webhook_execution::Model) -> AppResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::HistoryWrite("storage offline".to_string()));
        }
        let id = record.id.clone();
        self.rows.lock().unwrap().push(record);
        Ok(id)
    }

    async fn find_by_webhook_id(
        &self,
        webhook_id: &str,
        page: PageRequest,
    ) -> AppResult<(Vec<webhook_execution::Model>, u64)> {
        let mut rows = self.records_for(webhook_id);
        rows.sort_by(|a, b| b.executed_at.cmp(&a.executed_at).then(b.id.cmp(&a.id)));
        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size() as usize)
            .collect();
        Ok((items, total))
    }

    async fn stats(&self, webhook_id: &str, from: DateTime<Utc>) -> AppResult<ExecutionStats> {
        let rows = self.records_for(webhook_id);
        let window: Vec<_> = rows.iter().filter(|r| r.executed_at >= from).collect();
        Ok(ExecutionStats {
            total: window.len() as u64,
            successful: window.iter().filter(|r| r.success).count() as u64,
        })
    }

    async fn find_last(&self, webhook_id: &str) -> AppResult<Option<webhook_execution::Model>> {
        Ok(self
            .records_for(webhook_id)
            .into_iter()
            .max_by(|a, b| a.executed_at.cmp(&b.executed_at).then(a.id.cmp(&b.id))))
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.executed_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16),
    Transport(TransportError),
}

/// Replays a fixed script per URL; the last reply repeats forever.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call takes `latency` of (paused) tokio time.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn script(self, url: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
        self
    }

    pub fn calls_to(&self, url: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        let Some(queue) = scripts.get_mut(url) else {
            return Reply::Status(200);
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or(Reply::Status(200))
        }
    }
}

#[async_trait]
impl DispatchClient for ScriptedClient {
    async fn send(
        &self,
        request: &OutboundRequest,
        _timeout: Duration,
    ) -> Result<DispatchResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.url.clone(), Instant::now()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.next_reply(&request.url) {
            Reply::Status(status_code) => Ok(DispatchResponse {
                status_code,
                body: format!("status {status_code}"),
                elapsed: self.latency,
            }),
            Reply::Transport(err) => Err(err),
        }
    }
}
