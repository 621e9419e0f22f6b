#![allow(dead_code)]

use async_trait::async_trait;
use console_collections::{
    AppError, AppResult, Entity, Envelope, FieldError, ListData, ListQuery, PaginationInfo, Record, ResourceClient,
    SubResourceClient, SubResourceSource, ViewMode,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Duration;

/// In-memory stand-in for the REST backend behind one resource.
#[derive(Default)]
pub struct MemoryClient {
    records: Mutex<Vec<Record>>,
    list_queries: Mutex<Vec<ListQuery>>,
    search_latency: Mutex<HashMap<String, Duration>>,
    fail_lists: AtomicBool,
    next_id: AtomicUsize,
}

impl MemoryClient {
    pub fn seeded(count: usize) -> Self {
        let client = Self::default();
        {
            let mut records = client.records.lock().expect("records lock");
            for index in 1..=count {
                records.push(Record::new(format!("evt-{:03}", index)).with_field("name", format!("Event {}", index)));
            }
        }
        client.next_id.store(count + 1, Ordering::SeqCst);
        client
    }

    pub fn with_record(self, record: Record) -> Self {
        self.records.lock().expect("records lock").push(record);
        self
    }

    /// Delays list responses whose search term equals `search` ("" for none).
    pub fn set_search_latency(&self, search: &str, latency: Duration) {
        self.search_latency
            .lock()
            .expect("latency lock")
            .insert(search.to_string(), latency);
    }

    pub fn set_fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn list_queries(&self) -> Vec<ListQuery> {
        self.list_queries.lock().expect("queries lock").clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_queries.lock().expect("queries lock").len()
    }

    pub fn set_deleted(&self, id: &str, deleted: bool) {
        let mut records = self.records.lock().expect("records lock");
        if let Some(record) = records.iter_mut().find(|record| record.id == id) {
            record.is_deleted = deleted;
        }
    }

    /// Drops rows behind the controller's back, as another user would.
    pub fn purge(&self, ids: &[&str]) {
        self.records
            .lock()
            .expect("records lock")
            .retain(|record| !ids.contains(&record.id.as_str()));
    }

    fn matches(query: &ListQuery, record: &Record) -> bool {
        let view_ok = match query.view {
            ViewMode::Deleted => record.is_deleted,
            ViewMode::Active => query.include_deleted || !record.is_deleted,
        };
        let search_ok = match &query.search {
            Some(term) => record
                .field("name")
                .and_then(Value::as_str)
                .map(|name| name.to_lowercase().contains(&term.to_lowercase()))
                .unwrap_or(false),
            None => true,
        };
        let fields_ok = query.filters.iter().all(|(name, expected)| {
            record
                .field(name)
                .map(|value| match value {
                    Value::String(text) => text == &expected.to_string(),
                    other => other.to_string() == expected.to_string(),
                })
                .unwrap_or(false)
        });
        view_ok && search_ok && fields_ok
    }
}

#[async_trait]
impl ResourceClient<Record> for MemoryClient {
    async fn list(&self, _resource: &str, query: &ListQuery) -> AppResult<Envelope<ListData<Record>>> {
        self.list_queries.lock().expect("queries lock").push(query.clone());
        let latency = self
            .search_latency
            .lock()
            .expect("latency lock")
            .get(query.search.as_deref().unwrap_or(""))
            .copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(AppError::Network("connection refused".to_string()));
        }

        let matching: Vec<Record> = self
            .records
            .lock()
            .expect("records lock")
            .iter()
            .filter(|record| Self::matches(query, record))
            .cloned()
            .collect();
        let total_count = matching.len() as u64;
        let limit = query.limit.max(1);
        let total_pages = total_count.div_ceil(u64::from(limit)) as u32;
        let start = ((query.page.max(1) - 1) * limit) as usize;
        let items = matching.into_iter().skip(start).take(limit as usize).collect();

        Ok(Envelope::ok(ListData {
            items,
            pagination: PaginationInfo {
                current_page: query.page,
                total_pages,
                total_count,
                limit,
            },
        }))
    }

    async fn get(&self, _resource: &str, id: &str) -> AppResult<Envelope<Record>> {
        let records = self.records.lock().expect("records lock");
        Ok(match records.iter().find(|record| record.id == id) {
            Some(record) => Envelope::ok(record.clone()),
            None => Envelope::failure("NOT_FOUND", "Record not found"),
        })
    }

    async fn create(&self, _resource: &str, body: &Value) -> AppResult<Envelope<Record>> {
        let name = body.get("name").and_then(Value::as_str).unwrap_or("").trim().to_string();
        if name.is_empty() {
            return Ok(Envelope::failure("VALIDATION_ERROR", "Validation failed").with_details(vec![FieldError {
                field: "name".to_string(),
                message: "Name is required".to_string(),
            }]));
        }
        let id = format!("evt-{:03}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut record: Record = serde_json::from_value(json!({ "id": id })).expect("record");
        if let Some(fields) = body.as_object() {
            for (key, value) in fields {
                record.fields.insert(key.clone(), value.clone());
            }
        }
        record.fields.insert("name".to_string(), json!(name));
        self.records.lock().expect("records lock").insert(0, record.clone());
        Ok(Envelope::ok(record))
    }

    async fn update(&self, _resource: &str, id: &str, patch: &Value) -> AppResult<Envelope<Record>> {
        let mut records = self.records.lock().expect("records lock");
        let Some(record) = records.iter_mut().find(|record| record.id == id) else {
            return Ok(Envelope::failure("NOT_FOUND", "Record not found"));
        };
        if let Some(fields) = patch.as_object() {
            for (key, value) in fields {
                record.fields.insert(key.clone(), value.clone());
            }
        }
        // the backend normalises names and stamps a revision
        if let Some(name) = record.field("name").and_then(Value::as_str).map(|name| name.trim().to_string()) {
            record.fields.insert("name".to_string(), json!(name));
        }
        let revision = record.field("revision").and_then(Value::as_u64).unwrap_or(0) + 1;
        record.fields.insert("revision".to_string(), json!(revision));
        Ok(Envelope::ok(record.clone()))
    }

    async fn soft_delete(&self, _resource: &str, id: &str) -> AppResult<Envelope<()>> {
        Ok(self.flip(id, true))
    }

    async fn restore(&self, _resource: &str, id: &str) -> AppResult<Envelope<()>> {
        Ok(self.flip(id, false))
    }

    async fn permanent_delete(&self, _resource: &str, id: &str) -> AppResult<Envelope<()>> {
        let mut records = self.records.lock().expect("records lock");
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(if records.len() < before {
            Envelope::ok_empty()
        } else {
            Envelope::failure("NOT_FOUND", "Record not found")
        })
    }
}

impl MemoryClient {
    fn flip(&self, id: &str, deleted: bool) -> Envelope<()> {
        let mut records = self.records.lock().expect("records lock");
        match records.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.set_deleted(deleted);
                Envelope::ok_empty()
            }
            None => Envelope::failure("NOT_FOUND", "Record not found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: String,
    pub event_id: String,
    pub question: String,
}

/// Poll backend: parents listed in `with_polls` own a poll, every fetch is
/// counted per parent and takes `latency`.
pub struct PollBackend {
    polls: Mutex<HashMap<String, Poll>>,
    fetches: Mutex<HashMap<String, usize>>,
    latency: Duration,
    missing_is_not_found: bool,
}

impl PollBackend {
    pub fn new(with_polls: &[&str], latency: Duration) -> Self {
        let polls = with_polls
            .iter()
            .map(|parent| {
                (
                    parent.to_string(),
                    Poll {
                        id: format!("poll-{}", parent),
                        event_id: parent.to_string(),
                        question: format!("Favourite moment of {}?", parent),
                    },
                )
            })
            .collect();
        Self {
            polls: Mutex::new(polls),
            fetches: Mutex::new(HashMap::new()),
            latency,
            missing_is_not_found: false,
        }
    }

    /// Report parents without a poll as NOT_FOUND instead of empty data.
    pub fn missing_as_not_found(mut self) -> Self {
        self.missing_is_not_found = true;
        self
    }

    pub fn fetches_for(&self, parent_id: &str) -> usize {
        self.fetches
            .lock()
            .expect("fetches lock")
            .get(parent_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().expect("fetches lock").values().sum()
    }
}

#[async_trait]
impl SubResourceSource<Poll> for PollBackend {
    async fn fetch_by_parent(&self, parent_id: &str) -> AppResult<Envelope<Poll>> {
        *self
            .fetches
            .lock()
            .expect("fetches lock")
            .entry(parent_id.to_string())
            .or_insert(0) += 1;
        tokio::time::sleep(self.latency).await;
        let poll = self.polls.lock().expect("polls lock").get(parent_id).cloned();
        Ok(match poll {
            Some(poll) => Envelope::ok(poll),
            None if self.missing_is_not_found => Envelope::failure("NOT_FOUND", "No poll for event"),
            None => Envelope::ok_empty(),
        })
    }
}

#[async_trait]
impl SubResourceClient<Poll> for PollBackend {
    async fn create_for_parent(&self, parent_id: &str, body: &Value) -> AppResult<Envelope<Poll>> {
        let Some(question) = body.get("question").and_then(Value::as_str) else {
            return Ok(Envelope::failure("VALIDATION_ERROR", "Question is required").with_details(vec![
                FieldError {
                    field: "question".to_string(),
                    message: "Question is required".to_string(),
                },
            ]));
        };
        let poll = Poll {
            id: format!("poll-{}", parent_id),
            event_id: parent_id.to_string(),
            question: question.to_string(),
        };
        self.polls
            .lock()
            .expect("polls lock")
            .insert(parent_id.to_string(), poll.clone());
        Ok(Envelope::ok(poll))
    }

    async fn update(&self, id: &str, patch: &Value) -> AppResult<Envelope<Poll>> {
        let mut polls = self.polls.lock().expect("polls lock");
        let Some(poll) = polls.values_mut().find(|poll| poll.id == id) else {
            return Ok(Envelope::failure("NOT_FOUND", "Poll not found"));
        };
        if let Some(question) = patch.get("question").and_then(Value::as_str) {
            poll.question = question.to_string();
        }
        Ok(Envelope::ok(poll.clone()))
    }

    async fn delete(&self, id: &str) -> AppResult<Envelope<()>> {
        let mut polls = self.polls.lock().expect("polls lock");
        let before = polls.len();
        polls.retain(|_, poll| poll.id != id);
        Ok(if polls.len() < before {
            Envelope::ok_empty()
        } else {
            Envelope::failure("NOT_FOUND", "Poll not found")
        })
    }
}
