//! Thread-safe in-memory connector.
//!
//! Stands in for a real backend in tests and demos. Records are plain JSON
//! objects keyed by an id field, kept in insertion order per resource type.
//!
//! ```rust
//! use scim_adapter::connector::{Connector, InMemoryConnector, PageRequest};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hr = InMemoryConnector::new("hr")
//!     .with_id_field("uid")
//!     .with_unique_field("User", "login");
//!
//! let created = hr.create("User", json!({ "login": "bjensen" })).await?;
//! let uid = created["uid"].as_str().unwrap_or_default().to_string();
//! assert_eq!(hr.get("User", &uid).await?["login"], "bjensen");
//!
//! let page = hr.list("User", None, PageRequest { start_index: 1, count: 10 }).await?;
//! assert_eq!(page.records.len(), 1);
//! # Ok(())
//! # }
//! ```

use super::{Connector, ConnectorCapabilities, ConnectorError, ConnectorResult, ListPage, PageRequest};
use crate::filter::{FilterEvaluator, FilterNode};

use async_trait::async_trait;
use log::{debug, trace};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory backend.
///
/// By default it neither filters nor pages natively, so the dispatcher
/// does both; [`InMemoryConnector::with_capabilities`] turns them on.
pub struct InMemoryConnector {
    name: String,
    id_field: String,
    capabilities: ConnectorCapabilities,
    // resource type -> records in insertion order
    data: RwLock<HashMap<String, Vec<Value>>>,
    // resource type -> fields that must be unique
    unique_fields: HashMap<String, Vec<String>>,
    latency: Option<Duration>,
    read_only: bool,
    available: AtomicBool,
}

impl InMemoryConnector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: "id".to_string(),
            capabilities: ConnectorCapabilities::default(),
            data: RwLock::new(HashMap::new()),
            unique_fields: HashMap::new(),
            latency: None,
            read_only: false,
            available: AtomicBool::new(true),
        }
    }

    /// Backend field holding record ids (default `id`).
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: ConnectorCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Reject creates and replaces that would duplicate `field` (compared
    /// case-insensitively for strings).
    pub fn with_unique_field(mut self, resource_type: impl Into<String>, field: impl Into<String>) -> Self {
        self.unique_fields
            .entry(resource_type.into())
            .or_default()
            .push(field.into());
        self
    }

    /// Seed records. Records without an id get a generated one.
    pub fn with_records(mut self, resource_type: impl Into<String>, records: Vec<Value>) -> Self {
        let id_field = self.id_field.clone();
        let stored = self.data.get_mut().entry(resource_type.into()).or_default();
        for mut record in records {
            assign_id(&mut record, &id_field);
            stored.push(record);
        }
        self
    }

    /// Delay every operation, e.g. to exercise timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Writes fail with [`ConnectorError::Unsupported`].
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Simulate an outage: while unavailable every operation fails with
    /// [`ConnectorError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self, resource_type: &str) -> usize {
        self.data
            .read()
            .await
            .get(resource_type)
            .map_or(0, Vec::len)
    }

    pub async fn clear(&self) {
        self.data.write().await.clear();
    }

    async fn enter(&self, operation: &str, resource_type: &str) -> ConnectorResult<()> {
        trace!("{} {} on in-memory connector '{}'", operation, resource_type, self.name);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(ConnectorError::Unavailable {
                message: format!("connector '{}' is offline", self.name),
            });
        }
        Ok(())
    }

    fn check_writable(&self, operation: &str) -> ConnectorResult<()> {
        if self.read_only {
            return Err(ConnectorError::unsupported(operation));
        }
        Ok(())
    }

    fn record_id<'a>(&self, record: &'a Value) -> Option<&'a str> {
        record.get(&self.id_field).and_then(Value::as_str)
    }

    fn check_unique(
        &self,
        resource_type: &str,
        records: &[Value],
        candidate: &Value,
        except_id: Option<&str>,
    ) -> ConnectorResult<()> {
        let Some(fields) = self.unique_fields.get(resource_type) else {
            return Ok(());
        };
        for field in fields {
            let Some(value) = candidate.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = records
                .iter()
                .filter(|record| except_id.is_none_or(|id| self.record_id(record) != Some(id)))
                .any(|record| record.get(field).is_some_and(|other| same_value(other, value)));
            if clash {
                return Err(ConnectorError::Conflict {
                    message: format!("{} with {} {} already exists", resource_type, field, value),
                });
            }
        }
        Ok(())
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        _ => a == b,
    }
}

fn assign_id(record: &mut Value, id_field: &str) {
    if let Some(obj) = record.as_object_mut() {
        if !obj.get(id_field).is_some_and(Value::is_string) {
            obj.insert(id_field.to_string(), Value::String(Uuid::new_v4().to_string()));
        }
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        self.capabilities
    }

    async fn list(
        &self,
        resource_type: &str,
        filter: Option<&FilterNode>,
        page: PageRequest,
    ) -> ConnectorResult<ListPage> {
        self.enter("list", resource_type).await?;
        let data = self.data.read().await;
        let records = data.get(resource_type).map(Vec::as_slice).unwrap_or_default();

        let evaluator = FilterEvaluator::new();
        let matching: Vec<Value> = match filter.filter(|_| self.capabilities.filtering) {
            Some(filter) => records
                .iter()
                .filter(|record| evaluator.matches(filter, record))
                .cloned()
                .collect(),
            None => records.to_vec(),
        };

        if !self.capabilities.pagination {
            return Ok(ListPage::complete(matching));
        }

        let total = matching.len();
        let records = matching
            .into_iter()
            .skip(page.offset())
            .take(page.count)
            .collect();
        Ok(ListPage {
            records,
            total_results: Some(total),
            paged: true,
        })
    }

    async fn get(&self, resource_type: &str, id: &str) -> ConnectorResult<Value> {
        self.enter("get", resource_type).await?;
        self.data
            .read()
            .await
            .get(resource_type)
            .and_then(|records| records.iter().find(|r| self.record_id(r) == Some(id)))
            .cloned()
            .ok_or_else(|| ConnectorError::not_found(id))
    }

    async fn create(&self, resource_type: &str, mut record: Value) -> ConnectorResult<Value> {
        self.enter("create", resource_type).await?;
        self.check_writable("create")?;
        if !record.is_object() {
            return Err(ConnectorError::Backend {
                message: "record must be a JSON object".to_string(),
            });
        }

        let mut data = self.data.write().await;
        let records = data.entry(resource_type.to_string()).or_default();
        assign_id(&mut record, &self.id_field);
        let id = self.record_id(&record).unwrap_or_default().to_string();
        if records.iter().any(|r| self.record_id(r) == Some(id.as_str())) {
            return Err(ConnectorError::Conflict {
                message: format!("{} '{}' already exists", resource_type, id),
            });
        }
        self.check_unique(resource_type, records, &record, None)?;

        debug!("Connector '{}' created {} {}", self.name, resource_type, id);
        records.push(record.clone());
        Ok(record)
    }

    async fn replace(&self, resource_type: &str, id: &str, mut record: Value) -> ConnectorResult<Value> {
        self.enter("replace", resource_type).await?;
        self.check_writable("replace")?;
        let Some(obj) = record.as_object_mut() else {
            return Err(ConnectorError::Backend {
                message: "record must be a JSON object".to_string(),
            });
        };
        obj.insert(self.id_field.clone(), Value::String(id.to_string()));

        let mut data = self.data.write().await;
        let records = data
            .get_mut(resource_type)
            .ok_or_else(|| ConnectorError::not_found(id))?;
        let index = records
            .iter()
            .position(|r| self.record_id(r) == Some(id))
            .ok_or_else(|| ConnectorError::not_found(id))?;
        self.check_unique(resource_type, records, &record, Some(id))?;

        records[index] = record.clone();
        Ok(record)
    }

    async fn delete(&self, resource_type: &str, id: &str) -> ConnectorResult<()> {
        self.enter("delete", resource_type).await?;
        self.check_writable("delete")?;
        let mut data = self.data.write().await;
        let records = data
            .get_mut(resource_type)
            .ok_or_else(|| ConnectorError::not_found(id))?;
        let before = records.len();
        records.retain(|r| self.record_id(r) != Some(id));
        if records.len() == before {
            return Err(ConnectorError::not_found(id));
        }
        Ok(())
    }
}
