//! In-memory adapters for handler tests and local runs.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use fleet_telemetry_core::error::StoreError;
use fleet_telemetry_core::page::{Page, PageRequest};
use fleet_telemetry_core::record::{ClientRecord, TelemetryRecord, TelemetryUpdate};

use crate::adapters::client_directory::ClientDirectory;
use crate::adapters::telemetry_store::TelemetryStore;

#[derive(Debug, Default)]
pub struct InMemoryTelemetryStore {
    rows: Mutex<BTreeMap<String, TelemetryRecord>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryTelemetryStore {
    /// Makes every following call fail with a backend error.
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.into());
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        let failure = self.failure.lock().map_err(|_| poisoned())?;
        match failure.as_ref() {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

impl TelemetryStore for InMemoryTelemetryStore {
    fn put_record(&self, record: &TelemetryRecord) -> Result<(), StoreError> {
        self.check_failure()?;
        let van_id = record
            .van_id()
            .ok_or_else(|| StoreError::Backend("record is missing its vanID key".to_string()))?;
        self.rows
            .lock()
            .map_err(|_| poisoned())?
            .insert(van_id.to_string(), record.clone());
        Ok(())
    }

    fn update_record(&self, update: &TelemetryUpdate) -> Result<TelemetryRecord, StoreError> {
        self.check_failure()?;
        let mut rows = self.rows.lock().map_err(|_| poisoned())?;
        let row = rows.entry(update.van_id.clone()).or_default();

        if row
            .client_id()
            .is_some_and(|client_id| client_id != update.client_id)
        {
            return Err(StoreError::ClientMismatch {
                van_id: update.van_id.clone(),
            });
        }

        row.apply(update);
        Ok(row.clone())
    }

    fn get_record(&self, van_id: &str) -> Result<Option<TelemetryRecord>, StoreError> {
        self.check_failure()?;
        Ok(self
            .rows
            .lock()
            .map_err(|_| poisoned())?
            .get(van_id)
            .cloned())
    }

    fn scan_page(&self, request: &PageRequest) -> Result<Page<TelemetryRecord>, StoreError> {
        self.check_failure()?;
        let rows = self.rows.lock().map_err(|_| poisoned())?;
        let lower = match request.cursor.as_deref() {
            Some(cursor) => Bound::Excluded(cursor),
            None => Bound::Unbounded,
        };

        let mut remaining = rows.range::<str, _>((lower, Bound::Unbounded));
        let items: Vec<TelemetryRecord> = remaining
            .by_ref()
            .take(request.limit)
            .map(|(_, record)| record.clone())
            .collect();
        let next_cursor = match remaining.next() {
            Some(_) => items
                .last()
                .and_then(TelemetryRecord::van_id)
                .map(str::to_string),
            None => None,
        };

        Ok(Page { items, next_cursor })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryClientDirectory {
    clients: BTreeMap<String, ClientRecord>,
    unreachable: Vec<String>,
    lookups: Mutex<Vec<String>>,
}

impl InMemoryClientDirectory {
    pub fn with_client(mut self, client_id: &str, discord_webhook: Option<&str>) -> Self {
        self.clients.insert(
            client_id.to_string(),
            ClientRecord {
                client_id: client_id.to_string(),
                discord_webhook: discord_webhook.map(str::to_string),
            },
        );
        self
    }

    /// Lookups for this client fail with a backend error.
    pub fn with_unreachable_client(mut self, client_id: &str) -> Self {
        self.unreachable.push(client_id.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .map(|lookups| lookups.clone())
            .unwrap_or_default()
    }
}

impl ClientDirectory for InMemoryClientDirectory {
    fn get_client(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError> {
        self.lookups
            .lock()
            .map_err(|_| poisoned())?
            .push(client_id.to_string());
        if self.unreachable.iter().any(|id| id == client_id) {
            return Err(StoreError::Backend(format!(
                "client table unavailable for {client_id}"
            )));
        }
        Ok(self.clients.get(client_id).cloned())
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}
