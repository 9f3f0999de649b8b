use fleet_telemetry_core::error::StoreError;
use fleet_telemetry_core::page::{Page, PageRequest};
use fleet_telemetry_core::record::{TelemetryRecord, TelemetryUpdate};

/// Persistence contract for the telemetry table, keyed by `vanID`.
///
/// Every call is a single-item or single-page operation. Full-table reads
/// go through [`ScanPages`] so no implementation ever materializes the
/// whole table at once.
pub trait TelemetryStore {
    /// Writes the record verbatim, replacing any existing row.
    fn put_record(&self, record: &TelemetryRecord) -> Result<(), StoreError>;

    /// Applies the assignments and returns the full row afterwards. Fails
    /// with [`StoreError::ClientMismatch`] when the row belongs to another
    /// client.
    fn update_record(&self, update: &TelemetryUpdate) -> Result<TelemetryRecord, StoreError>;

    fn get_record(&self, van_id: &str) -> Result<Option<TelemetryRecord>, StoreError>;

    fn scan_page(&self, request: &PageRequest) -> Result<Page<TelemetryRecord>, StoreError>;
}

/// Iterator over consecutive scan pages. Stops after the first error.
pub struct ScanPages<'a> {
    store: &'a dyn TelemetryStore,
    next: Option<PageRequest>,
}

impl<'a> ScanPages<'a> {
    pub fn new(store: &'a dyn TelemetryStore, page_size: usize) -> Self {
        Self {
            store,
            next: Some(PageRequest::first(page_size)),
        }
    }
}

impl Iterator for ScanPages<'_> {
    type Item = Result<Page<TelemetryRecord>, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let request = self.next.take()?;
        let page = match self.store.scan_page(&request) {
            Ok(page) => page,
            Err(error) => return Some(Err(error)),
        };

        self.next = page.next_cursor.clone().map(|cursor| PageRequest {
            limit: request.limit,
            cursor: Some(cursor),
        });
        Some(Ok(page))
    }
}
