use fleet_telemetry_core::error::StoreError;
use fleet_telemetry_core::record::ClientRecord;

pub trait ClientDirectory {
    fn get_client(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError>;
}
