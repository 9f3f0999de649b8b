pub mod ingest;
pub mod notify;
pub mod response;
