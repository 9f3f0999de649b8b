use fleet_telemetry_core::alert::AlertMessage;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Transport(String),

    #[error("webhook responded with {status} {reason}")]
    Status { status: u16, reason: String },
}

pub trait AlertNotifier {
    fn post_alert(&self, webhook_url: &str, message: &AlertMessage) -> Result<(), NotifyError>;
}
