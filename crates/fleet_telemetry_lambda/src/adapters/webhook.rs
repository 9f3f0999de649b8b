use fleet_telemetry_core::alert::AlertMessage;

use crate::adapters::block_on;
use crate::adapters::notifier::{AlertNotifier, NotifyError};

/// Posts alert payloads to Discord-compatible webhooks.
#[derive(Debug, Clone)]
pub struct ReqwestWebhookNotifier {
    client: reqwest::Client,
}

impl ReqwestWebhookNotifier {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl AlertNotifier for ReqwestWebhookNotifier {
    fn post_alert(&self, webhook_url: &str, message: &AlertMessage) -> Result<(), NotifyError> {
        let response = block_on(self.client.post(webhook_url).json(message).send())
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    fn alert() -> AlertMessage {
        AlertMessage {
            content: "speeding".to_string(),
        }
    }

    /// Serves one request with `status_line` and hands back the JSON body it
    /// received.
    async fn serve_once(status_line: &'static str) -> (String, JoinHandle<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind webhook listener");
        let url = format!("http://{}/hook", listener.local_addr().expect("local addr"));

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept webhook call");
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            let body = loop {
                let read = socket.read(&mut chunk).await.expect("read request");
                assert!(read > 0, "connection closed before the body arrived");
                request.extend_from_slice(&chunk[..read]);
                if let Some(body) = complete_body(&request) {
                    break body;
                }
            };

            let response =
                format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            serde_json::from_slice(&body).expect("request body should be JSON")
        });

        (url, server)
    }

    fn complete_body(request: &[u8]) -> Option<Vec<u8>> {
        let header_end = request.windows(4).position(|window| window == b"\r\n\r\n")? + 4;
        let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0);
        let body = &request[header_end..];
        (body.len() >= length).then(|| body[..length].to_vec())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn success_status_delivers_the_alert_as_json() {
        let (url, server) = serve_once("204 No Content").await;
        let notifier = ReqwestWebhookNotifier::new(reqwest::Client::new());

        assert_eq!(notifier.post_alert(&url, &alert()), Ok(()));
        let body = server.await.expect("server task");
        assert_eq!(body, json!({"content": "speeding"}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_status_is_reported() {
        let (url, server) = serve_once("500 Internal Server Error").await;
        let notifier = ReqwestWebhookNotifier::new(reqwest::Client::new());

        let error = notifier
            .post_alert(&url, &alert())
            .expect_err("500 should fail");
        assert_eq!(
            error,
            NotifyError::Status {
                status: 500,
                reason: "Internal Server Error".to_string(),
            }
        );
        server.await.expect("server task");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_webhook_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind webhook listener");
        let url = format!("http://{}/hook", listener.local_addr().expect("local addr"));
        drop(listener);

        let notifier = ReqwestWebhookNotifier::new(reqwest::Client::new());
        let error = notifier
            .post_alert(&url, &alert())
            .expect_err("closed port should fail");
        assert!(matches!(error, NotifyError::Transport(_)), "{error:?}");
    }
}
