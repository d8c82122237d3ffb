//! Mount via the local proxy server's HTTP API.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::domain::error::{ClifpError, ProxyMounterError};
use crate::services::director::Directorate;
use crate::services::mounter::Mounter;
use crate::services::task::StopToken;

pub const DEFAULT_PROXY_PORT: u16 = 22501;
const MOUNT_ENDPOINT: &str = "fpProxy/api/mountzip";

pub struct ProxyMounter {
    dirate: Directorate,
    port: u16,
    file_path: String,
    timeout: Duration,
    stop: StopToken,
}

impl ProxyMounter {
    pub const NAME: &'static str = "MounterProxy";

    pub fn new(dirate: Directorate, port: u16, file_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dirate,
            port,
            file_path: file_path.into(),
            timeout,
            stop: StopToken::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}/{}", self.port, MOUNT_ENDPOINT)
    }
}

#[async_trait]
impl Mounter for ProxyMounter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn mount(&mut self) -> Result<(), ClifpError> {
        self.dirate
            .log_event("Mounting data pack via proxy server...");

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProxyMounterError::ProxyMount(e.to_string()))?;

        let url = self.endpoint();
        let body = json!({ "filePath": self.file_path });
        self.dirate
            .log_event(&format!("Sent HTTP request POST {url} with {body}"));

        let request = client.post(&url).json(&body).send();

        let response = tokio::select! {
            response = request => {
                response.map_err(|e| ProxyMounterError::ProxyMount(e.to_string()))?
            }
            () = self.stop.triggered() => return Err(ClifpError::Cancelled),
        };

        if !response.status().is_success() {
            return Err(
                ProxyMounterError::ProxyMount(format!("server responded {}", response.status()))
                    .into(),
            );
        }

        let text = response.text().await.unwrap_or_default();
        self.dirate
            .log_event(&format!("Proxy Response: \"{text}\""));
        Ok(())
    }

    fn abort(&self) {
        self.stop.request();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::Verbosity;
    use crate::services::director::Director;

    fn proxy_for(port: u16) -> ProxyMounter {
        let (director, _rx) = Director::new(Verbosity::Silent);
        ProxyMounter::new(
            Directorate::new(ProxyMounter::NAME, director),
            port,
            "/fp/Data/Games/pack.zip",
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_mount_posts_file_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/fpProxy/api/mountzip")
            .match_body(mockito::Matcher::Json(
                json!({ "filePath": "/fp/Data/Games/pack.zip" }),
            ))
            .with_status(200)
            .with_body("mounted")
            .create_async()
            .await;

        let port = server.socket_address().port();
        proxy_for(port).mount().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_mount_failure_surfaces_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/fpProxy/api/mountzip")
            .with_status(500)
            .create_async()
            .await;

        let port = server.socket_address().port();
        let err = proxy_for(port).mount().await.unwrap_err();
        assert!(matches!(
            err,
            ClifpError::ProxyMounter(ProxyMounterError::ProxyMount(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_proxy_fails() {
        // Port 1 is never a proxy.
        let err = proxy_for(1).mount().await.unwrap_err();
        assert!(matches!(err, ClifpError::ProxyMounter(_)));
    }
}
