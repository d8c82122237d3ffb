//! Mount via the launcher's embedded router endpoint.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::error::{ClifpError, RouterMounterError};
use crate::services::director::Directorate;
use crate::services::mounter::Mounter;
use crate::services::task::StopToken;

pub const DEFAULT_ROUTER_PORT: u16 = 22500;
const MOUNT_SCRIPT: &str = "mount.php";

pub struct RouterMounter {
    dirate: Directorate,
    port: u16,
    mount_value: String,
    timeout: Duration,
    stop: StopToken,
}

impl RouterMounter {
    pub const NAME: &'static str = "MounterRouter";

    pub fn new(dirate: Directorate, port: u16, mount_value: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dirate,
            port,
            mount_value: mount_value.into(),
            timeout,
            stop: StopToken::new(),
        }
    }
}

#[async_trait]
impl Mounter for RouterMounter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn mount(&mut self) -> Result<(), ClifpError> {
        self.dirate.log_event("Mounting data pack via router...");

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RouterMounterError::Failed(e.to_string()))?;

        let url = format!(
            "http://127.0.0.1:{}/{}?file={}",
            self.port, MOUNT_SCRIPT, self.mount_value
        );
        self.dirate.log_event(&format!("Sent request (GET): {url}"));

        let request = client.get(&url).send();
        let response = tokio::select! {
            response = request => {
                response.map_err(|e| RouterMounterError::Failed(e.to_string()))?
            }
            () = self.stop.triggered() => return Err(ClifpError::Cancelled),
        };

        if !response.status().is_success() {
            return Err(
                RouterMounterError::Failed(format!("server responded {}", response.status()))
                    .into(),
            );
        }

        let text = response.text().await.unwrap_or_default();
        self.dirate
            .log_event(&format!("Mount.php Response: \"{text}\""));
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

    fn router_for(port: u16) -> RouterMounter {
        let (director, _rx) = Director::new(Verbosity::Silent);
        RouterMounter::new(
            Directorate::new(RouterMounter::NAME, director),
            port,
            "pack.zip",
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_mount_hits_router_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/mount.php?file=pack.zip")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let port = server.socket_address().port();
        router_for(port).mount().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_router_failure_surfaces_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mount.php?file=pack.zip")
            .with_status(500)
            .create_async()
            .await;

        let port = server.socket_address().port();
        let err = router_for(port).mount().await.unwrap_err();
        assert!(matches!(
            err,
            ClifpError::RouterMounter(RouterMounterError::Failed(_))
        ));
    }
}
