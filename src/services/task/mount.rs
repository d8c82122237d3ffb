//! Data pack mounting task.
//!
//! Tries mount variants in a fixed order chosen from the install's recognized
//! daemon and stops on the first success. All attempt failures collapse into a
//! single aggregate error.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::directive::AsyncDirective;
use crate::domain::error::{ClifpError, CoreError};
use crate::domain::settings::KnownDaemon;
use crate::domain::task::Stage;
use crate::services::director::Directorate;
use crate::services::mounter::{Mounter, ProxyMounter, QmpMounter, RouterMounter};
use crate::services::task::{StopToken, Task};

pub struct TMount {
    dirate: Directorate,
    stage: Stage,
    stop: StopToken,
    title_id: Uuid,
    /// Absolute pack path handed to the mount backend.
    path: String,
    daemon: Option<KnownDaemon>,
    proxy_port: u16,
    router_port: u16,
    qmp_port: u16,
    transfer_timeout: Duration,
    qmp_timeout: Duration,
}

impl TMount {
    pub const NAME: &'static str = "TMount";

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dirate: Directorate,
        stage: Stage,
        title_id: Uuid,
        path: impl Into<String>,
        daemon: Option<KnownDaemon>,
        proxy_port: u16,
        router_port: u16,
        qmp_port: u16,
        transfer_timeout: Duration,
        qmp_timeout: Duration,
    ) -> Self {
        Self {
            dirate,
            stage,
            stop: StopToken::new(),
            title_id,
            path: path.into(),
            daemon,
            proxy_port,
            router_port,
            qmp_port,
            transfer_timeout,
            qmp_timeout,
        }
    }

    fn build_mounters(&self) -> Vec<Box<dyn Mounter>> {
        let proxy = || -> Box<dyn Mounter> {
            Box::new(ProxyMounter::new(
                self.dirate.clone(),
                self.proxy_port,
                self.path.clone(),
                self.transfer_timeout,
            ))
        };
        let qmp = || -> Box<dyn Mounter> {
            let tag = self.title_id.simple().to_string();
            let short = &tag[..8];
            Box::new(QmpMounter::new(
                self.dirate.clone(),
                self.qmp_port,
                self.path.clone(),
                format!("clifp_drive_{short}"),
                format!("clifp_serial_{short}"),
                self.qmp_timeout,
            ))
        };
        let router = || -> Box<dyn Mounter> {
            Box::new(RouterMounter::new(
                self.dirate.clone(),
                self.router_port,
                self.path.clone(),
                self.transfer_timeout,
            ))
        };

        match self.daemon {
            Some(KnownDaemon::Docker | KnownDaemon::FpProxy) => vec![proxy()],
            Some(KnownDaemon::Qemu) => vec![proxy(), qmp()],
            Some(KnownDaemon::FpGameServer) => vec![router()],
            None => vec![proxy(), qmp(), router()],
        }
    }
}

#[async_trait]
impl Task for TMount {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![
            format!(".title_id = {}", self.title_id),
            format!(".path = \"{}\"", self.path),
            format!(".daemon = {:?}", self.daemon.map(|d| d.as_str())),
        ]
    }

    fn stop_token(&self) -> Option<StopToken> {
        Some(self.stop.clone())
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        self.dirate
            .log_event(&format!("Mounting Data Pack {}", self.path));
        self.dirate.post_async(AsyncDirective::ProcedureStart {
            label: "Mounting data pack".into(),
        });

        let mut failures: Vec<String> = Vec::new();
        let mut result: Result<(), ClifpError> =
            Err(CoreError::CannotObtainDatapack("no mount variant applies".into()).into());

        for mut mounter in self.build_mounters() {
            let attempt = tokio::select! {
                attempt = mounter.mount() => attempt,
                () = self.stop.triggered() => {
                    self.dirate.log_event("Stopping current mount(s)...");
                    mounter.abort();
                    Err(ClifpError::Cancelled)
                }
            };

            match attempt {
                Ok(()) => {
                    result = Ok(());
                    break;
                }
                Err(ClifpError::Cancelled) => {
                    result = Err(ClifpError::Cancelled);
                    break;
                }
                Err(e) => {
                    failures.push(format!("{}: {e}", mounter.name()));
                    result = Err(CoreError::CannotObtainDatapack(failures.join("; ")).into());
                }
            }
        }

        self.dirate.post_async(AsyncDirective::ProcedureStop);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::Verbosity;
    use crate::services::director::Director;

    fn mount_task(daemon: Option<KnownDaemon>, proxy_port: u16) -> TMount {
        let (director, _rx) = Director::new(Verbosity::Silent);
        TMount::new(
            Directorate::new(TMount::NAME, director),
            Stage::Primary,
            Uuid::parse_str("11111111-2222-3333-4444-555555555555").unwrap(),
            "/fp/Data/Games/pack.zip",
            daemon,
            proxy_port,
            1,
            1,
            Duration::from_secs(2),
            Duration::from_millis(300),
        )
    }

    #[tokio::test]
    async fn test_proxy_success_for_docker_daemon() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/fpProxy/api/mountzip")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let port = server.socket_address().port();
        mount_task(Some(KnownDaemon::Docker), port)
            .perform()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_all_variants_failing_aggregates() {
        // No servers anywhere; every variant must fail and be collected.
        let mut task = mount_task(None, 1);
        let err = task.perform().await.unwrap_err();
        match err {
            ClifpError::Core(CoreError::CannotObtainDatapack(detail)) => {
                assert!(detail.contains(ProxyMounter::NAME));
                assert!(detail.contains(QmpMounter::NAME));
                assert!(detail.contains(RouterMounter::NAME));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_qemu_daemon_falls_back_from_proxy_to_qmp() {
        // Proxy fails fast (no listener); QMP also absent, so the aggregate
        // names both attempts in order.
        let mut task = mount_task(Some(KnownDaemon::Qemu), 1);
        let err = task.perform().await.unwrap_err();
        match err {
            ClifpError::Core(CoreError::CannotObtainDatapack(detail)) => {
                let proxy_pos = detail.find(ProxyMounter::NAME).unwrap();
                let qmp_pos = detail.find(QmpMounter::NAME).unwrap();
                assert!(proxy_pos < qmp_pos);
                assert!(!detail.contains(RouterMounter::NAME));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
