//! Mount via a QMP session against the bundled emulator.
//!
//! The session handshakes capabilities, then issues a `blockdev-add` and
//! `device_add` pair carrying a generated drive id and serial. QMP is
//! newline-delimited JSON; asynchronous event lines are skipped while waiting
//! for command acknowledgements.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::domain::error::{ClifpError, QmpMounterError};
use crate::services::director::Directorate;
use crate::services::mounter::Mounter;
use crate::services::task::StopToken;

pub const DEFAULT_QMP_PORT: u16 = 22501;

pub struct QmpMounter {
    dirate: Directorate,
    port: u16,
    file_path: String,
    drive_id: String,
    drive_serial: String,
    command_timeout: Duration,
    stop: StopToken,
}

struct QmpSession {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    command_timeout: Duration,
}

impl QmpSession {
    async fn read_json(&mut self) -> Result<Value, QmpMounterError> {
        loop {
            let line = timeout(self.command_timeout, self.reader.next_line())
                .await
                .map_err(|_| QmpMounterError::Communication("response timeout".into()))?
                .map_err(|e| QmpMounterError::Communication(e.to_string()))?
                .ok_or_else(|| QmpMounterError::Communication("connection closed".into()))?;

            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&line)
                .map_err(|e| QmpMounterError::Communication(e.to_string()))?;

            // Interleaved events are not command responses.
            if value.get("event").is_some() {
                continue;
            }
            return Ok(value);
        }
    }

    async fn execute(&mut self, command: &str, arguments: Option<Value>) -> Result<Value, QmpMounterError> {
        let mut message = json!({ "execute": command });
        if let Some(args) = arguments {
            message["arguments"] = args;
        }
        let mut line = message.to_string();
        line.push('\n');

        timeout(self.command_timeout, self.writer.write_all(line.as_bytes()))
            .await
            .map_err(|_| QmpMounterError::Communication("send timeout".into()))?
            .map_err(|e| QmpMounterError::Communication(e.to_string()))?;

        let response = self.read_json().await?;
        if let Some(error) = response.get("error") {
            let class = error.get("class").and_then(Value::as_str).unwrap_or("?");
            let desc = error.get("desc").and_then(Value::as_str).unwrap_or("?");
            return Err(QmpMounterError::Command(format!(
                "Command {command} - [{class}] \"{desc}\""
            )));
        }
        Ok(response)
    }
}

impl QmpMounter {
    pub const NAME: &'static str = "MounterQmp";

    pub fn new(
        dirate: Directorate,
        port: u16,
        file_path: impl Into<String>,
        drive_id: impl Into<String>,
        drive_serial: impl Into<String>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            dirate,
            port,
            file_path: file_path.into(),
            drive_id: drive_id.into(),
            drive_serial: drive_serial.into(),
            command_timeout,
            stop: StopToken::new(),
        }
    }

    async fn connect(&self) -> Result<QmpSession, QmpMounterError> {
        let stream = timeout(
            self.command_timeout,
            TcpStream::connect(("127.0.0.1", self.port)),
        )
        .await
        .map_err(|_| QmpMounterError::Connection("connect timeout".into()))?
        .map_err(|e| QmpMounterError::Connection(e.to_string()))?;

        let (read_half, writer) = stream.into_split();
        let mut session = QmpSession {
            reader: BufReader::new(read_half).lines(),
            writer,
            command_timeout: self.command_timeout,
        };

        let greeting = session.read_json().await?;
        let version = greeting
            .pointer("/QMP/version/qemu")
            .map_or_else(|| "unknown".to_string(), Value::to_string);
        self.dirate
            .log_event(&format!("QMP connected to QEMU version: {version}"));

        session.execute("qmp_capabilities", None).await?;
        Ok(session)
    }

    async fn run_mount(&self) -> Result<(), ClifpError> {
        self.dirate.log_event("Connecting to FP QEMU instance...");
        let mut session = self.connect().await?;

        self.dirate.log_event(&format!(
            "Mount Info: {{.filePath = \"{}\", .driveId = \"{}\", .driveSerial = \"{}\"}}",
            self.file_path, self.drive_id, self.drive_serial
        ));
        self.dirate
            .log_event("Creating data pack mount point on QEMU instance...");

        session
            .execute(
                "blockdev-add",
                Some(json!({
                    "node-name": self.drive_id,
                    "driver": "raw",
                    "read-only": true,
                    "file": { "driver": "file", "filename": self.file_path }
                })),
            )
            .await?;

        session
            .execute(
                "device_add",
                Some(json!({
                    "driver": "virtio-blk-pci",
                    "drive": self.drive_id,
                    "id": self.drive_id,
                    "serial": self.drive_serial
                })),
            )
            .await?;

        self.dirate
            .log_event("Disconnecting from FP QEMU instance...");
        Ok(())
    }
}

#[async_trait]
impl Mounter for QmpMounter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn mount(&mut self) -> Result<(), ClifpError> {
        tokio::select! {
            result = self.run_mount() => result,
            () = self.stop.triggered() => Err(ClifpError::Cancelled),
        }
    }

    fn abort(&self) {
        self.stop.request();
    }
}
