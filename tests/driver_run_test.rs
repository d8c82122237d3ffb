//! End-to-end runs through the driver: cancellation, shutdown guarantees, and
//! exit codes.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use clifp::cli::commands;
use clifp::cli::types::{CommandArgs, PlayArgs, TitleArgs};
use clifp::domain::config::ClifpConfig;
use clifp::domain::directive::{AsyncDirective, Verbosity};
use clifp::services::director::{Directive, Director};
use clifp::services::driver::{ControlRequest, Driver};

use common::{build_install, FixtureOptions, GAME_ID};

fn unique_lock_id(tag: &str) -> String {
    format!("clifp-e2e-{tag}-{}", std::process::id())
}

#[tokio::test]
async fn test_quit_mid_download_cancels_and_still_shuts_down() {
    // Endpoint that trickles bytes so the quit lands mid-transfer.
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/Games/fixture-pack.zip")
        .with_status(200)
        .with_chunked_body(|writer| {
            for _ in 0..200 {
                writer.write_all(&[0u8; 512])?;
                std::thread::sleep(Duration::from_millis(25));
            }
            Ok(())
        })
        .create_async()
        .await;

    let fixture = build_install(FixtureOptions {
        data_source_url: format!("{}/Games", server.url()),
        start_server: false,
        shutdown_marker: true,
    })
    .await;

    let (director, mut rx) = Director::new(Verbosity::Full);
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let driver = Driver::new(Arc::clone(&director), ClifpConfig::default(), control_rx)
        .with_install_root(fixture.root.clone())
        .with_instance_id(unique_lock_id("quit"));
    drop(director);

    let command = commands::acquire(CommandArgs::Play(PlayArgs {
        url: Some(format!("flashpoint://{GAME_ID}")),
        ..PlayArgs::default()
    }));
    let worker = tokio::spawn(driver.drive(command));

    // Frontend: quit as soon as download progress is visible.
    let mut quit_sent = false;
    while let Some(directive) = rx.recv().await {
        match directive {
            Directive::Async {
                payload: AsyncDirective::ProcedureProgress { .. },
                ..
            } if !quit_sent => {
                control_tx.send(ControlRequest::Quit).unwrap();
                quit_sent = true;
            }
            Directive::Sync { ack, .. } => {
                let _ = ack.send(());
            }
            Directive::Request { payload, reply, .. } => {
                let _ = reply.send(payload.default_response());
            }
            _ => {}
        }
    }

    let code = worker.await.unwrap();
    assert!(quit_sent, "download never produced progress");
    // User cancel is not an error.
    assert_eq!(code, 0);
    // Shutdown-stage tasks still ran.
    assert!(
        fixture.root.join("shutdown-marker.txt").exists(),
        "stop step skipped"
    );
    // The canceled transfer left no partial pack behind.
    assert!(!fixture.pack_path().exists());
}

#[tokio::test]
async fn test_unknown_id_exits_with_title_not_found_code() {
    let fixture = build_install(FixtureOptions::default()).await;

    let (director, mut rx) = Director::new(Verbosity::Full);
    let (_control_tx, control_rx) = mpsc::unbounded_channel();

    let driver = Driver::new(Arc::clone(&director), ClifpConfig::default(), control_rx)
        .with_install_root(fixture.root.clone())
        .with_instance_id(unique_lock_id("noid"));
    drop(director);

    let command = commands::acquire(CommandArgs::Play(PlayArgs {
        title: TitleArgs {
            id: Some("99999999-9999-9999-9999-999999999999".into()),
            ..TitleArgs::default()
        },
        ..PlayArgs::default()
    }));
    let worker = tokio::spawn(driver.drive(command));

    let mut saw_critical = false;
    while let Some(directive) = rx.recv().await {
        match directive {
            Directive::Async {
                payload: AsyncDirective::Error(details),
                ..
            } => {
                saw_critical = true;
                assert_eq!(details.code, 120004);
            }
            Directive::Sync { ack, .. } => {
                let _ = ack.send(());
            }
            Directive::Request { payload, reply, .. } => {
                let _ = reply.send(payload.default_response());
            }
            _ => {}
        }
    }

    let code = worker.await.unwrap();
    assert_eq!(code, 120004);
    assert!(saw_critical, "critical error directive expected");
}

#[tokio::test]
async fn test_failed_mount_reports_error_but_still_shuts_down() {
    let fixture = build_install(FixtureOptions {
        start_server: true,
        shutdown_marker: true,
        ..FixtureOptions::default()
    })
    .await;
    fixture.write_pack();

    let (director, mut rx) = Director::new(Verbosity::Full);
    let (_control_tx, control_rx) = mpsc::unbounded_channel();

    let driver = Driver::new(Arc::clone(&director), ClifpConfig::default(), control_rx)
        .with_install_root(fixture.root.clone())
        .with_instance_id(unique_lock_id("play"));
    drop(director);

    let command = commands::acquire(CommandArgs::Play(PlayArgs {
        url: Some(format!("flashpoint://{GAME_ID}")),
        ..PlayArgs::default()
    }));
    let worker = tokio::spawn(driver.drive(command));

    let mut errors = Vec::new();
    while let Some(directive) = rx.recv().await {
        match directive {
            Directive::Async {
                payload: AsyncDirective::Error(details),
                ..
            } => errors.push(details),
            Directive::Sync { ack, .. } => {
                let _ = ack.send(());
            }
            Directive::Request { payload, reply, .. } => {
                let _ = reply.send(payload.default_response());
            }
            _ => {}
        }
    }

    let code = worker.await.unwrap();

    // The mount fails (no proxy is listening in the fixture), which is a
    // critical task error, so the run reports it and still shuts down.
    assert_ne!(code, 0);
    assert!(errors.iter().any(|d| d.code == code as u32));
    assert!(
        fixture.root.join("shutdown-marker.txt").exists(),
        "shutdown must run despite the failed mount"
    );
}
