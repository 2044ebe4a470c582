mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{instant_renderer, plan, start_app, user, GatedRenderer, RecordingTransport};
use courier::mail::{MailError, MailRequest, MailerState};
use courier::shutdown::ShutdownPhase;

#[tokio::test]
async fn coordinator_blocks_while_a_job_is_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    let app = start_app(dir.path(), RecordingTransport::default(), instant_renderer()).await;
    let mailer = app.mailer().clone();

    let held = app.tasks().add();
    let coordinator = app.into_coordinator();
    let mut phase = coordinator.subscribe();
    let shutdown = tokio::spawn(coordinator.run());

    phase.wait_for(|p| *p == ShutdownPhase::Draining).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown.is_finished());
    assert_eq!(*phase.borrow(), ShutdownPhase::Draining);
    assert_ne!(mailer.state(), MailerState::Stopped);

    drop(held);
    shutdown.await.unwrap().unwrap();
    assert_eq!(*phase.borrow(), ShutdownPhase::Closed);
    assert_eq!(mailer.state(), MailerState::Stopped);
}

#[tokio::test]
async fn shutdown_waits_for_two_in_flight_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Arc::new(GatedRenderer::new());
    let gate = renderer.gate.clone();
    let transport = RecordingTransport::default();
    let app = start_app(dir.path(), transport.clone(), renderer).await;

    app.spawner().spawn_subscription_jobs(&user(1), &plan()).unwrap();
    app.spawner().spawn_subscription_jobs(&user(2), &plan()).unwrap();

    let coordinator = app.into_coordinator();
    let mut phase = coordinator.subscribe();
    let shutdown = tokio::spawn(coordinator.run());

    phase.wait_for(|p| *p == ShutdownPhase::Draining).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown.is_finished());

    gate.add_permits(2);
    shutdown.await.unwrap().unwrap();

    assert_eq!(transport.with_subject("Invoice").len(), 2);
    assert_eq!(transport.with_subject("Manual").len(), 2);
}

#[tokio::test]
async fn stop_signals_after_shutdown_are_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let app = start_app(dir.path(), RecordingTransport::default(), instant_renderer()).await;
    let mailer = app.mailer().clone();
    let errors = app.errors().clone();

    app.shutdown().await.unwrap();

    mailer.stop();
    mailer.stop();
    let late = MailRequest::builder()
        .to("member@example.com")
        .subject("late")
        .text("too late")
        .build()
        .unwrap();
    assert!(matches!(mailer.enqueue(late).await, Err(MailError::QueueClosed)));
    errors.error("invoice", "reported after shutdown");
}

#[tokio::test]
async fn idle_shutdown_completes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let app = start_app(dir.path(), RecordingTransport::default(), instant_renderer()).await;

    tokio::time::timeout(Duration::from_secs(5), app.shutdown())
        .await
        .unwrap()
        .unwrap();
}
