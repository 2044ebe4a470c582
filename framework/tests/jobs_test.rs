mod common;

use std::sync::Arc;

use common::{instant_renderer, plan, start_app, user, GatedRenderer, RecordingTransport};
use courier::jobs::JobError;
use courier::mail::MailRequest;

#[tokio::test]
async fn subscription_delivers_invoice_and_manual() {
    let dir = tempfile::tempdir().unwrap();
    let transport = RecordingTransport::default();
    let app = start_app(dir.path(), transport.clone(), instant_renderer()).await;

    let jobs = app.spawner().spawn_subscription_jobs(&user(1), &plan()).unwrap();
    jobs.join().await.unwrap();
    app.shutdown().await.unwrap();

    let invoices = transport.with_subject("Invoice");
    assert_eq!(invoices.len(), 1);
    assert!(invoices[0].contains("$10.00"));
    assert!(invoices[0].contains("To: member1@example.com"));

    let manuals = transport.with_subject("Manual");
    assert_eq!(manuals.len(), 1);
    assert!(manuals[0].contains("manual.pdf"));

    // The rendered manual is removed once attached.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn spawning_returns_before_jobs_finish() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Arc::new(GatedRenderer::new());
    let gate = renderer.gate.clone();
    let transport = RecordingTransport::default();
    let app = start_app(dir.path(), transport.clone(), renderer).await;

    let jobs = app.spawner().spawn_subscription_jobs(&user(2), &plan()).unwrap();
    assert!(!jobs.manual.is_finished());
    assert!(app.tasks().len() >= 1);

    gate.add_permits(1);
    jobs.join().await.unwrap();
    app.shutdown().await.unwrap();
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn concurrent_subscriptions_all_drain() {
    let dir = tempfile::tempdir().unwrap();
    let transport = RecordingTransport::default();
    let app = start_app(dir.path(), transport.clone(), instant_renderer()).await;

    for id in 0..30 {
        app.spawner().spawn_subscription_jobs(&user(id), &plan()).unwrap();
    }
    app.shutdown().await.unwrap();

    assert_eq!(transport.with_subject("Invoice").len(), 30);
    assert_eq!(transport.with_subject("Manual").len(), 30);
}

#[tokio::test]
async fn handlers_can_queue_mail_directly() {
    let dir = tempfile::tempdir().unwrap();
    let transport = RecordingTransport::default();
    let app = start_app(dir.path(), transport.clone(), instant_renderer()).await;

    let request = MailRequest::builder()
        .to("new@example.com")
        .subject("Activate Your Account")
        .template("confirmation-email")
        .html("http://localhost/activate?email=new@example.com")
        .build()
        .unwrap();
    app.mailer().enqueue(request).await.unwrap();
    app.shutdown().await.unwrap();

    let sent = transport.with_subject("Activate Your Account");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("http://localhost/activate"));
}

#[tokio::test]
async fn failed_manual_render_sends_only_the_invoice() {
    let dir = tempfile::tempdir().unwrap();
    let transport = RecordingTransport::default();
    let app = start_app(dir.path(), transport.clone(), instant_renderer()).await;

    let jobs = {
        // Point the manual at a directory that no longer exists.
        let tmp = dir.path().to_path_buf();
        std::fs::remove_dir(&tmp).unwrap();
        app.spawner().spawn_subscription_jobs(&user(3), &plan()).unwrap()
    };
    jobs.join().await.unwrap();
    assert!(app.tasks().is_empty());
    app.shutdown().await.unwrap();

    assert_eq!(transport.with_subject("Invoice").len(), 1);
    assert!(transport.with_subject("Manual").is_empty());
}

#[tokio::test]
async fn spawning_after_shutdown_started_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let app = start_app(dir.path(), RecordingTransport::default(), instant_renderer()).await;
    let spawner = app.spawner().clone();

    app.shutdown().await.unwrap();

    let result = spawner.spawn_subscription_jobs(&user(4), &plan());
    assert!(matches!(result, Err(JobError::ShuttingDown)));
}
