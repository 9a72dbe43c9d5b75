use super::*;

#[tokio::test]
async fn shutdown_cancels_active_job_and_rejects_new_work() {
    let seg = Arc::new(ScriptedBackend::new("aria2c", Script::WaitForCancel));
    let repo = Arc::new(ScriptedBackend::new("hf", Script::Complete));
    let (queue, dir) = create_test_queue(seg, repo);

    let id = queue.add(other_request(dir.path(), "a.bin")).await.unwrap();
    queue.start().await.unwrap();
    wait_for(&queue, |s| {
        s.job(&id).is_some_and(|job| job.status == Status::Downloading)
    })
    .await;

    let mut events = queue.subscribe();
    queue.shutdown().await.unwrap();

    let state = queue.state().await;
    assert!(!state.is_processing);
    assert_eq!(state.job(&id).unwrap().status, Status::Cancelled);

    let err = queue
        .add(other_request(dir.path(), "b.bin"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
    assert!(matches!(queue.start().await, Err(Error::ShuttingDown)));

    let mut saw_shutdown = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::Shutdown) {
            saw_shutdown = true;
        }
    }
    assert!(saw_shutdown);
}

#[tokio::test]
async fn shutdown_when_idle_emits_event() {
    let seg = Arc::new(ScriptedBackend::new("aria2c", Script::Complete));
    let repo = Arc::new(ScriptedBackend::new("hf", Script::Complete));
    let (queue, _dir) = create_test_queue(seg, repo);
    let mut events = queue.subscribe();

    tokio::time::timeout(Duration::from_secs(1), queue.shutdown())
        .await
        .expect("idle shutdown should not wait")
        .unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.topic(), "downloader.shutdown");
}

#[tokio::test]
async fn shutdown_keeps_state_readable() {
    let seg = Arc::new(ScriptedBackend::new("aria2c", Script::Complete));
    let repo = Arc::new(ScriptedBackend::new("hf", Script::Complete));
    let (queue, dir) = create_test_queue(seg, repo);

    queue.add(other_request(dir.path(), "a.bin")).await.unwrap();
    queue.shutdown().await.unwrap();

    let state = queue.state().await;
    assert_eq!(state.jobs.len(), 1);
    assert_eq!(state.jobs[0].status, Status::Queued);
}
