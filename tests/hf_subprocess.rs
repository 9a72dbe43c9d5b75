//! Drives the real Hugging Face CLI backend against a stand-in shell script
//!
//! The script answers `version`, prints tqdm-style bars on stderr and writes
//! the requested file into a repo-shaped tree under `--local-dir`, together
//! with the `.cache/huggingface` metadata folder the real client leaves.

#![cfg(unix)]

mod common;

use common::{test_config, wait_for_snapshot, wait_until_stopped};
use model_dl::{JobRequest, LogLevel, Provider, QueueService, Status};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const HF_URL: &str =
    "https://huggingface.co/acme/flux-dev/resolve/main/split_files/vae/ae.safetensors";

const HF_HEADER: &str = r#"#!/bin/sh
if [ "$1" = "version" ]; then
  echo "huggingface_hub version: 0.26.2"
  exit 0
fi
file="$3"
dir=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "--local-dir" ]; then dir="$arg"; fi
  prev="$arg"
done
"#;

const HF_WRITES_FILE: &str = r#"mkdir -p "$dir/$(dirname "$file")" "$dir/.cache/huggingface/download"
printf 'ae.safetensors:  45%%|####5     | 2.1G/4.6G [00:30<00:35, 70.2MB/s]\n' >&2
sleep 1
head -c 8192 /dev/zero > "$dir/$file"
printf 'ae.safetensors: 100%%|##########| 4.6G/4.6G [01:05<00:00, 70.2MB/s]\n' >&2
echo "$dir/$file"
exit 0
"#;

const ARIA2_WRITES_FILE: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "aria2 version 1.37.0"
  exit 0
fi
for arg in "$@"; do
  case "$arg" in
    --dir=*) dir="${arg#--dir=}" ;;
    --out=*) out="${arg#--out=}" ;;
  esac
done
head -c 1024 /dev/zero > "$dir/$out"
exit 0
"#;

fn write_script(path: PathBuf, contents: &str) -> PathBuf {
    std::fs::write(&path, contents).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn queue_with_hf(dir: &Path, body: &str) -> QueueService {
    let mut config = test_config(dir);
    config.queue.broadcast_interval = Duration::ZERO;
    config.tools.hf_cli_path = Some(write_script(
        dir.join("fake-hf"),
        &format!("{HF_HEADER}{body}"),
    ));
    config.tools.aria2_path = Some(write_script(dir.join("fake-aria2c"), ARIA2_WRITES_FILE));
    QueueService::new(config).unwrap()
}

#[tokio::test]
async fn download_is_flattened_and_metadata_removed() {
    let dir = tempfile::tempdir().unwrap();
    let queue = queue_with_hf(dir.path(), HF_WRITES_FILE);
    let mut events = queue.subscribe();

    let target = dir.path().join("models").join("vae");
    let id = queue.add(JobRequest::new(HF_URL, &target)).await.unwrap();
    queue.start().await.unwrap();

    let snapshot = wait_for_snapshot(&mut events, |s| {
        s.job(&id).is_some_and(|job| job.progress == 45)
    })
    .await;
    let job = snapshot.job(&id).unwrap();
    assert_eq!(job.speed, "70.2MB/s");
    assert_eq!(job.eta, "00:35");
    assert_eq!(job.detected_filename, "ae.safetensors");

    let state = wait_until_stopped(&queue).await;
    let job = state.job(&id).unwrap();
    assert_eq!(job.status, Status::Completed, "{}", job.message);
    assert_eq!(job.provider, Provider::RepoTransferClient);
    assert_eq!(job.size_bytes, Some(8192));
    assert_eq!(
        job.output_path.as_deref(),
        Some(target.join("ae.safetensors").as_path())
    );
    assert!(job.message.starts_with("Completed! 8.00 KB in "));

    assert!(target.join("ae.safetensors").is_file());
    assert!(!target.join("split_files").exists());
    assert!(!target.join(".cache").exists());
}

#[tokio::test]
async fn existing_metadata_folder_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let queue = queue_with_hf(dir.path(), HF_WRITES_FILE);

    let target = dir.path().join("models").join("vae");
    std::fs::create_dir_all(target.join(".cache").join("huggingface")).unwrap();

    let id = queue.add(JobRequest::new(HF_URL, &target)).await.unwrap();
    queue.start().await.unwrap();
    let state = wait_until_stopped(&queue).await;

    assert_eq!(state.job(&id).unwrap().status, Status::Completed);
    assert!(target.join(".cache").is_dir());
    assert!(!target.join("split_files").exists());
}

#[tokio::test]
async fn failed_transfer_falls_back_to_aria2() {
    let dir = tempfile::tempdir().unwrap();
    let queue = queue_with_hf(
        dir.path(),
        "echo 'Repository Not Found for url' >&2\nexit 1\n",
    );

    let target = dir.path().join("models").join("vae");
    let id = queue
        .add(JobRequest::new(HF_URL, &target).with_filename("ae.safetensors"))
        .await
        .unwrap();
    queue.start().await.unwrap();
    let state = wait_until_stopped(&queue).await;

    let job = state.job(&id).unwrap();
    assert_eq!(job.status, Status::Completed, "{}", job.message);
    assert_eq!(job.provider, Provider::SegmentDownloader);
    assert_eq!(job.size_bytes, Some(1024));
    assert!(state.recent_logs.iter().any(|entry| {
        entry.level == LogLevel::Warning
            && entry.message == "hf failed (Download failed (code: 1)), falling back to aria2"
    }));
}

#[tokio::test]
async fn cancel_terminates_the_transfer_client() {
    let dir = tempfile::tempdir().unwrap();
    let queue = queue_with_hf(
        dir.path(),
        "printf 'ae.safetensors:   1%%|          | 50M/4.6G [00:01<02:00, 40MB/s]\\n' >&2\nexec sleep 30\n",
    );

    let target = dir.path().join("models").join("vae");
    let id = queue.add(JobRequest::new(HF_URL, &target)).await.unwrap();
    queue.start().await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let state = queue.state().await;
            if state.job(&id).is_some_and(|job| job.status == Status::Downloading) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    // Let the script reach its sleep
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = std::time::Instant::now();
    queue.cancel().await;
    let state = wait_until_stopped(&queue).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    let job = state.job(&id).unwrap();
    assert_eq!(job.status, Status::Cancelled);
    assert_eq!(job.message, "Download cancelled");
    assert_eq!(job.provider, Provider::RepoTransferClient);
    assert!(!target.join("ae.safetensors").exists());
}
