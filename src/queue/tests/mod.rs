use super::test_helpers::*;
use super::*;
use crate::error::Error;
use crate::progress::ProgressUpdate;
use crate::types::{
    CancelOutcome, Event, JobRequest, LogLevel, Platform, Provider, StartOutcome, Status,
};
use std::sync::Arc;
use std::time::Duration;

mod lifecycle;

fn hf_request(dir: &std::path::Path) -> JobRequest {
    JobRequest::new(
        "https://huggingface.co/acme/flux/resolve/main/vae/ae.safetensors",
        dir.join("vae"),
    )
}

fn other_request(dir: &std::path::Path, name: &str) -> JobRequest {
    JobRequest::new(format!("https://example.com/files/{name}"), dir.join("loras"))
        .with_filename(name)
}
