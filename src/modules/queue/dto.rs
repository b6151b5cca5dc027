use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::infrastructure::queue::Job;
use crate::media::thumbnails::MAX_THUMBNAILS;
use crate::workers::processor::SUPPORTED_TYPES;

fn validate_job_type(kind: &str) -> Result<(), ValidationError> {
    if SUPPORTED_TYPES.contains(&kind) {
        Ok(())
    } else {
        let mut err = ValidationError::new("unsupported_type");
        err.message = Some(format!("Supported types: {}", SUPPORTED_TYPES.join(", ")).into());
        Err(err)
    }
}

fn validate_job_options(options: &Map<String, Value>) -> Result<(), ValidationError> {
    let Some(count) = options.get("thumbnailCount") else {
        return Ok(());
    };
    match count.as_u64() {
        Some(n) if n <= MAX_THUMBNAILS as u64 => Ok(()),
        _ => {
            let mut err = ValidationError::new("thumbnail_count");
            err.message =
                Some(format!("thumbnailCount must be between 0 and {}", MAX_THUMBNAILS).into());
            Err(err)
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueJobRequest {
    /// Generated when omitted
    #[validate(length(min = 1, max = 128, message = "Job id must be 1-128 characters"))]
    pub id: Option<String>,
    #[serde(rename = "type")]
    #[validate(custom(function = "validate_job_type"))]
    pub job_type: String,
    #[validate(length(min = 1, message = "Input is required"))]
    pub input: String,
    #[validate(length(min = 1, message = "Output directory is required"))]
    pub output_dir: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    #[validate(custom(function = "validate_job_options"))]
    pub options: Map<String, Value>,
}

impl EnqueueJobRequest {
    pub fn into_job(self, enqueued_at: i64) -> Job {
        let mut job = Job::new(self.job_type)
            .with_input(self.input)
            .with_output_dir(self.output_dir);
        if let Some(id) = self.id {
            job.id = id;
        }
        job.options = self.options;
        job.enqueued_at = Some(enqueued_at);
        job
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub input: Option<String>,
    pub output_dir: Option<String>,
    #[schema(value_type = Object)]
    pub options: Map<String, Value>,
    pub enqueued_at: Option<i64>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.kind,
            input: job.input,
            output_dir: job.output_dir,
            options: job.options,
            enqueued_at: job.enqueued_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnqueueResponse {
    pub queue: String,
    pub job: JobResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueueSummary {
    pub name: String,
    pub depth: u64,
    /// Pollers running for this queue; 0 until the next discovery
    pub workers: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueueDepthResponse {
    pub name: String,
    pub depth: u64,
}
