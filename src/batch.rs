//! Batch driver
//!
//! Runs the processor over many files. A failing image is recorded and the
//! batch moves on, except for fatal errors (model load, network) which
//! cannot succeed for any later image either.

use crate::{
    config::{OutputFormat, UpscaleFactor},
    error::Result,
    processor::UpscaleProcessor,
    services::OutputFormatHandler,
};
use instant::{Duration, Instant};
use std::path::{Path, PathBuf};

/// One input/output pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Outcome of a single job, passed to the per-item callback
#[derive(Debug)]
pub enum BatchItemOutcome<'a> {
    Succeeded { job: &'a BatchJob, dimensions: (u32, u32) },
    Failed { job: &'a BatchJob, error: &'a str },
}

/// Aggregated batch result
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: Vec<(PathBuf, String)>,
    pub total_time: Duration,
}

impl BatchSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.processed + self.failed.len()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build the jobs for `inputs`, writing next to each input or into
/// `output_dir` when given
#[must_use]
pub fn plan_jobs(
    inputs: &[PathBuf],
    output_dir: Option<&Path>,
    factor: UpscaleFactor,
    format_override: Option<OutputFormat>,
) -> Vec<BatchJob> {
    inputs
        .iter()
        .map(|input| BatchJob {
            input: input.clone(),
            output: generate_output_path(input, output_dir, factor, format_override),
        })
        .collect()
}

/// Output path `<stem>_<N>x.<ext>` for an input
///
/// `ext` is the input's extension unless `format_override` is set, and
/// `png` for inputs without one.
///
/// ```rust
/// use imgly_upscale::{batch::generate_output_path, UpscaleFactor};
/// use std::path::{Path, PathBuf};
///
/// let out = generate_output_path(Path::new("photos/cat.jpg"), None, UpscaleFactor::X4, None);
/// assert_eq!(out, PathBuf::from("photos/cat_4x.jpg"));
/// ```
#[must_use]
pub fn generate_output_path(
    input: &Path,
    output_dir: Option<&Path>,
    factor: UpscaleFactor,
    format_override: Option<OutputFormat>,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy());
    let extension = match format_override {
        Some(format) => OutputFormatHandler::get_extension(format).to_string(),
        None => input
            .extension()
            .map_or_else(|| "png".to_string(), |e| e.to_string_lossy().into_owned()),
    };
    let file_name = format!("{stem}_{}x.{extension}", factor.multiplier());

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

/// Process every job in order
///
/// `on_item` is called once per job with its outcome.
///
/// # Errors
/// - Fatal errors (model load, network) stop the batch and are returned
pub async fn process_batch<F>(
    processor: &UpscaleProcessor,
    jobs: &[BatchJob],
    mut on_item: F,
) -> Result<BatchSummary>
where
    F: FnMut(BatchItemOutcome<'_>),
{
    let start = Instant::now();
    let mut summary = BatchSummary::default();

    for job in jobs {
        match processor.upscale_file(&job.input, &job.output).await {
            Ok(result) => {
                summary.processed += 1;
                on_item(BatchItemOutcome::Succeeded {
                    job,
                    dimensions: result.dimensions(),
                });
            },
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(input = %job.input.display(), error = %message, "Image failed");
                on_item(BatchItemOutcome::Failed {
                    job,
                    error: &message,
                });
                summary.failed.push((job.input.clone(), message));
            },
        }
    }

    summary.total_time = start.elapsed();
    tracing::info!(
        processed = summary.processed,
        failed = summary.failed.len(),
        elapsed_ms = summary.total_time.as_millis() as u64,
        "Batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_output_path() {
        assert_eq!(
            generate_output_path(Path::new("a/b.png"), None, UpscaleFactor::X2, None),
            PathBuf::from("a/b_2x.png")
        );
        assert_eq!(
            generate_output_path(
                Path::new("a/b.png"),
                Some(Path::new("out")),
                UpscaleFactor::X8,
                Some(OutputFormat::Jpeg)
            ),
            PathBuf::from("out/b_8x.jpg")
        );
        assert_eq!(
            generate_output_path(Path::new("noext"), None, UpscaleFactor::X4, None),
            PathBuf::from("noext_4x.png")
        );
    }

    #[test]
    fn test_plan_jobs() {
        let inputs = vec![PathBuf::from("x.bmp"), PathBuf::from("y.webp")];
        let jobs = plan_jobs(&inputs, None, UpscaleFactor::X2, None);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].output, PathBuf::from("y_2x.webp"));
    }

    #[test]
    fn test_summary_counts() {
        let summary = BatchSummary {
            processed: 2,
            failed: vec![(PathBuf::from("bad.png"), "decode".to_string())],
            total_time: Duration::ZERO,
        };
        assert_eq!(summary.total(), 3);
        assert!(!summary.is_success());
    }
}
