//! Batch driver isolation and output naming

use image::Rgba;
use imgly_upscale::batch::{plan_jobs, process_batch, BatchItemOutcome};
use imgly_upscale::{ImageIOService, OutputFormat, UpscaleConfig, UpscaleFactor};
use std::path::PathBuf;
use tempfile::TempDir;

mod common;
use common::{pattern, processor_with, MarkerFailBackend, POISON};

fn write_inputs(dir: &TempDir, count: usize, poisoned: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.path().join(format!("img{i}.png"));
            let mut image = pattern(11, 9);
            if i == poisoned {
                image.put_pixel(4, 4, Rgba([POISON[0], POISON[1], POISON[2], 255]));
            }
            ImageIOService::save_image(&image, &path, OutputFormat::Png, 90).unwrap();
            path
        })
        .collect()
}

#[tokio::test]
async fn test_one_failure_does_not_abort_the_batch() {
    let dir = TempDir::new().unwrap();
    let inputs = write_inputs(&dir, 5, 2);
    let out_dir = dir.path().join("out");
    let jobs = plan_jobs(&inputs, Some(&out_dir), UpscaleFactor::X2, None);

    let processor = processor_with(MarkerFailBackend, UpscaleConfig::default());
    let mut seen = Vec::new();
    let summary = process_batch(&processor, &jobs, |outcome| {
        seen.push(matches!(outcome, BatchItemOutcome::Succeeded { .. }));
    })
    .await
    .unwrap();

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, inputs[2]);
    assert!(summary.failed[0].1.contains("poisoned"));
    assert_eq!(seen, vec![true, true, false, true, true]);

    for (index, job) in jobs.iter().enumerate() {
        assert_eq!(job.output.exists(), index != 2, "{}", job.output.display());
    }
    let written = ImageIOService::load_image(&jobs[0].output).unwrap();
    assert_eq!(written.dimensions(), (22, 18));
}

#[tokio::test]
async fn test_undecodable_input_is_counted_as_failure() {
    let dir = TempDir::new().unwrap();
    let mut inputs = write_inputs(&dir, 2, usize::MAX);
    let broken = dir.path().join("broken.png");
    std::fs::write(&broken, b"not an image").unwrap();
    inputs.push(broken);

    let jobs = plan_jobs(&inputs, None, UpscaleFactor::X2, None);
    let processor = processor_with(MarkerFailBackend, UpscaleConfig::default());
    let summary = process_batch(&processor, &jobs, |_| {}).await.unwrap();

    assert_eq!(summary.total(), 3);
    assert_eq!(summary.processed, 2);
    assert!(!summary.is_success());
}

#[test]
fn test_output_names_follow_scale_and_format() {
    let inputs = vec![PathBuf::from("shots/a.jpeg"), PathBuf::from("b.tiff")];

    let jobs = plan_jobs(&inputs, None, UpscaleFactor::X4, None);
    assert_eq!(jobs[0].output, PathBuf::from("shots/a_4x.jpeg"));
    assert_eq!(jobs[1].output, PathBuf::from("b_4x.tiff"));

    let jobs = plan_jobs(
        &inputs,
        Some(std::path::Path::new("out")),
        UpscaleFactor::X8,
        Some(OutputFormat::WebP),
    );
    assert_eq!(jobs[0].output, PathBuf::from("out/a_8x.webp"));
    assert_eq!(jobs[1].output, PathBuf::from("out/b_8x.webp"));
}
