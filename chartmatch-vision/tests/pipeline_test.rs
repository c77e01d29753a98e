use anyhow::Result;
use chartmatch_vision::{cosine_similarity, Pipeline, PreprocessConfig};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Model used by the end-to-end checks; they are skipped when it is absent.
fn model_path() -> PathBuf {
    std::env::var("CHARTMATCH_TEST_MODEL")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("../models/resnet50.onnx"))
}

/// A crude candlestick-like chart: rising bars on white.
fn synthetic_chart(rising: bool) -> DynamicImage {
    let mut img = RgbImage::from_pixel(320, 200, Rgb([255, 255, 255]));
    for bar in 0..16u32 {
        let height = if rising { 20 + bar * 10 } else { 180 - bar * 10 };
        let x0 = 10 + bar * 19;
        for x in x0..x0 + 12 {
            for y in (200 - height)..200 {
                img.put_pixel(x, y, Rgb([20, 160, 60]));
            }
        }
    }
    DynamicImage::ImageRgb8(img)
}

#[test]
fn missing_model_is_an_error() {
    let result = Pipeline::new(Path::new("does/not/exist.onnx"), PreprocessConfig::default());
    let err = result.err().expect("pipeline should not load");
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_embedding_is_deterministic() -> Result<()> {
    env_logger::try_init().ok();
    let path = model_path();
    if !path.exists() {
        eprintln!("Skipping: model not found at {}", path.display());
        return Ok(());
    }

    let mut pipeline = Pipeline::new(&path, PreprocessConfig::default())?;
    let chart = synthetic_chart(true);

    let first = pipeline.extract_embedding(&chart)?;
    let second = pipeline.extract_embedding(&chart)?;

    println!("Embedding dimension: {}", first.dim());
    assert!(first.dim() > 0);
    assert_eq!(first.dim(), second.dim());
    assert!((cosine_similarity(&first, &second) - 1.0).abs() < 1e-5);
    Ok(())
}

#[test]
fn test_different_charts_are_distinguishable() -> Result<()> {
    env_logger::try_init().ok();
    let path = model_path();
    if !path.exists() {
        eprintln!("Skipping: model not found at {}", path.display());
        return Ok(());
    }

    let mut pipeline = Pipeline::new(&path, PreprocessConfig::default())?;
    let rising = pipeline.extract_embedding(&synthetic_chart(true))?;
    let falling = pipeline.extract_embedding(&synthetic_chart(false))?;

    let sim = cosine_similarity(&rising, &falling);
    println!("rising <-> falling: {:.4}", sim);
    assert!(sim < 0.9999, "distinct charts should not embed identically");
    Ok(())
}
