use image::{Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use hy3d_gen::mocks::{CallLog, MockPipelineFactory, MockSelector};
use hy3d_gen::{run_loop, run_single, Config, Hy3dError, Mesh, RunOutcome};

fn config_in(dir: &Path) -> Config {
    Config {
        output_dir: dir.to_path_buf(),
        ..Config::default()
    }
}

fn write_rgb(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(16, 12, Rgb([200, 40, 40])).save(&path).unwrap();
    path
}

fn write_rgba(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(12, 16, Rgba([40, 200, 40, 128]))
        .save(&path)
        .unwrap();
    path
}

#[test]
fn test_cancel_before_anything_is_loaded() -> hy3d_gen::Result<()> {
    let temp_dir = TempDir::new()?;
    let log = CallLog::default();
    let mut selector = MockSelector::cancelled(log.clone());

    let outcome = run_single(
        MockPipelineFactory::new(log.clone()),
        &mut selector,
        &config_in(temp_dir.path()),
    )?;

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(log.events(), vec!["select".to_string()]);
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_single_run_exports_named_after_input() -> hy3d_gen::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_rgb(temp_dir.path(), "cat.jpg.png");
    let log = CallLog::default();
    let mut selector = MockSelector::new([input.clone()], log.clone());

    let outcome = run_single(
        MockPipelineFactory::new(log.clone()),
        &mut selector,
        &config_in(temp_dir.path()),
    )?;

    let RunOutcome::Processed(outcome) = outcome else {
        panic!("expected a processed image");
    };
    assert_eq!(outcome.input, input);
    assert_eq!(outcome.output, temp_dir.path().join("cat.glb"));
    assert!(outcome.background_removed);
    assert!(!outcome.textured);

    // the exported file is the first candidate
    let bytes = fs::read(&outcome.output)?;
    let mesh = Mesh::from_glb(bytes)?;
    let json = String::from_utf8_lossy(mesh.as_bytes()).into_owned();
    assert!(json.contains(r#""candidate":0"#));
    Ok(())
}

#[test]
fn test_single_run_loads_shape_pipeline_after_selection() -> hy3d_gen::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_rgba(temp_dir.path(), "dog.png");
    let log = CallLog::default();
    let mut selector = MockSelector::new([input], log.clone());

    run_single(
        MockPipelineFactory::new(log.clone()),
        &mut selector,
        &config_in(temp_dir.path()),
    )?;

    assert_eq!(
        log.events(),
        vec!["select", "load_shape_pipeline", "generate_shape"]
    );
    Ok(())
}

#[test]
fn test_loop_loads_pipelines_once() -> hy3d_gen::Result<()> {
    let temp_dir = TempDir::new()?;
    let first = write_rgb(temp_dir.path(), "first.jpg");
    let second = write_rgba(temp_dir.path(), "second.png");
    let log = CallLog::default();
    let mut selector = MockSelector::new([first, second], log.clone());

    let outcomes = run_loop(
        MockPipelineFactory::new(log.clone()),
        &mut selector,
        &config_in(temp_dir.path()),
    )?;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(log.count("load_shape_pipeline"), 1);
    assert_eq!(log.count("load_texture_pipeline"), 1);
    assert_eq!(log.count("generate_shape"), 2);
    assert_eq!(log.count("paint_texture"), 2);
    assert_eq!(log.count("select"), 3);
    assert!(outcomes.iter().all(|o| o.textured));
    assert!(temp_dir.path().join("first.glb").exists());
    assert!(temp_dir.path().join("second.glb").exists());
    Ok(())
}

#[test]
fn test_loop_paints_after_shape_and_before_next_selection() -> hy3d_gen::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_rgba(temp_dir.path(), "mug.png");
    let log = CallLog::default();
    let mut selector = MockSelector::new([input], log.clone());

    run_loop(
        MockPipelineFactory::new(log.clone()),
        &mut selector,
        &config_in(temp_dir.path()),
    )?;

    assert_eq!(
        log.events(),
        vec![
            "load_shape_pipeline",
            "load_texture_pipeline",
            "select",
            "generate_shape",
            "paint_texture",
            "select",
        ]
    );
    Ok(())
}

#[test]
fn test_loop_without_seed_by_default() -> hy3d_gen::Result<()> {
    let temp_dir = TempDir::new()?;
    let config = config_in(temp_dir.path());
    assert_eq!(config.generation_params(hy3d_gen::Flow::Loop).seed, None);
    assert_eq!(
        config.generation_params(hy3d_gen::Flow::Single).seed,
        Some(12345)
    );
    Ok(())
}

#[test]
fn test_texture_failure_leaves_no_output() -> hy3d_gen::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_rgba(temp_dir.path(), "vase.png");
    let log = CallLog::default();
    let mut selector = MockSelector::new([input], log.clone());

    let result = run_loop(
        MockPipelineFactory::new(log.clone()).with_failing_texture(),
        &mut selector,
        &config_in(temp_dir.path()),
    );

    assert!(matches!(result, Err(Hy3dError::Pipeline { .. })));
    assert!(!temp_dir.path().join("vase.glb").exists());
    assert_eq!(log.count("select"), 1);
    Ok(())
}

#[test]
fn test_unreadable_image_aborts_loop() -> hy3d_gen::Result<()> {
    let temp_dir = TempDir::new()?;
    let broken = temp_dir.path().join("broken.jpg");
    fs::write(&broken, b"not an image")?;
    let log = CallLog::default();
    let mut selector = MockSelector::new([broken], log.clone());

    let result = run_loop(
        MockPipelineFactory::new(log.clone()),
        &mut selector,
        &config_in(temp_dir.path()),
    );

    assert!(matches!(result, Err(Hy3dError::ImageProcessing { .. })));
    assert_eq!(log.count("generate_shape"), 0);
    Ok(())
}
