use loadbar::config::SlowRange;
use loadbar::scheduler::FrameSource;
use loadbar::stage::ContainerSpec;
use loadbar::{LoadbarError, ProgressOptions};
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_full_configuration_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r##"
        duration = 2500
        timeout = 60000
        slowRange = "88-94"
        stopAt = 98
        container = "#splash"
        classPrefix = "boot"
        customClass = "quiet"
        inlineStyle = false
        frameSource = "native"
        seed = 7
        template = "<p>Starting</p>"

        [containerStyle]
        background-color = "#222"
        "##,
    );

    let options = tokio_test::block_on(ProgressOptions::load(Some(&path))).unwrap();

    assert_eq!(options.duration, 2500);
    assert_eq!(options.timeout_ms(), Some(60_000.0));
    assert_eq!(options.slow_range, SlowRange { min: 88.0, max: 94.0 });
    assert_eq!(options.effective_stop_at(), 98.0);
    assert_eq!(options.container, ContainerSpec::Selector("#splash".to_string()));
    assert_eq!(options.class_prefix, "boot");
    assert_eq!(options.custom_class, "quiet");
    assert!(!options.inline_style);
    assert_eq!(options.frame_source, FrameSource::Native);
    assert_eq!(options.seed, Some(7));
    assert_eq!(options.template.as_deref(), Some("<p>Starting</p>"));
}

#[test]
fn test_empty_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let options = tokio_test::block_on(ProgressOptions::load(Some(&path))).unwrap();
    assert_eq!(options, ProgressOptions::default());
}

#[test]
fn test_unknown_keys_are_ignored() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "theme = \"dark\"\nduration = 900\n");

    let options = tokio_test::block_on(ProgressOptions::load(Some(&path))).unwrap();
    assert_eq!(options.duration, 900);
}

#[test]
fn test_broken_file_names_its_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "duration = [");

    let error = tokio_test::block_on(ProgressOptions::load(Some(&path))).unwrap_err();
    assert!(matches!(error, LoadbarError::ConfigParse { .. }));
    assert!(error.to_string().contains("config.toml"));
}
