// Log file path handling and the file writer behind LOG_FILE

use komari_traffic::logging::{file_writer, split_log_path};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn split_log_path_handles_bare_and_nested_names() {
    assert_eq!(
        split_log_path(Path::new("traffic.log")),
        Some((PathBuf::from("."), "traffic.log".to_string()))
    );
    assert_eq!(
        split_log_path(Path::new("/var/log/komari/traffic.log")),
        Some((PathBuf::from("/var/log/komari"), "traffic.log".to_string()))
    );
    assert_eq!(split_log_path(Path::new("/")), None);
}

#[test]
fn file_writer_appends_to_the_exact_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs").join("traffic.log");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "earlier line\n").unwrap();

    let mut writer = file_writer(&path).unwrap();
    writer.write_all(b"report sent\n").unwrap();
    writer.flush().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "earlier line\nreport sent\n");
}

#[test]
fn file_writer_creates_missing_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a").join("b").join("traffic.log");
    let mut writer = file_writer(&path).unwrap();
    writer.write_all(b"x\n").unwrap();
    writer.flush().unwrap();
    assert!(path.exists());
}
