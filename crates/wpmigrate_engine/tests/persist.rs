use std::fs;

use tempfile::TempDir;
use wpmigrate_core::MediaLayout;
use wpmigrate_engine::{ensure_output_dir, prepare_outputs, reset_dir, AtomicFileWriter};

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("content").join("posts");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_post() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("2024-01-a.md", "hello").unwrap();
    assert_eq!(first.file_name().unwrap(), "2024-01-a.md");
    assert_eq!(fs::read_to_string(&first).unwrap(), "hello");

    let second = writer.write("2024-01-a.md", "world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world");
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("post.md", "data").is_err());
    assert!(!file_path.with_file_name("post.md").exists());
}

#[test]
fn reset_dir_empties_existing_tree() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("images");
    fs::create_dir_all(dir.join("old-post")).unwrap();
    fs::write(dir.join("old-post").join("a.jpg"), "x").unwrap();

    reset_dir(&dir).unwrap();

    assert!(dir.is_dir());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn clean_step_keeps_static_root_contents_outside_media_areas() {
    let temp = TempDir::new().unwrap();
    let content = temp.path().join("content/posts");
    let static_root = temp.path().join("static");
    fs::create_dir_all(&content).unwrap();
    fs::write(content.join("stale.md"), "old").unwrap();
    fs::create_dir_all(static_root.join("galleries/s")).unwrap();
    fs::write(static_root.join("galleries/s/g.jpg"), "old").unwrap();
    fs::write(static_root.join("favicon.ico"), "keep").unwrap();

    prepare_outputs(&content, &MediaLayout::new(&static_root), true).unwrap();

    assert!(!content.join("stale.md").exists());
    assert!(!static_root.join("galleries/s").exists());
    for area in ["images", "galleries", "videos"] {
        assert!(static_root.join(area).is_dir(), "{area}");
    }
    assert_eq!(fs::read_to_string(static_root.join("favicon.ico")).unwrap(), "keep");
}

#[test]
fn without_clean_existing_files_survive() {
    let temp = TempDir::new().unwrap();
    let content = temp.path().join("content/posts");
    let static_root = temp.path().join("static");
    fs::create_dir_all(&content).unwrap();
    fs::write(content.join("kept.md"), "old").unwrap();

    prepare_outputs(&content, &MediaLayout::new(&static_root), false).unwrap();

    assert!(content.join("kept.md").exists());
    assert!(static_root.is_dir());
}
