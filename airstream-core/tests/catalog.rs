use std::fs;
use std::path::{Path, PathBuf};

use airstream_core::config::CatalogSection;
use airstream_core::{DirectoryCatalog, FileCatalog};
use tempfile::TempDir;

fn write_file(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn catalog(root: &Path) -> DirectoryCatalog {
    DirectoryCatalog::new(root, &CatalogSection::default()).unwrap()
}

#[test]
fn collects_only_files_under_valid_hierarchy() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("Rai");
    let good = write_file(&root, "RAI1_AAC/2024/03/05/0500_x_05h.aac", b"audio");
    let wma = write_file(&root, "RAI12_WMA/2024/12/31/0000_x_23h.wma", b"audio");
    write_file(&root, "RAI1_MP3/2024/03/05/0500_x_05h.aac", b"audio");
    write_file(&root, "RAI1_AAC/24/03/05/0500_x_05h.aac", b"audio");
    write_file(&root, "RAI1_AAC/2024/13/05/0500_x_05h.aac", b"audio");
    write_file(&root, "RAI1_AAC/2024/03/32/0500_x_05h.aac", b"audio");
    write_file(&root, "RAI1_AAC/2024/03/00/0500_x_05h.aac", b"audio");
    write_file(&root, "rai1_AAC/2024/03/05/0500_x_05h.aac", b"audio");
    write_file(&root, "RAI1_AAC/2024/03/05/deeper/0500_x_05h.aac", b"audio");
    write_file(&root, "RAI1_AAC/2024/03/stray.aac", b"audio");
    write_file(&root, "loose.aac", b"audio");

    let catalog = catalog(&root);
    assert!(catalog.validate());
    let mut collected = catalog.collect();
    collected.sort();
    let mut expected = vec![good, wma];
    expected.sort();
    assert_eq!(collected, expected);
}

#[test]
fn second_collect_returns_nothing_until_released() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("Rai");
    let file = write_file(&root, "RAI1_AAC/2024/03/05/0500_x_05h.aac", b"audio");

    let catalog = catalog(&root);
    assert_eq!(catalog.collect(), vec![file.clone()]);
    assert!(catalog.collect().is_empty());
    assert_eq!(catalog.processed().len(), 1);

    assert!(catalog.remove_processed(&file));
    assert!(!catalog.remove_processed(&file));
    assert_eq!(catalog.collect(), vec![file]);
}

#[test]
fn validate_does_not_admit_files() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("Rai");
    let file = write_file(&root, "RAI1_AAC/2024/03/05/0500_x_05h.aac", b"audio");

    let catalog = catalog(&root);
    assert!(catalog.validate());
    assert!(catalog.processed().is_empty());
    assert_eq!(catalog.collect(), vec![file]);
}

#[test]
fn unsupported_extensions_are_reported_once() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("Rai");
    let text = write_file(&root, "RAI1_AAC/2024/03/05/notes.txt", b"text");
    write_file(&root, "RAI1_AAC/2024/03/05/0500_x_05h.AAC", b"audio");

    let catalog = catalog(&root);
    assert_eq!(catalog.collect().len(), 1);
    catalog.validate();
    catalog.collect();
    assert_eq!(catalog.invalid_files(), vec![text]);
}

#[test]
fn empty_files_are_skipped() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("Rai");
    write_file(&root, "RAI1_AAC/2024/03/05/0500_x_05h.aac", b"");
    let kept = write_file(&root, "RAI1_AAC/2024/03/05/0600_x_06h.aac", b"audio");

    let catalog = catalog(&root);
    assert_eq!(catalog.collect(), vec![kept]);
    assert!(catalog.invalid_files().is_empty());
}

#[test]
fn missing_root_yields_empty_collection() {
    let temp = TempDir::new().unwrap();
    let catalog = catalog(&temp.path().join("Rai"));
    assert!(!catalog.validate());
    assert!(catalog.collect().is_empty());
}

#[cfg(unix)]
#[test]
fn symlinked_sources_and_files_are_followed() {
    use std::os::unix::fs::symlink;

    let temp = TempDir::new().unwrap();
    let root = temp.path().join("Rai");
    let store = temp.path().join("store");
    let target = write_file(&store, "0500_x_05h.aac", b"audio");
    write_file(&store, "tree/2024/03/06/0600_x_06h.aac", b"audio");
    write_file(&store, "empty.aac", b"");

    let day = root.join("RAI1_AAC/2024/03/05");
    fs::create_dir_all(&day).unwrap();
    symlink(&target, day.join("0500_x_05h.aac")).unwrap();
    symlink(store.join("empty.aac"), day.join("0700_x_07h.aac")).unwrap();
    symlink(store.join("tree"), root.join("RAI2_AAC")).unwrap();
    symlink(store.join("tree"), root.join("RAI2_MP3")).unwrap();

    let mut collected = catalog(&root).collect();
    collected.sort();
    assert_eq!(
        collected,
        vec![
            day.join("0500_x_05h.aac"),
            root.join("RAI2_AAC/2024/03/06/0600_x_06h.aac"),
        ]
    );
}
