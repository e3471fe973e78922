use std::fs;
use std::path::{Path, PathBuf};

use airstream_core::config::CatalogSection;
use airstream_core::playlist::parse_playlist;
use airstream_core::{
    DirectoryCatalog, FileCatalog, GroupIdentifier, PlaylistArchive, PlaylistError, PlaylistOrder,
    PlaylistWriter,
};
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    root: PathBuf,
    playlists: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("audio/Rai");
        let playlists = temp.path().join("playlists");
        fs::create_dir_all(&root).unwrap();
        Self {
            _temp: temp,
            root,
            playlists,
        }
    }

    fn audio(&self, relative: &str) -> PathBuf {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"audio").unwrap();
        path
    }

    fn catalog(&self) -> DirectoryCatalog {
        DirectoryCatalog::new(&self.root, &CatalogSection::default()).unwrap()
    }

    fn writer(&self, max_streams: usize, order: PlaylistOrder) -> PlaylistWriter {
        PlaylistWriter::new(PlaylistArchive::new(&self.playlists), max_streams, "Rai", order)
            .unwrap()
    }
}

fn identifier(path: &Path) -> GroupIdentifier {
    GroupIdentifier::from_path(path, "Rai").unwrap()
}

#[test]
fn single_day_becomes_one_playlist() {
    let fixture = Fixture::new();
    let mut files = vec![
        fixture.audio("RAI1_AAC/2024/03/05/0500_x_05a.aac"),
        fixture.audio("RAI1_AAC/2024/03/05/0500_x_05b.aac"),
        fixture.audio("RAI1_AAC/2024/03/05/0500_x_05c.aac"),
    ];
    files.sort();

    let writer = fixture.writer(1, PlaylistOrder::Chronological);
    let catalog = fixture.catalog();
    let loaded = writer.load_and_sort(&catalog).unwrap();
    assert_eq!(loaded, files);

    let groups = writer.divide_into_streams(&loaded);
    assert_eq!(groups.len(), 1);
    let streams = writer.generate_playlists(groups).unwrap();
    assert_eq!(streams.len(), 1);

    let stream = &streams[0];
    assert_eq!(stream.identifier.to_string(), "RAI1_AAC_2024_03_05_05");
    assert_eq!(
        stream.playlist,
        fixture.playlists.join("RAI1_AAC_2024_03_05_05.m3u8")
    );
    let contents = fs::read_to_string(&stream.playlist).unwrap();
    assert_eq!(contents.matches("#EXTINF:7200,").count(), 3);
    assert_eq!(parse_playlist(&contents), files);
}

#[test]
fn traversal_order_matches_catalog_enumeration() {
    let fixture = Fixture::new();
    for relative in [
        "RAI2_WMA/2024/03/06/0700_x_07h.wma",
        "RAI1_AAC/2024/03/07/0100_x_01h.aac",
        "RAI1_AAC/2024/03/05/2300_x_23h.aac",
        "RAI3_AAC/2023/12/31/0000_x_00h.aac",
        "RAI1_AAC/2024/03/05/0500_x_05h.aac",
        "RAI2_WMA/2024/02/29/1200_x_12h.wma",
    ] {
        fixture.audio(relative);
    }

    let reference = fixture.catalog().collect();
    assert_eq!(reference.len(), 6);

    let writer = fixture.writer(3, PlaylistOrder::Traversal);
    let loaded = writer.load_and_sort(&fixture.catalog()).unwrap();
    assert_eq!(loaded, reference);
    assert_eq!(writer.divide_into_streams(&loaded).concat(), reference);
}

#[test]
fn single_day_scenario_keeps_traversal_order_by_default() {
    let fixture = Fixture::new();
    for name in ["0500_x_05c.aac", "0500_x_05a.aac", "0500_x_05b.aac"] {
        fixture.audio(&format!("RAI1_AAC/2024/03/05/{name}"));
    }
    let reference = fixture.catalog().collect();

    let writer = fixture.writer(1, PlaylistOrder::default());
    let loaded = writer.load_and_sort(&fixture.catalog()).unwrap();
    assert_eq!(loaded, reference);

    let streams = writer
        .generate_playlists(writer.divide_into_streams(&loaded))
        .unwrap();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].identifier.to_string(), "RAI1_AAC_2024_03_05_05");
    let contents = fs::read_to_string(&streams[0].playlist).unwrap();
    assert_eq!(parse_playlist(&contents), reference);
}

#[test]
fn archived_groups_are_filtered_before_partitioning() {
    let fixture = Fixture::new();
    let streamed = fixture.audio("RAI1_AAC/2024/03/05/0500_x_05h.aac");
    let fresh = fixture.audio("RAI2_WMA/2024/03/06/0700_x_07h.wma");

    let writer = fixture.writer(20, PlaylistOrder::Traversal);
    let archived = writer.archive().archived_path(&identifier(&streamed));
    fs::write(&archived, "#EXTM3U\n").unwrap();

    let loaded = writer.load_and_sort(&fixture.catalog()).unwrap();
    assert_eq!(loaded, vec![fresh]);
}

#[test]
fn generate_skips_groups_already_archived() {
    let fixture = Fixture::new();
    let first = fixture.audio("RAI1_AAC/2024/03/05/0500_x_05h.aac");
    let second = fixture.audio("RAI1_AAC/2024/03/06/0600_x_06h.aac");

    let writer = fixture.writer(2, PlaylistOrder::Traversal);
    fs::write(writer.archive().archived_path(&identifier(&first)), "").unwrap();

    let streams = writer
        .generate_playlists(vec![vec![first.clone()], vec![second.clone()]])
        .unwrap();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].files, vec![second]);
    assert!(!writer.archive().playlist_path(&identifier(&first)).exists());
    assert_eq!(writer.archive().active_playlists().unwrap().len(), 1);
}

#[test]
fn chronological_order_is_date_major() {
    let fixture = Fixture::new();
    let later = fixture.audio("RAI1_AAC/2024/03/07/0100_x_01h.aac");
    let early = fixture.audio("RAI2_AAC/2024/03/05/2300_x_23h.aac");
    let middle = fixture.audio("RAI1_AAC/2024/03/06/0000_x_00h.aac");

    let writer = fixture.writer(3, PlaylistOrder::Chronological);
    let loaded = writer.load_and_sort(&fixture.catalog()).unwrap();
    assert_eq!(loaded, vec![early, middle, later]);
}

#[test]
fn files_outside_marker_are_rejected() {
    let temp = TempDir::new().unwrap();
    let writer = PlaylistWriter::new(
        PlaylistArchive::new(temp.path().join("lists")),
        1,
        "Rai",
        PlaylistOrder::Traversal,
    )
    .unwrap();
    let err = writer
        .generate_playlists(vec![vec![PathBuf::from("/srv/Other/RAI1_AAC/2024/03/05/a_b_05.aac")]])
        .unwrap_err();
    assert!(matches!(err, PlaylistError::MarkerNotFound { .. }));

    let err = writer.generate_playlists(vec![Vec::new()]).unwrap_err();
    assert!(matches!(err, PlaylistError::EmptyGroup));
}

#[tokio::test]
async fn archive_moves_active_playlist() {
    let fixture = Fixture::new();
    let file = fixture.audio("RAI1_AAC/2024/03/05/0500_x_05h.aac");
    let writer = fixture.writer(1, PlaylistOrder::Traversal);
    let streams = writer.generate_playlists(vec![vec![file]]).unwrap();
    let id = &streams[0].identifier;

    assert!(writer.archive().archive(id, &streams[0].files).await.unwrap());
    assert!(writer.archive().is_archived(id));
    assert!(!streams[0].playlist.exists());
}

#[tokio::test]
async fn archive_rebuilds_marker_when_active_playlist_is_gone() {
    let fixture = Fixture::new();
    let file = fixture.audio("RAI1_AAC/2024/03/05/0500_x_05h.aac");
    let writer = fixture.writer(1, PlaylistOrder::Traversal);
    let streams = writer.generate_playlists(vec![vec![file.clone()]]).unwrap();
    let id = &streams[0].identifier;
    fs::remove_file(&streams[0].playlist).unwrap();

    assert!(!writer.archive().archive(id, &streams[0].files).await.unwrap());
    assert!(writer.archive().is_archived(id));
    let archived = fs::read_to_string(writer.archive().archived_path(id)).unwrap();
    assert_eq!(parse_playlist(&archived), vec![file.clone()]);

    let catalog = fixture.catalog();
    assert!(writer.load_and_sort(&catalog).unwrap().is_empty());
}
