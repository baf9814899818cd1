use std::fs;

use tempfile::tempdir;

use super::*;

#[test]
fn test_single_bits_map_to_kinds() {
    assert_eq!(ChangeKind::from_mask(EventMask::WRITE), ChangeKind::Modified);
    assert_eq!(ChangeKind::from_mask(EventMask::EXTEND), ChangeKind::Modified);
    assert_eq!(ChangeKind::from_mask(EventMask::DELETE), ChangeKind::Deleted);
    assert_eq!(ChangeKind::from_mask(EventMask::RENAME), ChangeKind::Renamed);
    assert_eq!(ChangeKind::from_mask(EventMask::ATTRIB), ChangeKind::PermissionChanged);
    assert_eq!(ChangeKind::from_mask(EventMask::empty()), ChangeKind::Unknown);
}

#[test]
fn test_coalesced_masks_pick_highest_priority() {
    assert_eq!(
        ChangeKind::from_mask(EventMask::DELETE | EventMask::WRITE),
        ChangeKind::Modified
    );
    assert_eq!(
        ChangeKind::from_mask(EventMask::RENAME | EventMask::DELETE | EventMask::ATTRIB),
        ChangeKind::Deleted
    );
    assert_eq!(
        ChangeKind::from_mask(EventMask::ATTRIB | EventMask::RENAME),
        ChangeKind::Renamed
    );
}

#[test]
fn test_mask_operations() {
    let mut mask = EventMask::empty();
    assert!(mask.is_empty());
    assert!(!mask.contains(EventMask::WRITE));

    mask.insert(EventMask::WRITE);
    mask.insert(EventMask::ATTRIB);

    assert!(mask.contains(EventMask::WRITE));
    assert!(mask.contains(EventMask::WRITE | EventMask::ATTRIB));
    assert!(!mask.contains(EventMask::WRITE | EventMask::DELETE));
    assert!(mask.intersects(EventMask::WRITE | EventMask::DELETE));
    assert_eq!(mask.bits(), EventMask::WRITE.bits() | EventMask::ATTRIB.bits());
}

#[test]
fn test_terminal_kinds() {
    assert!(ChangeKind::Deleted.is_terminal());
    assert!(ChangeKind::Renamed.is_terminal());
    assert!(!ChangeKind::Modified.is_terminal());
    assert!(!ChangeKind::PermissionChanged.is_terminal());
}

#[test]
fn test_observe_reads_metadata_of_existing_file() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("main.swift");
    fs::write(&file, b"print(1)\n").unwrap();

    let event = ChangeEvent::observe(&file, EventMask::WRITE);

    assert_eq!(event.kind, ChangeKind::Modified);
    assert_eq!(event.metadata.size_bytes, Some(9));
    assert_eq!(event.metadata.file_kind, Some(FileKind::File));
    assert!(event.metadata.modified_at.is_some());
}

#[test]
fn test_observe_deleted_path_has_empty_metadata() {
    let dir = tempdir().unwrap();
    let gone = dir.path().join("Podfile");

    let event = ChangeEvent::observe(&gone, EventMask::DELETE);

    assert_eq!(event.kind, ChangeKind::Deleted);
    assert_eq!(event.metadata, ChangeMetadata::default());
}

#[test]
fn test_observe_directory() {
    let dir = tempdir().unwrap();

    let event = ChangeEvent::observe(dir.path(), EventMask::ATTRIB);

    assert_eq!(event.metadata.file_kind, Some(FileKind::Directory));
}
