use std::ops::BitOr;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;

use super::ChangeCategory;
use super::ImpactLevel;
use super::RecommendedAction;

/// Raw change bits as delivered by a notifier. Several bits may be set for one
/// event when the OS coalesces notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventMask(u32);

impl EventMask {
    pub const WRITE: EventMask = EventMask(1 << 0);
    pub const EXTEND: EventMask = EventMask(1 << 1);
    pub const DELETE: EventMask = EventMask(1 << 2);
    pub const RENAME: EventMask = EventMask(1 << 3);
    pub const ATTRIB: EventMask = EventMask(1 << 4);

    pub const fn empty() -> Self {
        EventMask(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(
        self,
        other: EventMask,
    ) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn intersects(
        self,
        other: EventMask,
    ) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(
        &mut self,
        other: EventMask,
    ) {
        self.0 |= other.0;
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(
        self,
        rhs: EventMask,
    ) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Modified,
    Deleted,
    Renamed,
    PermissionChanged,
    Unknown,
}

impl ChangeKind {
    /// Collapses a mask into exactly one kind:
    /// write/extend > delete > rename > attrib > unknown.
    pub fn from_mask(mask: EventMask) -> Self {
        if mask.intersects(EventMask::WRITE | EventMask::EXTEND) {
            ChangeKind::Modified
        } else if mask.intersects(EventMask::DELETE) {
            ChangeKind::Deleted
        } else if mask.intersects(EventMask::RENAME) {
            ChangeKind::Renamed
        } else if mask.intersects(EventMask::ATTRIB) {
            ChangeKind::PermissionChanged
        } else {
            ChangeKind::Unknown
        }
    }

    /// Whether this kind ends the life of the path it was reported for.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChangeKind::Deleted | ChangeKind::Renamed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// What could be read about the path when the event was observed. Every field
/// is empty for a path that no longer exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeMetadata {
    pub size_bytes: Option<u64>,
    pub modified_at: Option<SystemTime>,
    pub file_kind: Option<FileKind>,
}

impl ChangeMetadata {
    pub fn read(path: &Path) -> Self {
        let Ok(meta) = std::fs::symlink_metadata(path) else {
            return Self::default();
        };
        let file_type = meta.file_type();
        let file_kind = if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        };
        Self {
            size_bytes: Some(meta.len()),
            modified_at: meta.modified().ok(),
            file_kind: Some(file_kind),
        }
    }
}

/// A single observed change to one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: SystemTime,
    pub metadata: ChangeMetadata,
}

impl ChangeEvent {
    pub fn new(
        path: impl Into<PathBuf>,
        kind: ChangeKind,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: SystemTime::now(),
            metadata: ChangeMetadata::default(),
        }
    }

    /// Stamps the event now and reads whatever metadata the path still has.
    pub fn observe(
        path: impl Into<PathBuf>,
        mask: EventMask,
    ) -> Self {
        let path = path.into();
        let metadata = ChangeMetadata::read(&path);
        Self {
            kind: ChangeKind::from_mask(mask),
            timestamp: SystemTime::now(),
            metadata,
            path,
        }
    }
}

/// A change with its classification, impact and suggested follow-ups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectChangeEvent {
    pub event: ChangeEvent,
    pub category: ChangeCategory,
    pub impact: ImpactLevel,
    pub recommendations: Vec<RecommendedAction>,
}
