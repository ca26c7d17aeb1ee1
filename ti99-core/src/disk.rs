//! Disk images and drive state.
//!
//! Images are owned by a `DiskImageSet`; drives refer to them by name only.
//! The bytes inside an image are never interpreted here.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Names of the blank images every session starts with.
pub const DEFAULT_DISK_IMAGE_NAMES: [&str; 3] = ["FLOPPY A", "FLOPPY B", "FLOPPY C"];

/// Named virtual floppy contents.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskImage {
    pub name: String,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl DiskImage {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn blank(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

impl fmt::Debug for DiskImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskImage")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// The in-memory collection of disk images, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskImageSet {
    images: BTreeMap<String, DiskImage>,
}

impl DiskImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three blank floppies a fresh session has.
    pub fn with_defaults() -> Self {
        DEFAULT_DISK_IMAGE_NAMES
            .into_iter()
            .map(DiskImage::blank)
            .collect()
    }

    /// Add an image, replacing any image of the same name.
    pub fn insert(&mut self, image: DiskImage) {
        self.images.insert(image.name.clone(), image);
    }

    pub fn get(&self, name: &str) -> Option<&DiskImage> {
        self.images.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.images.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiskImage> {
        self.images.values()
    }

    /// Owned copy of every image, ordered by name.
    pub fn to_vec(&self) -> Vec<DiskImage> {
        self.images.values().cloned().collect()
    }
}

impl FromIterator<DiskImage> for DiskImageSet {
    fn from_iter<I: IntoIterator<Item = DiskImage>>(iter: I) -> Self {
        let mut set = Self::new();
        for image in iter {
            set.insert(image);
        }
        set
    }
}

/// State of one disk drive: its name and the image inserted, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskDrive {
    pub name: String,
    #[serde(default)]
    pub disk_image: Option<String>,
}

impl DiskDrive {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disk_image: None,
        }
    }
}

/// Match persisted drive state against the available images.
///
/// Returns, for each entry in `drives`, the drive name and the image to
/// insert. A reference to an image that no longer exists empties the drive.
pub fn resolve_drives<'a>(
    drives: &[DiskDrive],
    images: &'a DiskImageSet,
) -> Vec<(String, Option<&'a DiskImage>)> {
    drives
        .iter()
        .map(|drive| {
            let image = drive
                .disk_image
                .as_deref()
                .and_then(|name| images.get(name));
            (drive.name.clone(), image)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_images() {
        let set = DiskImageSet::with_defaults();
        assert_eq!(set.names(), vec!["FLOPPY A", "FLOPPY B", "FLOPPY C"]);
        assert!(set.iter().all(|image| image.data.is_empty()));
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut set = DiskImageSet::with_defaults();
        set.insert(DiskImage::new("FLOPPY A", vec![1, 2, 3]));
        assert_eq!(set.len(), 3);
        assert_eq!(set.get("FLOPPY A").unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn test_resolve_drives() {
        let set: DiskImageSet = [DiskImage::new("GAMES", vec![9])].into_iter().collect();
        let drives = vec![
            DiskDrive {
                name: "DSK1".to_string(),
                disk_image: Some("GAMES".to_string()),
            },
            DiskDrive {
                name: "DSK2".to_string(),
                disk_image: Some("GONE".to_string()),
            },
            DiskDrive::empty("DSK3"),
        ];

        let resolved = resolve_drives(&drives, &set);
        assert_eq!(resolved[0].0, "DSK1");
        assert_eq!(resolved[0].1.map(|i| i.name.as_str()), Some("GAMES"));
        assert!(resolved[1].1.is_none());
        assert!(resolved[2].1.is_none());
    }
}
