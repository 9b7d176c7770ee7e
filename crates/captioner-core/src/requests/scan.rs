use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use super::types::ImageItem;
use crate::Result;

/// Result of scanning an image directory
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Regular files seen, images or not
    pub total_files: usize,
    /// Files that passed the extension filter, in scan order
    pub images: Vec<ImageItem>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Recursively collect image files under `dir`.
///
/// Entries are visited sorted by file name at every level so repeated scans of
/// an unchanged directory return the same order. Hidden entries are skipped.
pub fn scan_images(dir: &Path) -> Result<ScanSummary> {
    let mut summary = ScanSummary::default();

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        summary.total_files += 1;

        if let Some(image) = ImageItem::from_path(entry.path()) {
            summary.images.push(image);
        }
    }

    tracing::debug!(
        total_files = summary.total_files,
        total_images = summary.images.len(),
        "Scanned {:?}",
        dir
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_scan_filters_and_recurses() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        touch(&root.join("photo.PNG"));
        touch(&root.join("document.pdf"));
        touch(&root.join("nested/deeper/cat.jpeg"));
        touch(&root.join("nested/notes.txt"));

        let summary = scan_images(root).unwrap();

        assert_eq!(summary.total_files, 4);
        let names: Vec<String> = summary.images.iter().map(|i| i.file_name()).collect();
        assert_eq!(names, vec!["cat.jpeg", "photo.PNG"]);
    }

    #[test]
    fn test_scan_order_is_stable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        for name in ["c.jpg", "a.jpg", "b.png"] {
            touch(&root.join(name));
        }

        let first = scan_images(root).unwrap();
        let second = scan_images(root).unwrap();

        let names: Vec<String> = first.images.iter().map(|i| i.file_name()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.jpg"]);
        assert_eq!(first.images, second.images);
    }

    #[test]
    fn test_scan_skips_hidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        touch(&root.join(".thumbs/a.jpg"));
        touch(&root.join(".b.jpg"));
        touch(&root.join("c.jpg"));

        let summary = scan_images(root).unwrap();

        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.images.len(), 1);
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(scan_images(&temp_dir.path().join("missing")).is_err());
    }
}
