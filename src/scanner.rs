//! Snapshot discovery: walk the input tree and pair HTML files with their
//! resource folders.
//!
//! Browsers saving a "complete web page" write `<name>.html` next to a
//! `<name>_files` folder holding every image the page references. The
//! pairing is a **lexical join** on that naming convention — nothing on disk
//! links the two, so the scanner re-derives the relationship and freezes it
//! into a flat [`Document`] value. Documents are immutable after creation;
//! each one is consumed by exactly one orchestrator job.
//!
//! `_files` folders with no HTML sibling are not documents (they are
//! someone's resources, or orphans); HTML files with no `_files` sibling are
//! documents whose image references simply cannot be resolved locally.

use crate::error::Snap2MdError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One discovered snapshot: an HTML file, its optional resource folder, and
/// where its Markdown will land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path to the HTML file, as rooted at the scanned input directory.
    pub source_path: PathBuf,
    /// The matched `<stem>_files` sibling folder, if present.
    pub resource_dir: Option<PathBuf>,
    /// Path of `source_path` relative to the input root; mirrors the
    /// hierarchy at the output side.
    pub relative_path: PathBuf,
    /// Mirrored output path: same relative directory, `.md` extension.
    pub output_md_path: PathBuf,
}

impl Document {
    /// Directory depth of the document below the input root.
    ///
    /// A file directly in the root has depth 0; `a/b/page.html` has depth 2.
    /// This is exactly the number of `../` segments needed to reach the
    /// output root from the document's own output directory.
    pub fn depth(&self) -> usize {
        self.relative_path
            .parent()
            .map(|p| p.components().count())
            .unwrap_or(0)
    }
}

/// Walk `input_root` and produce a [`Document`] for every `.html`/`.htm`
/// file found, at any depth.
///
/// Unreadable directories are logged and skipped; they never abort the walk.
/// The result order is the filesystem walk order — callers must not depend
/// on it, and no Document depends on any other.
pub fn scan(input_root: &Path, output_root: &Path) -> Result<Vec<Document>, Snap2MdError> {
    if !input_root.exists() {
        return Err(Snap2MdError::InputRootNotFound {
            path: input_root.to_path_buf(),
        });
    }
    if !input_root.is_dir() {
        return Err(Snap2MdError::InputRootNotADirectory {
            path: input_root.to_path_buf(),
        });
    }

    info!("scanning {}", input_root.display());
    let mut documents = Vec::new();

    for entry in WalkDir::new(input_root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable path: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_html_extension(path) {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("skipping file with non-UTF-8 name: {}", path.display());
            continue;
        };

        // Case-sensitive exact match on "<stem>_files", in the same directory.
        let resource_dir = path
            .parent()
            .map(|parent| parent.join(format!("{stem}_files")))
            .filter(|candidate| candidate.is_dir());

        match &resource_dir {
            Some(d) => debug!("paired {} -> {}", path.display(), d.display()),
            None => debug!("no resource folder for {}", path.display()),
        }

        let relative_path = path
            .strip_prefix(input_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(entry.file_name()));

        let output_md_path = output_root.join(&relative_path).with_extension("md");

        documents.push(Document {
            source_path: path.to_path_buf(),
            resource_dir,
            relative_path,
            output_md_path,
        });
    }

    info!("scan complete: {} document(s)", documents.len());
    Ok(documents)
}

fn has_html_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"<html></html>").unwrap();
    }

    #[test]
    fn pairs_html_with_files_folder() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("page.html"));
        fs::create_dir_all(root.join("page_files")).unwrap();

        let docs = scan(root, Path::new("out")).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].resource_dir, Some(root.join("page_files")));
        assert_eq!(docs[0].output_md_path, Path::new("out").join("page.md"));
    }

    #[test]
    fn html_without_folder_is_still_a_document() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("solo.html"));

        let docs = scan(tmp.path(), Path::new("out")).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].resource_dir.is_none());
    }

    #[test]
    fn orphan_files_folder_is_not_a_document() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("ghost_files")).unwrap();

        let docs = scan(tmp.path(), Path::new("out")).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn extension_match_is_case_insensitive_and_covers_htm() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("upper.HTML"));
        touch(&tmp.path().join("legacy.htm"));
        touch(&tmp.path().join("not_a_page.txt"));

        let docs = scan(tmp.path(), Path::new("out")).unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn folder_match_is_case_sensitive() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("page.html"));
        fs::create_dir_all(tmp.path().join("Page_files")).unwrap();

        let docs = scan(tmp.path(), Path::new("out")).unwrap();
        assert_eq!(docs.len(), 1);
        // "Page_files" != "page_files": no pairing.
        assert!(docs[0].resource_dir.is_none());
    }

    #[test]
    fn nested_documents_mirror_hierarchy() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a/b/deep.html"));

        let docs = scan(tmp.path(), Path::new("out")).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].relative_path, Path::new("a/b/deep.html"));
        assert_eq!(docs[0].output_md_path, Path::new("out/a/b/deep.md"));
        assert_eq!(docs[0].depth(), 2);
    }

    #[test]
    fn depth_zero_at_root() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("top.html"));

        let docs = scan(tmp.path(), Path::new("out")).unwrap();
        assert_eq!(docs[0].depth(), 0);
    }

    #[test]
    fn missing_root_is_fatal() {
        let err = scan(Path::new("/definitely/not/here"), Path::new("out"));
        assert!(matches!(err, Err(Snap2MdError::InputRootNotFound { .. })));
    }

    #[test]
    fn dotted_stems_pair_on_full_stem() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("v1.2 notes.html"));
        fs::create_dir_all(tmp.path().join("v1.2 notes_files")).unwrap();

        let docs = scan(tmp.path(), Path::new("out")).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].resource_dir.is_some());
        assert_eq!(
            docs[0].output_md_path.file_name().unwrap(),
            "v1.2 notes.md"
        );
    }
}
