//! Resource resolution and Markdown reference rewriting.
//!
//! For each raw image reference harvested from the cleaned DOM this stage
//! decides: remote references pass through untouched; local references are
//! percent-decoded, located under the document's resource folder, interned
//! into the shared [`AssetStore`](crate::assets::AssetStore), and mapped to
//! a path that is valid *from the output Markdown's directory* — a document
//! two levels deep gets `../../assets/<hash>.<ext>`.
//!
//! The substitution happens in the **converted Markdown**, not the source
//! HTML: the external converter is instructed to echo reference text
//! verbatim, and this stage replaces those echoes. A reference the
//! converter failed to echo cannot be rewritten; that is reported as a
//! warning, never as a document failure.

use crate::assets::AssetStore;
use crate::output::AssetWarning;
use crate::scanner::Document;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The outcome of resolving one document's raw references.
#[derive(Debug, Default)]
pub struct ResolvedRefs {
    /// raw reference → output-relative asset path.
    pub mapping: HashMap<String, String>,
    /// Per-reference problems that did not fail the document.
    pub warnings: Vec<AssetWarning>,
}

/// Whether a reference points outside the local snapshot.
///
/// Absolute URLs, protocol-relative URLs, and inline data URIs are returned
/// unchanged by the pipeline — no store interaction at all.
pub fn is_remote_ref(raw: &str) -> bool {
    let r = raw.trim_start();
    r.starts_with("http:") || r.starts_with("https:") || r.starts_with("data:") || r.starts_with("//")
}

/// Resolve every raw reference for `doc`, interning readable local assets.
///
/// A document without a resource folder resolves nothing: its local-looking
/// references stay as they are (there is no folder to look in), and that is
/// not a warning — it is the normal shape of a snapshot saved without
/// resources.
pub async fn resolve_refs(
    doc: &Document,
    raw_refs: &[String],
    store: &AssetStore,
    asset_dir_name: &str,
) -> ResolvedRefs {
    let mut resolved = ResolvedRefs::default();
    let Some(resource_dir) = doc.resource_dir.as_deref() else {
        if !raw_refs.is_empty() {
            debug!(
                "{}: no resource folder; leaving {} reference(s) untouched",
                doc.source_path.display(),
                raw_refs.len()
            );
        }
        return resolved;
    };

    let prefix = relative_asset_prefix(doc.depth(), asset_dir_name);
    let mut doc_hashes: HashSet<String> = HashSet::new();

    for raw in raw_refs {
        if is_remote_ref(raw) {
            continue;
        }

        let Some(path) = locate_asset(doc, resource_dir, raw) else {
            warn!(
                "{}: could not locate image '{}'",
                doc.source_path.display(),
                raw
            );
            resolved.warnings.push(AssetWarning::UnreadableAsset {
                raw_ref: raw.clone(),
                detail: "file not found under the resource folder".into(),
            });
            continue;
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) => {
                warn!("{}: failed to read '{}': {}", doc.source_path.display(), path.display(), e);
                resolved.warnings.push(AssetWarning::UnreadableAsset {
                    raw_ref: raw.clone(),
                    detail: e.to_string(),
                });
                continue;
            }
        };

        let ext = path.extension().and_then(|e| e.to_str());
        let record = match store.intern(&bytes, ext).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    "{}: failed to store asset for '{}': {}",
                    doc.source_path.display(),
                    raw,
                    e
                );
                resolved.warnings.push(AssetWarning::UnreadableAsset {
                    raw_ref: raw.clone(),
                    detail: format!("store error: {e}"),
                });
                continue;
            }
        };

        doc_hashes.insert(record.content_hash.clone());
        resolved
            .mapping
            .insert(raw.clone(), format!("{prefix}{}", record.canonical_filename));
    }

    // ref_count counts documents, not occurrences: three raw paths to the
    // same bytes within this document bump it once.
    for hash in &doc_hashes {
        store.add_document_ref(hash).await;
    }

    resolved
}

/// `../` × depth + `<asset_dir_name>/` — always forward slashes, this is a
/// Markdown path, not a filesystem one.
fn relative_asset_prefix(depth: usize, asset_dir_name: &str) -> String {
    let mut prefix = "../".repeat(depth);
    prefix.push_str(asset_dir_name);
    prefix.push('/');
    prefix
}

/// Try the candidate interpretations of a raw reference until one names an
/// existing file.
///
/// Browsers and operating systems disagree on how saved references look:
/// percent-encoded or not, forward or back slashes, with or without a
/// leading `./`. References are usually relative to the HTML file's own
/// directory (`page_files/img.png`) but occasionally relative to the
/// resource folder itself, so both bases are tried.
fn locate_asset(doc: &Document, resource_dir: &Path, raw: &str) -> Option<PathBuf> {
    let decoded = match urlencoding::decode(raw) {
        Ok(d) => d.into_owned(),
        Err(_) => raw.to_string(),
    };
    let normalized = decoded.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./").to_string();

    let html_dir = doc.source_path.parent();

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(base) = html_dir {
        candidates.push(base.join(raw));
        candidates.push(base.join(&decoded));
        candidates.push(base.join(&normalized));
        candidates.push(base.join(&trimmed));
    }
    candidates.push(resource_dir.join(raw));
    candidates.push(resource_dir.join(&decoded));
    candidates.push(resource_dir.join(&normalized));
    candidates.push(resource_dir.join(&trimmed));

    candidates.into_iter().find(|p| p.is_file())
}

/// Substitute every mapped raw reference in the converted Markdown.
///
/// Returns the rewritten text plus the raw references the converter did not
/// echo (and which therefore could not be rewritten).
pub fn rewrite_markdown(markdown: &str, mapping: &HashMap<String, String>) -> (String, Vec<String>) {
    // Longest-first so a reference that is a substring of another
    // ("img.png" vs "sub/img.png") never clobbers the longer one.
    let mut entries: Vec<(&String, &String)> = mapping.iter().collect();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));

    let mut out = markdown.to_string();
    let mut missing = Vec::new();
    for (raw, replacement) in entries {
        if out.contains(raw.as_str()) {
            out = out.replace(raw.as_str(), replacement);
        } else {
            missing.push(raw.clone());
        }
    }
    missing.sort();
    (out, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn doc_at(tmp: &TempDir, rel: &str) -> Document {
        let source_path = tmp.path().join("in").join(rel);
        fs::create_dir_all(source_path.parent().unwrap()).unwrap();
        fs::write(&source_path, "<html></html>").unwrap();
        let resource_dir = source_path.parent().unwrap().join(format!(
            "{}_files",
            source_path.file_stem().unwrap().to_str().unwrap()
        ));
        fs::create_dir_all(&resource_dir).unwrap();
        Document {
            source_path: source_path.clone(),
            resource_dir: Some(resource_dir),
            relative_path: PathBuf::from(rel),
            output_md_path: tmp.path().join("out").join(rel).with_extension("md"),
        }
    }

    #[test]
    fn remote_refs_are_detected() {
        assert!(is_remote_ref("https://example.com/a.png"));
        assert!(is_remote_ref("http://example.com/a.png"));
        assert!(is_remote_ref("//cdn.example.com/a.png"));
        assert!(is_remote_ref("data:image/png;base64,AAAA"));
        assert!(!is_remote_ref("page_files/a.png"));
        assert!(!is_remote_ref("./a.png"));
    }

    #[test]
    fn asset_prefix_matches_depth() {
        assert_eq!(relative_asset_prefix(0, "assets"), "assets/");
        assert_eq!(relative_asset_prefix(1, "assets"), "../assets/");
        assert_eq!(relative_asset_prefix(2, "assets"), "../../assets/");
    }

    #[tokio::test]
    async fn local_ref_is_interned_and_mapped() {
        let tmp = TempDir::new().unwrap();
        let doc = doc_at(&tmp, "a/b/page.html");
        fs::write(doc.resource_dir.as_ref().unwrap().join("img1.png"), b"PNGDATA").unwrap();
        let store = AssetStore::open(tmp.path().join("out/assets")).unwrap();

        let refs = vec!["page_files/img1.png".to_string()];
        let resolved = resolve_refs(&doc, &refs, &store, "assets").await;

        assert!(resolved.warnings.is_empty());
        let final_path = &resolved.mapping["page_files/img1.png"];
        assert!(final_path.starts_with("../../assets/"), "{final_path}");
        assert!(final_path.ends_with(".png"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn percent_encoded_ref_resolves_to_decoded_file() {
        let tmp = TempDir::new().unwrap();
        let doc = doc_at(&tmp, "page.html");
        fs::write(doc.resource_dir.as_ref().unwrap().join("图.png"), b"BYTES").unwrap();
        let store = AssetStore::open(tmp.path().join("out/assets")).unwrap();

        let refs = vec!["page_files/%E5%9B%BE.png".to_string()];
        let resolved = resolve_refs(&doc, &refs, &store, "assets").await;

        assert!(resolved.warnings.is_empty(), "{:?}", resolved.warnings);
        assert!(resolved.mapping.contains_key("page_files/%E5%9B%BE.png"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn missing_file_warns_and_leaves_ref_unmapped() {
        let tmp = TempDir::new().unwrap();
        let doc = doc_at(&tmp, "page.html");
        let store = AssetStore::open(tmp.path().join("out/assets")).unwrap();

        let refs = vec!["page_files/ghost.png".to_string()];
        let resolved = resolve_refs(&doc, &refs, &store, "assets").await;

        assert!(resolved.mapping.is_empty());
        assert_eq!(resolved.warnings.len(), 1);
        assert!(matches!(
            resolved.warnings[0],
            AssetWarning::UnreadableAsset { .. }
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn remote_refs_skip_the_store() {
        let tmp = TempDir::new().unwrap();
        let doc = doc_at(&tmp, "page.html");
        let store = AssetStore::open(tmp.path().join("out/assets")).unwrap();

        let refs = vec!["https://cdn.example.com/logo.png".to_string()];
        let resolved = resolve_refs(&doc, &refs, &store, "assets").await;

        assert!(resolved.mapping.is_empty());
        assert!(resolved.warnings.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn no_resource_dir_resolves_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut doc = doc_at(&tmp, "page.html");
        doc.resource_dir = None;
        let store = AssetStore::open(tmp.path().join("out/assets")).unwrap();

        let refs = vec!["page_files/img.png".to_string()];
        let resolved = resolve_refs(&doc, &refs, &store, "assets").await;

        assert!(resolved.mapping.is_empty());
        assert!(resolved.warnings.is_empty());
    }

    #[tokio::test]
    async fn two_raw_paths_same_bytes_count_one_document_ref() {
        let tmp = TempDir::new().unwrap();
        let doc = doc_at(&tmp, "page.html");
        let rdir = doc.resource_dir.clone().unwrap();
        fs::write(rdir.join("one.png"), b"SAME").unwrap();
        fs::write(rdir.join("two.png"), b"SAME").unwrap();
        let store = AssetStore::open(tmp.path().join("out/assets")).unwrap();

        let refs = vec![
            "page_files/one.png".to_string(),
            "page_files/two.png".to_string(),
        ];
        let resolved = resolve_refs(&doc, &refs, &store, "assets").await;

        assert_eq!(resolved.mapping.len(), 2);
        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ref_count, 1);
        // Both raw refs point at the same canonical file.
        let targets: HashSet<_> = resolved.mapping.values().collect();
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn rewrite_substitutes_all_occurrences() {
        let mut mapping = HashMap::new();
        mapping.insert("page_files/a.png".to_string(), "../assets/h.png".to_string());

        let md = "![x](page_files/a.png)\n\ntext\n\n![y](page_files/a.png)\n";
        let (out, missing) = rewrite_markdown(md, &mapping);
        assert_eq!(out.matches("../assets/h.png").count(), 2);
        assert!(!out.contains("page_files/a.png"));
        assert!(missing.is_empty());
    }

    #[test]
    fn rewrite_reports_unechoed_refs() {
        let mut mapping = HashMap::new();
        mapping.insert("page_files/a.png".to_string(), "../assets/h.png".to_string());
        mapping.insert("page_files/b.png".to_string(), "../assets/i.png".to_string());

        let md = "![x](page_files/a.png)\n";
        let (out, missing) = rewrite_markdown(md, &mapping);
        assert!(out.contains("../assets/h.png"));
        assert_eq!(missing, vec!["page_files/b.png".to_string()]);
    }

    #[test]
    fn rewrite_handles_overlapping_refs_longest_first() {
        let mut mapping = HashMap::new();
        mapping.insert("img.png".to_string(), "assets/short.png".to_string());
        mapping.insert("sub/img.png".to_string(), "assets/long.png".to_string());

        let md = "![a](sub/img.png) ![b](img.png)";
        let (out, missing) = rewrite_markdown(md, &mapping);
        assert!(out.contains("assets/long.png"), "{out}");
        assert!(out.contains("assets/short.png"), "{out}");
        assert!(missing.is_empty());
    }
}
