//! DOM noise reduction before the external conversion call.
//!
//! Saved web pages drag along scripts, stylesheets, navigation chrome, and
//! tracking attributes that cost tokens and carry no document semantics.
//! This stage removes them — and nothing else. The bias is deliberately
//! conservative: a node we wrongly keep costs a few tokens; a node we
//! wrongly drop is content the reader never gets back. When in doubt, keep.
//!
//! The stage is a pure DOM transform: no I/O, no network, deterministic.

use crate::dom::{self, Dom};
use markup5ever_rcdom::Handle;

/// Tags removed together with their entire subtree.
///
/// Scripts and styles are pure noise; form controls are interaction, not
/// content; `nav`/`footer` on documentation pages hold menus and copyright
/// lines. `svg`/`path` are vector chrome (icons, decorations) that cannot
/// survive a text conversion anyway.
const REMOVE_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "meta", "link", "svg", "path", "button", "input",
    "form", "select", "textarea", "nav", "footer",
];

/// Attributes that survive cleaning.
///
/// `class` stays because it often carries code-block language hints
/// (`language-rust`, `highlight-python`) the converter uses; `rowspan`/
/// `colspan` are structural for tables.
const KEEP_ATTRS: &[&str] = &[
    "src", "href", "alt", "title", "rowspan", "colspan", "class", "id",
];

/// Containers pruned when they hold no text and no image after cleaning.
const PRUNE_IF_EMPTY: &[&str] = &["div", "span", "p"];

/// Strip structurally noisy markup from the tree, in place.
pub fn clean(dom: &Dom) {
    clean_node(&dom.root());
}

fn clean_node(node: &Handle) {
    // Children first: emptiness of a container is judged on its cleaned
    // subtree, not on the noise about to be removed from it.
    for child in dom::children_of(node) {
        clean_node(&child);
    }

    dom::remove_children(node, is_noise);

    dom::retain_attrs(node, |name, value| {
        if !KEEP_ATTRS.contains(&name) {
            return false;
        }
        // javascript: links are script smuggled into an allowed attribute.
        !(name == "href" && value.trim().to_ascii_lowercase().starts_with("javascript:"))
    });
}

fn is_noise(node: &Handle) -> bool {
    if dom::is_comment(node) {
        return true;
    }
    match dom::element_name(node) {
        Some(name) if REMOVE_TAGS.contains(&name.as_str()) => true,
        Some(name) if PRUNE_IF_EMPTY.contains(&name.as_str()) => !dom::has_content(node),
        _ => false,
    }
}
