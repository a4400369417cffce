//! A typed DOM with a fixed capability set: element/attribute access, child
//! iteration, node removal, image-reference harvesting, serialisation.
//!
//! The cleaner needs exactly those five operations and nothing else, so this
//! module wraps html5ever's `RcDom` behind a small surface instead of
//! spreading `NodeData` pattern-matches across the pipeline. Swapping the
//! parser would touch only this file.
//!
//! `RcDom` is `Rc`-based and therefore not `Send`; every [`Dom`] must be
//! created, transformed, and serialised within one synchronous scope (the
//! orchestrator runs the whole clean stage inside `spawn_blocking`).

use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::io;

/// A parsed HTML document.
pub struct Dom {
    dom: RcDom,
}

impl Dom {
    /// Parse an HTML string. html5ever recovers from arbitrary tag soup, so
    /// this never fails — garbage in, best-effort tree out.
    pub fn parse(html: &str) -> Dom {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html.to_string());
        Dom { dom }
    }

    /// The document root handle.
    pub fn root(&self) -> Handle {
        self.dom.document.clone()
    }

    /// Serialise the (possibly transformed) tree back to HTML.
    pub fn serialize(&self) -> io::Result<String> {
        let mut buf = Vec::new();
        let handle: SerializableHandle = self.dom.document.clone().into();
        serialize(&mut buf, &handle, SerializeOpts::default())?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Collect the `src` attribute of every `<img>`, in document order,
    /// deduplicated on first occurrence.
    pub fn image_refs(&self) -> Vec<String> {
        let mut refs = Vec::new();
        let mut seen = std::collections::HashSet::new();
        collect_image_refs(&self.root(), &mut refs, &mut seen);
        refs
    }
}

fn collect_image_refs(
    node: &Handle,
    refs: &mut Vec<String>,
    seen: &mut std::collections::HashSet<String>,
) {
    if element_name(node).as_deref() == Some("img") {
        if let Some(src) = get_attr(node, "src") {
            if !src.is_empty() && seen.insert(src.clone()) {
                refs.push(src);
            }
        }
    }
    for child in node.children.borrow().iter() {
        collect_image_refs(child, refs, seen);
    }
}

/// Lower-case local tag name, if this node is an element.
pub fn element_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref().to_ascii_lowercase()),
        _ => None,
    }
}

/// Whether this node is an HTML comment.
pub fn is_comment(node: &Handle) -> bool {
    matches!(&node.data, NodeData::Comment { .. })
}

/// The value of `attr` on an element node.
pub fn get_attr(node: &Handle, attr: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == attr)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Keep only the attributes for which `keep` returns true.
pub fn retain_attrs(node: &Handle, keep: impl Fn(&str, &str) -> bool) {
    if let NodeData::Element { attrs, .. } = &node.data {
        attrs
            .borrow_mut()
            .retain(|a| keep(a.name.local.as_ref(), a.value.as_ref()));
    }
}

/// Snapshot of a node's children (cheap `Rc` clones), for iteration that
/// outlives a `RefCell` borrow.
pub fn children_of(node: &Handle) -> Vec<Handle> {
    node.children.borrow().clone()
}

/// Drop every direct child for which `remove` returns true.
pub fn remove_children(node: &Handle, remove: impl Fn(&Handle) -> bool) {
    node.children.borrow_mut().retain(|c| !remove(c));
}

/// Whether the subtree rooted here carries any non-whitespace text or any
/// `<img>` element.
pub fn has_content(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { contents } => !contents.borrow().trim().is_empty(),
        NodeData::Element { name, .. } => {
            if name.local.as_ref().eq_ignore_ascii_case("img") {
                return true;
            }
            node.children.borrow().iter().any(has_content)
        }
        _ => node.children.borrow().iter().any(has_content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_serialize_roundtrip_keeps_content() {
        let dom = Dom::parse("<html><body><p>hello</p></body></html>");
        let out = dom.serialize().unwrap();
        assert!(out.contains("<p>hello</p>"), "got: {out}");
    }

    #[test]
    fn image_refs_in_document_order_deduplicated() {
        let dom = Dom::parse(
            r#"<body>
                <img src="a.png">
                <img src="b.png">
                <img src="a.png">
                <img>
                <img src="">
            </body>"#,
        );
        assert_eq!(dom.image_refs(), vec!["a.png", "b.png"]);
    }

    #[test]
    fn get_attr_reads_values() {
        let dom = Dom::parse(r#"<body><img src="x.png" alt="pic"></body>"#);
        let mut found = None;
        fn find_img(node: &Handle, out: &mut Option<Handle>) {
            if element_name(node).as_deref() == Some("img") {
                *out = Some(node.clone());
                return;
            }
            for c in children_of(node) {
                find_img(&c, out);
            }
        }
        find_img(&dom.root(), &mut found);
        let img = found.expect("img present");
        assert_eq!(get_attr(&img, "src").as_deref(), Some("x.png"));
        assert_eq!(get_attr(&img, "alt").as_deref(), Some("pic"));
        assert_eq!(get_attr(&img, "width"), None);
    }

    #[test]
    fn has_content_sees_text_and_images() {
        let with_text = Dom::parse("<body><div> hi </div></body>");
        assert!(has_content(&with_text.root()));

        let with_img = Dom::parse(r#"<body><div><img src="a.png"></div></body>"#);
        assert!(has_content(&with_img.root()));

        let empty = Dom::parse("<body><div><span>  </span></div></body>");
        // head/body themselves carry no text
        assert!(!has_content(&empty.root()));
    }

    #[test]
    fn malformed_html_still_parses() {
        let dom = Dom::parse("<p>unclosed <b>nested <i>deeply");
        let out = dom.serialize().unwrap();
        assert!(out.contains("deeply"));
    }
}
