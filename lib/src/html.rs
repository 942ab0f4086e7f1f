//! Read-modify-write access to HTML documents.
//!
//! Publishers only touch generated HTML through [`HtmlTree`]; [`Dom`] is the
//! implementation backed by an html5ever parse tree.

use kuchikiki::traits::TendrilSink;
use kuchikiki::{ElementData, NodeRef};

use crate::error::Result;

pub trait HtmlTree: Sized {
    type Node: Clone;

    /// Parses a complete document. Parsing is lenient: malformed markup is
    /// repaired the way a browser would.
    fn parse(html: &str) -> Self;

    /// The document node.
    fn root(&self) -> Self::Node;

    /// Descendant elements of `scope` carrying `class`, in document order.
    fn find_by_class(&self, scope: &Self::Node, class: &str) -> Vec<Self::Node>;

    /// Descendant elements of `scope` named `tag`, in document order.
    fn find_by_tag(&self, scope: &Self::Node, tag: &str) -> Vec<Self::Node>;

    /// The concatenated text of `node` and its descendants.
    fn text(&self, node: &Self::Node) -> String;

    fn attr(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attr(&self, node: &Self::Node, name: &str, value: &str);

    /// Replaces every child of `node` with a single text node.
    fn set_text(&self, node: &Self::Node, text: &str);

    /// Parses `html` and appends the resulting nodes to `node`.
    fn append_html(&self, node: &Self::Node, html: &str);

    fn serialize(&self) -> Result<String>;

    /// The first descendant of the document named `tag`.
    fn first_by_tag(&self, tag: &str) -> Option<Self::Node> {
        self.find_by_tag(&self.root(), tag).into_iter().next()
    }
}

/// A `<link rel="describedby">` tag pointing at a Turtle document.
pub fn describedby_link(href: &str) -> String {
    format!(r#"<link rel="describedby" type="text/turtle" href="{href}">"#)
}

/// Points the `describedby` link in the head of `html` at `href`, adding the
/// link if there is none. `None` if the document already links to `href`.
pub fn set_describedby<H: HtmlTree>(html: &str, href: &str) -> Result<Option<String>> {
    let dom = H::parse(html);
    let Some(head) = dom.first_by_tag("head") else {
        return Ok(None);
    };

    let link = dom.find_by_tag(&head, "link")
        .into_iter()
        .find(|link| dom.attr(link, "rel").as_deref() == Some("describedby"));

    match link {
        Some(link) if dom.attr(&link, "href").as_deref() == Some(href) => return Ok(None),
        Some(link) => dom.set_attr(&link, "href", href),
        None => dom.append_html(&head, &describedby_link(href)),
    }

    dom.serialize().map(Some)
}

/// An [`HtmlTree`] over a `kuchikiki` document.
#[derive(Debug, Clone)]
pub struct Dom {
    document: NodeRef,
}

impl Dom {
    fn elements(scope: &NodeRef, filter: impl Fn(&ElementData) -> bool) -> Vec<NodeRef> {
        scope.descendants()
            .filter(|node| node.as_element().map_or(false, &filter))
            .collect()
    }
}

impl HtmlTree for Dom {
    type Node = NodeRef;

    fn parse(html: &str) -> Self {
        Dom { document: kuchikiki::parse_html().one(html) }
    }

    fn root(&self) -> NodeRef {
        self.document.clone()
    }

    fn find_by_class(&self, scope: &NodeRef, class: &str) -> Vec<NodeRef> {
        Dom::elements(scope, |element| {
            element.attributes.borrow()
                .get("class")
                .map_or(false, |list| list.split_whitespace().any(|c| c == class))
        })
    }

    fn find_by_tag(&self, scope: &NodeRef, tag: &str) -> Vec<NodeRef> {
        Dom::elements(scope, |element| &*element.name.local == tag)
    }

    fn text(&self, node: &NodeRef) -> String {
        node.text_contents()
    }

    fn attr(&self, node: &NodeRef, name: &str) -> Option<String> {
        let element = node.as_element()?;
        let attributes = element.attributes.borrow();
        attributes.get(name).map(str::to_string)
    }

    fn set_attr(&self, node: &NodeRef, name: &str, value: &str) {
        if let Some(element) = node.as_element() {
            element.attributes.borrow_mut().insert(name, value.to_string());
        }
    }

    fn set_text(&self, node: &NodeRef, text: &str) {
        for child in node.children().collect::<Vec<_>>() {
            child.detach();
        }

        node.append(NodeRef::new_text(text));
    }

    fn append_html(&self, node: &NodeRef, html: &str) {
        // A full parse hoists metadata elements such as `<link>` into the
        // head, so take the children of both the head and the body.
        let fragment = kuchikiki::parse_html().one(html);
        for container in ["head", "body"] {
            let Some(container) = first_element(&fragment, container) else {
                continue;
            };

            for child in container.children().collect::<Vec<_>>() {
                node.append(child);
            }
        }
    }

    fn serialize(&self) -> Result<String> {
        let mut bytes = vec![];
        self.document.serialize(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn first_element(document: &NodeRef, tag: &str) -> Option<NodeRef> {
    document.descendants()
        .find(|node| node.as_element().map_or(false, |e| &*e.name.local == tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!DOCTYPE html><html><head><title>t</title></head><body>
        <nav class="toc"><a href="#Test One">Test One</a></nav>
        <section class="entity wide" id="Test One"><code class="iri">https://x.org/v#Test One</code></section>
    </body></html>"##;

    #[test]
    fn finds_and_edits() {
        let dom = Dom::parse(PAGE);
        let root = dom.root();
        let entities = dom.find_by_class(&root, "entity");
        assert_eq!(entities.len(), 1);
        assert_eq!(dom.attr(&entities[0], "id").as_deref(), Some("Test One"));

        let iri = &dom.find_by_class(&entities[0], "iri")[0];
        assert_eq!(dom.text(iri), "https://x.org/v#Test One");
        dom.set_text(iri, "https://x.org/v#testOne");
        dom.set_attr(&entities[0], "id", "testOne");

        let toc = &dom.find_by_class(&root, "toc")[0];
        let anchors = dom.find_by_tag(toc, "a");
        assert_eq!(anchors.len(), 1);
        dom.set_attr(&anchors[0], "href", "#testOne");

        let html = dom.serialize().unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"id="testOne""#));
        assert!(html.contains(r##"href="#testOne""##));
        assert!(html.contains(">https://x.org/v#testOne<"));
        assert!(!html.contains("Test One\""));
    }

    #[test]
    fn appends_markup_to_head() {
        let dom = Dom::parse(PAGE);
        let head = dom.first_by_tag("head").unwrap();
        dom.append_html(&head, r#"<link rel="describedby" type="text/turtle" href="a.ttl">"#);

        let links = dom.find_by_tag(&head, "link");
        assert_eq!(links.len(), 1);
        assert_eq!(dom.attr(&links[0], "href").as_deref(), Some("a.ttl"));
        assert!(dom.serialize().unwrap().contains("describedby"));
    }

    #[test]
    fn describedby_is_idempotent() {
        let html = set_describedby::<Dom>(PAGE, "a.ttl").unwrap().unwrap();
        assert!(html.contains(r#"href="a.ttl""#));
        assert_eq!(set_describedby::<Dom>(&html, "a.ttl").unwrap(), None);

        let moved = set_describedby::<Dom>(&html, "../b.ttl").unwrap().unwrap();
        assert!(moved.contains(r#"href="../b.ttl""#));
        assert_eq!(moved.matches("describedby").count(), 1);
    }
}
