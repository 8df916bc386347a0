//! XML request bodies and element helpers
//!
//! Requests are built as `xmltree` elements with the `DAV:` namespace bound
//! to prefix `D` on the root element. Parsed elements are matched by
//! namespace URI plus local name, whatever prefix the server chose.

use crate::dav::{DavError, Name, Property, Result, DAV_NS};
use xmltree::{Element, Namespace, XMLNode};

pub const CONTENT_TYPE: &str = "text/xml; charset=\"utf-8\"";

const DAV_PREFIX: &str = "D";
const CUSTOM_PREFIX: &str = "N";

/// Parse a response body
pub fn parse(body: &[u8]) -> Result<Element> {
    Element::parse(body).map_err(|e| DavError::Xml(e.to_string()))
}

/// Serialize a request body, XML declaration included
pub fn to_bytes(element: &Element) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    element
        .write(&mut buf)
        .map_err(|e| DavError::Xml(e.to_string()))?;
    Ok(buf)
}

/// `<D:propfind><D:prop>...</D:prop></D:propfind>` asking for `names`
pub fn propfind(names: &[Name]) -> Element {
    let mut prop = dav_element("prop");
    for name in names {
        prop.children.push(XMLNode::Element(named_element(name)));
    }
    let mut root = dav_root("propfind");
    root.children.push(XMLNode::Element(prop));
    root
}

/// `<D:propertyupdate><D:set><D:prop>...</D:prop></D:set></D:propertyupdate>`
pub fn propertyupdate(property: &Property) -> Element {
    let mut value = property.element().clone();
    let named = named_element(property.name());
    value.prefix = named.prefix;
    value.namespace = named.namespace;
    value.namespaces = named.namespaces;

    let mut prop = dav_element("prop");
    prop.children.push(XMLNode::Element(value));
    let mut set = dav_element("set");
    set.children.push(XMLNode::Element(prop));
    let mut root = dav_root("propertyupdate");
    root.children.push(XMLNode::Element(set));
    root
}

fn dav_root(local: &str) -> Element {
    let mut root = dav_element(local);
    let mut namespaces = Namespace::empty();
    namespaces.put(DAV_PREFIX, DAV_NS);
    root.namespaces = Some(namespaces);
    root
}

fn dav_element(local: &str) -> Element {
    let mut element = Element::new(local);
    element.prefix = Some(DAV_PREFIX.to_string());
    element.namespace = Some(DAV_NS.to_string());
    element
}

// Names outside DAV: declare their own prefix on the element
fn named_element(name: &Name) -> Element {
    if name.is_dav() {
        return dav_element(name.local());
    }
    let mut element = Element::new(name.local());
    element.prefix = Some(CUSTOM_PREFIX.to_string());
    element.namespace = Some(name.namespace().to_string());
    let mut namespaces = Namespace::empty();
    namespaces.put(CUSTOM_PREFIX, name.namespace());
    element.namespaces = Some(namespaces);
    element
}

/// Child elements, skipping text and comments
pub fn elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

/// Child elements with the given name
pub fn children<'a>(element: &'a Element, name: &'a Name) -> impl Iterator<Item = &'a Element> {
    elements(element).filter(move |child| name.matches(child))
}

pub fn child<'a>(element: &'a Element, name: &Name) -> Option<&'a Element> {
    elements(element).find(|child| name.matches(child))
}

/// Concatenated text and CDATA content, trimmed
pub fn text(element: &Element) -> String {
    let mut text = String::new();
    for node in &element.children {
        match node {
            XMLNode::Text(t) | XMLNode::CData(t) => text.push_str(t),
            _ => {}
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(element: &Element) -> Element {
        let bytes = to_bytes(element).unwrap();
        parse(&bytes).unwrap()
    }

    #[test]
    fn test_propfind_body() {
        let body = propfind(&[Name::RESOURCETYPE, Name::GETCONTENTLENGTH]);
        let text = String::from_utf8(to_bytes(&body).unwrap()).unwrap();
        assert!(text.contains("D:propfind"));
        assert!(text.contains("xmlns:D=\"DAV:\""));

        let parsed = roundtrip(&body);
        assert!(Name::dav("propfind").matches(&parsed));
        let prop = child(&parsed, &Name::dav("prop")).unwrap();
        let names: Vec<_> = elements(prop).map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["resourcetype", "getcontentlength"]);
    }

    #[test]
    fn test_propertyupdate_custom_namespace() {
        let property = Property::text(Name::new("urn:example", "color"), "blue");
        let parsed = roundtrip(&propertyupdate(&property));

        let set = child(&parsed, &Name::dav("set")).unwrap();
        let prop = child(set, &Name::dav("prop")).unwrap();
        let value = child(prop, property.name()).unwrap();
        assert_eq!(text(value), "blue");
    }

    #[test]
    fn test_match_ignores_prefix() {
        let doc = br#"<?xml version="1.0"?>
            <x:multistatus xmlns:x="DAV:"><x:response/>  <!-- c --> <x:response/></x:multistatus>"#;
        let parsed = parse(doc).unwrap();
        assert_eq!(children(&parsed, &Name::dav("response")).count(), 2);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse(b"<open>"), Err(DavError::Xml(_))));
    }
}
