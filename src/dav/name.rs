//! Property names and values

use std::borrow::Cow;
use std::fmt;
use xmltree::{Element, XMLNode};

/// The WebDAV namespace
pub const DAV_NS: &str = "DAV:";

/// A qualified property name: namespace URI plus local name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    namespace: Cow<'static, str>,
    local: Cow<'static, str>,
}

impl Name {
    pub const RESOURCETYPE: Name = Name::dav("resourcetype");
    pub const GETCONTENTLENGTH: Name = Name::dav("getcontentlength");
    pub const GETLASTMODIFIED: Name = Name::dav("getlastmodified");
    pub const DISPLAYNAME: Name = Name::dav("displayname");

    /// Element name of the `<collection/>` marker inside `resourcetype`
    pub const COLLECTION: Name = Name::dav("collection");

    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Name {
            namespace: Cow::Owned(namespace.into()),
            local: Cow::Owned(local.into()),
        }
    }

    /// A name in the `DAV:` namespace
    pub const fn dav(local: &'static str) -> Self {
        Name {
            namespace: Cow::Borrowed(DAV_NS),
            local: Cow::Borrowed(local),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn is_dav(&self) -> bool {
        self.namespace == DAV_NS
    }

    /// Whether `element` carries this name
    pub fn matches(&self, element: &Element) -> bool {
        element.name == self.local && element.namespace.as_deref() == Some(self.namespace())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local)
    }
}

/// A property as found in a multistatus response, or as sent in PROPPATCH
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    name: Name,
    value: Element,
}

impl Property {
    /// Wrap a property element, taking its name from the element
    pub fn from_element(value: Element) -> Self {
        let name = Name::new(value.namespace.clone().unwrap_or_default(), value.name.clone());
        Property { name, value }
    }

    /// A property whose value is plain text
    pub fn text(name: Name, text: &str) -> Self {
        let mut value = Element::new(name.local());
        value.namespace = Some(name.namespace().to_string());
        if !text.is_empty() {
            value.children.push(XMLNode::Text(text.to_string()));
        }
        Property { name, value }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The property element, children included
    pub fn element(&self) -> &Element {
        &self.value
    }

    /// Text content, trimmed
    pub fn value(&self) -> String {
        crate::dav::xml::text(&self.value)
    }

    /// First child element with the given name
    pub fn child(&self, name: &Name) -> Option<&Element> {
        crate::dav::xml::child(&self.value, name)
    }
}
