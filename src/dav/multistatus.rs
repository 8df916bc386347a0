//! `207 Multi-Status` decoding
//!
//! A multistatus body is flattened into one record per property per
//! `propstat`, each carrying the href it belongs to and the status the
//! server reported for that property.

use crate::dav::{xml, DavError, Name, Property, Result};
use crate::http::parser::parse_status_line;
use xmltree::Element;

#[derive(Debug, Clone, PartialEq)]
pub struct MultiStatus {
    href: String,
    property: Property,
    status: u16,
}

impl MultiStatus {
    /// Decode a multistatus body
    pub fn parse(body: &[u8]) -> Result<Vec<MultiStatus>> {
        Self::from_element(&xml::parse(body)?)
    }

    pub fn from_element(root: &Element) -> Result<Vec<MultiStatus>> {
        if !Name::dav("multistatus").matches(root) {
            return Err(DavError::Protocol(format!(
                "expected multistatus, got <{}>",
                root.name
            )));
        }

        let mut records = Vec::new();
        for response in xml::children(root, &Name::dav("response")) {
            let href = xml::child(response, &Name::dav("href"))
                .map(xml::text)
                .ok_or_else(|| DavError::Protocol("multistatus response without href".to_string()))?;

            for propstat in xml::children(response, &Name::dav("propstat")) {
                let status = propstat_status(propstat)?;
                let Some(prop) = xml::child(propstat, &Name::dav("prop")) else {
                    continue;
                };
                for value in xml::elements(prop) {
                    records.push(MultiStatus {
                        href: href.clone(),
                        property: Property::from_element(value.clone()),
                        status,
                    });
                }
            }
        }
        Ok(records)
    }

    /// First record for `name`, whichever href it belongs to
    pub fn lookup<'a>(records: &'a [MultiStatus], name: &Name) -> Option<&'a MultiStatus> {
        records.iter().find(|record| record.property.name() == name)
    }

    /// Record for `name` under `href`
    ///
    /// Hrefs compare equal regardless of a `scheme://authority` prefix or a
    /// trailing slash.
    pub fn lookup_href<'a>(records: &'a [MultiStatus], href: &str, name: &Name) -> Option<&'a MultiStatus> {
        let wanted = normalize_href(href);
        records
            .iter()
            .find(|record| record.property.name() == name && normalize_href(&record.href) == wanted)
    }

    /// Distinct hrefs, in document order
    pub fn hrefs(records: &[MultiStatus]) -> Vec<&str> {
        let mut hrefs: Vec<&str> = Vec::new();
        for record in records {
            if !hrefs.contains(&record.href.as_str()) {
                hrefs.push(&record.href);
            }
        }
        hrefs
    }

    /// Raw href as sent by the server, still percent-encoded
    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Path part of an href, without trailing slash
pub fn normalize_href(href: &str) -> &str {
    let path = match href.find("://") {
        Some(at) => {
            let rest = &href[at + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => href,
    };
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn propstat_status(propstat: &Element) -> Result<u16> {
    let text = xml::child(propstat, &Name::dav("status"))
        .map(xml::text)
        .ok_or_else(|| DavError::Protocol("propstat without status".to_string()))?;
    Ok(parse_status_line(&text)?.code())
}
