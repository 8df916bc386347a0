//! HTTP headers handling
//!
//! This module provides the header value type and an ordered header
//! collection with case-insensitive lookups.

use super::{Error, Result, MAX_HEADERS};
use std::fmt;

/// A single header
///
/// Immutable once constructed; name comparison is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    pub const AUTHORIZATION: &'static str = "Authorization";
    pub const CONNECTION: &'static str = "Connection";
    pub const CONTENT_ENCODING: &'static str = "Content-Encoding";
    pub const CONTENT_LENGTH: &'static str = "Content-Length";
    pub const CONTENT_TYPE: &'static str = "Content-Type";
    pub const DEPTH: &'static str = "Depth";
    pub const DESTINATION: &'static str = "Destination";
    pub const HOST: &'static str = "Host";
    pub const LAST_MODIFIED: &'static str = "Last-Modified";
    pub const LOCATION: &'static str = "Location";
    pub const OVERWRITE: &'static str = "Overwrite";
    pub const TRANSFER_ENCODING: &'static str = "Transfer-Encoding";

    /// Create a new header
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Get the header name as sent
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the header value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Check the name against `name`, ignoring ASCII case
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Parse a header line into a header
    pub fn parse(line: &str) -> Result<Self> {
        if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim();
            let value = line[colon_pos + 1..].trim();

            if name.is_empty() {
                return Err(Error::InvalidHeader("Empty header name".to_string()));
            }
            if name.contains(char::is_whitespace) {
                return Err(Error::InvalidHeader(format!("Whitespace in header name: {}", line)));
            }

            Ok(Header::new(name, value))
        } else {
            Err(Error::InvalidHeader(format!("No colon in header: {}", line)))
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// HTTP header list
///
/// Headers are stored in insertion order and support:
/// - Case-insensitive first-match lookups
/// - Duplicate names, kept in the order they were added
/// - Iteration over all headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    headers: Vec<Header>,
}

impl HeaderList {
    /// Create a new empty header list
    pub fn new() -> Self {
        HeaderList {
            headers: Vec::new(),
        }
    }

    /// Append a header
    ///
    /// If a header with the same name (case-insensitive) already exists,
    /// this adds another one rather than replacing it.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.push(Header::new(name, value));
    }

    /// Append an already constructed header
    pub fn push(&mut self, header: Header) {
        self.headers.push(header);
    }

    /// Get the first header with this name (case-insensitive)
    pub fn get_first(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.is(name))
    }

    /// Get the first value for a header (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_first(name).map(Header::value)
    }

    /// Get all values for a header (case-insensitive)
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.is(name))
            .map(Header::value)
            .collect()
    }

    /// Check if a header exists
    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.is(name))
    }

    /// Get the number of headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over all headers
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter()
    }

    /// Parse a header line and append it, enforcing the header count limit
    pub fn add_line(&mut self, line: &str) -> Result<()> {
        if self.headers.len() >= MAX_HEADERS {
            return Err(Error::InvalidHeader(format!(
                "More than {} headers",
                MAX_HEADERS
            )));
        }
        self.push(Header::parse(line)?);
        Ok(())
    }
}

impl fmt::Display for HeaderList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.headers {
            writeln!(f, "{}", header)?;
        }
        Ok(())
    }
}

impl FromIterator<Header> for HeaderList {
    fn from_iter<T: IntoIterator<Item = Header>>(iter: T) -> Self {
        HeaderList {
            headers: iter.into_iter().collect(),
        }
    }
}
