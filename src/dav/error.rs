//! Error types for WebDAV operations
//!
//! `DavError` is what the method layer reports: one variant per outcome
//! the node layer branches on. `NodeError` is what node operations return,
//! naming the operation and the node it failed on.

use crate::http::{self, message::status, Method, StatusLine};
use bytes::Bytes;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum DavError {
    /// 404 or 410
    #[error("not found: {url}")]
    NotFound { url: String },

    /// 301, or a PROPFIND 400: the trailing-slash form of the path was wrong
    #[error("moved permanently: {url}")]
    MovedPermanently { url: String },

    /// 302 on GET; the redirect is not followed
    #[error("moved temporarily to {location}")]
    MovedTemporarily { location: String },

    /// A status code the verb does not expect
    #[error("{method} {url}: {line}")]
    Status {
        method: Method,
        url: String,
        line: StatusLine,
        body: Option<Bytes>,
    },

    #[error("not a file: {url}")]
    NotAFile { url: String },

    #[error("not a directory: {url}")]
    NotADirectory { url: String },

    #[error("directory not empty: {url}")]
    DirectoryNotEmpty { url: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A response that does not make sense for the request
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error(transparent)]
    Http(#[from] http::Error),
}

impl From<std::io::Error> for DavError {
    fn from(e: std::io::Error) -> Self {
        DavError::Http(http::Error::from_io(e))
    }
}

impl DavError {
    /// Status code carried by a generic status error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DavError::Status { line, .. } => Some(line.code()),
            _ => None,
        }
    }

    /// Not found, whether classified by the verb or carried as a raw status
    pub fn is_not_found(&self) -> bool {
        matches!(self, DavError::NotFound { .. })
            || matches!(self.status_code(), Some(status::NOT_FOUND | status::GONE))
    }

    /// Moved permanently, whether classified by the verb or carried as a raw status
    pub fn is_moved_permanently(&self) -> bool {
        matches!(self, DavError::MovedPermanently { .. })
            || self.status_code() == Some(status::MOVED_PERMANENTLY)
    }

    /// Diagnostic body of a status error, if it was read
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            DavError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

/// Node operations, as named in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Exists,
    IsFile,
    IsDirectory,
    Length,
    LastModified,
    List,
    Delete,
    Move,
    Mkdir,
    Read,
    Write,
    GetProperty,
    SetProperty,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Exists => "check existence of",
            Op::IsFile => "check file",
            Op::IsDirectory => "check directory",
            Op::Length => "get length of",
            Op::LastModified => "get last modified of",
            Op::List => "list",
            Op::Delete => "delete",
            Op::Move => "move",
            Op::Mkdir => "create directory",
            Op::Read => "read",
            Op::Write => "write",
            Op::GetProperty => "get property of",
            Op::SetProperty => "set property of",
        })
    }
}

/// A failed node operation
#[derive(Debug, thiserror::Error)]
#[error("cannot {op} {url}")]
pub struct NodeError {
    pub op: Op,
    pub url: String,
    #[source]
    pub cause: DavError,
}

impl NodeError {
    pub fn new(op: Op, url: impl Into<String>, cause: DavError) -> Self {
        NodeError {
            op,
            url: url.into(),
            cause,
        }
    }

    pub fn cause(&self) -> &DavError {
        &self.cause
    }
}
