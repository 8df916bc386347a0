//! davnode - WebDAV/HTTP node backend
//!
//! This crate implements the HTTP/WebDAV side of a uniform node abstraction:
//! a pooled HTTP/1.1 protocol engine and a node type that resolves
//! directory-versus-file ambiguity against plain HTTP and WebDAV servers.

pub mod dav;
pub mod http;

pub use dav::{DavError, HttpNode, Name, NodeError, Op};
pub use http::{Root, Scheme};
