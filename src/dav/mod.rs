//! WebDAV layer
//!
//! This module builds the node abstraction on top of the HTTP engine:
//!
//! - `method` - one operation per verb, with exact status classification
//! - `multistatus` - decoder for `207 Multi-Status` bodies
//! - `node` - `HttpNode`, which resolves directory-versus-file ambiguity
//!   and DAV capability per node

pub mod error;
pub mod method;
pub mod multistatus;
pub mod name;
pub mod node;
pub mod xml;

pub use error::{DavError, NodeError, Op};
pub use method::{Depth, GetStream, PutStream};
pub use multistatus::MultiStatus;
pub use name::{Name, Property, DAV_NS};
pub use node::{HttpNode, NodeResult};

/// Result type for method layer operations
pub type Result<T> = std::result::Result<T, DavError>;
