//! Minimal XML support for the provider's flat `<xml>` documents.
//!
//! The provider exchanges documents consisting of a single `<xml>` root
//! element holding one child element per field, each with text or CDATA
//! content. The [`decode`] module reads such documents atop `quick-xml`,
//! the [`encode`] module writes them.

pub mod decode;
pub mod encode;
