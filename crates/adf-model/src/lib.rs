//! adf-model: Atlassian Document Format (ADF) types for agent-tools
//!
//! This crate provides:
//! - ADF document, node and mark types (subset), serializable with serde
//! - Rendering of an ADF document back to Markdown
//!
//! ## Example
//!
//! ```rust
//! use adf_model::{Document, Node, WriterOptions, document_to_markdown};
//!
//! let doc = Document::new(vec![
//!     Node::heading(1, vec![Node::text("Hello")]),
//!     Node::paragraph(vec![Node::text("World")]),
//! ]);
//!
//! let md = document_to_markdown(&doc, &WriterOptions::default());
//! assert!(md.contains("# Hello"));
//! ```

pub mod node;
pub mod writer;

pub use node::{
    ADF_VERSION, Blockquote, BulletList, CodeBlock, CodeBlockAttrs, Document, Heading,
    HeadingAttrs, LinkAttrs, ListItem, Mark, Node, OrderedList, OrderedListAttrs, Paragraph,
    Table, TableCell, TableRow, Text,
};
pub use writer::{WriterOptions, document_to_markdown};
