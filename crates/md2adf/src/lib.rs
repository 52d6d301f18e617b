//! md2adf: Convert Markdown to Atlassian Document Format
//!
//! This crate provides:
//! - Markdown parsing (CommonMark with GFM tables and strikethrough)
//! - Markdown to ADF tree conversion
//! - ADF JSON serialization
//!
//! # Example
//!
//! ```
//! use md2adf::{Node, convert};
//!
//! let doc = convert("# Release notes\n\n- **fixed** login");
//! assert_eq!(doc.content.len(), 2);
//! assert!(matches!(doc.content[0], Node::Heading(_)));
//! ```

pub mod convert;

pub use adf_model::{Document, Mark, Node};
pub use convert::{
    ConvertOptions, MAX_NESTING, convert, convert_to_json, convert_to_json_pretty,
    convert_with_options, text_leaves,
};
