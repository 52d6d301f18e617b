//! ADF (Atlassian Document Format) node types
//!
//! The subset of block nodes, inline nodes and marks that markdown can express.
//! Reference: https://developer.atlassian.com/cloud/jira/platform/apis/document/structure/

use serde::{Deserialize, Serialize};

/// ADF format version carried by every document
pub const ADF_VERSION: u32 = 1;

/// Root node of an ADF document
///
/// Serializes as `{"type": "doc", "version": 1, "content": [...]}`.
/// `content` is always present, even for an empty document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "doc")]
pub struct Document {
    pub version: u32,
    pub content: Vec<Node>,
}

/// An ADF node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    // Block nodes
    Paragraph(Paragraph),
    Heading(Heading),
    BulletList(BulletList),
    OrderedList(OrderedList),
    ListItem(ListItem),
    Blockquote(Blockquote),
    CodeBlock(CodeBlock),
    Rule,
    Table(Table),
    TableRow(TableRow),
    TableCell(TableCell),
    #[serde(rename = "tableHeader")]
    TableHeaderCell(TableCell),

    // Inline nodes
    Text(Text),
    HardBreak,
}

/// Paragraph node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,
}

/// Heading node (level 1 to 6)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub attrs: HeadingAttrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    pub level: u8,
}

/// Unordered list node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletList {
    pub content: Vec<Node>,
}

/// Ordered list node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedList {
    /// Present only when the list does not start at 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<OrderedListAttrs>,
    pub content: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedListAttrs {
    pub order: u64,
}

/// List item node (block content, first child is usually a paragraph)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub content: Vec<Node>,
}

/// Blockquote node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blockquote {
    pub content: Vec<Node>,
}

/// Code block node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<CodeBlockAttrs>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockAttrs {
    pub language: String,
}

/// Table node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub content: Vec<Node>,
}

/// Table row node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub content: Vec<Node>,
}

/// Table cell node, shared by `tableCell` and `tableHeader`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub content: Vec<Node>,
}

/// Text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

/// Inline formatting applied to a text node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Mark {
    #[serde(rename = "strong")]
    Bold,
    #[serde(rename = "em")]
    Italic,
    #[serde(rename = "strike")]
    Strikethrough,
    #[serde(rename = "code")]
    InlineCode,
    #[serde(rename = "link")]
    Link { attrs: LinkAttrs },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkAttrs {
    pub href: String,
}

// Convenience constructors
impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(Text {
            text: s.into(),
            marks: Vec::new(),
        })
    }

    pub fn marked_text(s: impl Into<String>, marks: Vec<Mark>) -> Self {
        Node::Text(Text {
            text: s.into(),
            marks,
        })
    }

    pub fn paragraph(content: Vec<Node>) -> Self {
        Node::Paragraph(Paragraph { content })
    }

    /// Heading with the level clamped to 1..=6
    pub fn heading(level: u8, content: Vec<Node>) -> Self {
        Node::Heading(Heading {
            attrs: HeadingAttrs {
                level: level.clamp(1, 6),
            },
            content,
        })
    }

    pub fn bullet_list(items: Vec<Node>) -> Self {
        Node::BulletList(BulletList { content: items })
    }

    pub fn ordered_list(items: Vec<Node>) -> Self {
        Node::OrderedList(OrderedList {
            attrs: None,
            content: items,
        })
    }

    pub fn ordered_list_from(start: u64, items: Vec<Node>) -> Self {
        Node::OrderedList(OrderedList {
            attrs: (start != 1).then_some(OrderedListAttrs { order: start }),
            content: items,
        })
    }

    pub fn list_item(content: Vec<Node>) -> Self {
        Node::ListItem(ListItem { content })
    }

    pub fn blockquote(content: Vec<Node>) -> Self {
        Node::Blockquote(Blockquote { content })
    }

    pub fn code_block(language: Option<String>, code: impl Into<String>) -> Self {
        let code = code.into();
        Node::CodeBlock(CodeBlock {
            attrs: language.map(|language| CodeBlockAttrs { language }),
            content: if code.is_empty() {
                Vec::new()
            } else {
                vec![Node::text(code)]
            },
        })
    }

    pub fn rule() -> Self {
        Node::Rule
    }

    pub fn table(rows: Vec<Node>) -> Self {
        Node::Table(Table { content: rows })
    }

    pub fn table_row(cells: Vec<Node>) -> Self {
        Node::TableRow(TableRow { content: cells })
    }

    pub fn table_cell(content: Vec<Node>) -> Self {
        Node::TableCell(TableCell { content })
    }

    pub fn table_header_cell(content: Vec<Node>) -> Self {
        Node::TableHeaderCell(TableCell { content })
    }

    pub fn hard_break() -> Self {
        Node::HardBreak
    }

    /// Child nodes of this node (empty for leaves)
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Paragraph(Paragraph { content })
            | Node::Heading(Heading { content, .. })
            | Node::BulletList(BulletList { content })
            | Node::OrderedList(OrderedList { content, .. })
            | Node::ListItem(ListItem { content })
            | Node::Blockquote(Blockquote { content })
            | Node::CodeBlock(CodeBlock { content, .. })
            | Node::Table(Table { content })
            | Node::TableRow(TableRow { content })
            | Node::TableCell(TableCell { content })
            | Node::TableHeaderCell(TableCell { content }) => content,
            Node::Rule | Node::Text(_) | Node::HardBreak => &[],
        }
    }

    /// Concatenated text of this node and its descendants
    pub fn plain_text(&self) -> String {
        match self {
            Node::Text(t) => t.text.clone(),
            Node::HardBreak => "\n".to_string(),
            other => other.children().iter().map(Node::plain_text).collect(),
        }
    }
}

impl Mark {
    pub fn link(href: impl Into<String>) -> Self {
        Mark::Link {
            attrs: LinkAttrs { href: href.into() },
        }
    }

    /// Href of a link mark
    pub fn href(&self) -> Option<&str> {
        match self {
            Mark::Link { attrs } => Some(&attrs.href),
            _ => None,
        }
    }
}

impl Document {
    pub fn new(content: Vec<Node>) -> Self {
        Self {
            version: ADF_VERSION,
            content,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
