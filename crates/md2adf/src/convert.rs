//! Markdown to ADF conversion
//!
//! Walks the pulldown-cmark event stream with a stack of open containers and
//! builds an ADF tree. The markdown grammar is total, so conversion never fails.

use adf_model::{Document, Mark, Node, Text};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Options for Markdown to ADF conversion
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Turn soft line breaks into hard breaks instead of a single space
    pub preserve_line_breaks: bool,
}

/// Convert Markdown to an ADF document
pub fn convert(markdown: &str) -> Document {
    convert_with_options(markdown, &ConvertOptions::default())
}

/// Convert Markdown to an ADF document with options
pub fn convert_with_options(markdown: &str, options: &ConvertOptions) -> Document {
    let mut parser_options = Options::empty();
    parser_options.insert(Options::ENABLE_TABLES);
    parser_options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut converter = Converter::new(options);
    for event in Parser::new_ext(markdown, parser_options) {
        converter.process_event(event);
    }
    converter.finish()
}

/// Convert Markdown to compact ADF JSON
pub fn convert_to_json(markdown: &str) -> serde_json::Result<String> {
    serde_json::to_string(&convert(markdown))
}

/// Convert Markdown to indented ADF JSON
pub fn convert_to_json_pretty(markdown: &str) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&convert(markdown))
}

/// Deepest nesting of blockquotes, lists and list items kept in the tree.
///
/// Containers opened below this depth are flattened into the innermost kept
/// one, so serializing, dropping or re-parsing the document stays within the
/// recursion limits of serde_json and of the stack.
pub const MAX_NESTING: usize = 32;

/// Kind of an open container on the converter stack
#[derive(Debug)]
enum FrameKind {
    Root,
    /// `implicit` paragraphs wrap inline runs of tight list items
    Paragraph { implicit: bool },
    Heading(u8),
    Blockquote,
    BulletList,
    OrderedList(u64),
    ListItem,
    CodeBlock { language: Option<String>, code: String },
    HtmlBlock(String),
    Table,
    TableHead,
    TableRow,
    TableCell,
    /// Unsupported or too deeply nested construct whose children are passed
    /// to the parent
    Transparent { inline: bool },
}

impl FrameKind {
    fn nests(&self) -> bool {
        matches!(
            self,
            FrameKind::Blockquote
                | FrameKind::BulletList
                | FrameKind::OrderedList(_)
                | FrameKind::ListItem
        )
    }
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    children: Vec<Node>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    fn holds_inline(&self) -> bool {
        matches!(
            self.kind,
            FrameKind::Paragraph { .. }
                | FrameKind::Heading(_)
                | FrameKind::TableCell
                | FrameKind::Transparent { inline: true }
        )
    }
}

/// Converter state
struct Converter<'a> {
    options: &'a ConvertOptions,
    stack: Vec<Frame>,
    /// Marks opened by enclosing spans; `None` for spans that carry no mark
    marks: Vec<Option<Mark>>,
    /// Open links and images: URL and the inline count when they started
    labels: Vec<(String, usize)>,
    /// Inline nodes pushed so far
    inline_count: usize,
    /// Open nesting containers on the stack
    depth: usize,
}

impl<'a> Converter<'a> {
    fn new(options: &'a ConvertOptions) -> Self {
        Self {
            options,
            stack: vec![Frame::new(FrameKind::Root)],
            marks: Vec::new(),
            labels: Vec::new(),
            inline_count: 0,
            depth: 0,
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),

            Event::Text(text) => {
                if !self.append_raw(&text) {
                    self.push_text(&text, self.active_marks());
                }
            }
            Event::Code(code) => self.push_text(&code, self.code_marks()),

            // Raw HTML is kept as literal text
            Event::Html(html) | Event::InlineHtml(html) => {
                if !self.append_raw(&html) {
                    self.push_text(&html, self.active_marks());
                }
            }

            Event::SoftBreak => {
                if self.options.preserve_line_breaks {
                    self.push_inline(Node::hard_break());
                } else {
                    self.push_text(" ", self.active_marks());
                }
            }
            Event::HardBreak => self.push_inline(Node::hard_break()),
            Event::Rule => {
                self.close_implicit_paragraph();
                self.top().children.push(Node::rule());
            }

            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.push_text(marker, self.active_marks());
            }
            Event::FootnoteReference(label) => {
                self.push_text(&format!("[^{label}]"), self.active_marks());
            }
            // Math is not enabled
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        let kind = match tag {
            // Inline spans only change the active marks
            Tag::Emphasis => return self.marks.push(Some(Mark::Italic)),
            Tag::Strong => return self.marks.push(Some(Mark::Bold)),
            Tag::Strikethrough => return self.marks.push(Some(Mark::Strikethrough)),
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                self.open_link(&dest_url);
                self.labels.push((dest_url.to_string(), self.inline_count));
                return;
            }

            Tag::Paragraph => FrameKind::Paragraph { implicit: false },
            Tag::Heading { level, .. } => FrameKind::Heading(heading_level_to_u8(level)),
            Tag::BlockQuote(_) => FrameKind::Blockquote,
            Tag::CodeBlock(kind) => FrameKind::CodeBlock {
                language: match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().map(str::to_string)
                    }
                    CodeBlockKind::Indented => None,
                },
                code: String::new(),
            },
            Tag::HtmlBlock => FrameKind::HtmlBlock(String::new()),
            Tag::List(Some(start)) => FrameKind::OrderedList(start),
            Tag::List(None) => FrameKind::BulletList,
            Tag::Item => FrameKind::ListItem,
            Tag::Table(_) => FrameKind::Table,
            Tag::TableHead => FrameKind::TableHead,
            Tag::TableRow => FrameKind::TableRow,
            Tag::TableCell => FrameKind::TableCell,

            // Extensions that are not enabled render their contents in place
            _ => FrameKind::Transparent {
                inline: self.top().holds_inline(),
            },
        };
        let kind = self.limit_nesting(kind);

        if !matches!(kind, FrameKind::Transparent { inline: true }) {
            self.close_implicit_paragraph();
        }
        self.stack.push(Frame::new(kind));
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.marks.pop();
            }
            TagEnd::Link | TagEnd::Image => {
                if let Some((url, start)) = self.labels.pop() {
                    // Links and images without text fall back to their URL
                    if self.inline_count == start {
                        self.push_text(&url, self.active_marks());
                    }
                }
                self.marks.pop();
            }
            _ => {
                self.close_implicit_paragraph();
                self.close_frame();
            }
        }
    }

    /// Flatten containers that would nest deeper than [`MAX_NESTING`]
    fn limit_nesting(&mut self, kind: FrameKind) -> FrameKind {
        let room = match kind {
            // A kept list has already reserved the level for its items
            FrameKind::ListItem => matches!(
                self.stack.last(),
                Some(Frame {
                    kind: FrameKind::BulletList | FrameKind::OrderedList(_),
                    ..
                })
            ),
            FrameKind::BulletList | FrameKind::OrderedList(_) => self.depth + 2 <= MAX_NESTING,
            FrameKind::Blockquote => self.depth < MAX_NESTING,
            _ => return kind,
        };
        if room {
            self.depth += 1;
            kind
        } else {
            FrameKind::Transparent { inline: false }
        }
    }

    fn open_link(&mut self, href: &str) {
        // A link mark always carries an href
        if href.is_empty() {
            self.marks.push(None);
        } else {
            self.marks.push(Some(Mark::link(href)));
        }
    }

    /// Marks of the enclosing spans, innermost link winning and no duplicates
    fn active_marks(&self) -> Vec<Mark> {
        let mut marks: Vec<Mark> = Vec::new();
        for mark in self.marks.iter().flatten() {
            if mark.href().is_some() {
                marks.retain(|m| m.href().is_none());
            } else if marks.contains(mark) {
                continue;
            }
            marks.push(mark.clone());
        }
        marks
    }

    /// Marks for inline code: the code mark may only be combined with a link
    fn code_marks(&self) -> Vec<Mark> {
        let mut marks: Vec<Mark> = self
            .active_marks()
            .into_iter()
            .filter(|m| m.href().is_some())
            .collect();
        marks.push(Mark::InlineCode);
        marks
    }

    fn top(&mut self) -> &mut Frame {
        if self.stack.is_empty() {
            self.stack.push(Frame::new(FrameKind::Root));
        }
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Append raw text to an open code or HTML block
    fn append_raw(&mut self, text: &str) -> bool {
        match &mut self.top().kind {
            FrameKind::CodeBlock { code, .. } => code.push_str(text),
            FrameKind::HtmlBlock(raw) => raw.push_str(text),
            _ => return false,
        }
        true
    }

    fn push_text(&mut self, text: &str, marks: Vec<Mark>) {
        if text.is_empty() {
            return;
        }
        self.push_inline(Node::marked_text(text, marks));
    }

    /// Append an inline node, merging text runs that share a mark set
    fn push_inline(&mut self, node: Node) {
        self.inline_count += 1;
        if !self.top().holds_inline() {
            self.stack
                .push(Frame::new(FrameKind::Paragraph { implicit: true }));
        }

        let children = &mut self.top().children;
        if let (Some(Node::Text(last)), Node::Text(next)) = (children.last_mut(), &node) {
            if last.marks == next.marks {
                last.text.push_str(&next.text);
                return;
            }
        }
        children.push(node);
    }

    fn close_implicit_paragraph(&mut self) {
        if matches!(
            self.stack.last(),
            Some(Frame {
                kind: FrameKind::Paragraph { implicit: true },
                ..
            })
        ) {
            self.close_frame();
        }
    }

    fn in_table_head(&self) -> bool {
        self.stack
            .iter()
            .rev()
            .take_while(|frame| !matches!(frame.kind, FrameKind::Table))
            .any(|frame| matches!(frame.kind, FrameKind::TableHead))
    }

    /// Pop the innermost container and attach the node it builds to its parent
    fn close_frame(&mut self) {
        // The root frame stays until `finish`
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let children = frame.children;
        if frame.kind.nests() {
            self.depth = self.depth.saturating_sub(1);
        }

        let nodes = match frame.kind {
            FrameKind::Root | FrameKind::Transparent { .. } => children,
            FrameKind::Paragraph { implicit } => {
                if implicit && children.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::paragraph(children)]
                }
            }
            FrameKind::Heading(level) => vec![Node::heading(level, children)],
            FrameKind::Blockquote => vec![Node::blockquote(children)],
            FrameKind::BulletList => vec![Node::bullet_list(children)],
            FrameKind::OrderedList(start) => vec![Node::ordered_list_from(start, children)],
            FrameKind::ListItem => {
                if children.is_empty() {
                    vec![Node::list_item(vec![Node::paragraph(Vec::new())])]
                } else {
                    vec![Node::list_item(children)]
                }
            }
            FrameKind::CodeBlock { language, code } => {
                let code = code.strip_suffix('\n').unwrap_or(&code);
                vec![Node::code_block(language, code)]
            }
            FrameKind::HtmlBlock(raw) => {
                let raw = raw.trim_end_matches('\n');
                if raw.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::paragraph(vec![Node::text(raw)])]
                }
            }
            FrameKind::Table => vec![Node::table(normalize_rows(children))],
            FrameKind::TableHead => {
                if children.iter().all(|n| matches!(n, Node::TableRow(_))) && !children.is_empty()
                {
                    children
                } else {
                    vec![Node::table_row(children)]
                }
            }
            FrameKind::TableRow => vec![Node::table_row(children)],
            FrameKind::TableCell => {
                // ADF cells hold block content
                let content = vec![Node::paragraph(children)];
                if self.in_table_head() {
                    vec![Node::table_header_cell(content)]
                } else {
                    vec![Node::table_cell(content)]
                }
            }
        };

        self.top().children.extend(nodes);
    }

    fn finish(mut self) -> Document {
        while self.stack.len() > 1 {
            self.close_frame();
        }
        let content = self
            .stack
            .pop()
            .map(|root| root.children)
            .unwrap_or_default();
        Document::new(content)
    }
}

/// Make every body row as wide as the header row.
///
/// Short rows are padded with empty cells and long rows are truncated,
/// matching GitHub-flavored Markdown table semantics.
fn normalize_rows(mut rows: Vec<Node>) -> Vec<Node> {
    let Some(width) = rows.first().map(|header| header.children().len()) else {
        return rows;
    };

    for row in rows.iter_mut().skip(1) {
        if let Node::TableRow(row) = row {
            row.content.truncate(width);
            while row.content.len() < width {
                row.content
                    .push(Node::table_cell(vec![Node::paragraph(Vec::new())]));
            }
        }
    }
    rows
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// All text leaves of a node list, in document order
pub fn text_leaves(nodes: &[Node]) -> Vec<&Text> {
    let mut leaves = Vec::new();
    for node in nodes {
        match node {
            Node::Text(t) => leaves.push(t),
            other => leaves.extend(text_leaves(other.children())),
        }
    }
    leaves
}
