//! ADF to Markdown writer
//!
//! Renders an ADF document back into GitHub-flavored Markdown.

use crate::node::{Document, Mark, Node, TableCell, Text};

/// Options for the Markdown writer
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Marker for bullet list items
    pub bullet: char,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self { bullet: '-' }
    }
}

/// Convert an ADF document to Markdown
pub fn document_to_markdown(doc: &Document, options: &WriterOptions) -> String {
    let mut writer = Writer::new(options);
    writer.write_document(doc)
}

/// Markdown writer state
struct Writer<'a> {
    options: &'a WriterOptions,
    output: String,
    /// Whether we're at the start of a line
    at_line_start: bool,
}

impl<'a> Writer<'a> {
    fn new(options: &'a WriterOptions) -> Self {
        Self {
            options,
            output: String::new(),
            at_line_start: true,
        }
    }

    fn write_document(&mut self, doc: &Document) -> String {
        self.write_blocks(&doc.content, "");
        std::mem::take(&mut self.output)
    }

    /// Write a sequence of blocks separated by blank lines, each line prefixed
    fn write_blocks(&mut self, blocks: &[Node], prefix: &str) {
        for (i, node) in blocks.iter().enumerate() {
            if i > 0 {
                self.ensure_newline();
                self.output.push_str(prefix.trim_end());
                self.output.push('\n');
                self.output.push_str(prefix);
            }
            self.write_block(node, prefix);
        }
        self.ensure_newline();
    }

    fn write_block(&mut self, node: &Node, prefix: &str) {
        match node {
            Node::Heading(h) => {
                for _ in 0..h.attrs.level {
                    self.output.push('#');
                }
                self.output.push(' ');
                self.write_inlines(&h.content, prefix);
            }
            Node::Paragraph(p) => self.write_inlines(&p.content, prefix),
            Node::Rule => self.output.push_str("---"),
            Node::Blockquote(b) => {
                self.output.push_str("> ");
                let nested = format!("{prefix}> ");
                self.write_blocks(&b.content, &nested);
            }
            Node::BulletList(l) => {
                let marker = format!("{} ", self.options.bullet);
                let markers = vec![marker; l.content.len()];
                self.write_list_items(&l.content, &markers, prefix);
            }
            Node::OrderedList(l) => {
                let start = l.attrs.map(|a| a.order).unwrap_or(1);
                let markers: Vec<String> = (0..l.content.len() as u64)
                    .map(|i| format!("{}. ", start.saturating_add(i)))
                    .collect();
                self.write_list_items(&l.content, &markers, prefix);
            }
            Node::CodeBlock(c) => {
                let code: String = c.content.iter().map(Node::plain_text).collect();
                // Fence must be longer than any backtick run in the body
                let fence = "`".repeat(calculate_fence_length(&code));
                self.output.push_str(&fence);
                if let Some(attrs) = &c.attrs {
                    self.output.push_str(&attrs.language);
                }
                for line in code.lines() {
                    self.output.push('\n');
                    self.output.push_str(prefix);
                    self.output.push_str(line);
                }
                self.output.push('\n');
                self.output.push_str(prefix);
                self.output.push_str(&fence);
            }
            Node::Table(t) => self.write_table(&t.content, prefix),
            Node::ListItem(li) => self.write_blocks(&li.content, prefix),
            // Stray row or cell outside a table: render its text
            Node::TableRow(_) | Node::TableCell(_) | Node::TableHeaderCell(_) => {
                self.output.push_str(&node.plain_text());
            }
            Node::Text(_) | Node::HardBreak => {
                self.write_inlines(std::slice::from_ref(node), prefix)
            }
        }
        self.at_line_start = false;
    }

    fn write_list_items(&mut self, items: &[Node], markers: &[String], prefix: &str) {
        for (i, (item, marker)) in items.iter().zip(markers).enumerate() {
            if i > 0 {
                self.ensure_newline();
                self.output.push_str(prefix);
            }
            self.output.push_str(marker);
            let nested = format!("{prefix}{}", " ".repeat(marker.len()));
            let blocks = item.children();
            for (j, child) in blocks.iter().enumerate() {
                if j > 0 {
                    self.ensure_newline();
                    // Sibling blocks need a blank line; a nested list follows directly
                    if !matches!(child, Node::BulletList(_) | Node::OrderedList(_)) {
                        self.output.push_str(nested.trim_end());
                        self.output.push('\n');
                    }
                    self.output.push_str(&nested);
                }
                self.write_block(child, &nested);
            }
        }
    }

    fn write_table(&mut self, rows: &[Node], prefix: &str) {
        let rows: Vec<&[Node]> = rows
            .iter()
            .filter(|n| matches!(n, Node::TableRow(_)))
            .map(Node::children)
            .collect();

        if rows.is_empty() {
            return;
        }

        let num_cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);

        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                self.ensure_newline();
                self.output.push_str(prefix);
            }
            self.write_table_row(row, num_cols);
            if i == 0 {
                self.output.push('\n');
                self.output.push_str(prefix);
                self.output.push('|');
                for _ in 0..num_cols {
                    self.output.push_str(" --- |");
                }
            }
            self.at_line_start = false;
        }
    }

    fn write_table_row(&mut self, cells: &[Node], num_cols: usize) {
        self.output.push('|');
        for cell in cells.iter().take(num_cols) {
            if let Node::TableCell(TableCell { content })
            | Node::TableHeaderCell(TableCell { content }) = cell
            {
                self.output.push(' ');
                let text = content
                    .iter()
                    .map(|block| {
                        let mut inner = Writer::new(self.options);
                        inner.write_inlines(block.children(), "");
                        inner.output
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                self.output.push_str(&text.replace('|', "\\|").replace('\n', " "));
                self.output.push_str(" |");
            }
        }
        // Fill missing cells
        for _ in cells.len()..num_cols {
            self.output.push_str("  |");
        }
    }

    fn write_inlines(&mut self, inlines: &[Node], prefix: &str) {
        // Text opening a line could be read back as a block marker
        let mut line_start = true;
        for node in inlines {
            match node {
                Node::Text(t) => {
                    self.write_text(t, line_start);
                    line_start &= t.text.is_empty();
                }
                Node::HardBreak => {
                    self.output.push_str("\\\n");
                    self.output.push_str(prefix);
                    line_start = true;
                }
                other => {
                    self.output.push_str(&other.plain_text());
                    line_start = false;
                }
            }
        }
    }

    fn write_text(&mut self, t: &Text, line_start: bool) {
        if t.marks.contains(&Mark::InlineCode) {
            let code = inline_code(&t.text);
            match t.marks.iter().find_map(Mark::href) {
                Some(href) => {
                    self.output
                        .push_str(&format!("[{code}]({})", link_destination(href)))
                }
                None => self.output.push_str(&code),
            }
            return;
        }

        let mut open = String::new();
        let mut close = Vec::new();
        for mark in &t.marks {
            let (o, c) = match mark {
                Mark::Bold => ("**".to_string(), "**".to_string()),
                Mark::Italic => ("*".to_string(), "*".to_string()),
                Mark::Strikethrough => ("~~".to_string(), "~~".to_string()),
                Mark::Link { attrs } => (
                    "[".to_string(),
                    format!("]({})", link_destination(&attrs.href)),
                ),
                Mark::InlineCode => continue,
            };
            open.push_str(&o);
            close.push(c);
        }

        self.output.push_str(&open);
        self.output
            .push_str(&escape_text(&t.text, line_start && open.is_empty()));
        for c in close.iter().rev() {
            self.output.push_str(c);
        }
    }

    fn ensure_newline(&mut self) {
        if !self.at_line_start && !self.output.is_empty() && !self.output.ends_with('\n') {
            self.output.push('\n');
        }
        self.at_line_start = true;
    }
}

/// Escape characters that would otherwise start markdown formatting.
///
/// At the start of a line the markers of headings, quotes, lists and setext
/// underlines are escaped as well.
fn escape_text(s: &str, line_start: bool) -> String {
    let mut out = String::with_capacity(s.len() + 1);
    let mut rest = s;
    if line_start {
        let digits = s.bytes().take_while(u8::is_ascii_digit).count();
        if s.starts_with(['#', '>', '-', '+', '=']) {
            out.push('\\');
        } else if (1..=9).contains(&digits) && s[digits..].starts_with(['.', ')']) {
            out.push_str(&s[..digits]);
            out.push('\\');
            rest = &s[digits..];
        }
    }
    for c in rest.chars() {
        if matches!(c, '*' | '_' | '`' | '[' | ']' | '\\' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Link destination, in angle brackets when it would not survive bare
fn link_destination(href: &str) -> String {
    if href.contains(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>')) {
        format!("<{}>", href.replace('<', "\\<").replace('>', "\\>"))
    } else {
        href.to_string()
    }
}

/// Wrap a code span, padding the delimiters when the content has backticks
fn inline_code(value: &str) -> String {
    if value.contains('`') {
        format!("`` {value} ``")
    } else {
        format!("`{value}`")
    }
}

/// Calculate the minimum fence length needed for a code block.
///
/// The fence must be longer than any sequence of consecutive backticks in the content.
/// Returns at least 3 (the minimum for a valid fenced code block).
fn calculate_fence_length(content: &str) -> usize {
    let mut max_backticks = 0;
    let mut current_run = 0;

    for c in content.chars() {
        if c == '`' {
            current_run += 1;
            max_backticks = max_backticks.max(current_run);
        } else {
            current_run = 0;
        }
    }

    3.max(max_backticks + 1)
}
