//! Section and indentation outline of a specification document.
//!
//! The document is split on level-1 headings. Inside structured sections,
//! each non-indented line opens a block and owns the indented lines after it;
//! those lines form a tree by relative indentation.

/// A single source line with its position in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// 1-based line number.
    pub number: usize,
    /// Byte offset of the first character of the line.
    pub offset: usize,
    /// Indentation width (tabs count as four columns).
    pub indent: usize,
    /// Byte length of the leading whitespace.
    pub indent_bytes: usize,
    /// Line content without leading/trailing whitespace.
    pub text: &'a str,
    /// Line content without the line terminator.
    pub raw: &'a str,
}

impl<'a> SourceLine<'a> {
    fn new(number: usize, offset: usize, raw: &'a str) -> Self {
        let raw = raw.strip_suffix('\n').unwrap_or(raw);
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let trimmed_start = raw.trim_start();
        let indent_bytes = raw.len() - trimmed_start.len();
        let indent = raw[..indent_bytes]
            .chars()
            .map(|c| if c == '\t' { 4 } else { 1 })
            .sum();
        Self {
            number,
            offset,
            indent,
            indent_bytes,
            text: trimmed_start.trim_end(),
            raw,
        }
    }

    /// Byte offset in the document of a position within `text`.
    pub fn offset_of(&self, text_index: usize) -> usize {
        self.offset + self.indent_bytes + text_index
    }

    /// 1-based character column of a position within `text`.
    pub fn column_of(&self, text_index: usize) -> usize {
        let prefix = &self.raw[..self.indent_bytes];
        let within = self.text.get(..text_index).unwrap_or(self.text);
        prefix.chars().count() + within.chars().count() + 1
    }

    fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    fn is_comment(&self) -> bool {
        self.text.starts_with("<!--")
    }
}

/// A top-level section: its heading line and every line up to the next heading.
#[derive(Debug, Clone)]
pub struct RawSection<'a> {
    pub title: &'a str,
    pub heading: SourceLine<'a>,
    pub lines: Vec<SourceLine<'a>>,
}

impl<'a> RawSection<'a> {
    /// Raw body text with surrounding blank lines removed.
    pub fn body_text(&self) -> String {
        let raw: Vec<&str> = self.lines.iter().map(|l| l.raw).collect();
        trim_blank_lines(&raw)
    }
}

/// The whole document split into preamble and sections.
#[derive(Debug, Clone)]
pub struct Outline<'a> {
    pub preamble: String,
    pub sections: Vec<RawSection<'a>>,
}

/// Split a document on level-1 headings (`# Title`). Headings inside fenced
/// code blocks are ignored.
pub fn split_sections(text: &str) -> Outline<'_> {
    let mut preamble = Vec::new();
    let mut sections: Vec<RawSection<'_>> = Vec::new();
    let mut in_fence = false;
    let mut offset = 0;

    for (index, raw) in text.split_inclusive('\n').enumerate() {
        let line = SourceLine::new(index + 1, offset, raw);
        offset += raw.len();

        if line.text.starts_with("```") {
            in_fence = !in_fence;
        }

        let is_heading = !in_fence && line.indent == 0 && line.text.starts_with("# ");
        if is_heading {
            sections.push(RawSection {
                title: line.text[2..].trim(),
                heading: line,
                lines: Vec::new(),
            });
            continue;
        }

        match sections.last_mut() {
            Some(section) => section.lines.push(line),
            None => preamble.push(line.raw),
        }
    }

    Outline {
        preamble: trim_blank_lines(&preamble),
        sections,
    }
}

/// An indented line and the deeper-indented lines beneath it.
#[derive(Debug, Clone)]
pub struct Node<'a> {
    pub line: SourceLine<'a>,
    pub children: Vec<Node<'a>>,
}

impl<'a> Node<'a> {
    /// Every line beneath this node, in document order.
    pub fn descendant_lines(&self) -> Vec<SourceLine<'a>> {
        let mut lines = Vec::new();
        for child in &self.children {
            lines.push(child.line);
            lines.extend(child.descendant_lines());
        }
        lines
    }
}

/// A non-indented header line with its indented body.
#[derive(Debug, Clone)]
pub struct Block<'a> {
    pub header: SourceLine<'a>,
    pub body: Vec<Node<'a>>,
}

/// Group the lines of a structured section into blocks.
///
/// Returns the blocks plus any indented lines that appear before the first
/// header, which the caller reports as errors.
pub fn blocks<'a>(lines: &[SourceLine<'a>]) -> (Vec<Block<'a>>, Vec<SourceLine<'a>>) {
    let significant: Vec<SourceLine<'a>> = lines
        .iter()
        .copied()
        .filter(|l| !l.is_blank() && !l.is_comment() && !is_decoration(l))
        .collect();

    let mut blocks = Vec::new();
    let mut orphans = Vec::new();
    let mut i = 0;

    while i < significant.len() {
        let header = significant[i];
        if header.indent > 0 {
            orphans.push(header);
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < significant.len() && significant[j].indent > 0 {
            j += 1;
        }
        blocks.push(Block {
            header,
            body: build_nodes(&significant[i + 1..j]),
        });
        i = j;
    }

    (blocks, orphans)
}

fn build_nodes<'a>(lines: &[SourceLine<'a>]) -> Vec<Node<'a>> {
    let mut nodes = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let mut j = i + 1;
        while j < lines.len() && lines[j].indent > line.indent {
            j += 1;
        }
        nodes.push(Node {
            line,
            children: build_nodes(&lines[i + 1..j]),
        });
        i = j;
    }
    nodes
}

/// Sub-headings and code fences organize a section but carry no content.
fn is_decoration(line: &SourceLine<'_>) -> bool {
    line.indent == 0 && (line.text.starts_with("##") || line.text.starts_with("```"))
}

/// Join lines, dropping leading and trailing blank lines.
pub fn trim_blank_lines(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}

/// Remove the common leading indentation from a set of lines.
pub fn dedent(lines: &[SourceLine<'_>]) -> String {
    let min = lines.iter().map(|l| l.indent_bytes).min().unwrap_or(0);
    lines
        .iter()
        .map(|l| l.raw.get(min..).unwrap_or(l.text))
        .collect::<Vec<_>>()
        .join("\n")
}
