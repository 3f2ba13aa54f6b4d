//! Splits an article written in the heading/paragraph subset of Markdown into
//! the blocks the editor receives one at a time.
//!
//! Only `#`, `##` and `###` lines are structure. Everything between them is a
//! paragraph, emitted verbatim (trimmed). This is not a general Markdown parser:
//! lists, tables, links and inline formatting pass through as paragraph text.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// Title used when the document has no level-1 heading.
pub const UNTITLED_TITLE: &str = "無題の記事";

const MARKDOWN_FENCE: &str = "```markdown";
const FENCE: &str = "```";

lazy_static! {
    static ref TITLE: Regex = Regex::new(r"(?m)^# +(\S[^\n]*)").expect("valid title regex");
    static ref HEADING: Regex = Regex::new(r"(?m)^(#{1,3}) +(\S[^\n]*)").expect("valid heading regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Heading1,
    Heading2,
    Heading3,
    Paragraph,
}

impl BlockKind {
    fn from_level(level: usize) -> Option<Self> {
        match level {
            1 => Some(BlockKind::Heading1),
            2 => Some(BlockKind::Heading2),
            3 => Some(BlockKind::Heading3),
            _ => None,
        }
    }

    pub fn is_heading(&self) -> bool {
        !matches!(self, BlockKind::Paragraph)
    }

    pub fn level(&self) -> Option<u8> {
        match self {
            BlockKind::Heading1 => Some(1),
            BlockKind::Heading2 => Some(2),
            BlockKind::Heading3 => Some(3),
            BlockKind::Paragraph => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level() {
            Some(level) => write!(f, "heading{}", level),
            None => f.write_str("paragraph"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// Trimmed text; headings keep their `#` markers.
    pub text: String,
}

impl ContentBlock {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self { kind: BlockKind::Paragraph, text: text.into() }
    }

    pub fn heading(level: u8, text: impl AsRef<str>) -> Self {
        let level = usize::from(level.clamp(1, 3));
        Self {
            kind: BlockKind::from_level(level).unwrap_or(BlockKind::Heading1),
            text: format!("{} {}", "#".repeat(level), text.as_ref().trim()),
        }
    }

    pub fn is_heading(&self) -> bool {
        self.kind.is_heading()
    }
}

impl fmt::Display for ContentBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedArticle {
    pub title: String,
    pub blocks: Vec<ContentBlock>,
}

/// Unwraps the first ```` ```markdown ```` fenced region, keeping its interior in place.
///
/// The closing fence is the one at the wrapper's own nesting depth, so fences
/// inside the wrapper survive. Without a matching close the text is returned as is.
pub fn strip_markdown_fence(text: &str) -> Cow<'_, str> {
    let mut offset = 0;
    // (start of the opening fence line, start of the interior)
    let mut open: Option<(usize, usize)> = None;
    let mut depth = 0usize;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let fence = line.trim_end();

        match open {
            None => {
                if fence == MARKDOWN_FENCE {
                    open = Some((start, offset));
                }
            }
            Some((open_start, interior_start)) => {
                if fence == FENCE {
                    if depth == 0 {
                        let mut stripped = String::with_capacity(text.len());
                        stripped.push_str(&text[..open_start]);
                        stripped.push_str(&text[interior_start..start]);
                        stripped.push_str(&text[offset..]);
                        return Cow::Owned(stripped);
                    }
                    depth -= 1;
                } else if fence.starts_with(FENCE) {
                    depth += 1;
                }
            }
        }
    }

    Cow::Borrowed(text)
}

/// Parses `markdown` into its title and ordered content blocks.
pub fn parse(markdown: &str) -> ParsedArticle {
    let text = strip_markdown_fence(markdown);

    let (title, body) = match TITLE.captures(&text) {
        Some(caps) => match (caps.get(0), caps.get(1)) {
            (Some(line), Some(title)) => {
                let mut body = String::with_capacity(text.len());
                body.push_str(&text[..line.start()]);
                body.push_str(&text[line.end()..]);
                (title.as_str().trim().to_string(), body.trim().to_string())
            }
            _ => (UNTITLED_TITLE.to_string(), text.to_string()),
        },
        None => (UNTITLED_TITLE.to_string(), text.to_string()),
    };

    let blocks = segment(&body);
    tracing::debug!(title = %title, blocks = blocks.len(), "Parsed markdown article");
    ParsedArticle { title, blocks }
}

fn segment(body: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut last = 0;

    for caps in HEADING.captures_iter(body) {
        let (Some(line), Some(hashes), Some(heading)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        push_paragraph(&mut blocks, &body[last..line.start()]);
        if let Some(kind) = BlockKind::from_level(hashes.as_str().len()) {
            blocks.push(ContentBlock {
                kind,
                text: format!("{} {}", hashes.as_str(), heading.as_str().trim()),
            });
        }
        last = line.end();
    }
    push_paragraph(&mut blocks, &body[last..]);

    blocks
}

fn push_paragraph(blocks: &mut Vec<ContentBlock>, span: &str) {
    let span = span.trim();
    if !span.is_empty() {
        blocks.push(ContentBlock::paragraph(span));
    }
}
