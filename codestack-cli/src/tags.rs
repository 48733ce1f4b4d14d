//! Definition lookup backed by a ctags file.
//!
//! Each tag line is `name<TAB>file<TAB>address`, where the address is either a
//! 1-based line number or a `/^pattern$/` search, optionally followed by `;"`
//! and extension fields. Files are relative to the directory of the tags file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use codestack_core::{LocationCandidate, Position, Range, SourceAccessor, SourceId, SymbolResolver};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagAddress {
    Line(u32),
    Pattern {
        text: String,
        anchored_start: bool,
        anchored_end: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tag {
    file: PathBuf,
    address: TagAddress,
}

pub struct TagsResolver {
    tags: HashMap<String, Vec<Tag>>,
    sources: Arc<dyn SourceAccessor>,
}

impl TagsResolver {
    pub fn load(path: &Path, sources: Arc<dyn SourceAccessor>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read tags file {:?}", path))?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::parse(&raw, root, sources))
    }

    pub fn parse(raw: &str, root: &Path, sources: Arc<dyn SourceAccessor>) -> Self {
        let mut tags: HashMap<String, Vec<Tag>> = HashMap::new();
        for line in raw.lines() {
            if line.starts_with("!_") || line.trim().is_empty() {
                continue;
            }
            match parse_tag_line(line, root) {
                Some((name, tag)) => tags.entry(name).or_default().push(tag),
                None => debug!(line, "skipping unreadable tag line"),
            }
        }
        Self { tags, sources }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    async fn locate(&self, name: &str, tag: &Tag) -> Result<Option<Range>> {
        let source = SourceId::from_path(&tag.file);
        let content = self.sources.read(&source).await?;
        let found = match &tag.address {
            TagAddress::Line(line) => {
                let index = line.saturating_sub(1) as usize;
                content.split('\n').nth(index).map(|text| (index, text))
            }
            TagAddress::Pattern {
                text,
                anchored_start,
                anchored_end,
            } => content.split('\n').enumerate().find(|(_, candidate)| {
                let candidate = candidate.strip_suffix('\r').unwrap_or(*candidate);
                match (*anchored_start, *anchored_end) {
                    (true, true) => candidate == text.as_str(),
                    (true, false) => candidate.starts_with(text.as_str()),
                    (false, true) => candidate.ends_with(text.as_str()),
                    (false, false) => candidate.contains(text.as_str()),
                }
            }),
        };
        Ok(found.map(|(line, text)| {
            let column = text
                .find(name)
                .map(|byte| text[..byte].chars().count())
                .unwrap_or(0);
            let width = name.chars().count();
            Range::new(
                Position::new(line as u32, column as u32),
                Position::new(line as u32, (column + width) as u32),
            )
        }))
    }
}

#[async_trait]
impl SymbolResolver for TagsResolver {
    async fn definitions(
        &self,
        source: &SourceId,
        position: Position,
    ) -> Result<Vec<LocationCandidate>> {
        let content = self.sources.read(source).await?;
        let Some(name) = identifier_at(&content, position) else {
            return Ok(Vec::new());
        };
        let Some(tag) = self.tags.get(&name).and_then(|tags| tags.first()) else {
            debug!(%name, "no tag for identifier");
            return Ok(Vec::new());
        };
        match self.locate(&name, tag).await? {
            Some(range) => Ok(vec![LocationCandidate::Location {
                source: SourceId::from_path(&tag.file),
                range,
            }]),
            None => {
                warn!(%name, file = ?tag.file, "tag address no longer matches its file");
                Ok(Vec::new())
            }
        }
    }
}

fn parse_tag_line(line: &str, root: &Path) -> Option<(String, Tag)> {
    let mut fields = line.splitn(3, '\t');
    let name = fields.next()?.to_owned();
    let file = fields.next()?;
    let rest = fields.next()?;
    let address = rest.split(";\"").next().unwrap_or(rest).trim_end();
    let address = parse_address(address)?;
    let file = Path::new(file);
    let file = if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    };
    Some((name, Tag { file, address }))
}

fn parse_address(address: &str) -> Option<TagAddress> {
    if let Ok(line) = address.parse::<u32>() {
        return Some(TagAddress::Line(line));
    }
    let delimiter = address.chars().next().filter(|c| *c == '/' || *c == '?')?;
    let body = address[1..].strip_suffix(delimiter)?;
    let (body, anchored_start) = match body.strip_prefix('^') {
        Some(rest) => (rest, true),
        None => (body, false),
    };
    let (body, anchored_end) = match body.strip_suffix('$') {
        Some(rest) if !rest.ends_with('\\') => (rest, true),
        _ => (body, false),
    };
    Some(TagAddress::Pattern {
        text: unescape_pattern(body, delimiter),
        anchored_start,
        anchored_end,
    })
}

fn unescape_pattern(body: &str, delimiter: char) -> String {
    let mut text = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) if next == '\\' || next == delimiter => text.push(next),
                Some(next) => {
                    text.push('\\');
                    text.push(next);
                }
                None => text.push('\\'),
            }
        } else {
            text.push(ch);
        }
    }
    text
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Identifier under `position`, also accepting a cursor just past its end.
pub fn identifier_at(text: &str, position: Position) -> Option<String> {
    let line = text.split('\n').nth(position.line as usize)?;
    let chars: Vec<char> = line.chars().collect();
    let mut col = (position.character as usize).min(chars.len());
    if chars.get(col).map_or(true, |ch| !is_word(*ch)) {
        if col > 0 && is_word(chars[col - 1]) {
            col -= 1;
        } else {
            return None;
        }
    }
    let start = chars[..col]
        .iter()
        .rposition(|ch| !is_word(*ch))
        .map(|index| index + 1)
        .unwrap_or(0);
    let end = chars[col..]
        .iter()
        .position(|ch| !is_word(*ch))
        .map(|index| col + index)
        .unwrap_or(chars.len());
    Some(chars[start..end].iter().collect())
}
