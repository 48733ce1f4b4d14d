//! Incremental per-frame text search.
//!
//! Matching is case-insensitive and non-overlapping. Offsets and lengths are
//! counted in characters so they line up with caret positions.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    pub line: usize,
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    term: String,
    matches: Vec<SearchMatch>,
    current: Option<usize>,
}

impl SearchState {
    /// Scans `lines` for `term`. An empty term yields no state at all.
    pub fn build<S: AsRef<str>>(term: &str, lines: &[S]) -> Option<Self> {
        if term.is_empty() {
            return None;
        }
        let needle: Vec<char> = term.chars().map(fold).collect();
        let mut matches = Vec::new();
        for (line, text) in lines.iter().enumerate() {
            for offset in find_occurrences(text.as_ref(), &needle) {
                matches.push(SearchMatch {
                    line,
                    offset,
                    len: needle.len(),
                });
            }
        }
        let current = if matches.is_empty() { None } else { Some(0) };
        Some(Self {
            term: term.to_owned(),
            matches,
            current,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn total(&self) -> usize {
        self.matches.len()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn current_match(&self) -> Option<&SearchMatch> {
        self.current.and_then(|index| self.matches.get(index))
    }

    pub fn step(&mut self, direction: Direction) -> Option<&SearchMatch> {
        let total = self.matches.len();
        if total == 0 {
            return None;
        }
        let next = match (self.current, direction) {
            (None, Direction::Next) => 0,
            (None, Direction::Previous) => total - 1,
            (Some(index), Direction::Next) => (index + 1) % total,
            (Some(0), Direction::Previous) => total - 1,
            (Some(index), Direction::Previous) => index - 1,
        };
        self.current = Some(next);
        self.current_match()
    }

    pub fn select(&mut self, ordinal: usize) -> Option<&SearchMatch> {
        if ordinal >= self.matches.len() {
            return None;
        }
        self.current = Some(ordinal);
        self.current_match()
    }

    /// `current/total` with a 1-based current, or `None` without matches.
    pub fn counter(&self) -> Option<String> {
        let current = self.current?;
        Some(format!("{}/{}", current + 1, self.matches.len()))
    }

    /// Splits one line into plain and highlighted runs.
    pub fn segments(&self, line: usize, text: &str) -> Vec<Segment> {
        let chars: Vec<char> = text.chars().collect();
        let mut segments = Vec::new();
        let mut cursor = 0;
        for (ordinal, found) in self
            .matches
            .iter()
            .enumerate()
            .filter(|(_, found)| found.line == line)
        {
            if found.offset > cursor {
                segments.push(Segment::plain(chars[cursor..found.offset].iter().collect()));
            }
            let end = (found.offset + found.len).min(chars.len());
            segments.push(Segment {
                text: chars[found.offset..end].iter().collect(),
                kind: SegmentKind::Match {
                    ordinal,
                    current: self.current == Some(ordinal),
                },
            });
            cursor = end;
        }
        if cursor < chars.len() || segments.is_empty() {
            segments.push(Segment::plain(chars[cursor..].iter().collect()));
        }
        segments
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn plain(text: String) -> Self {
        Self {
            text,
            kind: SegmentKind::Plain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Plain,
    Match { ordinal: usize, current: bool },
}

fn fold(ch: char) -> char {
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => ch,
    }
}

fn find_occurrences(text: &str, needle: &[char]) -> Vec<usize> {
    let haystack: Vec<char> = text.chars().map(fold).collect();
    let mut found = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return found;
    }
    let mut index = 0;
    while index + needle.len() <= haystack.len() {
        if haystack[index..index + needle.len()] == *needle {
            found.push(index);
            index += needle.len();
        } else {
            index += 1;
        }
    }
    found
}
