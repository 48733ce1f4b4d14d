use std::path::PathBuf;
use std::str::FromStr;

use codestack_core::{Position, Range};

/// A `FILE:LINE[:COL][-ENDLINE]` argument with 1-based numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameArg {
    pub path: PathBuf,
    pub range: Range,
}

impl FromStr for FrameArg {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (body, end_line) = match raw.rsplit_once('-') {
            Some((body, end)) if is_number(end) => (body, Some(parse_one_based(end, raw)?)),
            _ => (raw, None),
        };
        let (rest, last) = body
            .rsplit_once(':')
            .filter(|(_, last)| is_number(last))
            .ok_or_else(|| format!("expected FILE:LINE[:COL][-ENDLINE], got `{raw}`"))?;
        let last = parse_one_based(last, raw)?;
        let (path, line, column) = match rest.rsplit_once(':') {
            Some((path, line)) if is_number(line) && !path.is_empty() => {
                (path, parse_one_based(line, raw)?, last)
            }
            _ => (rest, last, 1),
        };
        if path.is_empty() {
            return Err(format!("missing file in `{raw}`"));
        }
        let end_line = end_line.unwrap_or(line);
        if end_line < line {
            return Err(format!("end line {end_line} precedes line {line} in `{raw}`"));
        }
        Ok(Self {
            path: PathBuf::from(path),
            range: Range::new(
                Position::new(line - 1, column - 1),
                Position::new(end_line - 1, column - 1),
            ),
        })
    }
}

fn is_number(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|ch| ch.is_ascii_digit())
}

fn parse_one_based(text: &str, raw: &str) -> Result<u32, String> {
    match text.parse::<u32>() {
        Ok(0) | Err(_) => Err(format!("`{text}` in `{raw}` is not a 1-based number")),
        Ok(value) => Ok(value),
    }
}
