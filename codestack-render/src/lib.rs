use std::fmt::Write as _;

use codestack_core::config::RenderConfig;
use codestack_core::{ContentRenderer, Frame, FrameMarkup, LineMarkup, ViewPayload};
use tracing::instrument;

pub struct HtmlRenderer {
    config: RenderConfig,
}

impl HtmlRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl ContentRenderer for HtmlRenderer {
    #[instrument(skip_all, fields(frames = frames.len()))]
    fn render(&self, frames: &[Frame]) -> ViewPayload {
        let markup: Vec<FrameMarkup> = frames.iter().map(frame_markup).collect();

        let mut body = String::new();
        if markup.is_empty() {
            let _ = write!(
                body,
                "<p class=\"empty-state\">{}</p>",
                escape_html(&self.config.empty_hint)
            );
        } else {
            for frame in &markup {
                write_frame(&mut body, frame);
            }
        }

        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
            escape_html(&self.config.title),
            STYLES,
            body
        );

        ViewPayload {
            html,
            frames: markup,
        }
    }
}

fn frame_markup(frame: &Frame) -> FrameMarkup {
    let anchor = frame.anchor();
    FrameMarkup {
        id: frame.id(),
        slot_key: frame.id().slot_key(),
        label: frame.label(),
        lines: frame
            .lines()
            .enumerate()
            .map(|(index, line)| LineMarkup {
                escaped: escape_html(line),
                highlighted: anchor.covers_line(index),
            })
            .collect(),
    }
}

/// Layout hint in `em` used until the view has measured the frame.
pub fn height_hint_em(line_count: usize) -> f32 {
    (line_count * 12 + 30) as f32 / 10.0
}

fn write_frame(out: &mut String, frame: &FrameMarkup) {
    let id = frame.id;
    let _ = write!(
        out,
        "<section class=\"frame\" id=\"{slot}\" data-frame-id=\"{id}\" style=\"max-height: {hint}em;\">\
<div class=\"frame-header\">\
<span class=\"file-name\">{label}</span>\
<div class=\"header-buttons\">\
<div class=\"search-container\">\
<input type=\"text\" class=\"search-box\" placeholder=\"Search...\" data-frame-id=\"{id}\" data-role=\"search\">\
<div class=\"search-nav\">\
<button data-frame-id=\"{id}\" data-role=\"search-prev\" title=\"Previous\" disabled>&#8593;</button>\
<button data-frame-id=\"{id}\" data-role=\"search-next\" title=\"Next\" disabled>&#8595;</button>\
<span class=\"search-count\" data-frame-id=\"{id}\" data-role=\"search-count\"></span>\
</div>\
</div>\
<button class=\"open-button\" data-frame-id=\"{id}\" data-role=\"open\">Open in Editor</button>\
<button class=\"close-button\" data-frame-id=\"{id}\" data-role=\"remove\">&#215;</button>\
</div>\
</div>\
<div class=\"frame-body\" data-frame-id=\"{id}\" data-role=\"body\">\
<div class=\"code-container\">",
        slot = frame.slot_key,
        hint = height_hint_em(frame.lines.len()),
        label = escape_html(&frame.label),
    );

    for (index, line) in frame.lines.iter().enumerate() {
        let class = if line.highlighted {
            "line-content highlighted"
        } else {
            "line-content"
        };
        let _ = write!(
            out,
            "<div class=\"code-line\"><span class=\"line-number\">{number}</span>\
<span class=\"{class}\" data-frame-id=\"{id}\" data-role=\"line\" data-line=\"{index}\" tabindex=\"0\">{text}</span></div>",
            number = index + 1,
            text = line.escaped,
        );
    }

    out.push_str("</div></div></section>");
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const ENTITIES: [(&str, char); 5] = [
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&#39;", '\''),
];

/// Inverse of [`escape_html`]. Unknown entities are kept verbatim.
pub fn unescape_html(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match ENTITIES
            .iter()
            .find(|(entity, _)| tail.starts_with(entity))
        {
            Some((entity, ch)) => {
                decoded.push(*ch);
                rest = &tail[entity.len()..];
            }
            None => {
                decoded.push('&');
                rest = &tail[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

const STYLES: &str = r#"
body { font-family: var(--vscode-font-family); color: var(--vscode-foreground); background: var(--vscode-editor-background); margin: 0; padding: 16px; }
.frame { border: 1px solid var(--vscode-editorWidget-border); border-radius: 6px; margin-bottom: 16px; overflow: hidden; resize: vertical; min-height: 100px; height: 25vh; display: flex; flex-direction: column; }
.frame-header { background: var(--vscode-editorWidget-background); padding: 8px 12px; display: flex; justify-content: space-between; align-items: center; border-bottom: 1px solid var(--vscode-editorWidget-border); }
.file-name { font-size: 12px; font-weight: 500; }
.header-buttons, .search-container, .search-nav { display: flex; gap: 4px; align-items: center; }
.search-box { width: 120px; font-size: 11px; }
.search-nav button:disabled { opacity: 0.5; cursor: default; }
.search-count { font-size: 10px; min-width: 30px; }
.open-button { background: var(--vscode-button-background); color: var(--vscode-button-foreground); border: none; padding: 4px 8px; border-radius: 3px; cursor: pointer; font-size: 11px; }
.close-button { background: transparent; color: var(--vscode-foreground); border: none; padding: 2px 6px; cursor: pointer; font-size: 16px; line-height: 1; }
.frame-body { flex: 1; overflow: auto; display: flex; flex-direction: column; }
.code-container { font-family: var(--vscode-editor-font-family); font-size: var(--vscode-editor-font-size); line-height: var(--vscode-editor-line-height); flex: 1; }
.code-line { display: flex; white-space: pre; }
.line-number { color: var(--vscode-editorLineNumber-foreground); text-align: right; min-width: 40px; padding-right: 12px; user-select: none; }
.line-content { flex: 1; user-select: text; position: relative; outline: none; }
.line-content.highlighted { background: var(--vscode-editor-findMatchHighlightBackground); }
.search-highlight { background: var(--vscode-editor-findMatchHighlightBackground); cursor: pointer; }
.search-highlight.current { background: var(--vscode-editor-findMatchBackground); }
.caret { position: absolute; width: 1px; height: 1em; background: var(--vscode-editorCursor-foreground); animation: blink 1s infinite; pointer-events: none; }
@keyframes blink { 0%, 50% { opacity: 1; } 51%, 100% { opacity: 0; } }
.context-menu { position: absolute; background: var(--vscode-menu-background); border: 1px solid var(--vscode-menu-border); border-radius: 3px; padding: 4px 0; z-index: 1000; }
.menu-item { padding: 4px 12px; cursor: pointer; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use codestack_core::{FrameStack, Range, SourceId};

    fn ten_line_stack(anchor: Range) -> FrameStack {
        let content = (1..=10)
            .map(|n| format!("let v{n} = {n};"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut stack = FrameStack::new();
        stack.push(SourceId::new("/work/src/lib.rs"), anchor, content);
        stack
    }

    #[test]
    fn anchor_lines_are_highlighted() {
        let stack = ten_line_stack(Range::lines(3, 3));
        let payload = HtmlRenderer::default().render(stack.frames());

        let frame = &payload.frames[0];
        assert_eq!(frame.lines.len(), 10);
        let highlighted: Vec<_> = frame
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.highlighted)
            .map(|(index, _)| index + 1)
            .collect();
        assert_eq!(highlighted, vec![4]);
        assert!(payload.html.contains("line-content highlighted\" data-frame-id=\"0\" data-role=\"line\" data-line=\"3\""));
        assert!(payload.html.contains("lib.rs:4"));
    }

    #[test]
    fn multi_line_anchor_highlights_inclusive_range() {
        let stack = ten_line_stack(Range::lines(2, 5));
        let payload = HtmlRenderer::default().render(stack.frames());
        let flags: Vec<bool> = payload.frames[0].lines.iter().map(|l| l.highlighted).collect();
        assert_eq!(
            flags,
            vec![false, false, true, true, true, true, false, false, false, false]
        );
    }

    #[test]
    fn empty_stack_renders_placeholder() {
        let payload = HtmlRenderer::default().render(&[]);
        assert!(payload.frames.is_empty());
        assert!(payload.html.contains("class=\"empty-state\""));
        assert!(payload.html.contains("No frames yet."));
        assert!(!payload.html.contains("<section"));
    }

    #[test]
    fn markup_has_no_inline_handlers() {
        let stack = ten_line_stack(Range::lines(0, 0));
        let payload = HtmlRenderer::default().render(stack.frames());
        assert!(!payload.html.contains("onclick"));
        assert!(!payload.html.contains("onkeyup"));
        for role in ["open", "remove", "search", "search-prev", "search-next", "body", "line"] {
            assert!(
                payload.html.contains(&format!("data-role=\"{role}\"")),
                "missing role {role}"
            );
        }
    }

    #[test]
    fn height_hint_grows_with_line_count() {
        assert_eq!(height_hint_em(10), 15.0);
        let stack = ten_line_stack(Range::lines(0, 0));
        let payload = HtmlRenderer::default().render(stack.frames());
        assert!(payload.html.contains("style=\"max-height: 15em;\""));
    }

    #[test]
    fn escaping_round_trips_every_special_character() {
        let samples = [
            "a & b",
            "<div class=\"x\">",
            "it's 'quoted'",
            "&amp; already escaped &lt;",
            "&&<<>>\"\"''",
            "plain text",
            "& stray ampersand;",
        ];
        for sample in samples {
            let escaped = escape_html(sample);
            for special in ['<', '>', '"', '\''] {
                assert!(!escaped.contains(special), "{escaped}");
            }
            assert_eq!(unescape_html(&escaped), sample);
        }
    }

    #[test]
    fn rendered_lines_decode_to_captured_content() {
        let content = "fn f<'a>(x: &'a str) -> bool {\n    x == \"<&>\"\n}";
        let mut stack = FrameStack::new();
        stack.push(SourceId::new("f.rs"), Range::lines(0, 0), content.to_owned());

        let payload = HtmlRenderer::default().render(stack.frames());
        let decoded: Vec<String> = payload.frames[0]
            .lines
            .iter()
            .map(|line| unescape_html(&line.escaped))
            .collect();
        assert_eq!(decoded.join("\n"), content);
    }
}
