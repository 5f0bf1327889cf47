//! Minimal markdown formatting for AI answers: headings, bullets, numbered
//! items and `**bold**`. Anything else renders as a paragraph.

use uuid::Uuid;

use crate::models::{Message, Sender};

#[derive(Clone, Debug, PartialEq)]
pub enum Span {
    Text(String),
    Bold(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Bullet(Vec<Span>),
    Numbered { number: u32, spans: Vec<Span> },
    Paragraph(Vec<Span>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum BubbleBody {
    Plain(String),
    Formatted(Vec<Block>),
}

/// One chat bubble per message.
#[derive(Clone, Debug, PartialEq)]
pub struct Bubble {
    pub message_id: Uuid,
    pub sender: Sender,
    pub body: BubbleBody,
}

pub fn parse_inline(text: &str) -> Vec<Span> {
    let parts: Vec<&str> = text.split("**").collect();
    // An odd number of markers leaves the last one unclosed.
    let balanced = parts.len() % 2 == 1;
    let last = parts.len() - 1;

    let mut spans: Vec<Span> = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        let inside_marker = i % 2 == 1;
        let span = if inside_marker && (balanced || i < last) {
            Span::Bold(part.to_string())
        } else if inside_marker {
            Span::Text(format!("**{}", part))
        } else {
            Span::Text(part.to_string())
        };
        match (spans.last_mut(), span) {
            (Some(Span::Text(prev)), Span::Text(next)) => prev.push_str(&next),
            (_, span) => spans.push(span),
        }
    }
    spans
}

fn heading(line: &str) -> Option<Block> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = line[level..].strip_prefix(' ')?;
    Some(Block::Heading {
        level: level as u8,
        spans: parse_inline(rest.trim()),
    })
}

fn bullet(line: &str) -> Option<Block> {
    ["- ", "* ", "• "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(|rest| Block::Bullet(parse_inline(rest.trim())))
}

fn numbered(line: &str) -> Option<Block> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix(". ")?;
    let number = line[..digits].parse().ok()?;
    Some(Block::Numbered {
        number,
        spans: parse_inline(rest.trim()),
    })
}

/// Splits text into blocks, one per non-blank line.
pub fn render_markdown(text: &str) -> Vec<Block> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            heading(line)
                .or_else(|| bullet(line))
                .or_else(|| numbered(line))
                .unwrap_or_else(|| Block::Paragraph(parse_inline(line)))
        })
        .collect()
}

pub fn render_message(message: &Message) -> Bubble {
    let body = match message.sender {
        Sender::Ai => BubbleBody::Formatted(render_markdown(&message.content)),
        Sender::User => BubbleBody::Plain(message.content.clone()),
    };
    Bubble {
        message_id: message.id,
        sender: message.sender,
        body,
    }
}

pub fn render_conversation(messages: &[Message]) -> Vec<Bubble> {
    messages.iter().map(render_message).collect()
}

fn spans_text(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Span::Text(t) | Span::Bold(t) => t.as_str(),
        })
        .collect()
}

/// Flattens blocks for a plain terminal.
pub fn to_plain_text(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block {
            Block::Heading { level: 1, spans } => {
                let text = spans_text(spans);
                out.push_str(&text.to_uppercase());
                out.push('\n');
            }
            Block::Heading { spans, .. } => {
                out.push('\n');
                out.push_str(&spans_text(spans));
                out.push('\n');
            }
            Block::Bullet(spans) => {
                out.push_str("  • ");
                out.push_str(&spans_text(spans));
                out.push('\n');
            }
            Block::Numbered { number, spans } => {
                out.push_str(&format!("  {}. {}\n", number, spans_text(spans)));
            }
            Block::Paragraph(spans) => {
                out.push_str(&spans_text(spans));
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    fn text(s: &str) -> Span {
        Span::Text(s.to_string())
    }

    fn bold(s: &str) -> Span {
        Span::Bold(s.to_string())
    }

    #[test]
    fn bold_markers_become_spans() {
        assert_eq!(
            parse_inline("Pay **Rs 2,000** by **31 March**"),
            vec![text("Pay "), bold("Rs 2,000"), text(" by "), bold("31 March")]
        );
        assert_eq!(parse_inline("**Verify Eligibility**: check"), vec![bold("Verify Eligibility"), text(": check")]);
    }

    #[test]
    fn unclosed_bold_stays_literal() {
        assert_eq!(parse_inline("a **b"), vec![text("a **b")]);
    }

    #[test]
    fn line_kinds_are_recognised() {
        let blocks = render_markdown("## Next Steps\n\n1. **Apply**: online\n• Keep copies\n- Carry ID\n#hashtag\nPlain text");
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 2, spans: vec![text("Next Steps")] },
                Block::Numbered { number: 1, spans: vec![bold("Apply"), text(": online")] },
                Block::Bullet(vec![text("Keep copies")]),
                Block::Bullet(vec![text("Carry ID")]),
                Block::Paragraph(vec![text("#hashtag")]),
                Block::Paragraph(vec![text("Plain text")]),
            ]
        );
    }

    #[test]
    fn one_bubble_per_message_in_order() {
        let messages = vec![
            Message::new(Sender::User, "first"),
            Message::new(Sender::Ai, "# second"),
            Message::new(Sender::User, "**third**"),
        ];
        let bubbles = render_conversation(&messages);
        assert_eq!(bubbles.len(), 3);
        for (bubble, message) in bubbles.iter().zip(&messages) {
            assert_eq!(bubble.message_id, message.id);
        }
        assert_eq!(bubbles[2].body, BubbleBody::Plain("**third**".to_string()));
    }

    #[test]
    fn pm_kisan_answer_renders_heading_then_eligibility_bullets() {
        let conversation = seed::example_conversation();
        let bubble = render_message(&conversation[1]);
        let BubbleBody::Formatted(blocks) = bubble.body else {
            panic!("AI answers are formatted");
        };

        assert_eq!(blocks[0], Block::Heading { level: 1, spans: vec![text("PM-KISAN Scheme")] });

        let criteria = blocks
            .iter()
            .position(|b| matches!(b, Block::Heading { level: 2, spans } if spans == &vec![text("Eligibility Criteria")]))
            .expect("eligibility section");
        assert!(matches!(blocks[criteria + 1], Block::Bullet(_)));
        let bullets = blocks[criteria + 1..]
            .iter()
            .take_while(|b| matches!(b, Block::Bullet(_)))
            .count();
        assert_eq!(bullets, 5);
    }

    #[test]
    fn plain_text_keeps_structure() {
        let out = to_plain_text(&render_markdown("# Title\n- one\n2. two"));
        assert_eq!(out, "TITLE\n  • one\n  2. two\n");
    }
}
