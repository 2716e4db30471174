//! body
//!
//! Pull request body rendering and parsing.
//!
//! Every classic-mode PR body leads with a navigator block listing the whole
//! stack, top of stack first, followed by the user's prose:
//!
//! ```text
//! Stack from ghstack (oldest at bottom):
//! * #502
//! * __->__ #501
//! * #500
//!
//! <user prose>
//! ```
//!
//! The navigator is the only part of the body the engine owns. On update the
//! block is rewritten in place and the surrounding prose is preserved byte
//! for byte (modulo CRLF normalization), so edits made on the forge survive.
//! Direct-mode PRs carry no navigator in the body; their stack listing lives
//! in an issue comment instead.

/// Header line of the navigator block (a `:` is appended when rendering).
pub const STACK_HEADER: &str = "Stack from ghstack (oldest at bottom)";

/// Separator inserted before prose that begins with a Markdown list item, so
/// the prose is not mistaken for more navigator entries.
const PROSE_SEPARATOR: &str = "----";

/// A PR body decomposed into the navigator block and the surrounding prose.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedBody {
    /// PR numbers from the navigator, top of stack first. Empty when the
    /// body carries no navigator (direct mode, or a foreign body).
    pub stack_refs: Vec<u64>,
    /// Everything outside the navigator block.
    pub prose: String,
}

/// Returns true if the text begins with a Markdown bullet list item.
pub fn starts_with_bullet(text: &str) -> bool {
    let trimmed = text.trim_start_matches([' ', '\t']);
    let mut chars = trimmed.chars();
    matches!(chars.next(), Some('*' | '-' | '+')) && matches!(chars.next(), Some(' ' | '\t'))
}

/// Render the navigator block for a stack.
///
/// `stack` is ordered top of stack first; `self_number` gets the arrow.
pub fn render_navigator(stack: &[u64], self_number: u64) -> String {
    let mut out = String::new();
    out.push_str(STACK_HEADER);
    out.push_str(":\n");
    for &number in stack {
        if number == self_number {
            out.push_str(&format!("* __->__ #{}\n", number));
        } else {
            out.push_str(&format!("* #{}\n", number));
        }
    }
    out
}

/// Render a fresh PR body from a navigator and prose.
pub fn render(stack: &[u64], self_number: u64, prose: &str) -> String {
    let mut prose = prose.trim().to_string();
    if starts_with_bullet(&prose) {
        prose = format!("{}\n\n{}", PROSE_SEPARATOR, prose);
    }
    format!("{}\n{}", render_navigator(stack, self_number), prose)
}

/// Parse a navigator item line, returning the PR number.
///
/// Accepts both `* #N` and `* __->__ #N`. Foreign list items return `None`.
fn parse_item(line: &str) -> Option<u64> {
    let rest = line.strip_prefix("* ")?;
    let rest = rest.strip_prefix("__->__ ").unwrap_or(rest);
    rest.strip_prefix('#')?.trim().parse().ok()
}

/// Locate the navigator block: the line range `[start, end)` covering the
/// header line and its `* ` items.
fn find_navigator(lines: &[&str]) -> Option<(usize, usize)> {
    let start = lines
        .iter()
        .position(|l| l.starts_with("Stack") && l.trim_end().ends_with(':'))?;

    let mut end = start + 1;
    while end < lines.len() && lines[end].starts_with("* ") {
        end += 1;
    }
    if end == start + 1 {
        return None;
    }
    Some((start, end))
}

/// Parse a PR body into its navigator references and prose.
///
/// CRLF line endings from the forge are normalized away. Bodies without a
/// navigator block parse as all prose with no refs.
///
/// # Example
///
/// ```
/// use ghstack::body::parse;
///
/// let parsed = parse("Stack from ghstack (oldest at bottom):\n* __->__ #2\n* #1\n\nMy change.");
/// assert_eq!(parsed.stack_refs, vec![2, 1]);
/// assert_eq!(parsed.prose, "My change.");
/// ```
pub fn parse(body: &str) -> ParsedBody {
    let normalized = body.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.lines().collect();

    let Some((start, end)) = find_navigator(&lines) else {
        return ParsedBody {
            stack_refs: Vec::new(),
            prose: normalized.trim().to_string(),
        };
    };

    let stack_refs = lines[start + 1..end]
        .iter()
        .filter_map(|l| parse_item(l))
        .collect();

    let mut prose_lines: Vec<&str> = Vec::new();
    prose_lines.extend(&lines[..start]);
    prose_lines.extend(&lines[end..]);
    let prose = prose_lines.join("\n").trim().to_string();

    ParsedBody { stack_refs, prose }
}

/// Rewrite the navigator block inside an existing body, preserving all
/// surrounding prose.
///
/// If the body has no navigator (the user deleted it, say), the fresh block
/// is prepended. The returned body always uses LF line endings.
pub fn replace_navigator(body: &str, stack: &[u64], self_number: u64) -> String {
    let normalized = body.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.lines().collect();
    let navigator = render_navigator(stack, self_number);

    match find_navigator(&lines) {
        Some((start, end)) => {
            let mut out = String::new();
            for l in &lines[..start] {
                out.push_str(l);
                out.push('\n');
            }
            out.push_str(&navigator);
            for l in &lines[end..] {
                out.push_str(l);
                out.push('\n');
            }
            // A body that did not end in a newline should stay that way.
            if !normalized.ends_with('\n') {
                out.pop();
            }
            out
        }
        None => format!("{}\n{}", navigator, normalized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_navigator_with_arrow() {
        let nav = render_navigator(&[502, 501, 500], 501);
        assert_eq!(
            nav,
            "Stack from ghstack (oldest at bottom):\n* #502\n* __->__ #501\n* #500\n"
        );
    }

    #[test]
    fn render_parse_round_trip() {
        let body = render(&[2, 1], 1, "My change description.\n\nMore detail.");
        let parsed = parse(&body);
        assert_eq!(parsed.stack_refs, vec![2, 1]);
        assert_eq!(parsed.prose, "My change description.\n\nMore detail.");
    }

    #[test]
    fn bullet_prose_gets_separator() {
        let body = render(&[1], 1, "* first point\n* second point");
        assert!(body.contains("----"));
        // The separator keeps the prose bullets out of the navigator.
        let parsed = parse(&body);
        assert_eq!(parsed.stack_refs, vec![1]);
        assert!(parsed.prose.contains("* first point"));
    }

    #[test]
    fn starts_with_bullet_variants() {
        assert!(starts_with_bullet("* item"));
        assert!(starts_with_bullet("- item"));
        assert!(starts_with_bullet("+ item"));
        assert!(starts_with_bullet("  * indented"));
        assert!(!starts_with_bullet("*emphasis*"));
        assert!(!starts_with_bullet("plain text"));
    }

    #[test]
    fn parses_body_without_navigator() {
        let parsed = parse("Just a description.\n\nWith paragraphs.");
        assert!(parsed.stack_refs.is_empty());
        assert_eq!(parsed.prose, "Just a description.\n\nWith paragraphs.");
    }

    #[test]
    fn normalizes_crlf_from_forge() {
        let parsed = parse("Stack from ghstack (oldest at bottom):\r\n* __->__ #1\r\n\r\nProse.\r\n");
        assert_eq!(parsed.stack_refs, vec![1]);
        assert_eq!(parsed.prose, "Prose.");
    }

    #[test]
    fn replace_navigator_preserves_prose() {
        let body = "Stack from ghstack (oldest at bottom):\n* __->__ #1\n\nEdited on the forge.";
        let updated = replace_navigator(body, &[2, 1], 1, );
        assert!(updated.contains("* #2"));
        assert!(updated.contains("* __->__ #1"));
        assert!(updated.contains("Edited on the forge."));
    }

    #[test]
    fn replace_navigator_handles_missing_block() {
        let updated = replace_navigator("User wiped the body.", &[7], 7);
        assert!(updated.starts_with(STACK_HEADER));
        assert!(updated.contains("User wiped the body."));
    }

    #[test]
    fn replace_navigator_normalizes_crlf() {
        let body = "Stack from ghstack (oldest at bottom):\r\n* __->__ #1\r\n\r\nProse.";
        let updated = replace_navigator(body, &[1], 1);
        assert!(!updated.contains('\r'));
        assert!(updated.contains("Prose."));
    }

    #[test]
    fn foreign_list_items_are_tolerated() {
        let parsed = parse("Stack from ghstack (oldest at bottom):\n* #3\n* (to be filled)\n\nProse.");
        assert_eq!(parsed.stack_refs, vec![3]);
    }

    #[test]
    fn header_without_items_is_prose() {
        let parsed = parse("Stack of pancakes:\n\nnothing else");
        assert!(parsed.stack_refs.is_empty());
    }
}
