//! msg
//!
//! The commit-message trailer codec.
//!
//! A commit message is treated as a structured document: a prose section and
//! an append-only trailer section at the bottom, separated by a blank line.
//! The codec parses and re-emits that structure, and computes the
//! `ghstack-source-id` content hash.
//!
//! # Wire format
//!
//! ```text
//! Add the widget frobnicator
//!
//! Longer explanation of the change.
//!
//! Signed-off-by: Alice <alice@example.com>
//! ghstack-source-id: 0c8e6b...
//! Pull Request resolved: https://github.com/owner/repo/pull/500
//! ```
//!
//! Unknown trailers (`Signed-off-by`, `Differential Revision`, ...) are
//! preserved verbatim in their original order; ghstack trailers are emitted
//! last in a fixed order. Carriage returns from the forge are stripped on
//! parse; output is always LF.

use sha1::{Digest, Sha1};

use crate::core::types::{PullRequestRef, TreeOid};

/// Trailer key carrying the stable diff identity.
pub const SOURCE_ID_KEY: &str = "ghstack-source-id";

/// Trailer key carrying the stack comment id (direct mode only).
pub const COMMENT_ID_KEY: &str = "ghstack-comment-id";

/// Trailer key carrying the PR URL in classic (stack) mode.
pub const PULL_REQUEST_RESOLVED_KEY: &str = "Pull Request resolved";

/// Trailer key carrying the PR URL in direct mode.
pub const PULL_REQUEST_KEY: &str = "Pull-Request";

/// A single `key: value` trailer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    pub key: String,
    pub value: String,
}

impl Trailer {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether this trailer is owned by ghstack (stripped on unlink,
    /// excluded from the source id).
    pub fn is_ghstack(&self) -> bool {
        matches!(
            self.key.as_str(),
            SOURCE_ID_KEY | COMMENT_ID_KEY | PULL_REQUEST_RESOLVED_KEY | PULL_REQUEST_KEY
        )
    }
}

impl std::fmt::Display for Trailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}

/// A commit message decomposed into prose and trailers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// Everything above the trailer block, trailing whitespace trimmed.
    pub prose: String,
    /// The trailer block, in file order.
    pub trailers: Vec<Trailer>,
}

impl Message {
    /// The subject (first line of the prose).
    pub fn title(&self) -> &str {
        self.prose.lines().next().unwrap_or("")
    }

    /// The prose below the subject, leading blank lines trimmed.
    pub fn body(&self) -> &str {
        match self.prose.split_once('\n') {
            Some((_, rest)) => rest.trim_start_matches('\n'),
            None => "",
        }
    }

    /// Look up a trailer value by exact key.
    pub fn trailer(&self, key: &str) -> Option<&str> {
        self.trailers
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// The `ghstack-source-id` recorded on this message, if any.
    pub fn recorded_source_id(&self) -> Option<&str> {
        self.trailer(SOURCE_ID_KEY)
    }

    /// The stack comment id recorded on this message, if any.
    pub fn comment_id(&self) -> Option<u64> {
        self.trailer(COMMENT_ID_KEY).and_then(|v| v.parse().ok())
    }

    /// The pull request this commit resolves, from either trailer spelling.
    pub fn pull_request(&self, github_url: &str) -> Option<PullRequestRef> {
        for key in [PULL_REQUEST_RESOLVED_KEY, PULL_REQUEST_KEY] {
            if let Some(url) = self.trailer(key) {
                if let Ok(pr) = PullRequestRef::parse_url(url, github_url) {
                    return Some(pr);
                }
            }
        }
        None
    }

    /// The trailers that are not ghstack's (preserved across rewrites).
    pub fn user_trailers(&self) -> Vec<Trailer> {
        self.trailers
            .iter()
            .filter(|t| !t.is_ghstack())
            .cloned()
            .collect()
    }
}

/// Check whether a line is trailer-shaped (`Key: value`).
///
/// Keys may contain letters, digits, `-`, `_` and interior spaces (the
/// `Pull Request resolved` key has them), and must not start or end with
/// whitespace. The value must be non-empty.
fn parse_trailer_line(line: &str) -> Option<Trailer> {
    let (key, value) = line.split_once(": ")?;
    if key.is_empty() || value.is_empty() {
        return None;
    }
    if !key.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if key.ends_with(' ') {
        return None;
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ' ')
    {
        return None;
    }
    Some(Trailer::new(key, value.trim()))
}

/// Parse a commit message into prose and trailers.
///
/// The trailer block is the maximal suffix of trailer-shaped lines separated
/// from the prose by a blank line. CRLF line endings are normalized away.
///
/// # Example
///
/// ```
/// use ghstack::msg::parse;
///
/// let m = parse("Subject\n\nBody text.\n\nSigned-off-by: A <a@b>\nghstack-source-id: 0123\n");
/// assert_eq!(m.title(), "Subject");
/// assert_eq!(m.trailers.len(), 2);
/// assert_eq!(m.recorded_source_id(), Some("0123"));
/// ```
pub fn parse(message: &str) -> Message {
    let normalized = message.replace("\r\n", "\n");
    let trimmed = normalized.trim_end_matches('\n');

    let lines: Vec<&str> = trimmed.lines().collect();

    // Walk backwards over trailer-shaped lines.
    let mut start = lines.len();
    while start > 0 {
        let line = lines[start - 1];
        if parse_trailer_line(line).is_some() {
            start -= 1;
        } else {
            break;
        }
    }

    // The block must be non-empty, preceded by a blank line, and must not be
    // the entire message (a message that is nothing but key/value lines has a
    // key/value-shaped subject, not a trailer block).
    let has_block = start < lines.len()
        && start >= 2
        && lines[start - 1].trim().is_empty();

    if !has_block {
        return Message {
            prose: trimmed.to_string(),
            trailers: Vec::new(),
        };
    }

    let prose = lines[..start - 1].join("\n").trim_end().to_string();
    let trailers = lines[start..]
        .iter()
        .filter_map(|l| parse_trailer_line(l))
        .collect();

    Message { prose, trailers }
}

/// Emit a commit message from prose and trailers.
///
/// Deterministic ordering: user trailers first, in their given order, then
/// ghstack trailers in a fixed order (`ghstack-source-id`,
/// `ghstack-comment-id`, PR trailer). Output is LF-terminated lines with no
/// trailing newline.
pub fn emit(prose: &str, trailers: &[Trailer]) -> String {
    let prose = prose.trim_end();
    if trailers.is_empty() {
        return prose.to_string();
    }

    let mut ordered: Vec<&Trailer> = trailers.iter().filter(|t| !t.is_ghstack()).collect();
    for key in [SOURCE_ID_KEY, COMMENT_ID_KEY, PULL_REQUEST_RESOLVED_KEY, PULL_REQUEST_KEY] {
        ordered.extend(trailers.iter().filter(|t| t.key == key));
    }

    let block: Vec<String> = ordered.iter().map(|t| t.to_string()).collect();
    format!("{}\n\n{}", prose, block.join("\n"))
}

/// Compute the `ghstack-source-id` for a commit.
///
/// The id is a SHA-1 over the tree hash, the prose, and the non-ghstack
/// trailers. ghstack's own trailers are deliberately excluded so that
/// stamping a source id onto a commit does not change its source id.
pub fn source_id(tree: &TreeOid, prose: &str, user_trailers: &[Trailer]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(tree.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(prose.trim_end().as_bytes());
    for t in user_trailers.iter().filter(|t| !t.is_ghstack()) {
        hasher.update(b"\0");
        hasher.update(t.key.as_bytes());
        hasher.update(b": ");
        hasher.update(t.value.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Strip GitHub `@mention`s so copied prose does not spam people.
///
/// A mention is only live when preceded by a non-word character (or the start
/// of the text), so `a@b.com` survives while `cc @alice` loses the `@`.
pub fn strip_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '@' {
            let boundary = match prev {
                None => true,
                Some(p) => !p.is_ascii_alphanumeric() && p != '_',
            };
            let next_alnum = chars.peek().is_some_and(|n| n.is_ascii_alphanumeric());
            if boundary && next_alnum {
                // Drop the '@'; the login itself is kept.
                prev = Some(c);
                continue;
            }
        }
        out.push(c);
        prev = Some(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> TreeOid {
        TreeOid::new("1111111111111111111111111111111111111111").unwrap()
    }

    #[test]
    fn parses_message_without_trailers() {
        let m = parse("Subject\n\nJust a body.\n");
        assert_eq!(m.prose, "Subject\n\nJust a body.");
        assert!(m.trailers.is_empty());
    }

    #[test]
    fn parses_trailer_block() {
        let m = parse("Subject\n\nBody.\n\nghstack-source-id: abcd\nPull Request resolved: https://github.com/o/r/pull/5\n");
        assert_eq!(m.prose, "Subject\n\nBody.");
        assert_eq!(m.recorded_source_id(), Some("abcd"));
        assert_eq!(
            m.trailer(PULL_REQUEST_RESOLVED_KEY),
            Some("https://github.com/o/r/pull/5")
        );
    }

    #[test]
    fn preserves_unknown_trailers() {
        let m = parse("Subject\n\nBody.\n\nSigned-off-by: A <a@b>\nDifferential Revision: D12345\n");
        assert_eq!(m.trailers.len(), 2);
        assert_eq!(m.user_trailers().len(), 2);
        assert_eq!(m.trailer("Differential Revision"), Some("D12345"));
    }

    #[test]
    fn trailer_block_requires_blank_separator() {
        // The key/value line is part of the paragraph, not a trailer block.
        let m = parse("Subject\n\nBody text\nNote: inline annotation");
        assert!(m.trailers.is_empty());
        assert!(m.prose.ends_with("Note: inline annotation"));
    }

    #[test]
    fn subject_only_key_value_is_not_a_trailer() {
        let m = parse("fix: the thing");
        assert!(m.trailers.is_empty());
        assert_eq!(m.title(), "fix: the thing");
    }

    #[test]
    fn tolerates_crlf() {
        let m = parse("Subject\r\n\r\nBody.\r\n\r\nghstack-source-id: abcd\r\n");
        assert_eq!(m.prose, "Subject\n\nBody.");
        assert_eq!(m.recorded_source_id(), Some("abcd"));
    }

    #[test]
    fn emit_orders_user_trailers_first() {
        let out = emit(
            "Subject\n\nBody.",
            &[
                Trailer::new(SOURCE_ID_KEY, "abcd"),
                Trailer::new("Signed-off-by", "A <a@b>"),
                Trailer::new(PULL_REQUEST_RESOLVED_KEY, "https://github.com/o/r/pull/5"),
            ],
        );
        assert_eq!(
            out,
            "Subject\n\nBody.\n\nSigned-off-by: A <a@b>\nghstack-source-id: abcd\nPull Request resolved: https://github.com/o/r/pull/5"
        );
    }

    #[test]
    fn round_trip() {
        let trailers = vec![
            Trailer::new("Signed-off-by", "A <a@b>"),
            Trailer::new(SOURCE_ID_KEY, "abcd"),
            Trailer::new(PULL_REQUEST_RESOLVED_KEY, "https://github.com/o/r/pull/5"),
        ];
        let msg = emit("Subject\n\nBody text.", &trailers);
        let parsed = parse(&msg);
        assert_eq!(parsed.prose, "Subject\n\nBody text.");
        assert_eq!(parsed.trailers, trailers);
    }

    #[test]
    fn round_trip_no_trailers() {
        let msg = emit("Subject\n\nBody.", &[]);
        let parsed = parse(&msg);
        assert_eq!(parsed.prose, "Subject\n\nBody.");
        assert!(parsed.trailers.is_empty());
    }

    #[test]
    fn source_id_ignores_ghstack_trailers() {
        let base = source_id(&tree(), "Subject\n\nBody.", &[]);
        let with_ghstack = source_id(
            &tree(),
            "Subject\n\nBody.",
            &[Trailer::new(SOURCE_ID_KEY, "abcd")],
        );
        assert_eq!(base, with_ghstack);
        assert_eq!(base.len(), 40);
    }

    #[test]
    fn source_id_tracks_content() {
        let a = source_id(&tree(), "Subject", &[]);
        let b = source_id(&tree(), "Subject edited", &[]);
        let c = source_id(
            &tree(),
            "Subject",
            &[Trailer::new("Signed-off-by", "A <a@b>")],
        );
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn pull_request_parses_both_spellings() {
        let classic = parse("S\n\nB.\n\nPull Request resolved: https://github.com/o/r/pull/5");
        assert_eq!(classic.pull_request("github.com").unwrap().number, 5);

        let direct = parse("S\n\nB.\n\nPull-Request: https://github.com/o/r/pull/6");
        assert_eq!(direct.pull_request("github.com").unwrap().number, 6);
    }

    #[test]
    fn strip_mentions_defangs_logins() {
        assert_eq!(strip_mentions("cc @alice and @bob-1"), "cc alice and bob-1");
        assert_eq!(strip_mentions("mail a@example.com"), "mail a@example.com");
        assert_eq!(strip_mentions("@lead first"), "lead first");
    }

    #[test]
    fn title_and_body_split() {
        let m = parse("Subject line\n\nFirst para.\n\nSecond para.");
        assert_eq!(m.title(), "Subject line");
        assert_eq!(m.body(), "First para.\n\nSecond para.");
    }
}
