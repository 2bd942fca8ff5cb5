//! Commit message shaping and validation.

use std::sync::LazyLock;

use regex::Regex;

/// Commit types accepted in a conventional commit header.
pub const COMMIT_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "test", "chore", "perf", "hotfix",
];

#[allow(clippy::unwrap_used)] // Pattern built from constant commit types
static COMMIT_HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let types = COMMIT_TYPES.join("|");
    Regex::new(&format!(r"^({types})\((\S.*)\):\s(\S.*)|^Merge.*")).unwrap()
});

/// Returns true if the first line of `message` is a conventional commit
/// header (`type(scope): subject`) or a merge commit header.
pub fn is_conventional_header(message: &str) -> bool {
    let header = message.lines().next().unwrap_or_default();
    COMMIT_HEADER_PATTERN.is_match(header)
}

/// Strips a surrounding markdown code fence from generated text.
///
/// Models occasionally wrap the message in ```` ``` ```` despite being told
/// not to; anything outside the first fenced block is discarded.
pub fn clean_generated_message(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop an info string such as ```text on the opening line.
        let body = rest.split_once('\n').map_or("", |(_, body)| body);
        let body = body.split("```").next().unwrap_or(body);
        return body.trim().to_string();
    }
    trimmed.to_string()
}

/// Produces the final commit message text.
///
/// Appends `sign_off` as a trailer unless the message already carries it,
/// and guarantees exactly one trailing newline.
pub fn finalize_message(message: &str, sign_off: Option<&str>) -> String {
    let mut out = message.trim_end().to_string();
    if let Some(line) = sign_off {
        if !out.lines().any(|l| l.trim() == line) {
            out.push_str("\n\n");
            out.push_str(line);
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conventional_header_accepts_all_types() {
        for ty in COMMIT_TYPES {
            assert!(
                is_conventional_header(&format!("{ty}(api): add thing")),
                "type {ty} should be accepted"
            );
        }
    }

    #[test]
    fn conventional_header_checks_only_first_line() {
        assert!(is_conventional_header(
            "feat(ui): add button\n\n- wire click handler"
        ));
        assert!(!is_conventional_header("Add button\n\nfeat(ui): nope"));
    }

    #[test]
    fn conventional_header_rejects_unknown_type() {
        assert!(!is_conventional_header("feature(api): add thing"));
        assert!(!is_conventional_header("build(ci): bump runner"));
    }

    #[test]
    fn conventional_header_rejects_missing_scope() {
        assert!(!is_conventional_header("feat: add thing"));
        assert!(!is_conventional_header("feature(api): add thing"));
    }

    #[test]
    fn conventional_header_accepts_merge() {
        assert!(is_conventional_header("Merge branch 'main' into dev"));
    }

    #[test]
    fn clean_generated_message_strips_fence() {
        let raw = "```text\nfeat(api): add x\n\n- do y\n```\n";
        assert_eq!(clean_generated_message(raw), "feat(api): add x\n\n- do y");
    }

    #[test]
    fn clean_generated_message_leaves_plain_text() {
        assert_eq!(
            clean_generated_message("  fix(db): close pool \n"),
            "fix(db): close pool"
        );
    }

    #[test]
    fn finalize_message_appends_sign_off_once() {
        let sob = "Signed-off-by: A <a@example.com>";
        let once = finalize_message("feat(x): y\n\n- z\n", Some(sob));
        assert_eq!(once, format!("feat(x): y\n\n- z\n\n{sob}\n"));
        assert_eq!(finalize_message(&once, Some(sob)), once);
    }

    #[test]
    fn finalize_message_without_sign_off() {
        assert_eq!(finalize_message("docs(readme): fix typo", None), "docs(readme): fix typo\n");
    }
}
