//! Pull-output classification tables.
//!
//! Keyword lists mapping git output to short human messages. These are data,
//! not logic: extending a category means adding a needle to a table.

/// One classification rule: if any needle occurs in the output, the rule's
/// message applies. Rules are checked in declaration order.
pub struct Rule {
    pub needles: &'static [&'static str],
    pub message: &'static str,
}

/// Successful pull output, most specific first.
pub static SUCCESS_RULES: &[Rule] = &[
    Rule {
        needles: &["Already up to date", "Already up-to-date"],
        message: "already up to date",
    },
    Rule {
        needles: &["Fast-forward"],
        message: "fast-forward",
    },
    Rule {
        needles: &["Merge made by"],
        message: "merged",
    },
    Rule {
        needles: &["files changed"],
        message: "updated",
    },
];

/// Failed pull output, most specific first.
pub static FAILURE_RULES: &[Rule] = &[
    Rule {
        needles: &["Permission denied", "could not read from remote repository"],
        message: "ssh authentication failed or no access to remote",
    },
    Rule {
        needles: &["refusing to merge unrelated histories"],
        message: "refusing to merge unrelated histories",
    },
    Rule {
        needles: &["non-fast-forward"],
        message: "non-fast-forward, local branch has unpushed commits",
    },
    Rule {
        needles: &["Authentication failed"],
        message: "authentication failed, check credentials",
    },
    Rule {
        needles: &["There is no tracking information"],
        message: "no upstream tracking branch configured",
    },
    Rule {
        needles: &["timeout", "Timeout", "timed out"],
        message: "connection timed out, check network or remote",
    },
];

/// Message for a successful pull, derived from its combined output.
pub fn classify_success(output: &str) -> String {
    if output.trim().is_empty() {
        return "no output".to_string();
    }
    for rule in SUCCESS_RULES {
        if rule.needles.iter().any(|n| output.contains(n)) {
            return rule.message.to_string();
        }
    }
    truncate(output.trim(), 100)
}

/// Message for a failed pull, derived from its combined output.
pub fn classify_failure(output: &str) -> String {
    for rule in FAILURE_RULES {
        if rule.needles.iter().any(|n| output.contains(n)) {
            return format!("update failed: {}", rule.message);
        }
    }
    format!("update failed: {}", truncate(output.trim(), 100))
}

/// Char-boundary-safe prefix with an ellipsis when truncated.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success_known_outputs() {
        assert_eq!(classify_success("Already up to date.\n"), "already up to date");
        assert_eq!(classify_success("Already up-to-date.\n"), "already up to date");
        assert_eq!(
            classify_success("Updating 1a2b3c..4d5e6f\nFast-forward\n file | 2 +-\n"),
            "fast-forward"
        );
        assert_eq!(
            classify_success("Merge made by the 'ort' strategy.\n"),
            "merged"
        );
        assert_eq!(classify_success(" 3 files changed, 10 insertions(+)\n"), "updated");
    }

    #[test]
    fn test_classify_success_falls_back_to_prefix() {
        let odd = "x".repeat(200);
        let msg = classify_success(&odd);
        assert!(msg.ends_with("..."));
        assert_eq!(msg.chars().count(), 100);
    }

    #[test]
    fn test_classify_success_empty() {
        assert_eq!(classify_success("   \n"), "no output");
    }

    #[test]
    fn test_classify_failure_known_outputs() {
        assert_eq!(
            classify_failure("fatal: Authentication failed for 'https://...'"),
            "update failed: authentication failed, check credentials"
        );
        assert_eq!(
            classify_failure("git@github.com: Permission denied (publickey)."),
            "update failed: ssh authentication failed or no access to remote"
        );
        assert_eq!(
            classify_failure("fatal: refusing to merge unrelated histories"),
            "update failed: refusing to merge unrelated histories"
        );
        assert_eq!(
            classify_failure("There is no tracking information for the current branch."),
            "update failed: no upstream tracking branch configured"
        );
        assert_eq!(
            classify_failure("! [rejected] main -> main (non-fast-forward)"),
            "update failed: non-fast-forward, local branch has unpushed commits"
        );
    }

    #[test]
    fn test_classify_failure_generic_is_truncated() {
        let long = "e".repeat(300);
        let msg = classify_failure(&long);
        assert!(msg.starts_with("update failed: "));
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "日本語のテキストです".repeat(20);
        let t = truncate(&s, 100);
        assert_eq!(t.chars().count(), 100);
    }
}
