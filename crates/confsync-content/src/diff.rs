//! Unified text diffs

use similar::TextDiff;

/// Git-style unified diff of `old` against `new` for `rel_path`.
///
/// Returns an empty string when the texts have the same lines.
pub fn unified_diff(rel_path: &str, old: &str, new: &str) -> String {
    if old.lines().eq(new.lines()) {
        return String::new();
    }
    let diff = TextDiff::from_lines(old, new);
    let from = format!("a/{}", rel_path);
    let to = format!("b/{}", rel_path);
    let body = diff
        .unified_diff()
        .missing_newline_hint(false)
        .header(&from, &to)
        .to_string();
    if body.trim().is_empty() {
        return String::new();
    }
    format!(
        "diff --git a/{} b/{}\n{}\n",
        rel_path,
        rel_path,
        body.trim_end_matches('\n')
    )
}
