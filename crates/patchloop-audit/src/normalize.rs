//! Best-effort cleanup of patcher replies.
//!
//! Hosted models wrap code in markdown fences and open with a chatty line
//! ("Here is the fixed code:") even when told not to. This is a heuristic:
//! it knows a handful of habits and nothing more.

/// Lines starting with these phrases are always treated as preamble.
/// A bare "Here" is not enough: `Here = 1` is code.
const PREAMBLE_PREFIXES: &[&str] = &["Here is ", "Here's ", "Here are ", "Here you go", "这里"];

/// Lines starting with these are preamble only when they end with a colon
const COLON_PREAMBLE_PREFIXES: &[&str] = &[
    "Here",
    "Sure",
    "Certainly",
    "Below",
    "The fixed",
    "The patched",
    "The remediated",
    "以下",
    "修复后",
    "下面",
];

/// Strip markdown fences and conversational preamble from a patcher reply.
///
/// If the reply contains a fenced block, only the body of the first block is
/// kept (to its closing fence, or to the end if it is never closed). Leading
/// preamble lines are then dropped until the first line that does not look
/// like one. Idempotent: normalizing an already-normalized text returns it
/// unchanged. May return an empty string.
pub fn normalize_patch_output(raw: &str) -> String {
    let text = raw.trim();
    let body = extract_fenced_body(text).unwrap_or(text);
    strip_preamble(body).trim().to_string()
}

fn is_fence_line(line: &str) -> bool {
    match line.trim().strip_prefix("```") {
        Some(tag) => tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '.' | '#')),
        None => false,
    }
}

fn extract_fenced_body(text: &str) -> Option<&str> {
    let mut offset = 0;
    let mut body_start = None;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if is_fence_line(line) {
            match body_start {
                None => body_start = Some(offset),
                Some(start) => return Some(&text[start..line_start]),
            }
        }
    }

    body_start.map(|start| &text[start..])
}

fn is_preamble_line(line: &str) -> bool {
    let line = line.trim();
    if PREAMBLE_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return true;
    }
    (line.ends_with(':') || line.ends_with('：'))
        && COLON_PREAMBLE_PREFIXES.iter().any(|p| line.starts_with(p))
}

fn strip_preamble(text: &str) -> &str {
    let mut rest = text;
    loop {
        let trimmed = rest.trim_start();
        let (first, remainder) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
        if trimmed.is_empty() || !is_preamble_line(first) {
            return trimmed;
        }
        rest = remainder;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "import os\n\ndef main():\n    return os.getenv(\"SECRET_KEY\")";

    #[test]
    fn test_plain_code_is_untouched() {
        assert_eq!(normalize_patch_output(CODE), CODE);
    }

    #[test]
    fn test_strips_language_fence() {
        let raw = format!("```python\n{}\n```", CODE);
        assert_eq!(normalize_patch_output(&raw), CODE);
    }

    #[test]
    fn test_strips_preamble_and_postscript_around_fence() {
        let raw = format!(
            "Here is the hardened version:\n\n```python\n{}\n```\n\nThis removes the SQL injection.",
            CODE
        );
        assert_eq!(normalize_patch_output(&raw), CODE);
    }

    #[test]
    fn test_strips_chinese_preamble_without_fence() {
        let raw = format!("这里是修复后的代码\n{}", CODE);
        assert_eq!(normalize_patch_output(&raw), CODE);
    }

    #[test]
    fn test_colon_preamble_requires_colon() {
        let raw = "Sure:\nprint('ok')";
        assert_eq!(normalize_patch_output(raw), "print('ok')");

        let code = "Sure = True\nprint(Sure)";
        assert_eq!(normalize_patch_output(code), code);
    }

    #[test]
    fn test_unclosed_fence_keeps_rest() {
        let raw = format!("```py\n{}", CODE);
        assert_eq!(normalize_patch_output(&raw), CODE);
    }

    #[test]
    fn test_only_first_fenced_block_is_kept() {
        let raw = "```python\nx = 1\n```\nand a test:\n```python\nassert x == 1\n```";
        assert_eq!(normalize_patch_output(raw), "x = 1");
    }

    #[test]
    fn test_preamble_only_reply_is_empty() {
        assert_eq!(normalize_patch_output("Here is the code"), "");
        assert_eq!(normalize_patch_output("```\n```"), "");
        assert_eq!(normalize_patch_output("   "), "");
    }

    #[test]
    fn test_inline_triple_backticks_are_not_fences() {
        let code = "doc = \"use ```code``` blocks\"";
        assert_eq!(normalize_patch_output(code), code);
    }

    #[test]
    fn test_code_starting_with_here_is_kept() {
        let body = "Here = 1\nprint(Here)";
        assert_eq!(normalize_patch_output(&format!("```python\n{}\n```", body)), body);
        assert_eq!(normalize_patch_output(body), body);
        assert_eq!(
            normalize_patch_output("Here's the fix:\n```python\nHere = 1\n```"),
            "Here = 1"
        );
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            CODE.to_string(),
            format!("```python\n{}\n```", CODE),
            format!("Here you go:\nHere is more:\n\n{}", CODE),
            format!("Sure:\n```\nHere = 1\n{}\n```", CODE),
            "```\n\n```".to_string(),
            "Certainly:\n\n   \nBelow is the fix:".to_string(),
        ];

        for sample in samples {
            let once = normalize_patch_output(&sample);
            let twice = normalize_patch_output(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }
}
