//! Code agents: turn a task into source code and repair failing code.
//!
//! Agents return plain source text. Markdown fences and commentary in the
//! model's reply are stripped before the code reaches the sandbox.

#[cfg(test)]
pub(crate) mod mock;
mod python;

pub(crate) use python::PythonCoderAgent;

use anyhow::Result;
use async_trait::async_trait;

/// Generates and repairs code for a task.
#[async_trait]
pub(crate) trait CodeAgent: Send + Sync {
    /// Returns the agent name for display and result labels.
    fn name(&self) -> &'static str;

    /// Writes code that performs `task`.
    async fn generate(&self, task: &str) -> Result<String>;

    /// Rewrites `failing_code` given the error it produced.
    async fn repair(&self, task: &str, failing_code: &str, error_text: &str) -> Result<String>;
}

/// Extracts plain source from a model reply.
///
/// If the reply contains a fenced block, only the first block's body is
/// kept and anything around it is dropped. A language tag on the opening
/// fence is removed.
pub(crate) fn sanitize_code(raw: &str) -> String {
    let text = raw.trim();
    let Some(start) = text.find("```") else {
        return text.to_string();
    };

    let after = &text[start + 3..];
    let body = match after.find('\n') {
        Some(nl) if is_language_tag(&after[..nl]) => &after[nl + 1..],
        _ => after,
    };
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };

    body.trim().to_string()
}

fn is_language_tag(s: &str) -> bool {
    s.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_code_unchanged() {
        assert_eq!(sanitize_code("  print(2+2)\n"), "print(2+2)");
    }

    #[test]
    fn test_sanitize_python_fence() {
        let raw = "```python\nimport math\nprint(math.pi)\n```";
        assert_eq!(sanitize_code(raw), "import math\nprint(math.pi)");
    }

    #[test]
    fn test_sanitize_bare_fence() {
        assert_eq!(sanitize_code("```\nprint(1)\n```"), "print(1)");
    }

    #[test]
    fn test_sanitize_inline_fence() {
        assert_eq!(sanitize_code("```print(1)```"), "print(1)");
    }

    #[test]
    fn test_sanitize_drops_surrounding_commentary() {
        let raw = "Here is the fixed code:\n```python\nprint(sum([1, 2]))\n```\nThis sums the list.";
        assert_eq!(sanitize_code(raw), "print(sum([1, 2]))");
    }

    #[test]
    fn test_sanitize_unterminated_fence() {
        assert_eq!(sanitize_code("```python\nprint(3)"), "print(3)");
    }
}
