use crate::NO_ISSUES_SENTINEL;

/// Prompt templates for the scanner and patcher roles
pub struct AuditPrompts;

impl AuditPrompts {
    /// Build the prompt asking for exploitable vulnerabilities in `artifact`
    pub fn scan_prompt(artifact: &str) -> String {
        format!(
            r#"You are a senior red-team penetration tester.

Task: find every genuinely exploitable security vulnerability in the code below.

Rules:
1. Report only real, exploitable vulnerabilities (SQL injection, remote code execution, hard-coded secrets, session fixation, XSS, path traversal, and similar).
2. Ignore code style, naming and performance.
3. For each vulnerability give the location, the attack, and why it is exploitable.
4. If there is no exploitable vulnerability at all, reply with exactly one word: {sentinel}

Code:
{code}"#,
            sentinel = NO_ISSUES_SENTINEL,
            code = artifact,
        )
    }

    /// Build the prompt asking for a remediated version of `artifact`
    pub fn patch_prompt(artifact: &str, issues: &str) -> String {
        format!(
            r#"You are a security architect. Fix every vulnerability the scanner confirmed in the code below, to production security standards.

Confirmed vulnerabilities:
{issues}

Original code:
{code}

Apply these rules wherever they are relevant:
1. No dangerous functions: pickle, eval, exec, os.system, subprocess.getoutput.
2. Run commands only with an argument list and no shell.
3. Every SQL statement must use parameterized queries.
4. Validate file paths: resolve them and check they stay inside the allowed directory.
5. Escape all user data before rendering HTML; cookies must be HttpOnly and Secure.
6. Read secret keys and API keys from the environment, never from literals.
7. Use the framework's session support instead of hand-made cookies.
8. Debug mode off and bind to 127.0.0.1 in production.
9. Store passwords only as salted hashes.
10. Wrap database and file operations in error handling.
11. Validate every external input.
12. Keep the business logic unchanged; do not remove features.
13. Output the complete code only: no markdown fences, no explanations."#,
            issues = issues,
            code = artifact,
        )
    }
}
