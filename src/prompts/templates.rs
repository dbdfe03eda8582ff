//! Built-in prompt templates.

use crate::review::ReviewType;

/// Pass prompt. Placeholders are replaced by [`super::TemplateRenderer`].
pub const PASS_TEMPLATE: &str = r#"You are an expert software engineer performing a {{REVIEW_TITLE}} of the project "{{PROJECT}}".

{{FOCUS}}

{{PASS_INFO}}

{{CONTEXT}}

## Files to review

{{FILES}}

## Response format

{{SCHEMA}}
"#;

/// Instructions describing the JSON a pass must return.
pub const SCHEMA_INSTRUCTIONS: &str = r#"Respond with a single JSON object and nothing else:

```json
{
  "summary": "Overall assessment of the files in this pass",
  "issues": [
    {
      "title": "Short issue title",
      "description": "What is wrong and why it matters",
      "priority": "critical | high | medium | low | info",
      "file": "relative/path/to/file",
      "line": 42,
      "suggestion": "Concrete fix"
    }
  ],
  "fileSummaries": [
    {"path": "relative/path", "type": "module | component | config | test | script",
     "description": "One sentence on the file's role", "keyElements": ["name"]}
  ],
  "codeElements": [
    {"type": "function | class | interface | variable | import | export | component | entry_point",
     "name": "identifier", "file": "relative/path", "signature": "optional", "importance": 7}
  ],
  "notes": ["Cross-cutting observations useful to later passes"]
}
```

Importance is 0-10. Only report issues you can point to in the code shown."#;

/// Prompt for merging partial reviews with the writer model.
pub const CONSOLIDATION_TEMPLATE: &str = r#"You are consolidating a multi-pass {{REVIEW_TITLE}} of the project "{{PROJECT}}".
The codebase was too large for one request, so it was reviewed in {{PASS_COUNT}} passes.
Below are the partial reviews.

Write one coherent review in markdown:
- a single unified summary of the whole codebase
- one issue list, grouped by priority (critical, high, medium, low)
- merge duplicate or overlapping issues and reconcile conflicting priorities
- keep file paths and line numbers from the partial reviews
- do not invent issues that no partial review reported

{{FAILURES}}

{{PARTIALS}}
"#;

/// Review-type focus paragraph.
pub fn focus(review_type: ReviewType) -> &'static str {
    match review_type {
        ReviewType::QuickFixes => {
            "Focus on quick, low-effort, high-impact fixes: obvious bugs, missing error handling, \
             misleading names, dead branches and small readability improvements. Skip large \
             refactors."
        }
        ReviewType::Architectural => {
            "Focus on architecture: module boundaries, coupling and cohesion, layering \
             violations, dependency direction, API design and how well the structure will \
             scale with new features."
        }
        ReviewType::Security => {
            "Focus on security: injection, authentication and authorization flaws, secrets in \
             code, unsafe deserialization, path traversal, missing input validation and \
             insecure defaults. Rate exploitable issues critical or high."
        }
        ReviewType::Performance => {
            "Focus on performance: algorithmic complexity, unnecessary allocation or copying, \
             blocking calls on hot paths, N+1 queries, missing caching and resource leaks."
        }
        ReviewType::UnusedCode => {
            "Focus on unused code: unreferenced functions, types, exports, imports, variables, \
             feature flags and files that can be removed safely. Name what is unused and why \
             you believe it is unreferenced."
        }
        ReviewType::BestPractices => {
            "Focus on best practices for the languages and frameworks in use: idiomatic \
             patterns, error handling conventions, testing gaps, documentation and \
             consistency across the codebase."
        }
        ReviewType::Evaluation => {
            "Evaluate overall code quality: correctness, readability, maintainability, test \
             coverage and the experience level the code suggests. Support each judgement with \
             concrete examples."
        }
    }
}
