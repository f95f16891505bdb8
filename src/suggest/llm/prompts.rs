//! Prompt text for code review requests

/// System message framing the model as a reviewer of `language`
pub fn review_system(language: &str) -> String {
    format!(
        "You are an expert {} code reviewer and mentor. Provide clear, actionable feedback with code examples.",
        language
    )
}

/// Fence tag for a language name, e.g. "Python" -> "python"
pub fn fence_tag(language: &str) -> String {
    language
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// User message asking for the five-part review as a JSON object.
///
/// The code is embedded verbatim. A blank or missing context adds no
/// `Context:` line.
pub fn review_user(code: &str, context: Option<&str>, language: &str) -> String {
    let context_line = match context.map(str::trim) {
        Some(ctx) if !ctx.is_empty() => format!("Context: {}\n\n", ctx),
        _ => String::new(),
    };

    format!(
        r#"Please analyze this {language} code and provide:

1. **Improved Code**: A cleaner, more efficient version of the code
2. **Time Complexity**: O() notation and explanation
3. **Space Complexity**: O() notation and explanation
4. **What the code is doing**: Clear explanation of the code's purpose and logic
5. **Suggestions**: 2-3 specific improvements for code quality, readability, or performance

Code to analyze:
```{tag}
{code}
```

{context_line}Please format your response as JSON with the following structure:
{{
    "improvedCode": "your improved code here",
    "timeComplexity": "O(n) - explanation",
    "spaceComplexity": "O(1) - explanation",
    "explanation": "what the code does",
    "suggestions": ["suggestion 1", "suggestion 2", "suggestion 3"]
}}
"#,
        language = language,
        tag = fence_tag(language),
        code = code,
        context_line = context_line,
    )
}
