//! Prompts for grounded answer generation.

/// Collection of prompts used by the generator.
pub struct Prompts;

impl Prompts {
    /// System prompt constraining the model to the retrieved context.
    pub fn system_grounded_assistant() -> &'static str {
        r#"You are an AI assistant that answers questions based on the provided context.
Use the retrieved information to provide accurate, relevant, and comprehensive responses.
If the context doesn't contain enough information, acknowledge the limitation."#
    }

    /// User prompt; `{context}` and `{question}` are substituted.
    pub fn rag_answer() -> &'static str {
        r#"Context:
{context}

Question: {question}

Please provide a detailed answer based on the context above."#
    }

    /// Fill [`Prompts::rag_answer`] with numbered context passages.
    pub fn render_rag_answer(question: &str, context: &[String]) -> String {
        let context = if context.is_empty() {
            "(no context retrieved)".to_string()
        } else {
            context
                .iter()
                .enumerate()
                .map(|(i, passage)| format!("[{}] {}", i + 1, passage))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        fill(
            Self::rag_answer(),
            &[("{context}", context.as_str()), ("{question}", question)],
        )
    }
}

/// Substitute placeholders in one pass, so inserted text is never rescanned.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
