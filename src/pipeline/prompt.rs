//! Prompts using Handlebars for templating. Strict mode makes a
//! missing variable an error instead of an empty string, and output
//! is not HTML escaped since it is sent to an LLM, not a browser.

use std::fmt;

use handlebars::{Handlebars, handlebars_helper};

// `@index` starts at 0, contexts are numbered from 1
handlebars_helper!(inc: |v: i64| format!("{}", v + 1));

#[derive(Debug)]
pub enum Prompt {
    Answer,
    ContextRelevance,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const ANSWER_PROMPT: &str = r"
You are an expert assistant for cloud security alerts. Answer the QUESTION using only the CONTEXT. If the CONTEXT does not contain the answer, say that you don't know.
{{#if history}}

CHAT HISTORY:
{{#each history}}
{{role}}: {{text}}
{{/each}}
{{/if}}

CONTEXT:
{{#each contexts}}
[{{inc @index}}] {{this}}
{{else}}
No relevant context was found.
{{/each}}

QUESTION:
{{question}}
";

const CONTEXT_RELEVANCE_PROMPT: &str = r"
Rate how relevant the CONTEXT is for answering the QUESTION on a scale from 0 (not relevant) to 10 (highly relevant). Respond with only the number.

QUESTION:
{{question}}

CONTEXT:
{{context}}
";

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_helper("inc", Box::new(inc));
    registry
        .register_template_string(&Prompt::Answer.to_string(), ANSWER_PROMPT)
        .expect("Failed to register template");
    registry
        .register_template_string(
            &Prompt::ContextRelevance.to_string(),
            CONTEXT_RELEVANCE_PROMPT,
        )
        .expect("Failed to register template");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answer_prompt_numbers_contexts() {
        let actual = templates()
            .render(
                &Prompt::Answer.to_string(),
                &json!({
                    "question": "What's a brute-force attack?",
                    "contexts": ["first chunk", "second chunk"],
                    "history": [],
                }),
            )
            .unwrap();
        assert!(actual.contains("[1] first chunk"));
        assert!(actual.contains("[2] second chunk"));
        assert!(actual.contains("QUESTION:\nWhat's a brute-force attack?"));
        assert!(!actual.contains("CHAT HISTORY"));
    }

    #[test]
    fn test_answer_prompt_with_history_and_no_context() {
        let actual = templates()
            .render(
                &Prompt::Answer.to_string(),
                &json!({
                    "question": "And how do I stop it?",
                    "contexts": [],
                    "history": [{"role": "user", "text": "What is <b>MFA</b>?"}],
                }),
            )
            .unwrap();
        assert!(actual.contains("CHAT HISTORY:"));
        assert!(actual.contains("user: What is <b>MFA</b>?"));
        assert!(actual.contains("No relevant context was found."));
    }

    #[test]
    fn test_strict_mode_rejects_missing_variables() {
        let result = templates().render(
            &Prompt::ContextRelevance.to_string(),
            &json!({"question": "q"}),
        );
        assert!(result.is_err());
    }
}
