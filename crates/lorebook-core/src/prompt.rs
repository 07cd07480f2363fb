//! Prompt assembly: the fixed novelist instructions wrapped around the
//! assembled context, plus the message list handed to a language model.

use serde::{Deserialize, Serialize};

use crate::store::NO_SELECTION;

const PERSONA: &str = "You are a bestselling Chinese novelist with deep expertise in reader psychology and market trends. Your works consistently top charts by masterfully blending pacing control, emotional hooks, relatable character archetypes, and culturally resonant storytelling—all strictly aligned with Chinese regulations and positive mainstream values.";

const CONTEXT_HEADING: &str = "\u{1F4CC} CURRENT NOVEL CONTEXT";

const RULES_HEADING: &str = "\u{2705} EXECUTION RULES:";

const RULES: [&str; 4] = [
    "1. For novel-related queries ONLY when context exists: Anchor every response directly to context fields. Never add, interpret, or evaluate beyond the text. If context lacks information: reply exactly 'Not mentioned in context'.",
    "2. When analyzing, implicitly reflect mainstream reader preferences (e.g., 'Does the opening create immediate intrigue?', 'Is the protagonist emotionally resonant?', 'Does the conflict generate tension?') using objective, professional phrasing—avoid 'I think', 'I suggest', or subjective language.",
    "3. Output format: Pure plaintext only. No markdown, bullets, emojis, or section headers. Use line breaks between paragraphs. Language should be crisp yet warm. Answer ONLY the query—no extra commentary, praise, or unsolicited advice.",
    "4. Content safety: Zero tolerance for sensitive topics. Uphold positivity, cultural respect, and social responsibility in every word.",
];

/// The system instruction text with `context` embedded under its heading.
/// Blank context is replaced by the no-selection marker.
pub fn system_prompt(context: &str) -> String {
    let context = if context.trim().is_empty() {
        NO_SELECTION
    } else {
        context
    };
    format!(
        "{PERSONA}\n\n{CONTEXT_HEADING}\n{context}\n\n{RULES_HEADING}\n{}",
        RULES.join("\n")
    )
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Tool,
}

impl Role {
    fn tag(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::User => "USER",
            Self::Tool => "TOOL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    pub role: Role,
    pub text: String,
    /// Tool name, for tool results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The ordered messages sent to a language model for one question.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptRequest {
    pub messages: Vec<PromptMessage>,
}

impl PromptRequest {
    /// `[system(context), user(question)]`.
    pub fn build(context: &str, question: &str) -> Self {
        Self {
            messages: vec![
                PromptMessage {
                    role: Role::System,
                    text: system_prompt(context),
                    name: None,
                },
                PromptMessage {
                    role: Role::User,
                    text: question.to_string(),
                    name: None,
                },
            ],
        }
    }

    /// Append the output of a tool call the model asked for.
    pub fn with_tool_result(mut self, name: &str, text: &str) -> Self {
        self.messages.push(PromptMessage {
            role: Role::Tool,
            text: text.to_string(),
            name: Some(name.to_string()),
        });
        self
    }

    /// Flatten into one role-tagged text for models that take a single prompt.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| match &m.name {
                Some(name) => format!("[{} {name}]\n{}", m.role.tag(), m.text),
                None => format!("[{}]\n{}", m.role.tag(), m.text),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
