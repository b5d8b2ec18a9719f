//! Agent personas and instruction templating.
//!
//! Each chat type talks to its own persona. The instruction is a template:
//! `{key}` is replaced with the session state value for `key`, and `{key?}`
//! renders empty when the key is absent. A required key that is missing is
//! left in place verbatim.

use forkline_types::agent::SessionState;
use forkline_types::chat::ChatType;
use tracing::warn;

const PRIMARY_INSTRUCTION: &str = "\
You are a helpful conversational assistant.
You respond with clear, concise, and logically structured answers.
Avoid unnecessary verbosity.";

const SECONDARY_INSTRUCTION: &str = "\
You are a clarification assistant.
The user is asking follow-up questions about a previous answer.
Your job is to simplify, expand, and explain concepts step-by-step.
Use examples and analogies when helpful.
Never refer to the original conversation unless explicitly provided.

<previous_answer>
{secondary:parent_answer?}
</previous_answer>";

/// A named agent identity with its instruction template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub name: &'static str,
    pub instruction: &'static str,
}

pub const PRIMARY_PERSONA: Persona = Persona {
    name: "primary_agent",
    instruction: PRIMARY_INSTRUCTION,
};

pub const SECONDARY_PERSONA: Persona = Persona {
    name: "secondary_agent",
    instruction: SECONDARY_INSTRUCTION,
};

impl Persona {
    /// The persona serving a given chat type.
    pub fn for_chat_type(chat_type: ChatType) -> Persona {
        match chat_type {
            ChatType::Primary => PRIMARY_PERSONA,
            ChatType::Secondary => SECONDARY_PERSONA,
        }
    }

    /// Render the instruction template against session state.
    pub fn render(&self, state: &SessionState) -> String {
        render_template(self.instruction, state)
    }
}

fn render_template(template: &str, state: &SessionState) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let raw = &after[..end];
        let (key, optional) = match raw.strip_suffix('?') {
            Some(key) => (key, true),
            None => (raw, false),
        };

        if !is_placeholder_key(key) {
            // Not a placeholder; emit the brace literally and keep scanning.
            out.push('{');
            rest = after;
            continue;
        }

        match state.get(key) {
            Some(serde_json::Value::String(s)) => out.push_str(s),
            Some(other) => out.push_str(&other.to_string()),
            None if optional => {}
            None => {
                warn!(key, "Instruction template references missing state key");
                out.push('{');
                out.push_str(raw);
                out.push('}');
            }
        }

        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn is_placeholder_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-'))
}
