//! AgentBridge trait and the shared model invocation path.
//!
//! A bridge turns one user turn into one reply. The stateful bridge keeps the
//! conversation in an agent session; the stateless bridge rebuilds it from the
//! chat transcript on every call. The message pipeline only sees this trait.

use futures_util::StreamExt;
use tracing::{Instrument, debug, field, info_span};

use forkline_observe::genai_attrs::{
    GEN_AI_REQUEST_MAX_TOKENS, GEN_AI_REQUEST_TEMPERATURE, GEN_AI_RESPONSE_FINISH_REASONS,
    GEN_AI_USAGE_INPUT_TOKENS, GEN_AI_USAGE_OUTPUT_TOKENS, OP_INVOKE_AGENT,
};

use forkline_types::agent::SessionState;
use forkline_types::chat::{ChatMessage, ChatType};
use forkline_types::config::AgentConfig;
use forkline_types::error::AgentError;
use forkline_types::llm::{CompletionRequest, Message, StreamEvent};

use crate::llm::factory::ProviderFactory;

use super::credential::Credential;

/// One user turn handed to a bridge.
#[derive(Debug, Clone, Copy)]
pub struct AgentTurn<'a> {
    /// Agent session bound to the chat.
    pub session_id: &'a str,
    pub user_id: &'a str,
    /// The new user text, verbatim.
    pub text: &'a str,
    /// Full ordered chat history, including the new user message.
    pub history: &'a [ChatMessage],
}

/// Contract between the message pipeline and the agent runtime.
///
/// Uses native async fn in traits (RPITIT). See `BoxAgentBridge` for the
/// dynamically dispatched form.
pub trait AgentBridge: Send + Sync {
    /// Allocate a runtime session seeded with `initial_state`.
    ///
    /// Never calls the model.
    fn create_session(
        &self,
        chat_type: ChatType,
        user_id: &str,
        initial_state: SessionState,
        credential: &Credential,
    ) -> impl std::future::Future<Output = Result<String, AgentError>> + Send;

    /// Produce the agent's reply to `turn`, already post-processed.
    fn reply(
        &self,
        chat_type: ChatType,
        turn: &AgentTurn<'_>,
        credential: &Credential,
    ) -> impl std::future::Future<Output = Result<String, AgentError>> + Send;
}

pub(crate) fn require_credential(credential: &Credential) -> Result<(), AgentError> {
    if credential.is_blank() {
        return Err(AgentError::Validation(
            "a model-provider credential is required".to_string(),
        ));
    }
    Ok(())
}

/// Issue one streamed completion with a provider bound to `credential`.
///
/// The provider lives only for this call. Text deltas are concatenated; the
/// stream must end with `Done`, otherwise the call is a failure. An empty
/// reply is returned as `""`.
pub(crate) async fn invoke_model<F: ProviderFactory>(
    factory: &F,
    config: &AgentConfig,
    chat_type: ChatType,
    agent_name: &str,
    system: String,
    messages: Vec<Message>,
    credential: &Credential,
) -> Result<String, AgentError> {
    // Field names mirror forkline_observe::genai_attrs.
    let span = info_span!(
        "invoke_agent",
        gen_ai.operation.name = OP_INVOKE_AGENT,
        gen_ai.provider.name = factory.provider_name(),
        gen_ai.request.model = factory.model(),
        gen_ai.agent.name = agent_name,
        chat_type = %chat_type,
        gen_ai.request.max_tokens = field::Empty,
        gen_ai.request.temperature = field::Empty,
        gen_ai.usage.input_tokens = field::Empty,
        gen_ai.usage.output_tokens = field::Empty,
        gen_ai.response.finish_reasons = field::Empty,
    );

    async move {
        let provider = factory.build(credential)?;
        let max_tokens = config
            .max_tokens
            .min(provider.capabilities().max_output_tokens);

        let current = tracing::Span::current();
        current.record(GEN_AI_REQUEST_MAX_TOKENS, max_tokens);
        current.record(GEN_AI_REQUEST_TEMPERATURE, config.temperature);

        let request = CompletionRequest {
            model: factory.model().to_string(),
            messages,
            system: Some(system),
            max_tokens,
            temperature: Some(config.temperature),
            stream: true,
        };

        let mut stream = provider.stream(request);
        let mut text = String::new();
        let mut finished = false;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Connected => {}
                StreamEvent::TextDelta { text: delta } => text.push_str(&delta),
                StreamEvent::MessageDelta { stop_reason } => {
                    let reason = stop_reason.to_string();
                    current.record(GEN_AI_RESPONSE_FINISH_REASONS, reason.as_str());
                }
                StreamEvent::Usage(usage) => {
                    current.record(GEN_AI_USAGE_INPUT_TOKENS, usage.input_tokens);
                    current.record(GEN_AI_USAGE_OUTPUT_TOKENS, usage.output_tokens);
                }
                StreamEvent::Done => {
                    finished = true;
                    break;
                }
            }
        }

        if !finished {
            return Err(AgentError::NoFinalResponse);
        }

        debug!(reply_len = text.len(), "Agent call completed");
        Ok(text)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::{Arc, Mutex};

    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id, Record};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use forkline_observe::genai_attrs::{GEN_AI_OPERATION_NAME, GEN_AI_PROVIDER_NAME};

    use crate::testing::{Script, ScriptedFactory};

    /// Collects every field value set on spans, by field name.
    #[derive(Clone, Default)]
    struct SpanFields(Arc<Mutex<HashMap<String, String>>>);

    impl SpanFields {
        fn get(&self, name: &str) -> Option<String> {
            self.0.lock().unwrap().get(name).cloned()
        }
    }

    struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

    impl Visit for FieldVisitor<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    impl<S: Subscriber> Layer<S> for SpanFields {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            attrs.record(&mut FieldVisitor(&mut self.0.lock().unwrap()));
        }

        fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
            values.record(&mut FieldVisitor(&mut self.0.lock().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_invoke_model_records_genai_fields() {
        let fields = SpanFields::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(fields.clone()));

        let factory = ScriptedFactory::new(Script::Reply("hi".into()));
        let text = invoke_model(
            &factory,
            &AgentConfig::default(),
            ChatType::Primary,
            "primary_agent",
            "system".to_string(),
            vec![Message::new(forkline_types::llm::MessageRole::User, "hello")],
            &Credential::new("key"),
        )
        .await
        .unwrap();
        assert_eq!(text, "hi");

        assert_eq!(fields.get(GEN_AI_OPERATION_NAME).as_deref(), Some(OP_INVOKE_AGENT));
        assert_eq!(fields.get(GEN_AI_PROVIDER_NAME).as_deref(), Some("scripted"));
        assert!(fields.get("gen_ai.system").is_none());
        // Capped by the provider's max output tokens.
        assert_eq!(fields.get(GEN_AI_REQUEST_MAX_TOKENS).as_deref(), Some("1024"));
        assert_eq!(fields.get(GEN_AI_USAGE_INPUT_TOKENS).as_deref(), Some("12"));
        assert_eq!(fields.get(GEN_AI_USAGE_OUTPUT_TOKENS).as_deref(), Some("2"));
        assert_eq!(
            fields.get(GEN_AI_RESPONSE_FINISH_REASONS).as_deref(),
            Some("end_turn")
        );
    }
}
