use crate::config::prompt::{ PromptBuilder, PromptConfig };
use crate::error::{ ChatError, Result };
use crate::history::ConversationStore;
use crate::llm::chat::ChatClient;
use crate::llm::completion::CompletionClient;
use crate::models::chat::ChatMessage;
use crate::run_trace::{ RunOutcome, RunTracer };
use log::{ debug, info, warn };
use std::sync::Arc;

/// Where a session is within a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    UserRecorded,
    Pending,
    Resolved,
}

/// Drives the turns of one session: records the user message, builds
/// the prompt, calls the backend, and records the reply or an apology.
/// This is the only code that mutates the conversation.
pub struct ChatAgent {
    session_id: String,
    store: ConversationStore,
    prompt_config: Arc<PromptConfig>,
    prompt_builder: PromptBuilder,
    completion: CompletionClient,
    tracer: RunTracer,
    state: TurnState,
    pending_question: Option<String>,
}

impl ChatAgent {
    pub fn new(
        session_id: impl Into<String>,
        completion: CompletionClient,
        prompt_config: Arc<PromptConfig>,
        tracer: RunTracer
    ) -> Self {
        Self {
            session_id: session_id.into(),
            store: ConversationStore::new(prompt_config.greeting.clone()),
            prompt_builder: PromptBuilder::new(Arc::clone(&prompt_config)),
            prompt_config,
            completion,
            tracer,
            state: TurnState::Idle,
            pending_question: None,
        }
    }

    /// Verifies the backend first; no conversation exists unless that
    /// succeeds.
    pub async fn connect(
        session_id: impl Into<String>,
        backend: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>,
        tracer: RunTracer
    ) -> Result<Self> {
        let completion = CompletionClient::connect(backend).await?;
        Ok(Self::new(session_id, completion, prompt_config, tracer))
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn model(&self) -> String {
        self.completion.model()
    }

    pub fn conversation(&self) -> &[ChatMessage] {
        self.store.all()
    }

    fn transition(&mut self, next: TurnState) {
        debug!("Session {}: {:?} -> {:?}", self.session_id, self.state, next);
        self.state = next;
    }

    /// Records the user message and leaves the turn pending. Any string
    /// is accepted, including an empty one.
    pub fn begin_turn(&mut self, text: &str) -> Result<ChatMessage> {
        if self.state != TurnState::Idle {
            return Err(ChatError::Busy);
        }
        let message = ChatMessage::user(text);
        self.store.append(message.clone());
        self.transition(TurnState::UserRecorded);

        self.pending_question = Some(text.to_string());
        self.transition(TurnState::Pending);
        Ok(message)
    }

    /// Calls the backend for the pending question and records the
    /// outcome. Backend failures become an assistant apology; the
    /// session then returns to `Idle`.
    pub async fn resolve_turn(&mut self) -> Result<ChatMessage> {
        if self.state != TurnState::Pending {
            return Err(ChatError::NoPendingTurn);
        }
        let question = self.pending_question.take().ok_or(ChatError::NoPendingTurn)?;

        let prompt = self.prompt_builder.build(&question);
        let span = self.tracer.start();
        let result = self.completion.complete(&prompt).await;

        let (reply, outcome) = match result {
            Ok(text) => (ChatMessage::assistant(text), RunOutcome::Ok),
            Err(reason) => {
                warn!("Session {}: turn failed: {}", self.session_id, reason);
                (ChatMessage::assistant(self.prompt_config.error_message(&reason)), RunOutcome::Error)
            }
        };
        self.tracer.finish(span, &self.session_id, &self.completion.model(), outcome);

        self.transition(TurnState::Resolved);
        self.store.append(reply.clone());
        self.transition(TurnState::Idle);
        info!(
            "Session {}: turn resolved ({:?}), {} messages",
            self.session_id,
            outcome,
            self.store.len()
        );
        Ok(reply)
    }

    /// Runs a whole turn and returns the assistant message it appended.
    pub async fn submit(&mut self, text: &str) -> Result<ChatMessage> {
        self.begin_turn(text)?;
        self.resolve_turn().await
    }
}
