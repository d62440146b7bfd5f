use super::reorder::ReorderBuffer;
use super::types::{
    Author, Feedback, Message, MessageId, MessageKind, TranscriptSnapshot, Turn, TurnOutcome,
    TurnState,
};
use crate::backend::{BackendError, DataSourceScope, Reply, SupportBackend};
use crate::error::{DeskError, Result};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

pub const GREETING: &str = "Hello! I'm your AI support assistant. I'm here to help you with any \
questions based on your uploaded documents and conversation history. How can I assist you today?";
const GREETING_SOURCE: &str = "Knowledge Base";
const ERROR_BODY: &str = "Sorry, I couldn't get an answer right now. Please try again.";

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub reply_timeout: Duration,
    /// Seed the transcript with the assistant greeting.
    pub greeting: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(30),
            greeting: true,
        }
    }
}

struct PendingReply {
    user_message: MessageId,
    result: std::result::Result<Reply, BackendError>,
    notify: oneshot::Sender<TurnOutcome>,
}

#[derive(Default)]
struct ChatState {
    messages: Vec<Message>,
    turns: Vec<Turn>,
    next_id: u64,
    replies: ReorderBuffer<PendingReply>,
}

impl ChatState {
    fn push(
        &mut self,
        author: Author,
        body: String,
        sources: Vec<String>,
        kind: MessageKind,
    ) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            author,
            body,
            created_at: Utc::now(),
            feedback: None,
            sources,
            kind,
        });
        id
    }

    fn seed_greeting(&mut self) {
        self.push(
            Author::Assistant,
            GREETING.to_string(),
            vec![GREETING_SOURCE.to_string()],
            MessageKind::Text,
        );
    }

    fn set_turn(&mut self, user_message: MessageId, state: TurnState) {
        if let Some(turn) = self.turns.iter_mut().find(|t| t.user_message == user_message) {
            turn.state = state;
        }
    }

    fn commit(
        &mut self,
        user_message: MessageId,
        result: std::result::Result<Reply, BackendError>,
    ) -> TurnOutcome {
        match result {
            Ok(Reply { answer, sources }) => {
                let id = self.push(Author::Assistant, answer, sources, MessageKind::Text);
                self.set_turn(user_message, TurnState::Replied);
                info!(%user_message, reply = %id, "Reply appended");
                TurnOutcome::Replied(id)
            }
            Err(e) => {
                warn!(%user_message, error = %e, "Reply generation failed");
                let id = self.push(
                    Author::Assistant,
                    ERROR_BODY.to_string(),
                    Vec::new(),
                    MessageKind::Error {
                        reason: e.to_string(),
                    },
                );
                self.set_turn(user_message, TurnState::Errored);
                TurnOutcome::Errored(id)
            }
        }
    }
}

struct Shared {
    state: Mutex<ChatState>,
    updates: watch::Sender<TranscriptSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: &ChatState) {
        self.updates.send_replace(TranscriptSnapshot {
            messages: state.messages.clone(),
            turns: state.turns.clone(),
            typing: state.replies.outstanding() > 0,
        });
    }

    fn mark_awaiting(&self, user_message: MessageId) {
        let mut state = self.lock();
        state.set_turn(user_message, TurnState::AwaitingReply);
        self.publish(&state);
    }

    /// Hand a finished reply to the reorder buffer and append whatever it releases.
    ///
    /// Handles are notified only after the new snapshot is published.
    fn complete(&self, seq: u64, pending: PendingReply) {
        let mut notifications = Vec::new();
        {
            let mut state = self.lock();
            let released = state.replies.complete(seq, pending);
            if released.is_empty() {
                debug!(seq, "Reply held until earlier turns land");
                return;
            }

            for reply in released {
                let outcome = state.commit(reply.user_message, reply.result);
                notifications.push((reply.notify, outcome));
            }
            self.publish(&state);
        }

        for (notify, outcome) in notifications {
            let _ = notify.send(outcome);
        }
    }
}

/// Resolves once the reply for a posted message has been appended.
#[derive(Debug)]
pub struct TurnHandle {
    user_message: MessageId,
    outcome: oneshot::Receiver<TurnOutcome>,
}

impl TurnHandle {
    pub fn user_message(&self) -> MessageId {
        self.user_message
    }

    pub async fn outcome(self) -> TurnOutcome {
        self.outcome.await.unwrap_or(TurnOutcome::Discarded)
    }
}

/// Owns the chat transcript. Replies are appended in the order their
/// requests were issued regardless of which backend call finishes first.
pub struct ConversationController<B> {
    shared: Arc<Shared>,
    backend: Arc<B>,
    options: ChatOptions,
}

impl<B: SupportBackend> ConversationController<B> {
    pub fn new(backend: Arc<B>, options: ChatOptions) -> Self {
        let mut state = ChatState::default();
        if options.greeting {
            state.seed_greeting();
        }
        let (updates, _) = watch::channel(TranscriptSnapshot::default());
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            updates,
        });
        shared.publish(&shared.lock());

        Self {
            shared,
            backend,
            options,
        }
    }

    /// Append the user's message and request a reply.
    ///
    /// Must be called from within a tokio runtime.
    pub fn post_user_message(&self, text: &str, scope: DataSourceScope) -> Result<TurnHandle> {
        if text.trim().is_empty() {
            return Err(DeskError::InvalidInput("message text is empty".to_string()));
        }

        let (user_message, seq) = {
            let mut state = self.shared.lock();
            let id = state.push(Author::User, text.to_string(), Vec::new(), MessageKind::Text);
            state.turns.push(Turn {
                user_message: id,
                state: TurnState::Sent,
            });
            let seq = state.replies.issue();
            self.shared.publish(&state);
            (id, seq)
        };
        info!(%user_message, seq, scope = scope.as_str(), "User message posted");

        let (notify, outcome) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let backend = Arc::clone(&self.backend);
        let question = text.to_string();
        let reply_timeout = self.options.reply_timeout;

        tokio::spawn(async move {
            shared.mark_awaiting(user_message);

            let call = AssertUnwindSafe(backend.generate_reply(&question, scope)).catch_unwind();
            let result = match tokio::time::timeout(reply_timeout, call).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(BackendError::Rejected("reply generation panicked".to_string())),
                Err(_) => Err(BackendError::Timeout(reply_timeout)),
            };

            shared.complete(
                seq,
                PendingReply {
                    user_message,
                    result,
                    notify,
                },
            );
        });

        Ok(TurnHandle {
            user_message,
            outcome,
        })
    }

    /// Overwrite (or clear) the feedback on an assistant message.
    pub fn set_feedback(&self, message_id: MessageId, feedback: Option<Feedback>) -> Result<()> {
        let mut state = self.shared.lock();
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id && m.author == Author::Assistant)
            .ok_or_else(|| DeskError::NotFound(format!("assistant message {}", message_id)))?;

        message.feedback = feedback;
        debug!(%message_id, ?feedback, "Feedback recorded");
        self.shared.publish(&state);
        Ok(())
    }

    pub fn is_typing(&self) -> bool {
        self.shared.lock().replies.outstanding() > 0
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.shared.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TranscriptSnapshot> {
        self.shared.updates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileDescriptor, LogAnalysis, UploadAck};
    use async_trait::async_trait;
    use std::collections::HashMap;

    type Gate = oneshot::Receiver<std::result::Result<Reply, BackendError>>;

    /// Backend whose replies are released by the test, keyed by question.
    #[derive(Default)]
    struct GatedChat {
        gates: Mutex<HashMap<String, Gate>>,
    }

    impl GatedChat {
        fn gate(
            &self,
            question: &str,
        ) -> oneshot::Sender<std::result::Result<Reply, BackendError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(question.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl SupportBackend for GatedChat {
        async fn generate_reply(
            &self,
            question: &str,
            _scope: DataSourceScope,
        ) -> std::result::Result<Reply, BackendError> {
            let gate = self.gates.lock().unwrap().remove(question);
            match gate {
                Some(gate) => gate
                    .await
                    .unwrap_or_else(|_| Err(BackendError::Rejected("gate dropped".into()))),
                None => std::future::pending().await,
            }
        }

        async fn upload_document(
            &self,
            _: &FileDescriptor,
        ) -> std::result::Result<UploadAck, BackendError> {
            unreachable!()
        }

        async fn analyze_log(
            &self,
            _: &FileDescriptor,
        ) -> std::result::Result<LogAnalysis, BackendError> {
            unreachable!()
        }
    }

    struct FailingChat;

    #[async_trait]
    impl SupportBackend for FailingChat {
        async fn generate_reply(
            &self,
            _: &str,
            _: DataSourceScope,
        ) -> std::result::Result<Reply, BackendError> {
            Err(BackendError::Api {
                status: 502,
                message: "bad gateway".into(),
            })
        }

        async fn upload_document(
            &self,
            _: &FileDescriptor,
        ) -> std::result::Result<UploadAck, BackendError> {
            unreachable!()
        }

        async fn analyze_log(
            &self,
            _: &FileDescriptor,
        ) -> std::result::Result<LogAnalysis, BackendError> {
            unreachable!()
        }
    }

    /// Answers every question immediately.
    struct EchoChat;

    #[async_trait]
    impl SupportBackend for EchoChat {
        async fn generate_reply(
            &self,
            question: &str,
            _: DataSourceScope,
        ) -> std::result::Result<Reply, BackendError> {
            Ok(Reply {
                answer: format!("re: {}", question),
                sources: Vec::new(),
            })
        }

        async fn upload_document(
            &self,
            _: &FileDescriptor,
        ) -> std::result::Result<UploadAck, BackendError> {
            unreachable!()
        }

        async fn analyze_log(
            &self,
            _: &FileDescriptor,
        ) -> std::result::Result<LogAnalysis, BackendError> {
            unreachable!()
        }
    }

    fn reply(answer: &str, sources: &[&str]) -> std::result::Result<Reply, BackendError> {
        Ok(Reply {
            answer: answer.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn quiet() -> ChatOptions {
        ChatOptions {
            greeting: false,
            ..ChatOptions::default()
        }
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let chat = ConversationController::new(Arc::new(FailingChat), quiet());

        for text in ["", "   ", "\n\t"] {
            let err = chat.post_user_message(text, DataSourceScope::Both).unwrap_err();
            assert!(matches!(err, DeskError::InvalidInput(_)));
        }
        assert!(chat.snapshot().messages.is_empty());
        assert!(!chat.is_typing());
    }

    #[tokio::test]
    async fn test_failed_reply_becomes_error_placeholder() {
        let chat = ConversationController::new(Arc::new(FailingChat), quiet());

        let handle = chat.post_user_message("hello", DataSourceScope::Both).unwrap();
        let user_message = handle.user_message();
        let outcome = handle.outcome().await;

        let snapshot = chat.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].author, Author::User);
        assert_eq!(snapshot.messages[0].body, "hello");

        let placeholder = &snapshot.messages[1];
        assert_eq!(outcome, TurnOutcome::Errored(placeholder.id));
        assert_eq!(placeholder.author, Author::Assistant);
        assert!(placeholder.is_error());
        assert_eq!(
            placeholder.kind,
            MessageKind::Error {
                reason: "API error: 502 - bad gateway".into()
            }
        );
        assert_eq!(snapshot.turn_state(user_message), Some(TurnState::Errored));
        assert!(!snapshot.typing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_follow_issue_order() {
        let backend = Arc::new(GatedChat::default());
        let release_a = backend.gate("A?");
        let release_b = backend.gate("B?");
        let chat = ConversationController::new(Arc::clone(&backend), quiet());

        let a = chat.post_user_message("A?", DataSourceScope::Documents).unwrap();
        let b = chat.post_user_message("B?", DataSourceScope::Documents).unwrap();

        release_b.send(reply("answer B", &["b.pdf"])).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // B finished first but must wait behind A
        let held = chat.snapshot();
        assert_eq!(held.messages.len(), 2);
        assert!(held.typing);
        assert_eq!(held.turn_state(b.user_message()), Some(TurnState::AwaitingReply));

        release_a.send(reply("answer A", &["a.pdf"])).unwrap();
        let outcome_a = a.outcome().await;
        let outcome_b = b.outcome().await;

        let snapshot = chat.snapshot();
        let bodies: Vec<_> = snapshot.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["A?", "B?", "answer A", "answer B"]);
        assert_eq!(outcome_a, TurnOutcome::Replied(snapshot.messages[2].id));
        assert_eq!(outcome_b, TurnOutcome::Replied(snapshot.messages[3].id));
        assert_eq!(snapshot.messages[3].sources, vec!["b.pdf"]);
        assert!(!snapshot.typing);
        assert!(!chat.is_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out_to_placeholder() {
        let backend = Arc::new(GatedChat::default());
        let chat = ConversationController::new(
            backend,
            ChatOptions {
                reply_timeout: Duration::from_secs(2),
                greeting: false,
            },
        );

        let handle = chat.post_user_message("anyone there?", DataSourceScope::Both).unwrap();
        assert!(chat.is_typing());

        let outcome = handle.outcome().await;
        let snapshot = chat.snapshot();
        assert!(matches!(outcome, TurnOutcome::Errored(_)));
        assert_eq!(
            snapshot.messages[1].kind,
            MessageKind::Error {
                reason: format!("Timed out after {:?}", Duration::from_secs(2))
            }
        );
    }

    #[tokio::test]
    async fn test_feedback_overwrites() {
        let backend = Arc::new(GatedChat::default());
        let release = backend.gate("hours?");
        let chat = ConversationController::new(Arc::clone(&backend), quiet());

        let handle = chat.post_user_message("hours?", DataSourceScope::Both).unwrap();
        release.send(reply("9 to 5", &[])).unwrap();
        let TurnOutcome::Replied(reply_id) = handle.outcome().await else {
            panic!("expected a reply");
        };

        chat.set_feedback(reply_id, Some(Feedback::Positive)).unwrap();
        chat.set_feedback(reply_id, Some(Feedback::Negative)).unwrap();
        assert_eq!(
            chat.snapshot().get(reply_id).unwrap().feedback,
            Some(Feedback::Negative)
        );

        chat.set_feedback(reply_id, None).unwrap();
        assert_eq!(chat.snapshot().get(reply_id).unwrap().feedback, None);
    }

    #[tokio::test]
    async fn test_feedback_on_user_or_unknown_message_not_found() {
        let chat = ConversationController::new(Arc::new(FailingChat), quiet());
        let handle = chat.post_user_message("hello", DataSourceScope::Both).unwrap();
        let user_message = handle.user_message();
        handle.outcome().await;

        let before = chat.snapshot();
        let err = chat
            .set_feedback(user_message, Some(Feedback::Positive))
            .unwrap_err();
        assert!(matches!(err, DeskError::NotFound(_)));
        let err = chat
            .set_feedback(MessageId(999), Some(Feedback::Positive))
            .unwrap_err();
        assert!(matches!(err, DeskError::NotFound(_)));
        assert_eq!(chat.snapshot(), before);
    }

    #[tokio::test]
    async fn test_greeting_seeded_first() {
        let chat = ConversationController::new(Arc::new(FailingChat), ChatOptions::default());

        let snapshot = chat.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].body, GREETING);
        assert_eq!(snapshot.messages[0].author, Author::Assistant);
        assert_eq!(snapshot.messages[0].sources, vec!["Knowledge Base"]);
        assert!(snapshot.turns.is_empty());

        chat.post_user_message("hello", DataSourceScope::Both)
            .unwrap()
            .outcome()
            .await;
        let after = chat.snapshot();
        assert_eq!(after.messages.len(), 3);
        assert_eq!(after.messages[0], snapshot.messages[0]);
        assert!(after.messages[1].id > after.messages[0].id);
    }

    #[test]
    fn test_outcome_discarded_when_runtime_shuts_down() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let chat = ConversationController::new(Arc::new(GatedChat::default()), quiet());

        let handle = runtime
            .block_on(async { chat.post_user_message("still there?", DataSourceScope::Both) })
            .unwrap();
        drop(runtime);

        let outcome = futures::executor::block_on(handle.outcome());
        assert_eq!(outcome, TurnOutcome::Discarded);
        assert_eq!(chat.snapshot().messages.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reply_visible_once_outcome_resolves() {
        let chat = ConversationController::new(Arc::new(EchoChat), quiet());

        for i in 0..500 {
            let handle = chat
                .post_user_message(&format!("question {}", i), DataSourceScope::Both)
                .unwrap();
            let user_message = handle.user_message();
            let TurnOutcome::Replied(reply_id) = handle.outcome().await else {
                panic!("expected a reply");
            };

            let snapshot = chat.snapshot();
            assert_eq!(
                snapshot.get(reply_id).map(|m| m.body.as_str()),
                Some(format!("re: question {}", i).as_str())
            );
            assert_eq!(snapshot.turn_state(user_message), Some(TurnState::Replied));
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_user_message_before_reply() {
        let backend = Arc::new(GatedChat::default());
        let release = backend.gate("ping");
        let chat = ConversationController::new(Arc::clone(&backend), quiet());
        let mut rx = chat.subscribe();

        let handle = chat.post_user_message("ping", DataSourceScope::Both).unwrap();
        {
            let seen = rx.borrow_and_update();
            assert_eq!(seen.messages.len(), 1);
            assert!(seen.typing);
        }

        release.send(reply("pong", &[])).unwrap();
        handle.outcome().await;
        let seen = rx.wait_for(|s| s.messages.len() == 2).await.unwrap().clone();
        assert_eq!(seen.messages[1].body, "pong");
        assert!(!seen.typing);
    }
}
