//! Response delivery: owns the conversation, talks to the chat service and feeds
//! the reveal animator.
//!
//! Background work (the HTTP call and the reveal timers) runs on spawned tasks that
//! only report back through [`CoordinatorEvent`]s. The owner of the coordinator
//! drains them with [`Coordinator::next_event`] and applies them with
//! [`Coordinator::handle_event`], so state is only ever touched from one place.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ai::{ChatRequest, ChatService, DeliveryError};
use crate::captions::CaptionPicker;
use crate::reveal::{animate, RevealPacing, RevealSession};
use crate::state::{ConversationState, Mode, Sender};

pub const DELIVERY_FAILURE_TEXT: &str = "Error: Could not get a response.";

#[derive(Debug)]
pub enum CoordinatorEvent {
    Delivered {
        turn: u64,
        result: Result<String, DeliveryError>,
    },
    RevealTick {
        turn: u64,
        partial: String,
    },
    RevealDone {
        turn: u64,
        text: String,
    },
}

impl CoordinatorEvent {
    fn turn(&self) -> u64 {
        match self {
            CoordinatorEvent::Delivered { turn, .. }
            | CoordinatorEvent::RevealTick { turn, .. }
            | CoordinatorEvent::RevealDone { turn, .. } => *turn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// Blank input, nothing changed
    Empty,
    /// A response is still pending or being revealed, nothing changed
    Busy,
}

pub struct Coordinator {
    state: ConversationState,
    service: Arc<dyn ChatService>,
    model: Option<String>,
    pacing: RevealPacing,
    captions: CaptionPicker,
    caption: Option<String>,
    rng: StdRng,
    turn: u64,
    task: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<CoordinatorEvent>,
    events_rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
}

impl Coordinator {
    pub fn new(service: Arc<dyn ChatService>, pacing: RevealPacing, captions: CaptionPicker) -> Self {
        Self::with_rng(service, pacing, captions, StdRng::from_entropy())
    }

    pub fn with_rng(
        service: Arc<dyn ChatService>,
        pacing: RevealPacing,
        captions: CaptionPicker,
        rng: StdRng,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: ConversationState::new(),
            service,
            model: None,
            pacing,
            captions,
            caption: None,
            rng,
            turn: 0,
            task: None,
            events_tx,
            events_rx,
        }
    }

    /// Model name forwarded with every request
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// The filler caption for the pending response, if any
    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    /// Record the user's message and start fetching a reply.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Empty;
        }
        if self.state.awaiting_response() {
            tracing::debug!(mode = ?self.state.mode(), "submission rejected while busy");
            return SubmitOutcome::Busy;
        }

        let id = self.state.push(Sender::User, text).id;
        self.state.set_mode(Mode::AwaitingResponse);
        self.caption = Some(self.captions.pick());
        self.turn += 1;
        tracing::info!(turn = self.turn, message_id = id, "message submitted");

        let turn = self.turn;
        let service = Arc::clone(&self.service);
        let request = ChatRequest::new(text).with_model(self.model.clone());
        let tx = self.events_tx.clone();
        self.task = Some(tokio::spawn(async move {
            let result = service.send_message(&request).await;
            let _ = tx.send(CoordinatorEvent::Delivered { turn, result });
        }));

        SubmitOutcome::Accepted
    }

    /// Wait for the next event from background work
    pub async fn next_event(&mut self) -> Option<CoordinatorEvent> {
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: CoordinatorEvent) {
        if event.turn() != self.turn {
            tracing::debug!(stale = event.turn(), current = self.turn, "dropping stale event");
            return;
        }

        match event {
            CoordinatorEvent::Delivered { result: Ok(text), .. } => {
                if self.state.mode() != Mode::AwaitingResponse {
                    return;
                }
                tracing::info!(turn = self.turn, chars = text.chars().count(), "response received");
                self.start_reveal(text);
            }
            CoordinatorEvent::Delivered { result: Err(err), .. } => {
                if self.state.mode() != Mode::AwaitingResponse {
                    return;
                }
                tracing::warn!(turn = self.turn, error = %err, "delivery failed");
                self.state.push(Sender::Assistant, DELIVERY_FAILURE_TEXT);
                self.finish_turn();
            }
            CoordinatorEvent::RevealTick { partial, .. } => {
                if self.state.mode() == Mode::Revealing {
                    self.state.set_reveal_buffer(partial);
                }
            }
            CoordinatorEvent::RevealDone { text, .. } => {
                if self.state.mode() != Mode::Revealing {
                    return;
                }
                self.state.push(Sender::Assistant, text);
                tracing::debug!(turn = self.turn, "reveal finished");
                self.finish_turn();
            }
        }
    }

    /// Apply every event until the conversation is idle again
    pub async fn run_until_idle(&mut self) {
        while self.state.awaiting_response() {
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    fn start_reveal(&mut self, text: String) {
        self.state.set_mode(Mode::Revealing);
        self.state.clear_reveal_buffer();

        let turn = self.turn;
        let pacing = self.pacing;
        let rng = StdRng::seed_from_u64(self.rng.gen());
        let tick_tx = self.events_tx.clone();
        let done_tx = self.events_tx.clone();
        self.task = Some(tokio::spawn(async move {
            animate(
                RevealSession::new(text),
                pacing,
                rng,
                |partial| {
                    let _ = tick_tx.send(CoordinatorEvent::RevealTick {
                        turn,
                        partial: partial.to_string(),
                    });
                },
                |full| {
                    let _ = done_tx.send(CoordinatorEvent::RevealDone {
                        turn,
                        text: full.to_string(),
                    });
                },
            )
            .await;
        }));
    }

    fn finish_turn(&mut self) {
        self.state.clear_reveal_buffer();
        self.state.set_mode(Mode::Idle);
        self.caption = None;
        self.task = None;
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    use crate::state::ConversationMessage;

    /// Replies with a canned answer, or fails when the answer is `None`
    struct FakeService {
        reply: Option<String>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl FakeService {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatService for FakeService {
        async fn send_message(&self, request: &ChatRequest) -> Result<String, DeliveryError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply
                .clone()
                .ok_or_else(|| DeliveryError::Payload("no reply configured".to_string()))
        }
    }

    /// Holds every request until released
    struct GatedService {
        gate: Notify,
    }

    #[async_trait]
    impl ChatService for GatedService {
        async fn send_message(&self, _request: &ChatRequest) -> Result<String, DeliveryError> {
            self.gate.notified().await;
            Ok("released".to_string())
        }
    }

    fn coordinator(service: Arc<dyn ChatService>) -> Coordinator {
        Coordinator::with_rng(
            service,
            RevealPacing::default(),
            CaptionPicker::seeded(Vec::new(), 1),
            StdRng::seed_from_u64(2),
        )
    }

    fn summary(messages: &[ConversationMessage]) -> Vec<(Sender, &str)> {
        messages.iter().map(|m| (m.sender, m.text.as_str())).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_reply_is_revealed_then_committed() {
        let mut coord = coordinator(FakeService::replying("hello there"));
        assert_eq!(coord.submit("hi"), SubmitOutcome::Accepted);
        assert!(coord.state().awaiting_response());
        assert!(coord.caption().is_some());

        let mut ticks = Vec::new();
        while coord.state().awaiting_response() {
            let event = coord.next_event().await.expect("event");
            coord.handle_event(event);
            if !coord.state().reveal_buffer().is_empty() {
                ticks.push(coord.state().reveal_buffer().to_string());
            }
        }

        let expected: Vec<String> = (1..="hello there".len())
            .map(|n| "hello there"[..n].to_string())
            .collect();
        assert_eq!(ticks, expected);
        assert_eq!(
            summary(coord.state().messages()),
            vec![(Sender::User, "hi"), (Sender::Assistant, "hello there")]
        );
        assert_eq!(coord.state().mode(), Mode::Idle);
        assert_eq!(coord.state().reveal_buffer(), "");
        assert!(coord.caption().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_appends_error_message() {
        let mut coord = coordinator(FakeService::failing());
        coord.submit("test");

        let event = coord.next_event().await.expect("event");
        assert!(matches!(event, CoordinatorEvent::Delivered { result: Err(_), .. }));
        coord.handle_event(event);

        assert_eq!(
            summary(coord.state().messages()),
            vec![(Sender::User, "test"), (Sender::Assistant, DELIVERY_FAILURE_TEXT)]
        );
        assert!(!coord.state().awaiting_response());
        assert_eq!(coord.state().reveal_buffer(), "");
        assert!(coord.task.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_changes_nothing() {
        let service = FakeService::replying("unused");
        let mut coord = Coordinator::new(service.clone(), RevealPacing::default(), CaptionPicker::seeded(Vec::new(), 5));
        assert_eq!(coord.submit(""), SubmitOutcome::Empty);
        assert_eq!(coord.submit("  \n\t "), SubmitOutcome::Empty);
        assert!(coord.state().messages().is_empty());
        assert_eq!(coord.state().mode(), Mode::Idle);
        assert!(coord.caption().is_none());

        tokio::task::yield_now().await;
        assert!(service.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_while_busy_is_rejected() {
        let service = Arc::new(GatedService { gate: Notify::new() });
        let mut coord = coordinator(service.clone());
        assert_eq!(coord.submit("first"), SubmitOutcome::Accepted);
        assert_eq!(coord.submit("second"), SubmitOutcome::Busy);
        assert_eq!(coord.state().messages().len(), 1);

        service.gate.notify_one();
        let event = coord.next_event().await.expect("event");
        coord.handle_event(event);
        assert_eq!(coord.state().mode(), Mode::Revealing);
        assert_eq!(coord.submit("third"), SubmitOutcome::Busy);

        coord.run_until_idle().await;
        assert_eq!(
            summary(coord.state().messages()),
            vec![(Sender::User, "first"), (Sender::Assistant, "released")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_increase_across_turns() {
        let mut coord = coordinator(FakeService::replying("ok."));
        for text in ["one", "two", "three"] {
            assert_eq!(coord.submit(text), SubmitOutcome::Accepted);
            coord.run_until_idle().await;
        }

        let messages = coord.state().messages();
        assert_eq!(messages.len(), 6);
        for pair in messages.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
        assert_eq!(
            summary(messages),
            vec![
                (Sender::User, "one"),
                (Sender::Assistant, "ok."),
                (Sender::User, "two"),
                (Sender::Assistant, "ok."),
                (Sender::User, "three"),
                (Sender::Assistant, "ok."),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_then_success_keeps_order() {
        let mut coord = coordinator(FakeService::failing());
        coord.submit("a");
        coord.run_until_idle().await;

        coord.service = FakeService::replying("b-reply");
        coord.submit("b");
        coord.run_until_idle().await;

        assert_eq!(
            summary(coord.state().messages()),
            vec![
                (Sender::User, "a"),
                (Sender::Assistant, DELIVERY_FAILURE_TEXT),
                (Sender::User, "b"),
                (Sender::Assistant, "b-reply"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_reply_commits_empty_message() {
        let mut coord = coordinator(FakeService::replying(""));
        coord.submit("say nothing");
        coord.run_until_idle().await;
        assert_eq!(
            summary(coord.state().messages()),
            vec![(Sender::User, "say nothing"), (Sender::Assistant, "")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_carries_text_and_model() {
        let service = FakeService::replying("fine");
        let mut coord = coordinator(service.clone()).with_model(Some("google/gemini-2.5-pro".to_string()));
        coord.submit("  keep my spacing ");
        coord.run_until_idle().await;

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message, "  keep my spacing ");
        assert_eq!(seen[0].model.as_deref(), Some("google/gemini-2.5-pro"));
        assert_eq!(coord.state().messages()[0].text, "  keep my spacing ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_events_are_ignored() {
        let mut coord = coordinator(FakeService::replying("current"));
        coord.submit("now");
        coord.handle_event(CoordinatorEvent::RevealDone {
            turn: 0,
            text: "from an old turn".to_string(),
        });
        assert_eq!(coord.state().messages().len(), 1);
        assert_eq!(coord.state().mode(), Mode::AwaitingResponse);

        coord.run_until_idle().await;
        assert_eq!(coord.state().messages()[1].text, "current");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_takes_paced_time() {
        let mut coord = Coordinator::with_rng(
            FakeService::replying("a, b"),
            RevealPacing {
                jitter: Duration::ZERO,
                ..RevealPacing::default()
            },
            CaptionPicker::seeded(Vec::new(), 1),
            StdRng::seed_from_u64(0),
        );
        let start = tokio::time::Instant::now();
        coord.submit("go");
        coord.run_until_idle().await;

        let pacing = RevealPacing::default();
        assert!(start.elapsed() >= pacing.base * 2 + pacing.punctuation + pacing.space);
    }
}
