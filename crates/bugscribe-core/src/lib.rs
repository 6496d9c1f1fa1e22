pub mod ai;
pub mod captions;
pub mod config;
pub mod coordinator;
pub mod reveal;
pub mod state;

// Re-export main types for convenience
pub use ai::{ChatRequest, ChatService, DeliveryError, HttpChatService};
pub use captions::CaptionPicker;
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorEvent, SubmitOutcome, DELIVERY_FAILURE_TEXT};
pub use reveal::{animate, RevealPacing, RevealSession, RevealStep};
pub use state::{ConversationMessage, ConversationState, Mode, Sender};
