use bugscribe_core::{Coordinator, CoordinatorEvent, Mode, SubmitOutcome};
use ratatui::layout::Rect;

/// Braille spinner frames for the waiting indicator
pub const SPINNER_FRAMES: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

pub struct App {
    // Core state
    pub should_quit: bool,
    pub coordinator: Coordinator,
    pub api_url: String,

    // Input state
    pub input: String,
    pub input_cursor: usize, // char index into input

    // Chat view state
    pub chat_scroll: u16,
    pub follow_bottom: bool,    // keep the newest text in view while it streams
    pub chat_height: u16,       // inner height of chat area, set during render
    pub chat_total_lines: u16,  // wrapped line estimate, set during render

    // Animation state
    pub animation_frame: usize,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(coordinator: Coordinator, api_url: String) -> Self {
        Self {
            should_quit: false,
            coordinator,
            api_url,
            input: String::new(),
            input_cursor: 0,
            chat_scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_total_lines: 0,
            animation_frame: 0,
            chat_area: None,
        }
    }

    /// Input is disabled from submission until the reply is fully shown
    pub fn input_locked(&self) -> bool {
        self.coordinator.state().awaiting_response()
    }

    pub fn mode(&self) -> Mode {
        self.coordinator.state().mode()
    }

    /// Send the current input. Only clears the box when the coordinator took it.
    pub fn submit_input(&mut self) -> SubmitOutcome {
        let outcome = self.coordinator.submit(&self.input);
        if outcome == SubmitOutcome::Accepted {
            self.input.clear();
            self.input_cursor = 0;
            self.follow_bottom = true;
        }
        outcome
    }

    pub fn apply_conversation_event(&mut self, event: CoordinatorEvent) {
        self.coordinator.handle_event(event);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.mode() == Mode::AwaitingResponse {
            self.animation_frame = (self.animation_frame + 1) % SPINNER_FRAMES.len();
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.animation_frame % SPINNER_FRAMES.len()]
    }

    pub fn max_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.min(self.max_scroll()).saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_bottom = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    /// Called from render once the chat size is known
    pub fn update_chat_metrics(&mut self, height: u16, total_lines: u16) {
        self.chat_height = height;
        self.chat_total_lines = total_lines;
        if self.follow_bottom {
            self.chat_scroll = self.max_scroll();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_scroll());
        }
    }
}
