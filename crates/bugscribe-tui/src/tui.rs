use std::io::{self, Stderr};
use std::time::Duration;
use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// One spinner frame per period while a reply is pending
pub const SPINNER_PERIOD: Duration = Duration::from_millis(120);

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    /// Spinner frame; only produced while waiting on the chat service
    Tick,
}

/// Terminal input the app reacts to. Key releases and focus/paste events are dropped.
fn map_terminal_event(evt: io::Result<Event>) -> Option<AppEvent> {
    match evt {
        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        Ok(Event::Mouse(mouse)) => Some(AppEvent::Mouse(mouse)),
        Ok(Event::Resize(w, h)) => Some(AppEvent::Resize(w, h)),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(error = %err, "terminal event stream error");
            None
        }
    }
}

/// Merges terminal input with the spinner clock. The clock only runs while the
/// caller says the spinner is visible, so an idle chat does not redraw.
pub struct EventHandler {
    input: mpsc::UnboundedReceiver<AppEvent>,
    spinner: Interval,
    reader: Option<JoinHandle<()>>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            let mut stream = EventStream::new();
            while let Some(evt) = stream.next().await {
                if let Some(event) = map_terminal_event(evt) {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        let mut handler = Self::from_input(rx);
        handler.reader = Some(reader);
        handler
    }

    fn from_input(input: mpsc::UnboundedReceiver<AppEvent>) -> Self {
        let mut spinner = tokio::time::interval(SPINNER_PERIOD);
        spinner.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            input,
            spinner,
            reader: None,
        }
    }

    /// Next event; `Tick`s are only interleaved when `spinning` is set
    pub async fn next(&mut self, spinning: bool) -> Option<AppEvent> {
        if !spinning {
            return self.input.recv().await;
        }

        tokio::select! {
            event = self.input.recv() => event,
            _ = self.spinner.tick() => Some(AppEvent::Tick),
        }
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)?;

    let mut terminal = Terminal::new(CrosstermBackend::new(io::stderr()))?;
    terminal.clear()?;
    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Leave the alternate screen before the panic message is printed
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}
