//! Prints bus events to the terminal while a command runs.

use std::io::{self, Write};

use forge_core::{CancellationToken, Event, EventBus, EventFilter, EventScope, EventType};
use tokio::task::JoinHandle;

/// How events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Human-readable lines; thoughts and code are typed inline.
    Text,
    /// One serialized event per line.
    Json,
}

/// Writes events in one [`Style`].
pub struct Printer<W: Write> {
    out: W,
    style: Style,
    /// The cursor is mid-line after inline output.
    inline: bool,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, style: Style) -> Self {
        Self {
            out,
            style,
            inline: false,
        }
    }

    pub fn print(&mut self, event: &Event) -> io::Result<()> {
        match self.style {
            Style::Json => {
                let line = serde_json::to_string(event).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                writeln!(self.out, "{}", line)
            }
            Style::Text => self.text(event),
        }
    }

    fn text(&mut self, event: &Event) -> io::Result<()> {
        match event.event_type {
            EventType::Thought => {
                let delta = event.get("delta").and_then(|d| d.as_str()).unwrap_or(&event.message);
                self.inline(delta)
            }
            EventType::CodeCharacterWritten => match event.get("character").and_then(|c| c.as_str()) {
                Some(character) => self.inline(character),
                None => Ok(()),
            },
            EventType::CodeChunkWritten | EventType::CodeStreamingStarted | EventType::FileOpenedInEditor => Ok(()),
            EventType::TerminalOutput => self.line(&format!("  | {}", event.message)),
            EventType::Terminal => self.line(&event.message),
            EventType::Todo => {
                self.line(&event.message)?;
                let items = event.get("items").and_then(|i| i.as_array()).cloned().unwrap_or_default();
                for item in items.iter().filter_map(|i| i.as_str()) {
                    self.line(&format!("  - {}", item))?;
                }
                Ok(())
            }
            EventType::Error | EventType::ErrorDetected | EventType::SyntaxErrorDetected => {
                self.line(&format!("! {}", event.message))
            }
            EventType::Done => self.line(&format!("Done: {}", event.message)),
            _ if event.message.is_empty() => Ok(()),
            _ => self.line(&format!("[{}] {}", event.event_type, event.message)),
        }
    }

    fn inline(&mut self, text: &str) -> io::Result<()> {
        self.inline = !text.ends_with('\n');
        write!(self.out, "{}", text)?;
        self.out.flush()
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        if self.inline {
            writeln!(self.out)?;
            self.inline = false;
        }
        writeln!(self.out, "{}", text)
    }

    /// End any inline output.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.inline {
            writeln!(self.out)?;
            self.inline = false;
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Background task printing a bus subscription to stdout.
pub struct RenderTask {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl RenderTask {
    pub fn spawn(bus: &EventBus, style: Style, scope: EventScope) -> Self {
        let subscription = bus.subscribe(EventFilter::all().scope(scope));
        let stop = CancellationToken::new();
        let stopped = stop.clone();
        let handle = tokio::spawn(async move {
            let mut printer = Printer::new(io::stdout(), style);
            loop {
                tokio::select! {
                    biased;
                    event = subscription.recv() => match event {
                        Some(event) => {
                            if printer.print(&event).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = stopped.cancelled() => {
                        for event in subscription.drain() {
                            if printer.print(&event).is_err() {
                                break;
                            }
                        }
                        break;
                    }
                }
            }
            let _ = printer.finish();
        });
        Self { stop, handle }
    }

    /// Print whatever is still buffered, then stop.
    pub async fn finish(self) {
        self.stop.cancel();
        let _ = self.handle.await;
    }
}
