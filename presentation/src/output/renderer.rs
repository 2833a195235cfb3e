//! Console renderer for live discussion events
//!
//! Finished messages are printed whole. The active speaker's reply is
//! written chunk by chunk as `MessageUpdated` events arrive, and agents that
//! are generating but have not produced any text yet get a spinner.

use crate::output::console::ConsoleFormatter;
use crate::progress::reporter::ThinkingReporter;
use colored::Color;
use roundtable_application::bus::recv_lossy;
use roundtable_domain::{
    AgentId, AgentProfile, Author, DiscussionEvent, Message, MessageId, MessageStatus,
};
use std::collections::HashMap;
use std::io::{self, Stdout, Write};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

struct Seat {
    name: String,
    color: Color,
}

/// Writes discussion events to a terminal (or any writer)
pub struct ConsoleRenderer<W: Write = Stdout> {
    out: W,
    seats: HashMap<AgentId, Seat>,
    thinking: ThinkingReporter,
    show_thinking: bool,
    /// Bytes of each message's content already written
    written: HashMap<MessageId, usize>,
    /// Message whose line is still open (streaming)
    open: Option<MessageId>,
    finished: usize,
}

impl ConsoleRenderer<Stdout> {
    pub fn new(cast: &[AgentProfile], show_thinking: bool) -> Self {
        let thinking = if show_thinking {
            ThinkingReporter::new()
        } else {
            ThinkingReporter::hidden()
        };
        Self::build(io::stdout(), cast, thinking, show_thinking)
    }
}

impl<W: Write> ConsoleRenderer<W> {
    /// Renderer writing to `out`, spinners are tracked but never drawn
    pub fn with_writer(out: W, cast: &[AgentProfile]) -> Self {
        Self::build(out, cast, ThinkingReporter::hidden(), true)
    }

    fn build(
        out: W,
        cast: &[AgentProfile],
        thinking: ThinkingReporter,
        show_thinking: bool,
    ) -> Self {
        let seats = cast
            .iter()
            .enumerate()
            .map(|(index, profile)| {
                (
                    profile.id.clone(),
                    Seat {
                        name: profile.name.clone(),
                        color: ConsoleFormatter::speaker_color(index),
                    },
                )
            })
            .collect();
        Self {
            out,
            seats,
            thinking,
            show_thinking,
            written: HashMap::new(),
            open: None,
            finished: 0,
        }
    }

    /// Messages written to completion so far
    pub fn finished(&self) -> usize {
        self.finished
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn name_of(&self, agent_id: &AgentId) -> String {
        self.seats
            .get(agent_id)
            .map(|seat| seat.name.clone())
            .unwrap_or_else(|| agent_id.to_string())
    }

    fn label_of(&self, author: &Author) -> String {
        match author {
            Author::User => ConsoleFormatter::user_label(),
            Author::Agent(id) => match self.seats.get(id) {
                Some(seat) => ConsoleFormatter::speaker_label(&seat.name, seat.color),
                None => ConsoleFormatter::speaker_label(id.as_str(), Color::White),
            },
            Author::System => String::new(),
        }
    }

    fn emit(&mut self, text: &str) -> io::Result<()> {
        let out = &mut self.out;
        self.thinking.suspend(|| {
            out.write_all(text.as_bytes())?;
            out.flush()
        })
    }

    /// Terminate a streamed line that is still open
    fn close_line(&mut self) -> io::Result<()> {
        if self.open.take().is_some() {
            self.emit("\n")?;
            self.finished += 1;
        }
        Ok(())
    }

    pub fn render(&mut self, event: &DiscussionEvent) -> io::Result<()> {
        match event {
            DiscussionEvent::Thinking {
                agent_id,
                is_thinking: true,
            } => {
                if self.show_thinking {
                    let message = ConsoleFormatter::thinking(&self.name_of(agent_id));
                    self.thinking.start(agent_id, message);
                }
                Ok(())
            }
            DiscussionEvent::Thinking { agent_id, .. } => {
                self.thinking.stop(agent_id);
                Ok(())
            }
            DiscussionEvent::MessageUpdated { message } => match message.author {
                Author::System => self.write_notice(message),
                Author::Agent(_) => self.write_progress(message),
                Author::User => Ok(()),
            },
            DiscussionEvent::MessagePosted { message } => self.write_progress(message),
            DiscussionEvent::Paused => {
                self.close_line()?;
                self.emit(&format!("{}\n", ConsoleFormatter::status("discussion paused")))
            }
            DiscussionEvent::Resumed => {
                self.emit(&format!("{}\n", ConsoleFormatter::status("discussion resumed")))
            }
            DiscussionEvent::TurnFailed {
                agent_id, error, ..
            } => {
                self.thinking.stop(agent_id);
                self.close_line()?;
                let line = ConsoleFormatter::failure(&self.name_of(agent_id), error);
                self.emit(&format!("{}\n", line))
            }
        }
    }

    fn write_notice(&mut self, message: &Message) -> io::Result<()> {
        if self.written.contains_key(&message.id) {
            return Ok(());
        }
        self.close_line()?;
        self.written.insert(message.id.clone(), message.content.len());
        self.emit(&format!("{}\n", ConsoleFormatter::notice(&message.content)))
    }

    /// Write whatever part of `message` has not been written yet
    fn write_progress(&mut self, message: &Message) -> io::Result<()> {
        let is_open = self.open.as_ref() == Some(&message.id);
        let written = self.written.get(&message.id).copied();

        if message.status == MessageStatus::Error {
            if is_open {
                self.close_line()?;
            }
            return Ok(());
        }
        if written.is_none() && message.content.is_empty() {
            // placeholder; the spinner stays until text arrives
            return Ok(());
        }

        let from = written.unwrap_or(0);
        let rest = message.content.get(from..).unwrap_or_default();
        if rest.is_empty() && !is_open {
            return Ok(());
        }

        if !is_open {
            self.close_line()?;
            if let Author::Agent(id) = &message.author {
                self.thinking.stop(id);
            }
            let label = self.label_of(&message.author);
            self.emit(&label)?;
            self.open = Some(message.id.clone());
        }
        self.emit(rest)?;
        self.written.insert(message.id.clone(), message.content.len());

        if message.status.is_terminal() {
            self.close_line()?;
        }
        Ok(())
    }

    /// Render events until the topic closes or `shutdown` fires.
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<DiscussionEvent>,
        shutdown: CancellationToken,
    ) -> io::Result<usize> {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = recv_lossy(&mut events, "console") => event,
            };
            let Some(event) = event else { break };
            self.render(&event)?;
        }
        self.close_line()?;
        self.thinking.clear();
        let footer = ConsoleFormatter::footer(self.finished);
        self.emit(&footer)?;
        Ok(self.finished)
    }
}
