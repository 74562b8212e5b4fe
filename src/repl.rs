use crate::engine::EngineState;
use crate::turn::{Author, Transcript};
use crate::widget::ChatWidget;
use anyhow::Context;
use std::io::Write;
use strum::{Display, EnumString};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

const BELL: char = '\u{7}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum Command {
    Clear,
    Open,
    Close,
    Toggle,
    Minimize,
    Sound,
    Help,
    Quit,
}

const USAGE: &str = "Commands: /clear /open /close /toggle /minimize /sound /help /quit";

/// Incrementally prints a transcript to a line-oriented terminal.
///
/// Turns are printed in order. The turn being revealed keeps its line open and
/// later turns wait until it is finished.
#[derive(Debug, Default)]
pub struct TranscriptView {
    rendered: usize,
    open_len: Option<usize>,
}

impl TranscriptView {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns the text that brings the terminal up to date with `transcript`.
    pub fn update(&mut self, transcript: &Transcript, revealing_turn: Option<usize>) -> String {
        if transcript.is_empty() || transcript.len() < self.rendered {
            self.reset();
        }

        let turns = transcript.turns();
        let mut out = String::new();
        if let Some(len) = self.open_len.take() {
            let index = self.rendered - 1;
            let text = &turns[index].text;
            out.push_str(text.get(len..).unwrap_or_default());
            if revealing_turn == Some(index) {
                self.open_len = Some(text.len());
                return out;
            }
            out.push('\n');
        }

        while let Some(turn) = turns.get(self.rendered) {
            let index = self.rendered;
            let speaker = match turn.author {
                Author::User => "you",
                Author::Bot => "assistant",
            };
            out.push_str(&format!("[{}] {speaker}: {}", turn.display_time(), turn.text));
            self.rendered += 1;
            if revealing_turn == Some(index) {
                self.open_len = Some(turn.text.len());
                break;
            }
            out.push('\n');
        }
        out
    }
}

/// Whether an open/close command should flip the widget given its current state.
fn wants_toggle(command: Command, open: bool) -> bool {
    match command {
        Command::Open => !open,
        Command::Close => open,
        _ => true,
    }
}

async fn next_change(revisions: &mut Option<watch::Receiver<u64>>) -> bool {
    match revisions {
        Some(revisions) => revisions.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

struct Terminal {
    view: TranscriptView,
    was_revealing: bool,
}

impl Terminal {
    fn render(&mut self, widget: &ChatWidget) -> anyhow::Result<()> {
        let Some(engine) = widget.engine() else {
            return Ok(());
        };
        let snapshot = engine.snapshot();
        let revealing = engine.state() == EngineState::Revealing;
        if widget.state().minimized {
            self.was_revealing = revealing;
            return Ok(());
        }

        let mut out = self.view.update(&snapshot.transcript, snapshot.revealing_turn);
        if self.was_revealing && !revealing && widget.state().sound {
            out.push(BELL);
        }
        self.was_revealing = revealing;
        write_out(&out)
    }

    fn restart(&mut self, widget: &ChatWidget, banner: &str) -> anyhow::Result<()> {
        self.view.reset();
        self.was_revealing = false;
        write_out(&format!("{banner}\n"))?;
        self.render(widget)
    }
}

fn write_out(text: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .context("Failed to write to stdout")
}

/// Runs the chat widget against stdin/stdout until `/quit` or end of input.
pub async fn run(mut widget: ChatWidget) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut terminal = Terminal {
        view: TranscriptView::default(),
        was_revealing: false,
    };

    widget.open();
    let mut revisions = widget.subscribe();
    terminal.restart(&widget, USAGE)?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                let Some(name) = line.trim().strip_prefix('/') else {
                    if !widget.send(&line) && !widget.state().open {
                        write_out("(chat is closed, type /open)\n")?;
                    }
                    continue;
                };

                match name.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(Command::Help) => write_out(&format!("{USAGE}\n"))?,
                    Ok(Command::Clear) => {
                        widget.clear();
                        terminal.restart(&widget, "--- conversation cleared ---")?;
                    }
                    Ok(command @ (Command::Open | Command::Close | Command::Toggle)) => {
                        if wants_toggle(command, widget.state().open) {
                            if widget.toggle_open() {
                                revisions = widget.subscribe();
                                terminal.restart(&widget, "--- chat opened ---")?;
                            } else {
                                revisions = None;
                                write_out("\n--- chat closed ---\n")?;
                            }
                        }
                    }
                    Ok(Command::Minimize) => {
                        if widget.toggle_minimized() {
                            write_out("\n--- minimized ---\n")?;
                        } else {
                            terminal.restart(&widget, "--- restored ---")?;
                        }
                    }
                    Ok(Command::Sound) => {
                        let state = if widget.toggle_sound() { "on" } else { "off" };
                        write_out(&format!("sound {state}\n"))?;
                    }
                    Err(_) => write_out(&format!("Unknown command `/{name}`. {USAGE}\n"))?,
                }
            }
            alive = next_change(&mut revisions) => {
                if alive {
                    terminal.render(&widget)?;
                } else {
                    revisions = None;
                }
            }
        }
    }

    widget.close();
    Ok(())
}
