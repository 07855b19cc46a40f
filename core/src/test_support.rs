//! Scripted command runner for tests.
//!
//! `FakeRunner` stands in for the odo binary. Listings are served from an
//! in-memory table per listing command; mutations change those tables after a
//! configurable number of listing reads, which models the backend's latency.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::odo::errors::{OdoError, Result};
use crate::ports::{CommandLine, CommandOutput, CommandRunner, OutputLine, OutputStream, RunOptions};

/// Delay that never elapses: the change is accepted but never shows up.
pub(crate) const NEVER: usize = usize::MAX;

/// What a mutation does to a listing once it becomes visible.
#[derive(Debug, Clone)]
pub(crate) enum Effect {
    /// Append a row to the listing.
    Add { listing: CommandLine, row: String },
    /// Drop the row whose name column is `name`.
    Remove { listing: CommandLine, name: String },
}

#[derive(Default)]
struct Listing {
    header: String,
    rows: Vec<String>,
}

struct Scheduled {
    listing: String,
    effect: Effect,
    /// Listing reads left before the effect applies.
    remaining: usize,
}

#[derive(Default)]
struct State {
    calls: Vec<CommandLine>,
    listings: HashMap<String, Listing>,
    responses: HashMap<String, CommandOutput>,
    mutations: HashMap<String, (Vec<Effect>, usize)>,
    hangs: HashMap<String, Duration>,
    scheduled: Vec<Scheduled>,
}

/// Scripted runner shared between the code under test and the test body.
#[derive(Clone, Default)]
pub(crate) struct FakeRunner {
    state: Arc<Mutex<State>>,
}

fn row_name(row: &str) -> Option<&str> {
    row.split_whitespace().find(|column| *column != "*")
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serves `rows` under `header` for a listing command.
    pub(crate) fn listing(self, command: CommandLine, header: &str, rows: &[&str]) -> Self {
        self.state.lock().listings.insert(
            command.to_string(),
            Listing {
                header: header.to_string(),
                rows: rows.iter().map(|r| r.to_string()).collect(),
            },
        );
        self
    }

    /// Answers a command with a fixed output.
    pub(crate) fn respond(self, command: CommandLine, output: CommandOutput) -> Self {
        self.state
            .lock()
            .responses
            .insert(command.to_string(), output);
        self
    }

    /// Accepts a mutating command; its effects show after `delay` further reads of the listing.
    pub(crate) fn mutation(self, command: CommandLine, effects: Vec<Effect>, delay: usize) -> Self {
        self.state
            .lock()
            .mutations
            .insert(command.to_string(), (effects, delay));
        self
    }

    /// Makes a command run past its deadline, as the process runner reports it.
    pub(crate) fn hang(self, command: CommandLine, timeout: Duration) -> Self {
        self.state.lock().hangs.insert(command.to_string(), timeout);
        self
    }

    pub(crate) fn calls(&self) -> Vec<CommandLine> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub(crate) fn count_calls(&self, command: &CommandLine) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| *c == command)
            .count()
    }

    fn answer(&self, command: &CommandLine) -> CommandOutput {
        let key = command.to_string();
        let mut state = self.state.lock();
        state.calls.push(command.clone());

        if state.listings.contains_key(&key) {
            let mut due = Vec::new();
            state.scheduled.retain_mut(|s| {
                if s.listing != key {
                    return true;
                }
                if s.remaining == 0 {
                    due.push(s.effect.clone());
                    return false;
                }
                if s.remaining != NEVER {
                    s.remaining -= 1;
                }
                true
            });

            let Some(listing) = state.listings.get_mut(&key) else {
                return CommandOutput::failure(1, "error: listing vanished");
            };
            for effect in due {
                match effect {
                    Effect::Add { row, .. } => listing.rows.push(row),
                    Effect::Remove { name, .. } => {
                        listing.rows.retain(|r| row_name(r) != Some(name.as_str()))
                    }
                }
            }

            let mut stdout = listing.header.clone();
            for row in &listing.rows {
                stdout.push('\n');
                stdout.push_str(row);
            }
            return CommandOutput::success(stdout);
        }

        if let Some(output) = state.responses.get(&key) {
            return output.clone();
        }

        if let Some((effects, delay)) = state.mutations.get(&key).cloned() {
            for effect in effects {
                let listing = match &effect {
                    Effect::Add { listing, .. } | Effect::Remove { listing, .. } => {
                        listing.to_string()
                    }
                };
                state.scheduled.push(Scheduled {
                    listing,
                    effect,
                    remaining: delay,
                });
            }
            return CommandOutput::success("");
        }

        CommandOutput::failure(1, format!("error: unexpected command '{}'", key))
    }
}

impl CommandRunner for FakeRunner {
    async fn run(&self, command: &CommandLine, _options: &RunOptions) -> Result<CommandOutput> {
        let hang = {
            let mut state = self.state.lock();
            let hang = state.hangs.get(&command.to_string()).copied();
            if hang.is_some() {
                state.calls.push(command.clone());
            }
            hang
        };
        if let Some(timeout) = hang {
            return Err(OdoError::Timeout {
                command: command.to_string(),
                timeout,
            });
        }
        Ok(self.answer(command))
    }

    async fn stream(&self, command: &CommandLine, _options: &RunOptions) -> Result<OutputStream> {
        let output = self.answer(command);
        let (tx, rx) = mpsc::unbounded_channel();
        for line in output.stdout.lines() {
            let _ = tx.send(OutputLine::stdout(line));
        }
        Ok(rx)
    }
}
