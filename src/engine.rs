use crate::corpus::{ResponseCorpus, normalize};
use crate::turn::{Transcript, Turn};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use strum::{Display, EnumString};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(150);

/// Granularity of the simulated typing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RevealUnit {
    #[default]
    Word,
    Character,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealSettings {
    pub unit: RevealUnit,
    pub interval: Duration,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            unit: RevealUnit::default(),
            interval: DEFAULT_REVEAL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EngineState {
    Idle,
    Revealing,
}

/// Byte offsets of each successive prefix of `reply`, ending at `reply.len()`.
///
/// Word steps split on single spaces, so joining the revealed words reproduces the reply exactly.
pub fn reveal_steps(reply: &str, unit: RevealUnit) -> Vec<usize> {
    let mut steps: Vec<usize> = match unit {
        RevealUnit::Word => reply.match_indices(' ').map(|(index, _)| index).collect(),
        RevealUnit::Character => reply
            .char_indices()
            .map(|(index, c)| index + c.len_utf8())
            .collect(),
    };
    if steps.last() != Some(&reply.len()) {
        steps.push(reply.len());
    }
    steps
}

/// Consistent view of the transcript for rendering.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub transcript: Transcript,
    /// Index of the bot turn currently being revealed.
    pub revealing_turn: Option<usize>,
}

struct ActiveReveal {
    id: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Session {
    transcript: Transcript,
    last_query: String,
    pending: VecDeque<String>,
    reveal: Option<ActiveReveal>,
    revealing_turn: Option<usize>,
    next_reveal_id: u64,
}

impl Session {
    fn is_current(&self, id: u64) -> bool {
        self.reveal.as_ref().is_some_and(|reveal| reveal.id == id)
    }

    fn stop_reveal(&mut self) -> bool {
        self.pending.clear();
        self.revealing_turn = None;
        match self.reveal.take() {
            Some(reveal) => {
                reveal.task.abort();
                true
            }
            None => false,
        }
    }
}

struct Shared {
    session: Mutex<Session>,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

/// Owns one chat session: matches user input against the corpus and reveals
/// each reply into the transcript on a timer.
///
/// Replies are revealed one at a time; submissions made while a reply is being
/// revealed are queued behind it. Dropping the engine cancels the reveal.
pub struct DialogueEngine {
    corpus: Arc<ResponseCorpus>,
    settings: RevealSettings,
    shared: Arc<Shared>,
}

impl DialogueEngine {
    pub fn new(corpus: Arc<ResponseCorpus>, settings: RevealSettings) -> Self {
        let session = Session {
            transcript: Transcript::seeded(corpus.greeting()),
            ..Session::default()
        };
        let (revision, _) = watch::channel(0);
        Self {
            corpus,
            settings,
            shared: Arc::new(Shared {
                session: Mutex::new(session),
                revision,
            }),
        }
    }

    /// Appends the user's turn and schedules the reply. Returns `false` for blank input.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, raw_text: &str) -> bool {
        let text = raw_text.trim();
        if text.is_empty() {
            debug!("ignoring blank submission");
            return false;
        }

        let query = normalize(text);
        {
            let mut session = self.shared.lock();
            session.transcript.push(Turn::user(text));
            let reply = self.corpus.respond(&query, &session.last_query);
            session.last_query = query;
            session.pending.push_back(reply);

            if session.reveal.is_none() {
                let id = session.next_reveal_id;
                session.next_reveal_id += 1;
                let task = tokio::spawn(run_reveals(self.shared.clone(), id, self.settings));
                session.reveal = Some(ActiveReveal { id, task });
                info!(reveal = id, "reveal started");
            } else {
                debug!(queued = session.pending.len(), "reply queued behind active reveal");
            }
        }
        self.shared.notify();
        true
    }

    /// Resets the transcript to the greeting and forgets the last query.
    pub fn clear(&self) {
        {
            let mut session = self.shared.lock();
            session.stop_reveal();
            session.transcript = Transcript::seeded(self.corpus.greeting());
            session.last_query.clear();
        }
        info!("transcript cleared");
        self.shared.notify();
    }

    /// Stops the in-flight reveal and drops queued replies. The partial turn is kept.
    pub fn cancel_reveal(&self) {
        let cancelled = self.shared.lock().stop_reveal();
        if cancelled {
            info!("reveal cancelled");
            self.shared.notify();
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let session = self.shared.lock();
        Snapshot {
            transcript: session.transcript.clone(),
            revealing_turn: session.revealing_turn,
        }
    }

    pub fn is_revealing(&self) -> bool {
        self.shared.lock().reveal.is_some()
    }

    pub fn state(&self) -> EngineState {
        if self.is_revealing() {
            EngineState::Revealing
        } else {
            EngineState::Idle
        }
    }

    pub fn last_query(&self) -> String {
        self.shared.lock().last_query.clone()
    }

    /// Receiver that changes after every transcript or state mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }
}

impl Drop for DialogueEngine {
    fn drop(&mut self) {
        self.cancel_reveal();
    }
}

async fn run_reveals(shared: Arc<Shared>, id: u64, settings: RevealSettings) {
    loop {
        let (index, reply) = {
            let mut session = shared.lock();
            if !session.is_current(id) {
                return;
            }
            match session.pending.pop_front() {
                Some(reply) => {
                    let index = session.transcript.push(Turn::bot(""));
                    session.revealing_turn = Some(index);
                    (index, reply)
                }
                None => {
                    session.reveal = None;
                    session.revealing_turn = None;
                    drop(session);
                    debug!(reveal = id, "reveal queue drained");
                    shared.notify();
                    return;
                }
            }
        };
        shared.notify();

        for end in reveal_steps(&reply, settings.unit) {
            tokio::time::sleep(settings.interval).await;
            {
                let mut session = shared.lock();
                if !session.is_current(id) {
                    return;
                }
                session.transcript.set_text(index, &reply[..end]);
            }
            shared.notify();
        }
        info!(reveal = id, turn = index, len = reply.len(), "reply revealed");
    }
}
