use crate::corpus::ResponseCorpus;
use crate::engine::{DialogueEngine, RevealSettings};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Host-side flags. None of these affect the conversation itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUiState {
    pub open: bool,
    pub minimized: bool,
    pub sound: bool,
    pub last_query: Option<String>,
}

/// The chat window: mounts a fresh [`DialogueEngine`] when opened and tears it down when closed.
pub struct ChatWidget {
    corpus: Arc<ResponseCorpus>,
    settings: RevealSettings,
    state: SessionUiState,
    engine: Option<DialogueEngine>,
}

impl ChatWidget {
    pub fn new(corpus: Arc<ResponseCorpus>, settings: RevealSettings, sound: bool) -> Self {
        Self {
            corpus,
            settings,
            state: SessionUiState {
                sound,
                ..SessionUiState::default()
            },
            engine: None,
        }
    }

    pub fn state(&self) -> &SessionUiState {
        &self.state
    }

    pub fn engine(&self) -> Option<&DialogueEngine> {
        self.engine.as_ref()
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        self.engine.as_ref().map(DialogueEngine::subscribe)
    }

    /// Returns whether the widget is open afterwards.
    pub fn toggle_open(&mut self) -> bool {
        if self.state.open {
            self.close();
        } else {
            self.open();
        }
        self.state.open
    }

    pub fn open(&mut self) {
        if self.state.open {
            return;
        }
        self.engine = Some(DialogueEngine::new(self.corpus.clone(), self.settings));
        self.state.open = true;
        info!("chat widget opened");
    }

    pub fn close(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.cancel_reveal();
        }
        self.state.open = false;
        self.state.minimized = false;
        self.state.last_query = None;
        info!("chat widget closed");
    }

    pub fn toggle_minimized(&mut self) -> bool {
        self.state.minimized = !self.state.minimized;
        self.state.minimized
    }

    pub fn toggle_sound(&mut self) -> bool {
        self.state.sound = !self.state.sound;
        self.state.sound
    }

    /// Forwards input to the engine. Ignored while the widget is closed.
    pub fn send(&mut self, text: &str) -> bool {
        let Some(engine) = &self.engine else {
            return false;
        };
        let accepted = engine.submit(text);
        if accepted {
            self.state.last_query = Some(engine.last_query());
        }
        accepted
    }

    pub fn clear(&mut self) {
        if let Some(engine) = &self.engine {
            engine.clear();
            self.state.last_query = None;
        }
    }
}
