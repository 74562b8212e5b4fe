use chrono::{DateTime, Local};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Author {
    User,
    Bot,
}

/// One message in the chat. Bot turns start empty and grow while they are revealed.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub author: Author,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Author::User, text)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Author::Bot, text)
    }

    fn new(author: Author, text: impl Into<String>) -> Self {
        Self {
            author,
            text: text.into(),
            timestamp: Local::now(),
        }
    }

    pub fn display_time(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

/// Append-only, conversation-ordered log of turns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn seeded(greeting: &str) -> Self {
        Self {
            turns: vec![Turn::bot(greeting)],
        }
    }

    /// Appends a turn and returns its index.
    pub fn push(&mut self, turn: Turn) -> usize {
        self.turns.push(turn);
        self.turns.len() - 1
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub(crate) fn set_text(&mut self, index: usize, text: &str) {
        if let Some(turn) = self.turns.get_mut(index) {
            turn.text.clear();
            turn.text.push_str(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_transcript_holds_one_bot_greeting() {
        let transcript = Transcript::seeded("Hello!");
        assert_eq!(transcript.len(), 1);
        let greeting = transcript.turns().last().unwrap();
        assert_eq!(greeting.author, Author::Bot);
        assert_eq!(greeting.text, "Hello!");
    }

    #[test]
    fn push_returns_insertion_index() {
        let mut transcript = Transcript::default();
        assert!(transcript.is_empty());
        assert_eq!(transcript.push(Turn::user("one")), 0);
        assert_eq!(transcript.push(Turn::bot("two")), 1);
        assert_eq!(transcript.turns()[0].author, Author::User);
    }

    #[test]
    fn set_text_ignores_out_of_range_index() {
        let mut transcript = Transcript::seeded("hi");
        transcript.set_text(5, "nope");
        transcript.set_text(0, "hello");
        assert_eq!(transcript.turns()[0].text, "hello");
    }

    #[test]
    fn display_time_is_hours_and_minutes() {
        let turn = Turn::user("x");
        let shown = turn.display_time();
        assert_eq!(shown.len(), 5);
        assert_eq!(&shown[2..3], ":");
    }

    #[test]
    fn author_displays_lowercase() {
        assert_eq!(Author::User.to_string(), "user");
        assert_eq!(Author::Bot.to_string(), "bot");
    }
}
