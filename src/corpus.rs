use regex::Regex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Corpus pattern must not be empty")]
    EmptyPattern,

    #[error("Duplicate corpus pattern: `{0}`")]
    DuplicatePattern(String),

    #[error("Invalid corpus pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Lower-cases and trims user input before matching.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// A keyword or short phrase matched as whole words, case-insensitively.
///
/// Interior whitespace in the phrase matches any run of whitespace in the input, so
/// `"what can you do"` matches `"so,  what can you do?"` but `"hi"` does not match `"this"`.
#[derive(Debug, Clone)]
pub struct WordPattern {
    source: String,
    regex: Regex,
}

impl WordPattern {
    pub fn new(pattern: &str) -> Result<Self, CorpusError> {
        let words: Vec<_> = pattern.split_whitespace().map(str::to_lowercase).collect();
        if words.is_empty() {
            return Err(CorpusError::EmptyPattern);
        }

        let source = words.join(" ");
        let body = words
            .iter()
            .map(|word| regex::escape(word))
            .collect::<Vec<_>>()
            .join(r"\s+");
        let regex = Regex::new(&format!(r"(?i)(?:^|\W){body}(?:\W|$)")).map_err(|source| {
            CorpusError::InvalidPattern {
                pattern: pattern.to_owned(),
                source,
            }
        })?;

        Ok(Self { source, regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// How a corpus entry produces its reply text.
#[derive(Clone)]
pub enum Reply {
    Literal(String),
    /// Receives the previous normalized user query (empty at session start).
    Contextual(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl Reply {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn contextual(rule: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::Contextual(Arc::new(rule))
    }

    /// Picks `then` when the previous query contains `word` as a whole word, else `otherwise`.
    pub fn when_previous_contains(
        word: &str,
        then: impl Into<String>,
        otherwise: impl Into<String>,
    ) -> Result<Self, CorpusError> {
        let trigger = WordPattern::new(word)?;
        let then = then.into();
        let otherwise = otherwise.into();
        Ok(Self::contextual(move |previous| {
            if trigger.is_match(previous) {
                then.clone()
            } else {
                otherwise.clone()
            }
        }))
    }

    pub fn resolve(&self, previous_query: &str) -> String {
        match self {
            Self::Literal(text) => text.clone(),
            Self::Contextual(rule) => rule(previous_query),
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Contextual(_) => f.write_str("Contextual(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub pattern: WordPattern,
    pub reply: Reply,
}

/// Ordered keyword rules plus the greeting and fallback texts. The first matching entry wins.
#[derive(Debug, Clone)]
pub struct ResponseCorpus {
    greeting: String,
    fallback: String,
    entries: Vec<CorpusEntry>,
}

impl ResponseCorpus {
    pub fn new(greeting: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
            fallback: fallback.into(),
            entries: Vec::new(),
        }
    }

    /// Appends an entry with the lowest precedence so far.
    pub fn entry(mut self, pattern: &str, reply: Reply) -> Result<Self, CorpusError> {
        let pattern = WordPattern::new(pattern)?;
        if self
            .entries
            .iter()
            .any(|entry| entry.pattern.as_str() == pattern.as_str())
        {
            return Err(CorpusError::DuplicatePattern(pattern.as_str().to_owned()));
        }
        self.entries.push(CorpusEntry { pattern, reply });
        Ok(self)
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn find(&self, input: &str) -> Option<&CorpusEntry> {
        let query = normalize(input);
        self.entries
            .iter()
            .find(|entry| entry.pattern.is_match(&query))
    }

    /// One-off reply without conversation context. Blank input gets no reply.
    pub fn answer(&self, input: &str) -> Option<String> {
        if normalize(input).is_empty() {
            debug!("ignoring blank question");
            return None;
        }
        Some(self.respond(input, ""))
    }

    /// Resolves the reply for `input`, falling back when no pattern matches.
    pub fn respond(&self, input: &str, previous_query: &str) -> String {
        match self.find(input) {
            Some(entry) => {
                debug!(pattern = entry.pattern.as_str(), "corpus match");
                entry.reply.resolve(previous_query)
            }
            None => {
                debug!("no corpus match, using fallback");
                self.fallback().to_owned()
            }
        }
    }
}
