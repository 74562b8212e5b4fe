use crate::corpus::{CorpusError, Reply, ResponseCorpus};
use crate::engine::{DEFAULT_REVEAL_INTERVAL, RevealSettings, RevealUnit};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const BUILTIN_CORPUS: &str = include_str!("../assets/corpus.toml");
const CONFIG_FILE_NAME: &str = "corpus.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read chat config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse chat config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Corpus(#[from] CorpusError),
}

/// Chat configuration as written in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    pub greeting: String,
    pub fallback: String,
    #[serde(default)]
    pub reveal: RevealConfig,
    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevealConfig {
    #[serde(default)]
    pub unit: RevealUnit,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            unit: RevealUnit::default(),
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_REVEAL_INTERVAL.as_millis() as u64
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
    pub pattern: String,
    pub reply: ReplyConfig,
}

/// Either `reply = "text"` or `reply = { previous_contains, then, otherwise }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReplyConfig {
    Literal(String),
    Contextual {
        previous_contains: String,
        then: String,
        otherwise: String,
    },
}

impl ReplyConfig {
    fn to_reply(&self) -> Result<Reply, CorpusError> {
        match self {
            Self::Literal(text) => Ok(Reply::literal(text.clone())),
            Self::Contextual {
                previous_contains,
                then,
                otherwise,
            } => Reply::when_previous_contains(previous_contains, then.clone(), otherwise.clone()),
        }
    }
}

impl ChatConfig {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::parse(BUILTIN_CORPUS, Path::new("<built-in>"))
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?;
        Self::parse(&contents, path)
    }

    /// Uses `explicit` if given, else the per-user config file if it exists, else the built-in corpus.
    pub async fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_owned()),
            None => user_config_path().filter(|path| path.is_file()),
        };
        match path {
            Some(path) => {
                info!(path = %path.display(), "loading chat config");
                Self::load(&path).await
            }
            None => Self::builtin(),
        }
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn corpus(&self) -> Result<ResponseCorpus, CorpusError> {
        let corpus = self.entries.iter().try_fold(
            ResponseCorpus::new(&self.greeting, &self.fallback),
            |corpus, entry| corpus.entry(&entry.pattern, entry.reply.to_reply()?),
        )?;
        debug!(entries = corpus.entries().len(), "corpus built");
        Ok(corpus)
    }

    pub fn reveal_settings(&self) -> RevealSettings {
        RevealSettings {
            unit: self.reveal.unit,
            interval: Duration::from_millis(self.reveal.interval_ms),
        }
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_corpus_answers_portfolio_questions() {
        let config = ChatConfig::builtin().unwrap();
        let corpus = config.corpus().unwrap();

        assert!(corpus.greeting().starts_with("Hello! I'm Amit's chatbot."));
        assert!(
            corpus
                .respond("tell me your skills please", "")
                .starts_with("Amit is skilled in React")
        );
        assert!(corpus.respond("can you help", "").starts_with("I can help"));
        assert_eq!(corpus.respond("this is nice", ""), corpus.fallback());
        assert!(corpus.respond("contact", "how do i").contains("via email"));
        assert!(corpus.respond("contact", "").contains("contact details"));
        assert_eq!(config.reveal_settings(), RevealSettings::default());
    }

    #[test]
    fn builtin_corpus_prefers_topics_over_greetings() {
        let corpus = ChatConfig::builtin().unwrap().corpus().unwrap();
        let skills = corpus.respond("skills", "");
        assert_eq!(corpus.respond("hello, what are your skills?", ""), skills);
        assert!(corpus.respond("hello", "").starts_with("Hello! How can I help"));
        assert_eq!(corpus.respond("this", ""), corpus.fallback());
    }

    #[tokio::test]
    async fn loads_file_with_contextual_reply() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
greeting = "Hey"
fallback = "Dunno"

[reveal]
unit = "character"
interval_ms = 20

[[entries]]
pattern = "Contact"
reply = {{ previous_contains = "how", then = "A", otherwise = "B" }}

[[entries]]
pattern = "rust"
reply = "Crab"
"#
        )
        .unwrap();

        let config = ChatConfig::load(file.path()).await.unwrap();
        let settings = config.reveal_settings();
        assert_eq!(settings.unit, RevealUnit::Character);
        assert_eq!(settings.interval, Duration::from_millis(20));

        let corpus = config.corpus().unwrap();
        assert_eq!(corpus.entries().len(), 2);
        assert_eq!(corpus.respond("contact me", "how"), "A");
        assert_eq!(corpus.respond("contact me", "why"), "B");
        assert_eq!(corpus.respond("I like Rust", ""), "Crab");
    }

    #[test]
    fn reveal_section_is_optional() {
        let config = ChatConfig::parse(
            "greeting = \"g\"\nfallback = \"f\"\n",
            Path::new("inline.toml"),
        )
        .unwrap();
        assert!(config.entries.is_empty());
        assert_eq!(config.reveal_settings(), RevealSettings::default());
    }

    #[test]
    fn rejects_unknown_reveal_unit() {
        let err = ChatConfig::parse(
            "greeting = \"g\"\nfallback = \"f\"\n[reveal]\nunit = \"sentence\"\n",
            Path::new("bad.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn duplicate_patterns_fail_corpus_build() {
        let config = ChatConfig::parse(
            r#"
greeting = "g"
fallback = "f"
[[entries]]
pattern = "hi"
reply = "one"
[[entries]]
pattern = "HI"
reply = "two"
"#,
            Path::new("dup.toml"),
        )
        .unwrap();
        assert!(matches!(
            config.corpus(),
            Err(CorpusError::DuplicatePattern(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = ChatConfig::load(Path::new("/nonexistent/corpus.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[tokio::test]
    async fn discover_prefers_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "greeting = \"Explicit\"\nfallback = \"f\"\n").unwrap();
        let config = ChatConfig::discover(Some(file.path())).await.unwrap();
        assert_eq!(config.greeting, "Explicit");
    }
}
