mod config;
mod contact;
mod corpus;
mod engine;
mod logger;
mod repl;
mod turn;
mod widget;

use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;

use crate::config::ChatConfig;
use crate::contact::{ContactClient, ContactSubmission};
use crate::engine::{RevealSettings, RevealUnit};
use crate::widget::ChatWidget;

#[derive(Deserialize, Debug, Default)]
struct Environment {
    contact_relay_url: Option<String>,
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "portfolio-chat",
    about = "Portfolio assistant chat and contact form client"
)]
struct Args {
    /// Append logs to this file instead of printing warnings to stderr
    #[structopt(long)]
    log_file: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Chat with the portfolio assistant in the terminal
    Chat {
        #[structopt(flatten)]
        chat: ChatOptions,

        /// Start with the completion bell turned off
        #[structopt(long)]
        mute: bool,
    },
    /// Print the assistant's reply to a single question
    Ask {
        #[structopt(flatten)]
        chat: ChatOptions,

        /// The question to ask
        #[structopt(required = true)]
        question: Vec<String>,
    },
    /// Send a message through the contact form mail relay
    Contact {
        #[structopt(short, long)]
        name: String,

        #[structopt(short, long)]
        email: String,

        #[structopt(short, long)]
        message: String,

        /// Relay endpoint; defaults to $CONTACT_RELAY_URL
        #[structopt(long)]
        endpoint: Option<String>,
    },
}

#[derive(StructOpt, Debug)]
struct ChatOptions {
    /// Path to a corpus TOML file
    #[structopt(short = "c", long)]
    corpus: Option<PathBuf>,

    /// Reveal unit (word or character)
    #[structopt(short = "u", long)]
    unit: Option<RevealUnit>,

    /// Milliseconds between reveal steps
    #[structopt(long)]
    interval_ms: Option<u64>,
}

impl ChatOptions {
    async fn load(&self) -> anyhow::Result<(ChatConfig, RevealSettings)> {
        let config = ChatConfig::discover(self.corpus.as_deref())
            .await
            .context("Failed to load chat config")?;
        let mut settings = config.reveal_settings();
        if let Some(unit) = self.unit {
            settings.unit = unit;
        }
        if let Some(interval_ms) = self.interval_ms {
            settings.interval = Duration::from_millis(interval_ms);
        }
        Ok((config, settings))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let environment = envy::from_env::<Environment>().context("Failed to read environment")?;
    let args = Args::from_args();
    logger::init_tracing(args.log_file.as_deref())?;

    match args.command {
        Command::Chat { chat, mute } => {
            let (config, settings) = chat.load().await?;
            let corpus = config.corpus().context("Invalid chat corpus")?;
            repl::run(ChatWidget::new(Arc::new(corpus), settings, !mute)).await?;
        }
        Command::Ask { chat, question } => {
            let (config, _) = chat.load().await?;
            let corpus = config.corpus().context("Invalid chat corpus")?;
            if let Some(reply) = corpus.answer(&question.join(" ")) {
                println!("{reply}");
            }
        }
        Command::Contact {
            name,
            email,
            message,
            endpoint,
        } => {
            let endpoint = endpoint
                .or(environment.contact_relay_url)
                .context("No relay endpoint: pass --endpoint or set CONTACT_RELAY_URL")?;
            let submission = ContactSubmission::new(&name, &email, &message);

            println!("Sending…");
            let confirmation = ContactClient::new(endpoint)
                .send(&submission)
                .await
                .context("Contact form submission failed")?;
            println!("{confirmation}");
        }
    }

    Ok(())
}
