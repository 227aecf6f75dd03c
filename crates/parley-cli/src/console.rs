//! Interactive console driving a [`ChatSession`].

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use parley_config::ChatConfig;
use parley_core::ProviderKind;
use parley_session::ChatSession;
use tracing::debug;

const RULE: &str = "------------------------------";

/// Returns `true` for the accepted "yes" answers.
fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "s" | "si")
}

/// Line-oriented front-end over any reader and writer.
pub struct Console<R, W> {
    input: R,
    output: W,
    session: ChatSession,
    config_path: PathBuf,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, config_path: impl Into<PathBuf>) -> Self {
        Self {
            input,
            output,
            session: ChatSession::new(),
            config_path: config_path.into(),
        }
    }

    /// Runs setup and then the chat loop.
    ///
    /// A failed setup step is reported on the output and ends the run
    /// normally. Only I/O errors on the console itself are returned.
    pub async fn run(&mut self) -> io::Result<()> {
        self.print_banner()?;
        if self.setup().await? {
            self.chat_loop().await?;
        }
        Ok(())
    }

    fn print_banner(&mut self) -> io::Result<()> {
        let rule = "=".repeat(60);
        writeln!(self.output, "\n{rule}")?;
        writeln!(self.output, "PARLEY - multi-provider chat")?;
        writeln!(self.output, "{rule}")?;
        writeln!(self.output, "Supports OpenAI, Anthropic, Ollama, LM Studio and other compatible endpoints")?;
        writeln!(self.output, "{rule}\n")
    }

    async fn setup(&mut self) -> io::Result<bool> {
        let restored = match self.session.load_config(&self.config_path) {
            Ok(found) => found,
            Err(e) => {
                writeln!(self.output, "Could not load configuration: {e}")?;
                false
            }
        };

        let use_existing = restored && {
            writeln!(self.output, "Previous configuration loaded from {}", self.config_path.display())?;
            self.confirm("Use existing configuration? (y/n): ")?
        };

        let config = match use_existing {
            true => Some(self.session.config().clone()),
            false => self.prompt_config()?,
        };
        let Some(config) = config else {
            writeln!(self.output, "Configuration failed")?;
            return Ok(false);
        };
        if let Err(e) = self.session.configure(config) {
            writeln!(self.output, "Configuration failed: {e}")?;
            return Ok(false);
        }

        if let Err(e) = self.session.initialize_client() {
            writeln!(self.output, "Could not initialize the client: {e}")?;
            return Ok(false);
        }
        writeln!(
            self.output,
            "Provider {} configured for: {}",
            self.session.config().provider,
            self.session.config().base_url
        )?;

        writeln!(self.output, "Fetching available models...")?;
        match self.session.refresh_models().await {
            Ok(count) => writeln!(self.output, "Found {count} models")?,
            Err(e) => {
                writeln!(self.output, "Could not retrieve models: {e}")?;
                return Ok(false);
            }
        }

        if self.session.needs_model_selection() && !self.select_model()? {
            writeln!(self.output, "No model selected")?;
            return Ok(false);
        }

        writeln!(self.output, "Testing connection...")?;
        if let Err(e) = self.session.test_connection().await {
            writeln!(self.output, "Connection test failed: {e}")?;
            return Ok(false);
        }
        writeln!(self.output, "Connection OK")?;

        if self.confirm("Save this configuration? (y/n): ")? {
            match self.session.save_config(&self.config_path) {
                Ok(()) => writeln!(self.output, "Configuration saved to {}", self.config_path.display())?,
                Err(e) => writeln!(self.output, "Could not save configuration: {e}")?,
            }
        }

        Ok(true)
    }

    /// Asks for provider, endpoint, credential and sampling parameters.
    ///
    /// Returns `None` when a required credential is missing.
    fn prompt_config(&mut self) -> io::Result<Option<ChatConfig>> {
        writeln!(self.output, "ENDPOINT CONFIGURATION\n{RULE}")?;
        writeln!(self.output, "\nSelect the AI provider:")?;
        writeln!(self.output, "1. OpenAI (or compatible)")?;
        writeln!(self.output, "2. Anthropic Claude")?;

        let choice = self.prompt("\nProvider [1 or 2, default: 1]: ")?.unwrap_or_default();
        let kind = match choice.as_str() {
            "2" => ProviderKind::Anthropic,
            _ => ProviderKind::OpenAi,
        };

        let mut config = ChatConfig {
            provider: kind.as_str().to_string(),
            base_url: kind.default_base_url().to_string(),
            ..self.session.config().clone()
        };

        match kind {
            ProviderKind::OpenAi => {
                writeln!(self.output, "\nEnter the API base URL:")?;
                writeln!(self.output, "- OpenAI: https://api.openai.com/v1")?;
                writeln!(self.output, "- Ollama: http://localhost:11434/v1")?;
                writeln!(self.output, "- LM Studio: http://localhost:1234/v1")?;
                writeln!(self.output, "- Other: enter the full URL")?;
            }
            ProviderKind::Anthropic => {
                writeln!(self.output, "\nEnter the Anthropic API base URL:")?;
                writeln!(self.output, "- Anthropic: https://api.anthropic.com")?;
                writeln!(self.output, "- Custom endpoint: enter the full URL")?;
            }
        }
        let url = self
            .prompt(&format!("\nBase URL [default: {}]: ", config.base_url))?
            .unwrap_or_default();
        if !url.is_empty() {
            config.base_url = url;
        }

        writeln!(self.output, "\nEnter the API key for {kind}:")?;
        match kind {
            ProviderKind::Anthropic => writeln!(self.output, "- Anthropic: your Anthropic API key (required)")?,
            ProviderKind::OpenAi => {
                writeln!(self.output, "- OpenAI: your OpenAI API key")?;
                writeln!(self.output, "- Local endpoints: usually not needed (leave empty)")?;
            }
        }
        let api_key = self
            .prompt("API key [leave empty if not needed]: ")?
            .unwrap_or_default();
        if api_key.is_empty() && kind.requires_api_key() {
            writeln!(self.output, "An API key is required for {kind}")?;
            return Ok(None);
        }
        config.api_key = api_key;

        let temperature = self
            .prompt(&format!("Temperature [default: {}]: ", config.temperature))?
            .unwrap_or_default();
        if !temperature.is_empty() {
            match temperature.parse::<f32>() {
                Ok(value) => config.temperature = value,
                Err(_) => writeln!(self.output, "Invalid temperature, keeping {}", config.temperature)?,
            }
        }

        let max_tokens = self
            .prompt(&format!("Max tokens [default: {}]: ", config.max_tokens))?
            .unwrap_or_default();
        if !max_tokens.is_empty() {
            match max_tokens.parse::<u32>() {
                Ok(value) => config.max_tokens = value,
                Err(_) => writeln!(self.output, "Invalid max tokens, keeping {}", config.max_tokens)?,
            }
        }

        Ok(Some(config))
    }

    /// Lists the catalog and reads one ordinal.
    fn select_model(&mut self) -> io::Result<bool> {
        writeln!(self.output, "\nAVAILABLE MODELS\n{RULE}")?;
        let listing: Vec<String> = self
            .session
            .models()
            .iter()
            .enumerate()
            .map(|(i, model)| format!("{}. {}", i + 1, model))
            .collect();
        for line in &listing {
            writeln!(self.output, "{line}")?;
        }

        let answer = self
            .prompt(&format!("\nSelect a model (1-{}): ", listing.len()))?
            .unwrap_or_default();
        let Ok(ordinal) = answer.parse::<usize>() else {
            writeln!(self.output, "Enter a valid number")?;
            return Ok(false);
        };

        match self.session.select_model(ordinal) {
            Ok(model) => {
                let model = model.to_string();
                writeln!(self.output, "Model selected: {model}")?;
                Ok(true)
            }
            Err(e) => {
                writeln!(self.output, "{e}")?;
                Ok(false)
            }
        }
    }

    async fn chat_loop(&mut self) -> io::Result<()> {
        writeln!(self.output, "\nCHAT\n{RULE}")?;
        writeln!(self.output, "Model: {}", self.session.config().model)?;
        writeln!(self.output, "Endpoint: {}", self.session.config().base_url)?;
        writeln!(self.output, "Type 'quit' or 'exit' to leave")?;
        writeln!(self.output, "Type 'clear' to clear the history")?;
        writeln!(self.output, "Type 'config' to show the configuration")?;
        writeln!(self.output, "{RULE}")?;

        loop {
            let Some(line) = self.prompt("\nYou: ")? else {
                writeln!(self.output, "\nGoodbye!")?;
                return Ok(());
            };
            if line.is_empty() {
                continue;
            }

            match line.to_lowercase().as_str() {
                "quit" | "exit" => {
                    writeln!(self.output, "Goodbye!")?;
                    return Ok(());
                }
                "clear" => {
                    self.session.clear_history();
                    writeln!(self.output, "History cleared")?;
                    continue;
                }
                "config" => {
                    self.show_config()?;
                    continue;
                }
                _ => {}
            }

            write!(self.output, "AI: ")?;
            self.output.flush()?;
            match self.session.send_message(&line).await {
                Ok(reply) => writeln!(self.output, "{reply}")?,
                Err(e) => writeln!(self.output, "Could not get a response: {e}")?,
            }
            debug!("Transcript holds {} messages", self.session.history().len());
        }
    }

    fn show_config(&mut self) -> io::Result<()> {
        let config = self.session.config();
        writeln!(self.output, "\nCURRENT CONFIGURATION\n{RULE}")?;
        writeln!(self.output, "Provider: {}", config.provider)?;
        writeln!(self.output, "Endpoint: {}", config.base_url)?;
        writeln!(self.output, "Model: {}", config.model)?;
        writeln!(self.output, "Temperature: {}", config.temperature)?;
        writeln!(self.output, "Max tokens: {}", config.max_tokens)?;
        writeln!(self.output, "Messages in history: {}", self.session.history().len())?;
        writeln!(self.output, "{RULE}")
    }

    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        Ok(self.prompt(question)?.is_some_and(|answer| is_affirmative(&answer)))
    }

    /// Prints `label` and reads one trimmed line, or `None` at end of input.
    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;

        let mut line = String::new();
        match self.input.read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line.trim().to_string())),
        }
    }
}
