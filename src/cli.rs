//! Command-line interface definition for iconagent
//!
//! This module defines the CLI structure using clap's derive API.

use clap::Parser;

/// iconagent - find a valid logo image for a brand
///
/// Runs a tool-calling agent that searches for, validates and describes a
/// logo image, then prints an HTML `img` tag referencing it.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "iconagent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Override the backend from config (openai, azure_openai)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Override the maximum number of model turns
    #[arg(long)]
    pub max_turns: Option<usize>,

    /// Override the number of backend retries
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Override the sampling temperature (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Override the tool choice mode (auto, none, forced:<tool>)
    #[arg(long)]
    pub tool_choice: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Brand to find a logo for; multiple words are joined with spaces
    #[arg(value_name = "BRAND")]
    pub brand: Vec<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The brand text, or `None` when no words were given
    pub fn brand_text(&self) -> Option<String> {
        let words: Vec<&str> = self
            .brand
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }
}
