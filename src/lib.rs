//! iconagent - tool-calling agent that finds a brand's logo
//!
//! This library drives a language model through a bounded loop of model
//! turns and tool calls until it produces an HTML `img` tag referencing a
//! validated logo image.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `agent`: Transcript types, loop controller and final answer extraction
//! - `providers`: Completion backend abstraction (OpenAI, Azure OpenAI)
//! - `tools`: Capability contracts, registry, dispatcher and capabilities
//! - `prompts`: Goal text for a brand
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use iconagent::agent::Agent;
//! use iconagent::providers::create_provider;
//! use iconagent::tools::ToolRegistryBuilder;
//! use iconagent::{prompts, Config};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let provider = create_provider(&config.provider, None)?;
//!     let registry = ToolRegistryBuilder::new(Arc::clone(&provider))
//!         .with_tools_config(config.tools.clone())
//!         .build()?;
//!     let agent = Agent::new(provider, Arc::new(registry), config.agent, &config.tools)?;
//!
//!     let answer = agent.find(prompts::build_goal("Acme Corp")).await?;
//!     println!("{}", answer.to_html());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod tools;

// Re-export commonly used types
pub use agent::{Agent, AgentRun, FinalAnswer, TerminalState};
pub use config::Config;
pub use error::{IconAgentError, Result};
