pub mod claude_cli;
pub mod context;
pub mod error;
pub mod expert;
pub mod graph;
pub mod group;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod review;
pub mod search;
pub mod synthesis;

pub mod test_support;

pub use claude_cli::{ClaudeCliConfig, ClaudeCliModel};
pub use context::{Collaborators, PipelineSettings, RunContext};
pub use error::AgentError;
pub use graph::{execute, NodeId, NodeRunner, TaskGraph};
pub use llm::LanguageModel;
pub use openai::{OpenAiConfig, OpenAiModel};
pub use orchestrator::Orchestrator;
pub use prompts::default_roster;
pub use search::{build_search_provider, CachedSearch, DuckDuckGoSearch, SearchProvider, TavilySearch};
