pub mod claude;
pub mod resolver;
pub mod types;

pub use claude::ClaudeClient;
pub use resolver::IntentResolver;
pub use types::ResolvedIntent;
