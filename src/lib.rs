pub mod assess;
pub mod config;
pub mod filter;
pub mod listings;
pub mod llm_adapter;
pub mod notifier;
pub mod pipeline;
pub mod retry;
pub mod seen_store;
pub mod types;

pub use assess::{Drafter, Scorer};
pub use config::Config;
pub use filter::{FilterConfig, FilterResult, FilterRule};
pub use listings::{FreelancerClient, ListingSource, QueryProfile};
pub use llm_adapter::{AnthropicClient, InferenceClient, MockInferenceClient};
pub use notifier::{Notifier, TelegramNotifier};
pub use pipeline::{PipelineConfig, ScoutPipeline};
pub use retry::RetryPolicy;
pub use seen_store::{MemorySeenStore, PgSeenStore, SeenStore};
pub use types::*;
