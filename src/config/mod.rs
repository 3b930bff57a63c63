pub mod env;
pub mod subentry;

pub use env::EnvConfig;
pub use subentry::{
    ResolvedEntry, SubentryConfig, SubentryKind, WebhookEntry, DEFAULT_OUTPUT_FIELD,
    DEFAULT_PROMPT, DEFAULT_STREAMING_END_VALUE, DEFAULT_TIMEOUT_SECS,
};
