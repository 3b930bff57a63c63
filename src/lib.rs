pub mod config;
pub mod error;
pub mod message;
pub mod services;
pub mod utils;
pub mod webhook;

pub use config::{EnvConfig, ResolvedEntry, SubentryConfig, SubentryKind, WebhookEntry};
pub use error::{ErrorKind, HookFlowError, Result};
pub use message::{ChatContent, ConversationTurn, Message, MessageRole};
pub use services::{
    AiTaskRunner, AudioCodec, AudioFormat, ConversationAgent, ConversationHost, ConversationInput,
    ConversationResponse, DynConversationHost, ExposedEntity, GenDataTaskResult, NoHost,
    SpeechMetadata, SpeechResult, SpeechResultState, SpeechToText, StaticHost,
};
pub use utils::{logging, validation};
pub use webhook::{
    AssistantDelta, Attachment, AuthConfig, AuthType, DeltaReconstructor, DeltaStream,
    EventStream, GenDataTask, PayloadBuilder, ResponseExtractor, StreamEvent, StreamFrameParser,
    WebhookClient,
};
