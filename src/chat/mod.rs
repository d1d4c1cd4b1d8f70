//! Role-play practice conversations.
//!
//! A static catalog of scenarios (each with a named character) and practice
//! languages, plus the Completion Service client that turns a message list
//! into the character's next reply.

pub mod completion;
pub mod scenarios;

pub use completion::{ChatMessage, CompletionProvider, OpenAiCompletion};
pub use scenarios::{
    find_language, find_scenario, system_prompt, Language, Scenario, LANGUAGES, SCENARIOS,
};
