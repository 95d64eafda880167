//! Narrative synthesizers: remote chat-completions client and offline template.

mod http;
mod template;

pub use http::{HttpNarrative, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use template::TemplateNarrative;
