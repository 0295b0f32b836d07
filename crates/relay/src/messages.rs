use serde::{Deserialize, Deserializer, Serialize};

/// OpenAI-compatible chat completion request.
///
/// Generation controls are optional on the wire. An absent value and an
/// explicit zero are treated the same once the request is translated.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub(crate) struct ChatCompletionRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) model: String,
    #[serde(default)]
    pub(crate) messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub(crate) fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Chat message in OpenAI format.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub(crate) struct ChatMessage {
    pub(crate) role: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) content: String,
}

/// Reads an explicit `null` the same way as an absent string.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// The `object` discriminator of OpenAI responses.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub(crate) enum ObjectType {
    #[serde(rename = "chat.completion")]
    ChatCompletion,
    #[serde(rename = "chat.completion.chunk")]
    ChatCompletionChunk,
}

/// OpenAI-compatible chat completion response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct ChatCompletionResponse {
    pub(crate) id: String,
    pub(crate) object: ObjectType,
    pub(crate) created: i64,
    pub(crate) model: String,
    pub(crate) choices: Vec<ChatChoice>,
    pub(crate) usage: Usage,
}

/// Chat completion choice.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct ChatChoice {
    pub(crate) index: u32,
    pub(crate) message: ChatMessage,
    pub(crate) finish_reason: String,
}

/// Token usage information.
///
/// Gemini reports one token count per candidate and nothing for the prompt, so
/// `completion_tokens` mirrors `total_tokens` and `prompt_tokens` stays zero.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub(crate) struct Usage {
    pub(crate) prompt_tokens: u32,
    pub(crate) completion_tokens: u32,
    pub(crate) total_tokens: u32,
}

/// One event of a streaming chat completion.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct ChatCompletionChunk {
    pub(crate) id: String,
    pub(crate) object: ObjectType,
    pub(crate) created: i64,
    pub(crate) model: String,
    pub(crate) choices: Vec<ChatChoiceDelta>,
}

/// Streaming choice carrying a content delta.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct ChatChoiceDelta {
    pub(crate) index: u32,
    pub(crate) delta: ChatMessageDelta,
    /// `null` while the model is still generating.
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub(crate) struct ChatMessageDelta {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) content: String,
}
