use serde::{Deserialize, Serialize};

use crate::{
    error::RelayError,
    messages::{
        ChatChoice, ChatChoiceDelta, ChatCompletionChunk, ChatCompletionResponse, ChatMessage, ChatMessageDelta,
        ObjectType, Usage,
    },
    stamp::ResponseStamp,
};

/// Model name reported in non-streaming responses.
pub(crate) const CONVERTED_MODEL: &str = "gemini-converted";

/// Response body of `generateContent`, and of each `streamGenerateContent` event.
///
/// See the [Google AI API Reference](https://ai.google.dev/api/generate-content#generatecontentresponse).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    /// Absent when the prompt itself was blocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) candidates: Option<Vec<Candidate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub(crate) content: Content,
    #[serde(default)]
    pub(crate) finish_reason: String,
    #[serde(default)]
    pub(crate) index: u32,
    #[serde(default)]
    pub(crate) token_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) safety_ratings: Vec<SafetyRating>,
}

impl Candidate {
    /// Text of the first part, empty when the candidate carries none.
    fn first_text(&self) -> &str {
        self.content.parts.first().map(|part| part.text.as_str()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) block_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct SafetyRating {
    pub(crate) category: String,
    pub(crate) probability: String,
}

/// A conversation turn.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub(crate) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<Role>,
    #[serde(default)]
    pub(crate) parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub(crate) struct Part {
    #[serde(default)]
    pub(crate) text: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Model,
    /// Roles this proxy never sends but may read back.
    #[serde(untagged)]
    Other(String),
}

impl GenerateContentResponse {
    /// Converts a complete response into the OpenAI shape.
    pub(crate) fn into_completion(self, stamp: ResponseStamp) -> crate::Result<ChatCompletionResponse> {
        let Some(candidates) = self.candidates else {
            let reason = self
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .map(|reason| format!(" (prompt blocked: {reason})"))
                .unwrap_or_default();

            return Err(RelayError::Mapping(format!("Gemini response has no candidates{reason}")));
        };

        let total_tokens = candidates
            .iter()
            .fold(0u32, |sum, candidate| sum.saturating_add(candidate.token_count));

        let choices = candidates
            .iter()
            .map(|candidate| ChatChoice {
                index: candidate.index,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: candidate.first_text().to_string(),
                },
                finish_reason: candidate.finish_reason.clone(),
            })
            .collect();

        Ok(ChatCompletionResponse {
            id: stamp.id,
            object: ObjectType::ChatCompletion,
            created: stamp.created,
            model: CONVERTED_MODEL.to_string(),
            choices,
            usage: Usage {
                prompt_tokens: 0,
                completion_tokens: total_tokens,
                total_tokens,
            },
        })
    }

    /// Converts one streaming event into a chunk for `model`.
    ///
    /// Only the first candidate is relayed, always as choice 0. Returns `None`
    /// when the event has no candidate at all.
    pub(crate) fn into_chunk(self, model: &str, stamp: ResponseStamp) -> Option<ChatCompletionChunk> {
        let candidate = self.candidates?.into_iter().next()?;

        let content = candidate.first_text().to_string();
        let finish_reason = Some(candidate.finish_reason).filter(|reason| !reason.is_empty());

        Some(ChatCompletionChunk {
            id: stamp.id,
            object: ObjectType::ChatCompletionChunk,
            created: stamp.created,
            model: model.to_string(),
            choices: vec![ChatChoiceDelta {
                index: 0,
                delta: ChatMessageDelta { content },
                finish_reason,
            }],
        })
    }
}
