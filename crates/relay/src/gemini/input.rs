use serde::Serialize;

use super::output::{Content, Part, Role};
use crate::messages::ChatCompletionRequest;

/// Request body for the Gemini `generateContent` and `streamGenerateContent` calls.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    /// One turn per client message, in order.
    pub(crate) contents: Vec<Content>,
    pub(crate) generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) model: String,
}

/// Sampling controls. Zero means "let the model decide" and is left off the wire.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub(crate) temperature: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub(crate) top_p: f64,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub(crate) max_output_tokens: u32,
}

fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

impl From<&ChatCompletionRequest> for GenerateContentRequest {
    fn from(request: &ChatCompletionRequest) -> Self {
        let contents = request
            .messages
            .iter()
            .map(|message| Content {
                role: Some(if message.role.eq_ignore_ascii_case("assistant") {
                    Role::Model
                } else {
                    Role::User
                }),
                parts: vec![Part {
                    text: message.content.clone(),
                }],
            })
            .collect();

        let generation_config = GenerationConfig {
            temperature: request.temperature.unwrap_or_default(),
            top_p: request.top_p.unwrap_or_default(),
            max_output_tokens: request.max_tokens.unwrap_or_default(),
        };

        Self {
            contents,
            generation_config,
            model: request.model.clone(),
        }
    }
}
