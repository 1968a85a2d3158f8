use bytes::Bytes;
use llm_core::Message;

use crate::error::ApiError;

/// Maximum length of a typed message
const MAX_TEXT_LENGTH: usize = 5000;
/// Maximum number of prior turns we forward to the model
const MAX_HISTORY: usize = 100;

/// A multipart field, detached from the request body.
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormField {
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            content_type: None,
            data: Bytes::copy_from_slice(value.as_bytes()),
        }
    }

    pub fn file(name: &str, file_name: &str, content_type: &str, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: Some(content_type.to_string()),
            data: data.into(),
        }
    }
}

/// What the user said: typed text or a recording.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    Text(String),
    Audio {
        data: Bytes,
        file_name: String,
        content_type: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRequest {
    pub input: UserInput,
    pub history: Vec<Message>,
}

/// Validate the fields of a voice request.
///
/// Exactly one non-empty `input` (text or file) is required; every `message`
/// field must be a JSON `{role, content}` object with role `user` or
/// `assistant`. Unknown fields are ignored.
pub fn parse_voice_form(fields: Vec<FormField>) -> Result<VoiceRequest, ApiError> {
    let mut input = None;
    let mut history = Vec::new();

    for field in fields {
        match field.name.as_str() {
            "input" => {
                if input.is_some() {
                    return Err(ApiError::InvalidRequest("input given more than once".into()));
                }
                input = Some(parse_input(field)?);
            }
            "message" => {
                let message: Message = serde_json::from_slice(&field.data)
                    .map_err(|e| ApiError::InvalidRequest(format!("Invalid message: {e}")))?;
                history.push(message);
            }
            _ => {}
        }
    }

    if history.len() > MAX_HISTORY {
        return Err(ApiError::InvalidRequest(format!(
            "Too many messages (max {})",
            MAX_HISTORY
        )));
    }

    let input = input.ok_or_else(|| ApiError::InvalidRequest("input is required".into()))?;
    Ok(VoiceRequest { input, history })
}

fn parse_input(field: FormField) -> Result<UserInput, ApiError> {
    if field.data.is_empty() {
        return Err(ApiError::InvalidRequest("input cannot be empty".into()));
    }

    match field.file_name {
        Some(file_name) => Ok(UserInput::Audio {
            data: field.data,
            file_name,
            content_type: field
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        }),
        None => {
            let text = String::from_utf8(field.data.to_vec())
                .map_err(|_| ApiError::InvalidRequest("input is not valid UTF-8".into()))?;
            if text.chars().count() > MAX_TEXT_LENGTH {
                return Err(ApiError::InvalidRequest(format!(
                    "Text too long (max {} characters)",
                    MAX_TEXT_LENGTH
                )));
            }
            Ok(UserInput::Text(text))
        }
    }
}
