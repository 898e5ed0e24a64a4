//! Roles, messages and the chat-completion wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Developer,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Producer of role sequences for message assembly.
///
/// Every call to [`Roles::iter`] starts a fresh sequence, so the same value
/// can be reused across calls and retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Roles {
    /// `system` for the first message, `user` for every message after it.
    #[default]
    Conversation,
    /// Exactly these roles, in order. Contents past the end are dropped.
    Fixed(Vec<Role>),
}

impl Roles {
    pub fn iter(&self) -> Box<dyn Iterator<Item = Role> + '_> {
        match self {
            Roles::Conversation => {
                Box::new(std::iter::once(Role::System).chain(std::iter::repeat(Role::User)))
            }
            Roles::Fixed(roles) => Box::new(roles.iter().copied()),
        }
    }
}

/// Pair roles with contents positionally.
///
/// Pairing stops as soon as either side runs out; contents that are `None`
/// are dropped together with the role they were paired with.
pub fn assemble<'a, R, C>(contents: C, roles: R) -> Vec<Message>
where
    R: IntoIterator<Item = Role>,
    C: IntoIterator<Item = &'a Option<String>>,
{
    roles
        .into_iter()
        .zip(contents)
        .filter_map(|(role, content)| content.as_ref().map(|c| Message::new(role, c.clone())))
        .collect()
}

// --- Request Types ---

/// OpenAI-compatible chat-completion request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// Structured-output constraint attached to a request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonSchema { json_schema: JsonSchemaFormat },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub schema: Value,
    pub strict: bool,
}

// --- Response Types ---

/// Raw chat-completion response.
///
/// Providers occasionally answer with a body that carries no choices at all;
/// that deserializes to an empty `choices` list rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// A completion whose first choice carries `content` (or nothing).
    pub fn with_content(content: Option<String>) -> Self {
        Self {
            choices: vec![Choice {
                index: 0,
                message: AssistantMessage {
                    role: Some(Role::Assistant),
                    content,
                    refusal: None,
                },
                finish_reason: Some(FinishReason::Stop),
            }],
            ..Default::default()
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::with_content(Some(content.into()))
    }

    /// Message of the first choice, if any.
    pub fn first_message(&self) -> Option<&AssistantMessage> {
        self.choices.first().map(|c| &c.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: AssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

/// Reason for finishing the response generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    #[serde(other)]
    Other,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_assemble_drops_missing_content() {
        let contents = vec![some("sys"), None, some("hi")];
        let roles = vec![Role::System, Role::User, Role::User];

        let messages = assemble(&contents, roles);
        assert_eq!(
            messages,
            vec![Message::new(Role::System, "sys"), Message::new(Role::User, "hi")]
        );
    }

    #[test]
    fn test_assemble_truncates_to_shorter_side() {
        let contents = vec![some("a"), some("b"), some("c")];

        let messages = assemble(&contents, vec![Role::System, Role::User]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "b");

        let messages = assemble(&contents[..1], vec![Role::Developer, Role::User, Role::User]);
        assert_eq!(messages, vec![Message::new(Role::Developer, "a")]);
    }

    #[test]
    fn test_conversation_roles() {
        let roles: Vec<Role> = Roles::Conversation.iter().take(4).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::User, Role::User]);

        // Restarts on every call.
        assert_eq!(Roles::Conversation.iter().next(), Some(Role::System));
    }

    #[test]
    fn test_conversation_roles_with_missing_instructions() {
        let contents = vec![None, some("only content")];
        let messages = assemble(&contents, Roles::Conversation.iter());
        assert_eq!(messages, vec![Message::new(Role::User, "only content")]);
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "google/gemini-2.5-flash".to_string(),
            messages: vec![Message::new(Role::System, "be brief")],
            max_completion_tokens: 16,
            response_format: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "google/gemini-2.5-flash",
                "messages": [{"role": "system", "content": "be brief"}],
                "max_completion_tokens": 16
            })
        );

        let request = ChatRequest {
            response_format: Some(ResponseFormat::JsonSchema {
                json_schema: JsonSchemaFormat {
                    name: "Answer".to_string(),
                    schema: json!({"type": "object"}),
                    strict: true,
                },
            }),
            ..request
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["response_format"],
            json!({
                "type": "json_schema",
                "json_schema": {"name": "Answer", "schema": {"type": "object"}, "strict": true}
            })
        );
    }

    #[test]
    fn test_completion_deserialization() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "gen-1",
            "model": "openai/gpt-4o",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Paris"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        }))
        .unwrap();

        assert_eq!(completion.first_message().unwrap().content.as_deref(), Some("Paris"));
        assert_eq!(completion.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage.unwrap().total_tokens, 11);
    }

    #[test]
    fn test_completion_without_choices() {
        let completion: ChatCompletion =
            serde_json::from_value(json!({"id": "gen-2", "provider": "x"})).unwrap();
        assert!(completion.first_message().is_none());
    }

    #[test]
    fn test_unknown_finish_reason() {
        let reason: FinishReason = serde_json::from_value(json!("error")).unwrap();
        assert_eq!(reason, FinishReason::Other);
    }
}
