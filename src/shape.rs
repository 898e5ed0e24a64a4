//! Result shapes: what kind of answer a call expects and how to read it back.
//!
//! Structured output on OpenAI-compatible endpoints only accepts object
//! schemas. Scalars (a `bool`, a `Vec<String>`, an enum) are therefore sent
//! wrapped in a one-field object named `ModelResponse` and unwrapped again
//! by the [`Extractor`] paired with the request.

use schemars::JsonSchema;
use serde_json::{json, Value};
use tracing::warn;

use crate::client::ClientError;
use crate::model::{AssistantMessage, ChatCompletion, JsonSchemaFormat, ResponseFormat};

/// Field holding the scalar inside the wrapper object.
pub const RESPONSE_FIELD: &str = "response";

/// Name of the wrapper object schema.
pub const WRAPPER_NAME: &str = "ModelResponse";

/// A named JSON Schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub schema: Value,
}

impl Schema {
    /// Wrap a hand-written schema. It is sent exactly as given.
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Derive the schema of `T`, tightened for strict structured output.
    pub fn for_type<T: JsonSchema>() -> Self {
        let mut schema = schemars::schema_for!(T).as_value().clone();
        if let Some(root) = schema.as_object_mut() {
            root.remove("$schema");
        }
        strictify(&mut schema);

        Self {
            name: schema_name(&T::schema_name()),
            schema,
        }
    }

    fn schema_type(&self) -> Option<&str> {
        self.schema.get("type").and_then(Value::as_str)
    }

    fn is_plain_string(&self) -> bool {
        let Some(map) = self.schema.as_object() else {
            return false;
        };
        self.schema_type() == Some("string")
            && map
                .keys()
                .all(|k| matches!(k.as_str(), "type" | "title" | "description"))
    }

    /// One-field object schema carrying this schema under [`RESPONSE_FIELD`].
    pub fn wrapped(&self) -> Schema {
        let mut inner = self.schema.clone();
        let defs = inner.as_object_mut().and_then(|map| {
            map.remove("$schema");
            map.remove("title");
            map.remove("$defs")
        });

        let mut wrapper = json!({
            "title": WRAPPER_NAME,
            "type": "object",
            "properties": { RESPONSE_FIELD: inner },
            "required": [RESPONSE_FIELD],
            "additionalProperties": false,
        });
        if let Some(defs) = defs {
            wrapper["$defs"] = defs;
        }

        Schema::new(WRAPPER_NAME, wrapper)
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: self.name.clone(),
                schema: self.schema.clone(),
                strict: true,
            },
        }
    }
}

/// The caller's declared expectation for what a call yields.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Shape {
    /// Free text, read from the first choice.
    #[default]
    Text,
    /// An object schema, sent as the response format as-is.
    Object(Schema),
    /// Any other schema, sent wrapped in a one-field object.
    Scalar(Schema),
}

impl Shape {
    pub fn text() -> Self {
        Shape::Text
    }

    pub fn object<T: JsonSchema>() -> Self {
        Shape::Object(Schema::for_type::<T>())
    }

    pub fn scalar<T: JsonSchema>() -> Self {
        Shape::Scalar(Schema::for_type::<T>())
    }

    /// Pick the shape for `T` from its derived schema.
    ///
    /// A bare string is [`Shape::Text`], an object is [`Shape::Object`] and
    /// everything else is [`Shape::Scalar`].
    pub fn of<T: JsonSchema>() -> Self {
        let schema = Schema::for_type::<T>();
        if schema.is_plain_string() {
            Shape::Text
        } else if schema.schema_type() == Some("object") {
            Shape::Object(schema)
        } else {
            Shape::Scalar(schema)
        }
    }

    /// Response format to request together with the extractor that reads it.
    pub fn plan(&self) -> (Option<ResponseFormat>, Extractor) {
        match self {
            Shape::Text => (None, Extractor::Text),
            Shape::Object(schema) => (Some(schema.response_format()), Extractor::Parsed),
            Shape::Scalar(schema) => (
                Some(schema.wrapped().response_format()),
                Extractor::Field(RESPONSE_FIELD),
            ),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Shape::Text => "text",
            Shape::Object(schema) | Shape::Scalar(schema) => &schema.name,
        }
    }
}

/// How to read the payload out of a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// First choice's text content.
    Text,
    /// First choice's content parsed as JSON.
    Parsed,
    /// One field of the parsed object.
    Field(&'static str),
}

impl Extractor {
    /// `Ok(None)` means the provider answered without usable content.
    pub fn extract(&self, completion: ChatCompletion) -> Result<Option<Value>, ClientError> {
        let Some(message) = completion.choices.into_iter().next().map(|c| c.message) else {
            return Ok(None);
        };

        match self {
            Extractor::Text => Ok(message.content.map(Value::String)),
            Extractor::Parsed => parse(message),
            Extractor::Field(field) => {
                Ok(parse(message)?.and_then(|mut v| v.get_mut(*field).map(Value::take)))
            }
        }
    }
}

fn parse(message: AssistantMessage) -> Result<Option<Value>, ClientError> {
    if let Some(refusal) = message.refusal {
        warn!(%refusal, "Model refused structured output");
        return Ok(None);
    }

    match message.content {
        Some(content) if !content.trim().is_empty() => Ok(Some(serde_json::from_str(&content)?)),
        _ => Ok(None),
    }
}

/// Require every property and forbid extra ones, recursively.
fn strictify(schema: &mut Value) {
    let Some(map) = schema.as_object_mut() else {
        return;
    };

    if let Some(Value::Object(props)) = map.get("properties") {
        let required = props.keys().cloned().map(Value::String).collect();
        map.insert("required".to_string(), Value::Array(required));
        map.insert("additionalProperties".to_string(), Value::Bool(false));
    }

    for key in ["properties", "$defs", "definitions"] {
        if let Some(Value::Object(children)) = map.get_mut(key) {
            children.values_mut().for_each(strictify);
        }
    }
    for key in ["anyOf", "allOf", "oneOf", "prefixItems"] {
        if let Some(Value::Array(children)) = map.get_mut(key) {
            children.iter_mut().for_each(strictify);
        }
    }
    for key in ["items", "additionalProperties"] {
        if let Some(child) = map.get_mut(key) {
            strictify(child);
        }
    }
}

fn schema_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(64)
        .collect();
    if name.is_empty() {
        WRAPPER_NAME.to_string()
    } else {
        name
    }
}
