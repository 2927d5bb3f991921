//! Record shapes the models are asked to fill, and the parse side of the
//! contract.
//!
//! Each shape carries a static field table ([`FieldSpec`]) that is rendered
//! into the format instructions sent with every prompt, so the description
//! the model sees and the struct serde parses into live next to each other.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::ParseError;

mod records;

pub use records::{
    AdDetails, CampaignRequest, CharacterDetail, ImageToVideoPrompt, SceneInput, SceneOutput,
    StoryboardOutput, StyleFixes, TextToImagePrompt,
};
pub(crate) use records::{specified, verbatim};

/// Semantic type of a field.
#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Whole number.
    Integer,
    /// List of nested records with the given fields.
    List(&'static [FieldSpec]),
}

/// One entry in a shape's field table.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    /// JSON key.
    pub name: &'static str,
    /// Semantic type.
    pub kind: FieldKind,
    /// What the model should put there.
    pub description: &'static str,
    /// Whether the model has to supply it. Optional fields have a default.
    pub required: bool,
}

impl FieldSpec {
    /// A required text field.
    pub const fn text(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            description,
            required: true,
        }
    }

    /// A required integer field.
    pub const fn integer(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Integer,
            description,
            required: true,
        }
    }

    /// A required list of nested records.
    pub const fn list(
        name: &'static str,
        fields: &'static [FieldSpec],
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind: FieldKind::List(fields),
            description,
            required: true,
        }
    }

    /// Marks the field as defaulted when missing.
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Values the reinforced retry example is anchored to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExampleHints {
    /// Scene the record belongs to.
    pub scene_number: Option<u32>,
    /// Scene count of the campaign.
    pub number_of_scenes: Option<u32>,
}

impl ExampleHints {
    /// Hints for a per-scene record.
    pub fn scene(scene_number: u32) -> Self {
        Self {
            scene_number: Some(scene_number),
            number_of_scenes: None,
        }
    }
}

/// A record type the models can be asked to produce.
pub trait Shape: Serialize + DeserializeOwned + Send {
    /// Name used in instructions and errors.
    const NAME: &'static str;

    /// Field table, in the order the model should emit them.
    fn fields() -> &'static [FieldSpec];

    /// Fully populated example instance, used by the reinforced retry.
    fn example(hints: &ExampleHints) -> Value;

    /// Checks beyond what serde enforces.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Result of running the parse capability over raw model text.
#[derive(Debug)]
pub enum ParseOutcome<T> {
    /// The text held a conforming record.
    Parsed(T),
    /// It didn't.
    Invalid(ParseError),
}

fn field_schema(field: &FieldSpec) -> Value {
    match field.kind {
        FieldKind::Text => json!({"type": "string", "description": field.description}),
        FieldKind::Integer => json!({"type": "integer", "description": field.description}),
        FieldKind::List(fields) => json!({
            "type": "array",
            "description": field.description,
            "items": object_schema(fields),
        }),
    }
}

fn object_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.to_string(), field_schema(field));
        if field.required {
            required.push(Value::String(field.name.to_string()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// JSON schema of a shape, built from its field table.
pub fn json_schema<T: Shape>() -> Value {
    let mut schema = object_schema(T::fields());
    if let Some(object) = schema.as_object_mut() {
        object.insert("title".to_string(), Value::String(T::NAME.to_string()));
    }
    schema
}

/// Textual contract embedded in prompts: what JSON the model must return.
pub fn format_instructions<T: Shape>() -> String {
    let schema = serde_json::to_string_pretty(&json_schema::<T>())
        .unwrap_or_else(|_| json_schema::<T>().to_string());
    format!(
        "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\
\n\
As an example, for the schema {{\"properties\": {{\"foo\": {{\"title\": \"Foo\", \"description\": \"a list of strings\", \"type\": \"array\", \"items\": {{\"type\": \"string\"}}}}}}, \"required\": [\"foo\"]}}\n\
the object {{\"foo\": [\"bar\", \"baz\"]}} is a well-formatted instance of the schema. The object {{\"properties\": {{\"foo\": [\"bar\", \"baz\"]}}}} is not well-formatted.\n\
\n\
Here is the output schema:\n\
```\n\
{schema}\n\
```"
    )
}

/// Finds the JSON object in a model response.
///
/// Models like to wrap answers in markdown fences or chat around them, so this
/// prefers a fenced block and otherwise takes the outermost braces.
pub fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|idx| idx + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            let candidate = body[..end].trim();
            if candidate.starts_with('{') {
                return Some(candidate);
            }
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// The parse capability: raw model text in, record or reason out.
pub fn parse_record<T: Shape>(raw: &str) -> ParseOutcome<T> {
    let Some(json_text) = extract_json(raw) else {
        return ParseOutcome::Invalid(ParseError::new(T::NAME, "no JSON object found"));
    };
    let record: T = match serde_json::from_str(json_text) {
        Ok(record) => record,
        Err(err) => return ParseOutcome::Invalid(ParseError::new(T::NAME, err.to_string())),
    };
    match record.validate() {
        Ok(()) => ParseOutcome::Parsed(record),
        Err(reason) => ParseOutcome::Invalid(ParseError::new(T::NAME, reason)),
    }
}

/// Lists required text fields that came back blank.
pub(crate) fn blank_fields(fields: &[(&'static str, &str)]) -> Result<(), String> {
    let blank: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if blank.is_empty() {
        Ok(())
    } else {
        Err(format!("empty fields: {}", blank.join(", ")))
    }
}
