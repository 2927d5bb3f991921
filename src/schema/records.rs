use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use super::{ExampleHints, FieldSpec, Shape, blank_fields};
use crate::constants::{STYLE_REFERENCE, STYLE_TYPE};
use crate::error::StoryboardError;

/// Returns the value when it holds something other than whitespace.
pub(crate) fn specified(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// What the user knows about one scene. Every field may be left out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneInput {
    /// Who appears in the scene.
    #[serde(default)]
    pub characters: Option<String>,
    /// Setting or location.
    #[serde(default)]
    pub environment: Option<String>,
    /// Time of day the scene takes place.
    #[serde(default)]
    pub timing_of_day: Option<String>,
    /// How long the scene lasts.
    #[serde(default)]
    pub scene_duration: Option<String>,
    /// What the scene should achieve.
    #[serde(default)]
    pub scene_goal: Option<String>,
    /// Verbatim instructions that override everything the model would infer.
    #[serde(default)]
    pub user_recommendation: Option<String>,
}

/// Reads a number the pipeline overwrites after parsing.
///
/// Anything the model sends (missing, null, a string, garbage) becomes a
/// plain value instead of failing the whole record.
fn lenient_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_u64()
            .and_then(|number| u32::try_from(number).ok())
            .unwrap_or_default(),
        Value::String(text) => text.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

/// The override exactly as written, unless it is blank.
pub(crate) fn verbatim(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|value| !value.trim().is_empty())
}

impl SceneInput {
    /// The verbatim override, if the user wrote one.
    pub fn override_text(&self) -> Option<&str> {
        verbatim(&self.user_recommendation)
    }

    /// Input for a 1-based scene number, blank when the user gave none.
    pub fn for_scene(inputs: &[SceneInput], scene_number: u32) -> SceneInput {
        scene_number
            .checked_sub(1)
            .and_then(|idx| inputs.get(idx as usize))
            .cloned()
            .unwrap_or_default()
    }
}

/// The partially filled campaign the user submits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRequest {
    /// Name of the product being advertised.
    #[serde(default)]
    pub product_name: Option<String>,
    /// Features and benefits.
    #[serde(default)]
    pub product_description: Option<String>,
    /// Who the ad is for.
    #[serde(default)]
    pub target_audience: Option<String>,
    /// Unique value proposition.
    #[serde(default)]
    pub selling_point: Option<String>,
    /// Core message the ad carries.
    #[serde(default)]
    pub key_message: Option<String>,
    /// Total length of the ad.
    #[serde(default)]
    pub duration_of_ad: Option<String>,
    /// Emotional tone.
    #[serde(default)]
    pub tone: Option<String>,
    /// Brand awareness, launch, public information...
    #[serde(default)]
    pub purpose: Option<String>,
    /// Target country or market.
    #[serde(default)]
    pub country: Option<String>,
    /// Declared number of scenes.
    #[serde(default)]
    pub number_of_scenes: Option<u32>,
    /// Scene inputs, in order.
    #[serde(default)]
    pub scenes: Vec<SceneInput>,
}

impl CampaignRequest {
    /// Number of scenes the storyboard will have.
    ///
    /// A declared count has to agree with a non-empty scene list. With an
    /// empty list the declared count wins and the scenes start out blank.
    pub fn scene_count(&self) -> Result<u32, StoryboardError> {
        let listed = u32::try_from(self.scenes.len())
            .map_err(|_| StoryboardError::invalid_request("too many scenes"))?;
        let count = match self.number_of_scenes {
            Some(declared) if listed > 0 && declared != listed => {
                return Err(StoryboardError::invalid_request(format!(
                    "number_of_scenes is {declared} but {listed} scenes were given"
                )));
            }
            Some(declared) => declared,
            None => listed,
        };
        if count == 0 {
            return Err(StoryboardError::invalid_request(
                "at least one scene is required",
            ));
        }
        Ok(count)
    }
}

const AD_DETAILS_FIELDS: &[FieldSpec] = &[
    FieldSpec::text(
        "product_name",
        "Name of the product being advertised. If not provided, give the product a unique name based on its description, e.g. 'QuietBeats' for noise-cancelling headphones.",
    ),
    FieldSpec::text(
        "product_description",
        "Description of the product features and benefits, what it does and why it helps the target audience.",
    ),
    FieldSpec::text(
        "target_audience",
        "Target demographic for the advertisement, e.g. men with beards for beard oil. Add detail when appropriate.",
    ),
    FieldSpec::text(
        "selling_point",
        "Main selling point or unique value proposition, e.g. noise cancellation for noise-cancelling headphones.",
    ),
    FieldSpec::text(
        "key_message",
        "Core message conveyed by the advertisement, e.g. 'Isolate yourself from the world'.",
    ),
    FieldSpec::text(
        "duration_of_ad",
        "Total duration of the advertisement, derived from the scenes or the norm for this kind of product.",
    ),
    FieldSpec::text(
        "tone",
        "Emotional tone or mood of the advertisement.",
    ),
    FieldSpec::text(
        "purpose",
        "Purpose of the advertisement, e.g. brand awareness, product launch, informative campaign.",
    ),
    FieldSpec::text(
        "country",
        "Target country or market for the advertisement.",
    ),
    FieldSpec::integer("number_of_scenes", "Number of scenes").optional(),
];

/// Campaign details with every gap filled in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdDetails {
    /// Product name.
    pub product_name: String,
    /// Product description.
    pub product_description: String,
    /// Target audience.
    pub target_audience: String,
    /// Main selling point.
    pub selling_point: String,
    /// Core message.
    pub key_message: String,
    /// Total duration.
    pub duration_of_ad: String,
    /// Tone.
    pub tone: String,
    /// Purpose.
    pub purpose: String,
    /// Market.
    pub country: String,
    /// Scene count, always taken from the request.
    #[serde(default, deserialize_with = "lenient_number")]
    pub number_of_scenes: u32,
}

impl Shape for AdDetails {
    const NAME: &'static str = "AdDetails";

    fn fields() -> &'static [FieldSpec] {
        AD_DETAILS_FIELDS
    }

    fn example(hints: &ExampleHints) -> Value {
        json!({
            "product_name": "Product Name",
            "product_description": "Comprehensive product description",
            "target_audience": "Specific target demographic",
            "selling_point": "Main unique value proposition",
            "key_message": "Core message for the ad",
            "duration_of_ad": "Duration in seconds/minutes",
            "tone": "Emotional tone of the ad",
            "purpose": "Purpose of the advertisement",
            "country": "Target market",
            "number_of_scenes": hints.number_of_scenes.unwrap_or(1),
        })
    }

    fn validate(&self) -> Result<(), String> {
        blank_fields(&[
            ("product_name", self.product_name.as_str()),
            ("product_description", self.product_description.as_str()),
            ("target_audience", self.target_audience.as_str()),
            ("selling_point", self.selling_point.as_str()),
            ("key_message", self.key_message.as_str()),
            ("duration_of_ad", self.duration_of_ad.as_str()),
            ("tone", self.tone.as_str()),
            ("purpose", self.purpose.as_str()),
            ("country", self.country.as_str()),
        ])
    }
}

const SCENE_OUTPUT_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("scene_number", "Position of the scene in the ad, starting at 1").optional(),
    FieldSpec::text(
        "characters",
        "Characters who appear in the scene: age, profession and traits relevant to the ad, chosen to represent the target audience.",
    ),
    FieldSpec::text(
        "environment",
        "Setting or location aligned with the target audience's habits or product use, with visual and sensory details.",
    ),
    FieldSpec::text(
        "timing_of_day",
        "Time of day that complements the scene's mood and matches realistic usage.",
    ),
    FieldSpec::text(
        "scene_duration",
        "Duration of the scene in seconds, proportionate to the total ad length.",
    ),
    FieldSpec::text(
        "scene_goal",
        "Narrative or emotional goal of the scene, supporting the ad's overall purpose.",
    ),
    FieldSpec::text(
        "visuals",
        "Visual elements: environment details, character appearances, actions.",
    ),
    FieldSpec::text("camera_work", "Camera angles, movements and focus points."),
    FieldSpec::text("sound_design", "Music, effects, dialogue or narration."),
    FieldSpec::text("transition", "Transition to the next scene."),
];

/// A fully resolved scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOutput {
    /// 1-based position; always set from the scene's index.
    #[serde(default, deserialize_with = "lenient_number")]
    pub scene_number: u32,
    /// Characters.
    pub characters: String,
    /// Environment.
    pub environment: String,
    /// Time of day.
    pub timing_of_day: String,
    /// Duration.
    pub scene_duration: String,
    /// Goal.
    pub scene_goal: String,
    /// Visual elements.
    pub visuals: String,
    /// Camera work.
    pub camera_work: String,
    /// Sound design.
    pub sound_design: String,
    /// Transition to the next scene.
    pub transition: String,
    /// The user's verbatim override for this scene, carried forward from the
    /// scene input and never filled by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_recommendation: Option<String>,
}

impl Shape for SceneOutput {
    const NAME: &'static str = "SceneOutput";

    fn fields() -> &'static [FieldSpec] {
        SCENE_OUTPUT_FIELDS
    }

    fn example(hints: &ExampleHints) -> Value {
        json!({
            "scene_number": hints.scene_number.unwrap_or(1),
            "characters": "Detailed character descriptions",
            "environment": "Detailed environment description",
            "timing_of_day": "Specific time of day",
            "scene_duration": "Duration in seconds",
            "scene_goal": "Specific goal for this scene",
            "visuals": "Detailed visual elements description",
            "camera_work": "Camera angles and movements",
            "sound_design": "Music, effects, and dialogue",
            "transition": "Transition to the next scene",
        })
    }

    fn validate(&self) -> Result<(), String> {
        blank_fields(&[
            ("characters", self.characters.as_str()),
            ("environment", self.environment.as_str()),
            ("visuals", self.visuals.as_str()),
            ("camera_work", self.camera_work.as_str()),
            ("sound_design", self.sound_design.as_str()),
            ("transition", self.transition.as_str()),
        ])
    }
}

const CHARACTER_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", "Name of the character"),
    FieldSpec::text(
        "appearance",
        "Physical appearance of the character (e.g., age, skin tone, height)",
    ),
    FieldSpec::text("clothing", "Clothing worn by the character"),
    FieldSpec::text(
        "expression",
        "Facial expression or emotional state of the character",
    ),
];

/// One character inside an image or video prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDetail {
    /// Name.
    pub name: String,
    /// Age, skin tone, height and other physical traits.
    pub appearance: String,
    /// Outfit and accessories.
    pub clothing: String,
    /// Facial expression or emotional state.
    pub expression: String,
}

fn default_style_type() -> String {
    STYLE_TYPE.to_string()
}

fn default_style_reference() -> String {
    STYLE_REFERENCE.to_string()
}

/// Adjustments made when pinning the style fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleFixes {
    /// The model's style type, when it was replaced.
    pub replaced_type: Option<String>,
    /// Whether a blank style reference was filled with the default.
    pub filled_reference: bool,
}

fn pin_style(style_type: &mut String, style_reference: &mut String) -> StyleFixes {
    let mut fixes = StyleFixes::default();
    if style_type != STYLE_TYPE {
        let previous = std::mem::replace(style_type, default_style_type());
        if previous.trim() != STYLE_TYPE {
            fixes.replaced_type = Some(previous);
        }
    }
    if style_reference.trim().is_empty() {
        *style_reference = default_style_reference();
        fixes.filled_reference = true;
    }
    fixes
}

const TEXT_TO_IMAGE_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("scene_number", "Scene this prompt belongs to").optional(),
    FieldSpec::list(
        "characters",
        CHARACTER_FIELDS,
        "List of characters with their appearance, clothing, and expression",
    ),
    FieldSpec::text(
        "action",
        "Precise single-moment action using active verbs; one frozen instant, never a sequence",
    ),
    FieldSpec::text("environment_location", "Specific setting and key objects"),
    FieldSpec::text("environment_lighting", "Time of day and light quality"),
    FieldSpec::text("environment_details", "Notable atmospheric elements"),
    FieldSpec::text("style_type", "Must be exactly 'Photorealistic CGI'").optional(),
    FieldSpec::text(
        "style_technique",
        "Specific rendering technique, e.g. 'tilt-shift depth of field'",
    ),
    FieldSpec::text("style_reference", "Must be exactly 'Gregory Crewdson'").optional(),
];

/// Single-frame image generation prompt for one scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextToImagePrompt {
    /// Scene this prompt belongs to.
    #[serde(default, deserialize_with = "lenient_number")]
    pub scene_number: u32,
    /// Characters in the frame.
    pub characters: Vec<CharacterDetail>,
    /// The frozen instant.
    pub action: String,
    /// Location.
    pub environment_location: String,
    /// Lighting.
    pub environment_lighting: String,
    /// Atmospheric details.
    pub environment_details: String,
    /// Always "Photorealistic CGI".
    #[serde(default = "default_style_type")]
    pub style_type: String,
    /// Rendering technique.
    pub style_technique: String,
    /// Artistic reference.
    #[serde(default = "default_style_reference")]
    pub style_reference: String,
}

impl TextToImagePrompt {
    /// Forces the pinned style constants.
    pub fn pin_style(&mut self) -> StyleFixes {
        pin_style(&mut self.style_type, &mut self.style_reference)
    }
}

impl Shape for TextToImagePrompt {
    const NAME: &'static str = "TextToImagePrompt";

    fn fields() -> &'static [FieldSpec] {
        TEXT_TO_IMAGE_FIELDS
    }

    fn example(hints: &ExampleHints) -> Value {
        json!({
            "scene_number": hints.scene_number.unwrap_or(1),
            "characters": [
                {
                    "name": "Character Name",
                    "appearance": "Detailed appearance description",
                    "clothing": "Detailed clothing description",
                    "expression": "Specific facial expression"
                }
            ],
            "action": "Precise single-moment action",
            "environment_location": "Specific setting description",
            "environment_lighting": "Detailed lighting description",
            "environment_details": "Notable environmental elements",
            "style_type": STYLE_TYPE,
            "style_technique": "Specific rendering technique",
            "style_reference": STYLE_REFERENCE,
        })
    }

    fn validate(&self) -> Result<(), String> {
        blank_fields(&[
            ("action", self.action.as_str()),
            ("environment_location", self.environment_location.as_str()),
            ("style_technique", self.style_technique.as_str()),
        ])
    }
}

const IMAGE_TO_VIDEO_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("scene_number", "Scene this prompt belongs to").optional(),
    FieldSpec::list(
        "characters",
        CHARACTER_FIELDS,
        "List of characters with their appearance, clothing physics, and expression",
    ),
    FieldSpec::text(
        "action",
        "Timed action (0.5s-3s markers) with object interaction, motion FX and at least three keyframes",
    ),
    FieldSpec::text(
        "environment_location",
        "Foreground, midground and background layers with parallax and camera movement",
    ),
    FieldSpec::text("environment_lighting", "Dynamic lighting changes"),
    FieldSpec::text("environment_details", "Layered environment specifics"),
    FieldSpec::text("style_type", "Must be exactly 'Photorealistic CGI'").optional(),
    FieldSpec::text(
        "style_technique",
        "Specific animation technique, e.g. 'motion blur + smear frames'",
    ),
    FieldSpec::text("style_reference", "Must be exactly 'Gregory Crewdson'").optional(),
];

/// Motion annotated video prompt animating a scene's image prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageToVideoPrompt {
    /// Scene this prompt belongs to.
    #[serde(default, deserialize_with = "lenient_number")]
    pub scene_number: u32,
    /// Characters, with cloth and hair physics.
    pub characters: Vec<CharacterDetail>,
    /// Timed action.
    pub action: String,
    /// Layered location.
    pub environment_location: String,
    /// Lighting.
    pub environment_lighting: String,
    /// Layered details.
    pub environment_details: String,
    /// Always "Photorealistic CGI".
    #[serde(default = "default_style_type")]
    pub style_type: String,
    /// Animation technique.
    pub style_technique: String,
    /// Artistic reference.
    #[serde(default = "default_style_reference")]
    pub style_reference: String,
}

impl ImageToVideoPrompt {
    /// Forces the pinned style constants.
    pub fn pin_style(&mut self) -> StyleFixes {
        pin_style(&mut self.style_type, &mut self.style_reference)
    }
}

impl Shape for ImageToVideoPrompt {
    const NAME: &'static str = "ImageToVideoPrompt";

    fn fields() -> &'static [FieldSpec] {
        IMAGE_TO_VIDEO_FIELDS
    }

    fn example(hints: &ExampleHints) -> Value {
        json!({
            "scene_number": hints.scene_number.unwrap_or(1),
            "characters": [
                {
                    "name": "Character Name",
                    "appearance": "Age, body type with hair motion details",
                    "clothing": "Clothing with physics description",
                    "expression": "Expression with timing details"
                }
            ],
            "action": "Timed action with object interaction and motion FX",
            "environment_location": "FG/MG/BG with parallax details",
            "environment_lighting": "Dynamic lighting description",
            "environment_details": "Layered environment specifics",
            "style_type": STYLE_TYPE,
            "style_technique": "Specific animation technique",
            "style_reference": STYLE_REFERENCE,
        })
    }

    fn validate(&self) -> Result<(), String> {
        blank_fields(&[
            ("action", self.action.as_str()),
            ("environment_location", self.environment_location.as_str()),
            ("style_technique", self.style_technique.as_str()),
        ])
    }
}

/// Everything one run produces, index aligned by scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryboardOutput {
    /// Resolved campaign details.
    pub ad_details: AdDetails,
    /// Scenes 1..N.
    pub scenes: Vec<SceneOutput>,
    /// Image prompts, one per scene.
    pub txt2img_prompts: Vec<TextToImagePrompt>,
    /// Video prompts, one per scene.
    pub img2vid_prompts: Vec<ImageToVideoPrompt>,
}
