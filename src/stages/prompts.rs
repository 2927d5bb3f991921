use futures::{StreamExt, TryStreamExt, stream};
use tracing::{info, warn};

use crate::completion::TextCompletion;
use crate::constants::{STYLE_REFERENCE, STYLE_TYPE};
use crate::error::{GenerationError, Stage, StoryboardError};
use crate::schema::{
    CharacterDetail, ImageToVideoPrompt, SceneOutput, StyleFixes, TextToImagePrompt, verbatim,
};
use crate::structured::{GenerationTarget, InstructionBody, StructuredGenerator};

fn visual_override_section(recommendation: Option<&str>, medium: &str) -> String {
    match recommendation {
        Some(text) => format!(
            "USER VISUAL INSTRUCTIONS (MUST FOLLOW EXACTLY):
{text}

RULES:
1. These visual descriptions take PRECEDENCE over all generated content
2. Translate them DIRECTLY into the {medium} prompt without modification
3. Ensure all prompt sections align with these instructions
"
        ),
        None => String::new(),
    }
}

fn scene_override(scene: &SceneOutput) -> Option<&str> {
    verbatim(&scene.user_recommendation)
}

/// Instruction body for a scene's still image prompt.
pub fn text_to_image_instructions(scene: &SceneOutput) -> InstructionBody {
    let n = scene.scene_number;
    let head = format!(
        "Create a detailed text-to-image prompt for Scene {n} following this EXACT format:\n"
    );
    let tail = format!(
        "

TEXT-TO-IMAGE PROMPT FOR SCENE {n}:
CHARACTERS:
[For each character in the scene]
- Character Name: [Character Name]
- Appearance: [age, gender, distinctive physical features]
- Clothing: [detailed outfit description + accessories]
- Expression: [specific emotion + facial details]

ACTION:
- [Precise single-moment action using active verbs]
- *Example:* \"Right hand gripping sword hilt while left arm shields face\"

ENVIRONMENT:
- Location: [specific setting + key objects]
- Lighting: [time of day + light quality]
- Details: [notable atmospheric elements]

STYLE:
- Type: {STYLE_TYPE} (MUST USE THIS EXACTLY)
- Technique: [specific rendering technique like \"tilt-shift depth of field\"]
- Reference: {STYLE_REFERENCE} (MUST USE THIS EXACTLY)

---

Scene Details to Incorporate:
- Characters: {characters}
- Environment: {environment}
- Time of Day: {timing_of_day}
- Visuals: {visuals}
- Camera Work: {camera_work}

{priority}
STRICT RULES:
1. NEVER merge categories - keep CHARACTERS/ACTION/ENVIRONMENT/STYLE strictly separated
2. The prompt must describe a SINGLE frozen moment (no sequential actions)
3. Prioritize atomic details (e.g. \"frayed red shoelace on left boot\")
4. If user instructions exist, implement them exactly as provided
5. Use active voice and specific visual descriptors
6. For scenes with multiple characters, include ALL characters with separate Appearance, Clothing, and Expression fields
7. Format each character's details on separate lines as shown in the CHARACTER section",
        characters = scene.characters,
        environment = scene.environment,
        timing_of_day = scene.timing_of_day,
        visuals = scene.visuals,
        camera_work = scene.camera_work,
        priority = visual_override_section(scene_override(scene), "image"),
    );
    InstructionBody::slotted(head, tail)
}

fn character_line(character: &CharacterDetail) -> String {
    format!(
        "Character Name: {}, Appearance: {}, Clothing: {}, Expression: {}",
        character.name, character.appearance, character.clothing, character.expression
    )
}

/// Instruction body for a scene's video prompt, grounded in its image prompt.
pub fn image_to_video_instructions(
    scene: &SceneOutput,
    image: &TextToImagePrompt,
) -> InstructionBody {
    let n = scene.scene_number;
    let image_characters = image
        .characters
        .iter()
        .map(character_line)
        .collect::<Vec<_>>()
        .join(", ");
    let head = format!(
        "Create a detailed image-to-video prompt for Scene {n} following this EXACT format:\n"
    );
    let tail = format!(
        "

IMAGE-TO-VIDEO PROMPT FOR SCENE {n}:
CHARACTER:
[For each character in the scene]
- Character Name: [Character Name]
- Appearance: [age, gender, distinctive physical features]
- Clothing: [detailed outfit description + accessories]
- Expression: [specific emotion + facial details]

ACTION:
- Timed Action: [precise 0.5s-3s action with timing markers]
- Object Interaction: [specific items being manipulated]
- Motion FX: [required effects like \"smear frames\" or \"impact blur\"]

ENVIRONMENT:
- FG: [Interactive foreground elements with parallax details]
- MG: [Midground setting + specific camera movement]
- BG: [Atmospheric background + depth effects]
- Lighting: [dynamic lighting changes if any]

STYLE:
- Type: {STYLE_TYPE} (MUST USE THIS EXACTLY)
- Technique: [specific rendering technique like \"motion blur + smear frames\"]
- Reference: {STYLE_REFERENCE} (MUST USE THIS EXACTLY)
- FPS: [required frame rate, typically 24 or 30]
- Camera: [specific camera movement and lens details]
- Negative Prompts: [elements to avoid in generation]

---

BASE SCENE DETAILS:
- Characters: {characters}
- Environment: {environment}
- Time of Day: {timing_of_day}
- Visuals: {visuals}
- Camera Work: {camera_work}

TEXT-TO-IMAGE PROMPT TO ANIMATE:
- Characters: {image_characters}
- Action: {action}
- Environment: {location}, {lighting}
- Style: {style_type}, {style_technique}

{priority}
STRICT RULES:
1. Time ALL actions (e.g. \"1.2s sword draw from scabbard\"), every timed segment under 3 seconds
2. Specify hair/cloth physics (e.g. \"left pigtail swings 30° right on impact\")
3. Use motion terms: \"smear\", \"impact frame\", \"stretch frame\"
4. Camera MUST move (no static shots) - specify movement type
5. Include parallax and layered depth (foreground/midground/background) in environment
6. Use exact durations for all actions and transitions
7. Each prompt must represent a SINGLE high-impact motion sequence
8. Specify at least 3 keyframes in the action description
9. Keep the characters, action and environment of the text-to-image prompt above; animate it, do not replace it
10. For scenes with multiple characters, include ALL characters with separate Appearance, Clothing Physics, and Expression fields",
        characters = scene.characters,
        environment = scene.environment,
        timing_of_day = scene.timing_of_day,
        visuals = scene.visuals,
        camera_work = scene.camera_work,
        action = image.action,
        location = image.environment_location,
        lighting = image.environment_lighting,
        style_type = image.style_type,
        style_technique = image.style_technique,
        priority = visual_override_section(scene_override(scene), "video"),
    );
    InstructionBody::slotted(head, tail)
}

fn log_style_fixes(stage: Stage, scene: u32, fixes: &StyleFixes) {
    if let Some(replaced) = &fixes.replaced_type {
        warn!(%stage, scene, "Model changed style type to {:?}, pinned back", replaced);
    }
    if fixes.filled_reference {
        warn!(%stage, scene, "Model left style reference blank, using default");
    }
}

/// Derives image and video generation prompts from finished scenes.
#[derive(Debug)]
pub struct PromptDerivationStage<C> {
    generator: StructuredGenerator<C>,
    concurrency: usize,
}

impl<C: TextCompletion> PromptDerivationStage<C> {
    /// Creates the stage; `concurrency` scenes are worked on at once.
    pub fn new(generator: StructuredGenerator<C>, concurrency: usize) -> Self {
        Self {
            generator,
            concurrency: concurrency.max(1),
        }
    }

    /// Still image prompt for one scene.
    pub async fn text_to_image(
        &self,
        scene: &SceneOutput,
    ) -> Result<TextToImagePrompt, GenerationError> {
        let body = text_to_image_instructions(scene);
        let mut prompt: TextToImagePrompt = self
            .generator
            .generate(
                GenerationTarget::scene(Stage::TextToImage, scene.scene_number),
                &body,
            )
            .await?;
        prompt.scene_number = scene.scene_number;
        log_style_fixes(Stage::TextToImage, scene.scene_number, &prompt.pin_style());
        info!(scene = scene.scene_number, "Derived text-to-image prompt");
        Ok(prompt)
    }

    /// Video prompt for one scene, animating its image prompt.
    pub async fn image_to_video(
        &self,
        scene: &SceneOutput,
        image: &TextToImagePrompt,
    ) -> Result<ImageToVideoPrompt, GenerationError> {
        let body = image_to_video_instructions(scene, image);
        let mut prompt: ImageToVideoPrompt = self
            .generator
            .generate(
                GenerationTarget::scene(Stage::ImageToVideo, scene.scene_number),
                &body,
            )
            .await?;
        prompt.scene_number = scene.scene_number;
        log_style_fixes(Stage::ImageToVideo, scene.scene_number, &prompt.pin_style());
        info!(scene = scene.scene_number, "Derived image-to-video prompt");
        Ok(prompt)
    }

    /// Image prompts for every scene, in scene order.
    pub async fn derive_text_to_image(
        &self,
        scenes: &[SceneOutput],
    ) -> Result<Vec<TextToImagePrompt>, GenerationError> {
        stream::iter(scenes)
            .map(|scene| self.text_to_image(scene))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    /// Video prompts for every scene; `images[i]` must belong to `scenes[i]`.
    pub async fn derive_image_to_video(
        &self,
        scenes: &[SceneOutput],
        images: &[TextToImagePrompt],
    ) -> Result<Vec<ImageToVideoPrompt>, StoryboardError> {
        if scenes.len() != images.len() {
            return Err(StoryboardError::MisalignedPrompts {
                scenes: scenes.len(),
                prompts: images.len(),
            });
        }
        let prompts = stream::iter(scenes.iter().zip(images))
            .map(|(scene, image)| self.image_to_video(scene, image))
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        Ok(prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(recommendation: Option<&str>) -> SceneOutput {
        SceneOutput {
            scene_number: 3,
            characters: "A cyclist in her thirties".to_string(),
            environment: "Rain-soaked city street".to_string(),
            timing_of_day: "Dusk".to_string(),
            scene_duration: "6 seconds".to_string(),
            scene_goal: "Show focus".to_string(),
            visuals: "Neon reflections".to_string(),
            camera_work: "Low tracking shot".to_string(),
            sound_design: "Muffled traffic".to_string(),
            transition: "Whip pan".to_string(),
            user_recommendation: recommendation.map(str::to_string),
        }
    }

    fn image() -> TextToImagePrompt {
        TextToImagePrompt {
            scene_number: 3,
            characters: vec![CharacterDetail {
                name: "Mara".to_string(),
                appearance: "32, athletic".to_string(),
                clothing: "Yellow rain jacket".to_string(),
                expression: "Calm focus".to_string(),
            }],
            action: "Mara lifts her hand from the handlebar".to_string(),
            environment_location: "Crosswalk".to_string(),
            environment_lighting: "Blue hour".to_string(),
            environment_details: "Steam from a grate".to_string(),
            style_type: STYLE_TYPE.to_string(),
            style_technique: "Anamorphic bokeh".to_string(),
            style_reference: STYLE_REFERENCE.to_string(),
        }
    }

    #[test]
    fn image_instructions_reassert_override() {
        let body = text_to_image_instructions(&scene(Some(
            "character waves at camera in slow motion",
        )))
        .to_string();
        assert!(body.contains(
            "USER VISUAL INSTRUCTIONS (MUST FOLLOW EXACTLY):\ncharacter waves at camera in slow motion"
        ));
        assert!(body.contains("Type: Photorealistic CGI (MUST USE THIS EXACTLY)"));
        assert!(body.contains("Reference: Gregory Crewdson (MUST USE THIS EXACTLY)"));
        assert!(body.contains("SINGLE frozen moment"));
    }

    #[test]
    fn image_instructions_without_override() {
        let body = text_to_image_instructions(&scene(None)).to_string();
        assert!(!body.contains("USER VISUAL INSTRUCTIONS"));
        assert!(body.contains("TEXT-TO-IMAGE PROMPT FOR SCENE 3:"));
        assert!(body.contains("- Camera Work: Low tracking shot"));
    }

    #[test]
    fn video_instructions_are_grounded_in_image_prompt() {
        let body = image_to_video_instructions(&scene(None), &image()).to_string();
        assert!(body.contains(
            "Character Name: Mara, Appearance: 32, athletic, Clothing: Yellow rain jacket, Expression: Calm focus"
        ));
        assert!(body.contains("- Action: Mara lifts her hand from the handlebar"));
        assert!(body.contains("- Environment: Crosswalk, Blue hour"));
        assert!(body.contains("Camera MUST move"));
        assert!(body.contains("at least 3 keyframes"));
    }
}
