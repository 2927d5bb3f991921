use futures::{StreamExt, TryStreamExt, stream};
use tracing::info;

use crate::completion::TextCompletion;
use crate::constants::NOT_SPECIFIED;
use crate::error::{GenerationError, Stage};
use crate::schema::{AdDetails, SceneInput, SceneOutput, specified};
use crate::structured::{GenerationTarget, InstructionBody, StructuredGenerator};

fn override_section(recommendation: Option<&str>) -> String {
    match recommendation {
        Some(text) => format!(
            "CRITICAL USER SCENE DESCRIPTION - MUST INCLUDE VERBATIM:
{text}

STRICT RULES:
1. ALL elements below must align with this description
2. NEVER contradict or omit any details from it
3. Only add technical details (camera/sound) that support this vision
4. Preserve all:
- Character actions
- Dialogue
- Key visuals
"
        ),
        None => String::new(),
    }
}

/// Instruction body for expanding one scene.
pub fn scene_instructions(
    ad: &AdDetails,
    scene_number: u32,
    input: &SceneInput,
) -> InstructionBody {
    let field = |value: &Option<String>| specified(value).unwrap_or(NOT_SPECIFIED).to_string();
    let recommendation = input.override_text();
    let head = format!(
        "Generate a detailed scene for an advertisement storyboard based on the provided information.

Ad Details:
- Product Name: {product_name}
- Product Description: {product_description}
- Target Audience: {target_audience}
- Selling Point: {selling_point}
- Key Message: {key_message}
- Duration of Ad: {duration_of_ad}
- Tone: {tone}
- Purpose: {purpose}
- Country/Target Market: {country}

Input Scene Details (Scene {scene_number}):
- Characters: {characters}
- Environment: {environment}
- Time of Day: {timing_of_day}
- Scene Duration: {scene_duration}
- Scene Goal: {scene_goal}
- User Recommendations: {user_recommendation}

{priority}
",
        product_name = ad.product_name,
        product_description = ad.product_description,
        target_audience = ad.target_audience,
        selling_point = ad.selling_point,
        key_message = ad.key_message,
        duration_of_ad = ad.duration_of_ad,
        tone = ad.tone,
        purpose = ad.purpose,
        country = ad.country,
        characters = field(&input.characters),
        environment = field(&input.environment),
        timing_of_day = field(&input.timing_of_day),
        scene_duration = field(&input.scene_duration),
        scene_goal = field(&input.scene_goal),
        user_recommendation =
            recommendation.unwrap_or("Not specified (follow normal generation)"),
        priority = override_section(recommendation),
    );
    let tail = format!(
        "

Generation Rules:
1. IF USER RECOMMENDATIONS EXIST:
- Implement them EXACTLY as written
- All other fields must support and align with them
- Do not add interpretations or modifications
2. IF NO USER RECOMMENDATIONS:
- Generate comprehensive scene details following marketing best practices
- Ensure alignment with ad details and product goals

Guidelines for scene creation:
1. If characters are not specified, create appropriate characters for the target audience and the target market.
2. If environment is not specified, create a suitable setting based on the product and audience.
3. If time of day is not specified, select an appropriate time that enhances the scene.
4. If scene duration is not specified, suggest an appropriate duration based on the scene's importance and the duration of the ad.
5. If scene goal is not specified, determine a goal that supports the overall ad purpose.
6. Create detailed descriptions for each of these required output components:
   - Visual elements (environment details, character appearances, actions)
   - Camera work (angles, movements, focus points)
   - Sound design (music, effects, dialogue/narration)
   - Transition to the next scene
7. Each scene should clearly contribute to the overall ad narrative and selling points.
8. The scene must clearly mention the Key Message: {key_message}

Be creative, specific, and focused on marketing effectiveness.",
        key_message = ad.key_message,
    );
    InstructionBody::slotted(head, tail)
}

/// Turns partial scene inputs into complete scenes.
#[derive(Debug)]
pub struct SceneExpansionStage<C> {
    generator: StructuredGenerator<C>,
    concurrency: usize,
}

impl<C: TextCompletion> SceneExpansionStage<C> {
    /// Creates the stage; `concurrency` scenes are generated at once.
    pub fn new(generator: StructuredGenerator<C>, concurrency: usize) -> Self {
        Self {
            generator,
            concurrency: concurrency.max(1),
        }
    }

    /// Generates one scene. The returned scene number is always `scene_number`.
    pub async fn expand_scene(
        &self,
        ad: &AdDetails,
        scene_number: u32,
        input: &SceneInput,
    ) -> Result<SceneOutput, GenerationError> {
        let body = scene_instructions(ad, scene_number, input);
        let mut scene: SceneOutput = self
            .generator
            .generate(
                GenerationTarget::scene(Stage::SceneExpansion, scene_number),
                &body,
            )
            .await?;
        scene.scene_number = scene_number;
        scene.user_recommendation = input.override_text().map(str::to_string);
        info!(scene = scene_number, "Expanded scene");
        Ok(scene)
    }

    /// Generates scenes 1..=N, N being the resolved scene count.
    ///
    /// Scene inputs past the end of `inputs` are treated as blank, inputs past
    /// N are ignored. Results come back in scene order whatever the
    /// concurrency; the first failure cancels the scenes still in flight.
    pub async fn expand(
        &self,
        ad: &AdDetails,
        inputs: &[SceneInput],
    ) -> Result<Vec<SceneOutput>, GenerationError> {
        stream::iter(1..=ad.number_of_scenes)
            .map(|scene_number| {
                let input = SceneInput::for_scene(inputs, scene_number);
                async move { self.expand_scene(ad, scene_number, &input).await }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}
