//! Markdown rendering of a finished storyboard.

use std::sync::LazyLock;

use regex::Regex;

use crate::schema::{CharacterDetail, StoryboardOutput};

/// Heading that starts the image prompt block.
pub const IMAGE_PROMPTS_HEADING: &str = "## Text-to-Image Prompts";

/// Heading that starts the video prompt block.
pub const VIDEO_PROMPTS_HEADING: &str = "## Image-to-Video Prompts";

#[allow(clippy::unwrap_used)]
static SCENE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"### Text-to-Image Prompt for Scene (\d+)").unwrap());

#[allow(clippy::unwrap_used)]
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());

/// The three independent text blocks of a storyboard report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormattedStoryboard {
    /// Product details and scene breakdown.
    pub summary: String,
    /// Text-to-image prompts.
    pub image_prompts: String,
    /// Image-to-video prompts.
    pub video_prompts: String,
}

impl FormattedStoryboard {
    /// All three blocks as one markdown document.
    pub fn to_markdown(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.summary, self.image_prompts, self.video_prompts
        )
    }
}

fn push_characters(out: &mut String, characters: &[CharacterDetail]) {
    out.push_str("**CHARACTER:**\n");
    for character in characters {
        out.push_str(&format!("- Character Name: {}\n", character.name));
        out.push_str(&format!("- Appearance: {}\n", character.appearance));
        out.push_str(&format!("- Clothing: {}\n", character.clothing));
        out.push_str(&format!("- Expression: {}\n", character.expression));
    }
    out.push('\n');
}

#[allow(clippy::too_many_arguments)]
fn push_prompt(
    out: &mut String,
    title: &str,
    characters: &[CharacterDetail],
    action: &str,
    location: &str,
    lighting: &str,
    details: &str,
    style: [&str; 3],
) {
    out.push_str(&format!("### {title}\n\n"));
    push_characters(out, characters);
    out.push_str(&format!("**ACTION:**\n- {action}\n\n"));
    out.push_str("**ENVIRONMENT:**\n");
    out.push_str(&format!("- Location: {location}\n"));
    out.push_str(&format!("- Lighting: {lighting}\n"));
    out.push_str(&format!("- Details: {details}\n\n"));
    let [style_type, technique, reference] = style;
    out.push_str("**STYLE:**\n");
    out.push_str(&format!("- Type: {style_type}\n"));
    out.push_str(&format!("- Technique: {technique}\n"));
    if !reference.trim().is_empty() {
        out.push_str(&format!("- Reference: {reference}\n"));
    }
    out.push('\n');
}

/// Renders the storyboard as summary, image prompt and video prompt blocks.
pub fn format_storyboard(storyboard: &StoryboardOutput) -> FormattedStoryboard {
    let ad = &storyboard.ad_details;
    let mut summary = String::from("# Advertisement Storyboard\n\n## Product Details\n");
    summary.push_str(&format!("- **Name:** {}\n", ad.product_name));
    summary.push_str(&format!("- **Description:** {}\n", ad.product_description));
    summary.push_str(&format!("- **Target Audience:** {}\n", ad.target_audience));
    summary.push_str(&format!("- **Main Selling Point:** {}\n", ad.selling_point));
    summary.push_str(&format!("- **Core/Key Message:** {}\n", ad.key_message));
    summary.push_str(&format!("- **Total Duration:** {}\n", ad.duration_of_ad));
    summary.push_str(&format!("- **Tone:** {}\n", ad.tone));
    summary.push_str(&format!("- **Market:** {}\n", ad.country));
    summary.push_str(&format!("- **Purpose:** {}\n", ad.purpose));
    summary.push_str(&format!("- **Total Scenes:** {}\n\n", ad.number_of_scenes));

    summary.push_str("## Scene Breakdown\n\n");
    for scene in &storyboard.scenes {
        summary.push_str(&format!("### Scene {}\n", scene.scene_number));
        summary.push_str(&format!("- **Characters:** {}\n", scene.characters));
        summary.push_str(&format!("- **Environment:** {}\n", scene.environment));
        summary.push_str(&format!("- **Time of Day:** {}\n", scene.timing_of_day));
        summary.push_str(&format!("- **Duration:** {}\n", scene.scene_duration));
        summary.push_str(&format!("- **Scene Goal:** {}\n\n", scene.scene_goal));
        if let Some(recommendation) = &scene.user_recommendation {
            summary.push_str(&format!("**User Direction:**\n{recommendation}\n\n"));
        }
        summary.push_str(&format!("**Visuals:**\n{}\n\n", scene.visuals));
        summary.push_str(&format!("**Camera Work:**\n{}\n\n", scene.camera_work));
        summary.push_str(&format!("**Sound Design:**\n{}\n\n", scene.sound_design));
        summary.push_str(&format!("**Transition:**\n{}\n\n", scene.transition));
    }

    let mut image_prompts = format!("{IMAGE_PROMPTS_HEADING}\n\n");
    for prompt in &storyboard.txt2img_prompts {
        push_prompt(
            &mut image_prompts,
            &format!("Text-to-Image Prompt for Scene {}", prompt.scene_number),
            &prompt.characters,
            &prompt.action,
            &prompt.environment_location,
            &prompt.environment_lighting,
            &prompt.environment_details,
            [
                &prompt.style_type,
                &prompt.style_technique,
                &prompt.style_reference,
            ],
        );
    }

    let mut video_prompts = format!("{VIDEO_PROMPTS_HEADING}\n\n");
    for prompt in &storyboard.img2vid_prompts {
        push_prompt(
            &mut video_prompts,
            &format!("Image-to-Video Prompt for Scene {}", prompt.scene_number),
            &prompt.characters,
            &prompt.action,
            &prompt.environment_location,
            &prompt.environment_lighting,
            &prompt.environment_details,
            [
                &prompt.style_type,
                &prompt.style_technique,
                &prompt.style_reference,
            ],
        );
    }

    FormattedStoryboard {
        summary,
        image_prompts,
        video_prompts,
    }
}

/// One flattened prompt, ready for the image model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenePrompt {
    /// Scene the prompt was rendered for.
    pub scene_number: u32,
    /// Single line prompt text.
    pub prompt: String,
}

/// Splits an image prompt block back into one flat prompt per scene.
///
/// Anything before [`IMAGE_PROMPTS_HEADING`] is skipped, bold markers are
/// dropped and line breaks collapse to spaces.
pub fn image_prompts_from_block(text: &str) -> Vec<ScenePrompt> {
    let body = match text.split_once(IMAGE_PROMPTS_HEADING) {
        Some((_, rest)) => rest.trim(),
        None => text.trim(),
    };

    let headings: Vec<(u32, usize, usize)> = SCENE_HEADING
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?.as_str().parse().ok()?;
            Some((number, whole.start(), whole.end()))
        })
        .collect();

    headings
        .iter()
        .enumerate()
        .filter_map(|(idx, (scene_number, _, content_start))| {
            let content_end = headings
                .get(idx + 1)
                .map(|(_, next_start, _)| *next_start)
                .unwrap_or(body.len());
            let content = body[*content_start..content_end].trim();
            if content.is_empty() {
                return None;
            }
            let plain = BOLD.replace_all(content, "$1");
            let prompt = plain
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            Some(ScenePrompt {
                scene_number: *scene_number,
                prompt,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{STYLE_REFERENCE, STYLE_TYPE};
    use crate::schema::{AdDetails, ImageToVideoPrompt, SceneOutput, TextToImagePrompt};

    fn storyboard() -> StoryboardOutput {
        let character = CharacterDetail {
            name: "Jun".to_string(),
            appearance: "25, tall".to_string(),
            clothing: "Grey hoodie".to_string(),
            expression: "Relieved".to_string(),
        };
        StoryboardOutput {
            ad_details: AdDetails {
                product_name: "QuietBeats".to_string(),
                product_description: "Noise-cancelling headphones".to_string(),
                target_audience: "Commuters".to_string(),
                selling_point: "Silence on demand".to_string(),
                key_message: "Your world, on mute".to_string(),
                duration_of_ad: "15 seconds".to_string(),
                tone: "Calm".to_string(),
                purpose: "Product launch".to_string(),
                country: "International".to_string(),
                number_of_scenes: 1,
            },
            scenes: vec![SceneOutput {
                scene_number: 1,
                characters: "Jun".to_string(),
                environment: "Subway car".to_string(),
                timing_of_day: "Morning".to_string(),
                scene_duration: "15 seconds".to_string(),
                scene_goal: "Relief".to_string(),
                visuals: "Crowd blurs".to_string(),
                camera_work: "Slow push in".to_string(),
                sound_design: "Noise fades to silence".to_string(),
                transition: "Cut to logo".to_string(),
                user_recommendation: Some("Jun closes his eyes".to_string()),
            }],
            txt2img_prompts: vec![TextToImagePrompt {
                scene_number: 1,
                characters: vec![character.clone()],
                action: "Jun slides the headphones on".to_string(),
                environment_location: "Packed subway car".to_string(),
                environment_lighting: "Flat fluorescent light".to_string(),
                environment_details: "Blurred commuters".to_string(),
                style_type: STYLE_TYPE.to_string(),
                style_technique: "Shallow depth of field".to_string(),
                style_reference: STYLE_REFERENCE.to_string(),
            }],
            img2vid_prompts: vec![ImageToVideoPrompt {
                scene_number: 1,
                characters: vec![character],
                action: "0.0-1.5s headphones slide on; 1.5-3.0s eyes close".to_string(),
                environment_location: "FG: handrail; MG: Jun; BG: commuters".to_string(),
                environment_lighting: "Lights dim".to_string(),
                environment_details: "Parallax on passing windows".to_string(),
                style_type: STYLE_TYPE.to_string(),
                style_technique: "Motion blur".to_string(),
                style_reference: String::new(),
            }],
        }
    }

    #[test]
    fn summary_lists_details_and_scenes() {
        let formatted = format_storyboard(&storyboard());
        assert!(formatted.summary.starts_with("# Advertisement Storyboard"));
        assert!(formatted.summary.contains("- **Core/Key Message:** Your world, on mute"));
        assert!(formatted.summary.contains("### Scene 1\n"));
        assert!(formatted.summary.contains("**User Direction:**\nJun closes his eyes"));
        assert!(formatted.summary.contains("**Transition:**\nCut to logo"));
    }

    #[test]
    fn blank_reference_is_left_out() {
        let formatted = format_storyboard(&storyboard());
        assert!(formatted.image_prompts.contains("- Reference: Gregory Crewdson"));
        assert!(!formatted.video_prompts.contains("- Reference:"));
        assert!(formatted.video_prompts.starts_with(VIDEO_PROMPTS_HEADING));
    }

    #[test]
    fn image_block_splits_into_flat_prompts() {
        let mut board = storyboard();
        let mut second = board.txt2img_prompts[0].clone();
        second.scene_number = 2;
        second.action = "Jun smiles".to_string();
        board.txt2img_prompts.push(second);

        let formatted = format_storyboard(&board);
        let prompts = image_prompts_from_block(&formatted.to_markdown());
        // the video block trails the last image prompt in the full document
        let prompts_only = image_prompts_from_block(&formatted.image_prompts);
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts_only.len(), 2);
        assert_eq!(prompts_only[0].scene_number, 1);
        assert_eq!(prompts_only[1].scene_number, 2);
        assert!(!prompts_only[0].prompt.contains('\n'));
        assert!(!prompts_only[0].prompt.contains("**"));
        assert!(prompts_only[0].prompt.starts_with("CHARACTER: - Character Name: Jun"));
        assert!(prompts_only[1].prompt.contains("ACTION: - Jun smiles"));
    }

    #[test]
    fn block_without_headings_has_no_prompts() {
        assert!(image_prompts_from_block("nothing to see").is_empty());
    }
}
