use std::sync::{Arc, Mutex};
use std::time::Duration;

use adboard::completion::TextCompletion;
use adboard::config::PipelineConfig;
use adboard::error::{CompletionError, GenerationFailure, Stage, StoryboardError};
use adboard::pipeline::StoryboardPipeline;
use adboard::schema::{CampaignRequest, SceneInput, TextToImagePrompt};
use serde_json::json;

const KEY_MESSAGE: &str = "Isolate yourself from the world";
const OVERRIDE: &str = "character waves at camera in slow motion";

/// Answers each stage's prompt with a plausible record.
#[derive(Default)]
struct Studio {
    prompts: Mutex<Vec<String>>,
    /// Scene numbers reported by the model are off by this much.
    renumber: u32,
    /// Leave the style fields out of prompt records.
    drop_style: bool,
    /// Scene whose expansion keeps coming back as prose.
    broken_scene: Option<u32>,
    /// Earlier scenes answer slower than later ones.
    stagger: bool,
}

fn scene_after(prompt: &str, marker: &str) -> u32 {
    let Some((_, rest)) = prompt.split_once(marker) else {
        return 0;
    };
    rest.chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

fn character() -> serde_json::Value {
    json!({
        "name": "Jun",
        "appearance": "28, lean, short black hair",
        "clothing": "Charcoal hoodie, matte black headphones",
        "expression": "Eyes closed, relaxed smile"
    })
}

impl Studio {
    fn sent(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    fn prompt_record(&self, n: u32, action: &str) -> serde_json::Value {
        let mut record = json!({
            "scene_number": n + self.renumber,
            "characters": [character()],
            "action": action,
            "environment_location": "Crowded subway car",
            "environment_lighting": "Flickering fluorescent light",
            "environment_details": "Commuters blurred around Jun",
            "style_type": "Photorealistic CGI",
            "style_technique": "Shallow depth of field",
            "style_reference": "Gregory Crewdson"
        });
        if self.drop_style
            && let Some(fields) = record.as_object_mut()
        {
            fields.remove("style_type");
            fields.remove("style_reference");
        }
        record
    }

    fn answer(&self, prompt: &str) -> String {
        if prompt.contains("generate comprehensive ad details") {
            return json!({
                "product_name": "QuietBeats",
                "product_description": "Noise-cancelling headphones with 30 hour battery",
                "target_audience": "Urban commuters aged 20-35",
                "selling_point": "Noise cancellation",
                "key_message": KEY_MESSAGE,
                "duration_of_ad": "30 seconds",
                "tone": "Calm and confident",
                "purpose": "Product launch",
                "country": "International",
                "number_of_scenes": 7
            })
            .to_string();
        }
        if prompt.contains("Generate a detailed scene") {
            let n = scene_after(prompt, "Input Scene Details (Scene ");
            if self.broken_scene == Some(n) {
                return "Here is a lovely scene, no JSON today.".to_string();
            }
            return format!(
                "```json\n{}\n```",
                json!({
                    "scene_number": n + self.renumber,
                    "characters": "Jun, a commuter",
                    "environment": "Subway at rush hour",
                    "timing_of_day": "Morning",
                    "scene_duration": "10 seconds",
                    "scene_goal": "Show the noise disappearing",
                    "visuals": format!("Scene {n}: Jun puts on QuietBeats. {KEY_MESSAGE}."),
                    "camera_work": "Slow push in on Jun's face",
                    "sound_design": format!("Noise fades to silence, narrator: '{KEY_MESSAGE}'"),
                    "transition": "Fade to white"
                })
            );
        }
        if prompt.contains("Create a detailed text-to-image prompt") {
            let n = scene_after(prompt, "text-to-image prompt for Scene ");
            return self
                .prompt_record(n, "Jun settles the headphones over his ears")
                .to_string();
        }
        if prompt.contains("Create a detailed image-to-video prompt") {
            let n = scene_after(prompt, "image-to-video prompt for Scene ");
            return self
                .prompt_record(n, "0.0s-1.5s: Jun lifts the headphones into place")
                .to_string();
        }
        String::new()
    }
}

impl TextCompletion for Studio {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        if self.stagger {
            let n = scene_after(prompt, "Input Scene Details (Scene ");
            tokio::time::sleep(Duration::from_millis(u64::from(10_u32.saturating_sub(n)) * 100))
                .await;
        }
        Ok(self.answer(prompt))
    }
}

fn request(scenes: Vec<SceneInput>) -> CampaignRequest {
    CampaignRequest {
        product_name: Some("QuietBeats".to_string()),
        product_description: Some("Noise-cancelling headphones".to_string()),
        key_message: Some(KEY_MESSAGE.to_string()),
        number_of_scenes: Some(u32::try_from(scenes.len()).expect("scene count")),
        scenes,
        ..CampaignRequest::default()
    }
}

fn pipeline(studio: &Arc<Studio>) -> StoryboardPipeline<Arc<Studio>> {
    StoryboardPipeline::new(studio.clone(), PipelineConfig::default())
}

#[tokio::test]
async fn two_scene_storyboard() {
    let studio = Arc::new(Studio::default());
    let storyboard = pipeline(&studio)
        .run(&request(vec![SceneInput::default(), SceneInput::default()]))
        .await
        .expect("storyboard");

    assert_eq!(storyboard.ad_details.product_name, "QuietBeats");
    assert_eq!(storyboard.ad_details.number_of_scenes, 2);
    assert_eq!(storyboard.scenes.len(), 2);
    assert_eq!(storyboard.txt2img_prompts.len(), 2);
    assert_eq!(storyboard.img2vid_prompts.len(), 2);
    for (idx, scene) in storyboard.scenes.iter().enumerate() {
        let n = u32::try_from(idx + 1).expect("scene number");
        assert_eq!(scene.scene_number, n);
        assert_eq!(storyboard.txt2img_prompts[idx].scene_number, n);
        assert_eq!(storyboard.img2vid_prompts[idx].scene_number, n);
        assert!(
            scene.visuals.contains(KEY_MESSAGE) || scene.sound_design.contains(KEY_MESSAGE),
            "scene {n} lost the key message"
        );
    }
    // one call for the details, then three per scene
    assert_eq!(studio.sent().len(), 7);
}

#[tokio::test]
async fn declared_count_with_no_scene_list() {
    let studio = Arc::new(Studio::default());
    let request = CampaignRequest {
        product_name: Some("QuietBeats".to_string()),
        key_message: Some(KEY_MESSAGE.to_string()),
        number_of_scenes: Some(2),
        scenes: vec![],
        ..CampaignRequest::default()
    };
    let storyboard = pipeline(&studio).run(&request).await.expect("storyboard");

    assert_eq!(storyboard.ad_details.number_of_scenes, 2);
    let numbers: Vec<u32> = storyboard.scenes.iter().map(|s| s.scene_number).collect();
    assert_eq!(numbers, vec![1, 2]);
    for scene in &storyboard.scenes {
        assert!(!scene.visuals.trim().is_empty());
        assert!(!scene.camera_work.trim().is_empty());
        assert!(!scene.sound_design.trim().is_empty());
        assert!(!scene.transition.trim().is_empty());
        assert!(scene.visuals.contains(KEY_MESSAGE) || scene.sound_design.contains(KEY_MESSAGE));
        assert_eq!(scene.user_recommendation, None);
    }
    assert_eq!(storyboard.txt2img_prompts.len(), 2);
    assert_eq!(storyboard.img2vid_prompts.len(), 2);

    let scene_prompts: Vec<String> = studio
        .sent()
        .into_iter()
        .filter(|p| p.contains("Generate a detailed scene"))
        .collect();
    assert_eq!(scene_prompts.len(), 2);
    assert!(
        scene_prompts
            .iter()
            .all(|p| p.contains("- Characters: Not specified"))
    );
}

#[tokio::test]
async fn model_scene_numbers_are_ignored() {
    let studio = Arc::new(Studio {
        renumber: 40,
        ..Studio::default()
    });
    let storyboard = pipeline(&studio)
        .run(&request(vec![SceneInput::default(); 3]))
        .await
        .expect("storyboard");

    let numbers: Vec<u32> = storyboard.scenes.iter().map(|s| s.scene_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    let image_numbers: Vec<u32> = storyboard
        .txt2img_prompts
        .iter()
        .map(|p| p.scene_number)
        .collect();
    assert_eq!(image_numbers, vec![1, 2, 3]);
    let video_numbers: Vec<u32> = storyboard
        .img2vid_prompts
        .iter()
        .map(|p| p.scene_number)
        .collect();
    assert_eq!(video_numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn override_reaches_every_downstream_prompt() {
    let studio = Arc::new(Studio::default());
    let scenes = vec![
        SceneInput::default(),
        SceneInput {
            user_recommendation: Some(OVERRIDE.to_string()),
            ..SceneInput::default()
        },
    ];
    let storyboard = pipeline(&studio)
        .run(&request(scenes))
        .await
        .expect("storyboard");

    assert_eq!(storyboard.scenes[0].user_recommendation, None);
    assert_eq!(
        storyboard.scenes[1].user_recommendation.as_deref(),
        Some(OVERRIDE)
    );

    let sent = studio.sent();
    let for_scene = |marker: &str, n: u32| {
        sent.iter()
            .find(|p| scene_after(p, marker) == n && p.contains(marker))
            .cloned()
            .expect("prompt sent")
    };
    for marker in [
        "Input Scene Details (Scene ",
        "text-to-image prompt for Scene ",
        "image-to-video prompt for Scene ",
    ] {
        assert!(for_scene(marker, 2).contains(OVERRIDE), "{marker} missing override");
        assert!(!for_scene(marker, 1).contains(OVERRIDE), "{marker} leaked override");
    }
}

#[tokio::test]
async fn misaligned_prompt_lists_are_rejected() {
    let studio = Arc::new(Studio::default());
    let pipeline = pipeline(&studio);
    let request = request(vec![SceneInput::default(); 2]);
    let ad = pipeline.resolve_ad_details(&request).await.expect("details");
    let scenes = pipeline
        .expand_scenes(&ad, &request.scenes)
        .await
        .expect("scenes");
    let images: Vec<TextToImagePrompt> = pipeline
        .derive_text_to_image_prompts(&scenes[..1])
        .await
        .expect("images");

    let before = studio.sent().len();
    let err = pipeline
        .derive_image_to_video_prompts(&scenes, &images)
        .await
        .expect_err("lists differ");
    assert!(matches!(
        err,
        StoryboardError::MisalignedPrompts {
            scenes: 2,
            prompts: 1
        }
    ));
    assert_eq!(studio.sent().len(), before, "no model call on misalignment");
}

#[tokio::test]
async fn identical_requests_resolve_identically() {
    let studio = Arc::new(Studio::default());
    let pipeline = pipeline(&studio);
    let request = request(vec![SceneInput::default(); 2]);
    let first = pipeline.resolve_ad_details(&request).await.expect("first");
    let second = pipeline.resolve_ad_details(&request).await.expect("second");
    assert_eq!(first, second);
}

#[tokio::test]
async fn broken_scene_aborts_the_run() {
    let studio = Arc::new(Studio {
        broken_scene: Some(2),
        ..Studio::default()
    });
    let err = pipeline(&studio)
        .run(&request(vec![SceneInput::default(); 3]))
        .await
        .expect_err("scene 2 never parses");

    let err = match err {
        StoryboardError::Generation(err) => err,
        other => panic!("unexpected error: {other}"),
    };
    assert!(matches!(err.stage, Stage::SceneExpansion));
    assert_eq!(err.scene, Some(2));
    assert!(matches!(
        err.failure,
        GenerationFailure::InvalidOutput { .. }
    ));

    let sent = studio.sent();
    let scene_two_calls = sent
        .iter()
        .filter(|p| scene_after(p, "Input Scene Details (Scene ") == 2)
        .count();
    assert_eq!(scene_two_calls, 2, "one retry, no more");
    assert!(
        !sent.iter().any(|p| p.contains("text-to-image prompt for Scene")),
        "no prompt derivation after a failed expansion"
    );
}

#[tokio::test]
async fn missing_style_fields_get_defaults() {
    let studio = Arc::new(Studio {
        drop_style: true,
        ..Studio::default()
    });
    let storyboard = pipeline(&studio)
        .run(&request(vec![SceneInput::default()]))
        .await
        .expect("storyboard");

    let image = &storyboard.txt2img_prompts[0];
    assert_eq!(image.style_type, "Photorealistic CGI");
    assert_eq!(image.style_reference, "Gregory Crewdson");
    let video = &storyboard.img2vid_prompts[0];
    assert_eq!(video.style_type, "Photorealistic CGI");
    assert_eq!(video.style_reference, "Gregory Crewdson");
}

#[tokio::test(start_paused = true)]
async fn concurrent_scenes_keep_their_order() {
    let studio = Arc::new(Studio {
        stagger: true,
        ..Studio::default()
    });
    let pipeline = StoryboardPipeline::new(
        studio.clone(),
        PipelineConfig {
            concurrency: 4,
            call_timeout: None,
        },
    );
    let storyboard = pipeline
        .run(&request(vec![SceneInput::default(); 4]))
        .await
        .expect("storyboard");

    let numbers: Vec<u32> = storyboard.scenes.iter().map(|s| s.scene_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    for (scene, image) in storyboard.scenes.iter().zip(&storyboard.txt2img_prompts) {
        assert_eq!(scene.scene_number, image.scene_number);
    }
}

#[tokio::test]
async fn empty_request_is_invalid() {
    let studio = Arc::new(Studio::default());
    let err = pipeline(&studio)
        .run(&CampaignRequest::default())
        .await
        .expect_err("no scenes");
    assert!(matches!(err, StoryboardError::InvalidRequest(_)));
    assert!(studio.sent().is_empty());
}
