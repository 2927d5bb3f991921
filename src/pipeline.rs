//! Runs the stages end to end.

use std::sync::Arc;

use tracing::info;

use crate::completion::TextCompletion;
use crate::config::PipelineConfig;
use crate::error::{GenerationError, StoryboardError};
use crate::schema::{
    AdDetails, CampaignRequest, ImageToVideoPrompt, SceneInput, SceneOutput, StoryboardOutput,
    TextToImagePrompt,
};
use crate::stages::{AdDetailsStage, PromptDerivationStage, SceneExpansionStage};
use crate::structured::StructuredGenerator;

/// One storyboard generator, reusable across runs.
#[derive(Debug)]
pub struct StoryboardPipeline<C> {
    ad_details: AdDetailsStage<C>,
    scenes: SceneExpansionStage<C>,
    prompts: PromptDerivationStage<C>,
}

impl<C: TextCompletion> StoryboardPipeline<C> {
    /// Builds every stage on top of the same completion capability.
    pub fn new(completion: C, config: PipelineConfig) -> Self {
        let generator = StructuredGenerator::new(Arc::new(completion), config.call_timeout);
        let concurrency = config.effective_concurrency();
        Self {
            ad_details: AdDetailsStage::new(generator.clone()),
            scenes: SceneExpansionStage::new(generator.clone(), concurrency),
            prompts: PromptDerivationStage::new(generator, concurrency),
        }
    }

    /// Fills in the campaign details.
    pub async fn resolve_ad_details(
        &self,
        request: &CampaignRequest,
    ) -> Result<AdDetails, StoryboardError> {
        self.ad_details.resolve(request).await
    }

    /// Expands scenes 1..=N from the user's partial scene inputs.
    pub async fn expand_scenes(
        &self,
        ad: &AdDetails,
        inputs: &[SceneInput],
    ) -> Result<Vec<SceneOutput>, GenerationError> {
        self.scenes.expand(ad, inputs).await
    }

    /// Still image prompts, one per scene.
    pub async fn derive_text_to_image_prompts(
        &self,
        scenes: &[SceneOutput],
    ) -> Result<Vec<TextToImagePrompt>, GenerationError> {
        self.prompts.derive_text_to_image(scenes).await
    }

    /// Video prompts, one per scene and image prompt.
    pub async fn derive_image_to_video_prompts(
        &self,
        scenes: &[SceneOutput],
        images: &[TextToImagePrompt],
    ) -> Result<Vec<ImageToVideoPrompt>, StoryboardError> {
        self.prompts.derive_image_to_video(scenes, images).await
    }

    /// Full run. Returns the complete storyboard or the first error; nothing
    /// partial is handed back.
    pub async fn run(&self, request: &CampaignRequest) -> Result<StoryboardOutput, StoryboardError> {
        let ad_details = self.resolve_ad_details(request).await?;
        let scenes = self.expand_scenes(&ad_details, &request.scenes).await?;
        let txt2img_prompts = self.derive_text_to_image_prompts(&scenes).await?;
        let img2vid_prompts = self
            .derive_image_to_video_prompts(&scenes, &txt2img_prompts)
            .await?;
        info!(
            product = %ad_details.product_name,
            scenes = scenes.len(),
            "Storyboard complete"
        );
        Ok(StoryboardOutput {
            ad_details,
            scenes,
            txt2img_prompts,
            img2vid_prompts,
        })
    }
}
