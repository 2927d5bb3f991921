use tracing::info;

use crate::completion::TextCompletion;
use crate::constants::{DEFAULT_COUNTRY, NOT_SPECIFIED};
use crate::error::{Stage, StoryboardError};
use crate::schema::{AdDetails, CampaignRequest, specified};
use crate::structured::{GenerationTarget, InstructionBody, StructuredGenerator};

/// Instruction body for resolving the campaign details.
pub fn ad_details_instructions(
    request: &CampaignRequest,
    number_of_scenes: u32,
) -> InstructionBody {
    let field = |value: &Option<String>| specified(value).unwrap_or(NOT_SPECIFIED).to_string();
    let head = "Based on the provided advertisement information, generate comprehensive ad details.
Fill in any missing information based on the context and marketing best practices.

";
    let tail = format!(
        "

Input information:
- Product Name: {product_name}
- Product Description: {product_description}
- Target Audience: {target_audience}
- Selling Point: {selling_point}
- Key Message: {key_message}
- Duration of Ad: {duration_of_ad}
- Tone: {tone}
- Purpose: {purpose}
- Country: {country}
- Number of Scenes: {number_of_scenes}

Guidelines:
1. If a product name is not provided, create a unique and memorable name based on the product description.
2. If product description is not provided, create a comprehensive description of what the product is and its benefits.
3. If target audience is not specified, determine the most appropriate target audience based on the product.
4. If selling point is not specified, identify the most compelling unique value proposition.
5. If key message is not specified, craft a resonant core message aligned with the selling point.
6. If duration is not specified, suggest an appropriate length based on industry standards and the number of scenes.
7. If tone is not specified, recommend a tone that matches the product and target audience.
8. If purpose is not specified, determine whether it's for brand awareness, product launch, public information, etc.
9. If country is not specified, use \"{DEFAULT_COUNTRY}\".
10. Keep every provided value exactly as given and keep number_of_scenes at {number_of_scenes}.

For all responses, be specific, creative, and marketing-focused.",
        product_name = field(&request.product_name),
        product_description = field(&request.product_description),
        target_audience = field(&request.target_audience),
        selling_point = field(&request.selling_point),
        key_message = field(&request.key_message),
        duration_of_ad = field(&request.duration_of_ad),
        tone = field(&request.tone),
        purpose = field(&request.purpose),
        country = field(&request.country),
    );
    InstructionBody::slotted(head, tail)
}

/// Fills every campaign attribute the user left out.
#[derive(Debug)]
pub struct AdDetailsStage<C> {
    generator: StructuredGenerator<C>,
}

impl<C: TextCompletion> AdDetailsStage<C> {
    /// Creates the stage on top of a structured generator.
    pub fn new(generator: StructuredGenerator<C>) -> Self {
        Self { generator }
    }

    /// Resolves the campaign request into complete ad details.
    ///
    /// The scene count is taken from the request, never from the model.
    pub async fn resolve(&self, request: &CampaignRequest) -> Result<AdDetails, StoryboardError> {
        let number_of_scenes = request.scene_count()?;
        let body = ad_details_instructions(request, number_of_scenes);
        let mut details: AdDetails = self
            .generator
            .generate(
                GenerationTarget::campaign(Stage::AdDetails, number_of_scenes),
                &body,
            )
            .await?;
        details.number_of_scenes = number_of_scenes;
        info!(product = %details.product_name, scenes = number_of_scenes, "Resolved ad details");
        Ok(details)
    }
}
