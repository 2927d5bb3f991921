//! Generation stages of a storyboard run.
//!
//! Each stage builds instruction bodies for its records and hands them to a
//! [`StructuredGenerator`](crate::structured::StructuredGenerator).

mod ad_details;
mod prompts;
mod scenes;

pub use ad_details::{AdDetailsStage, ad_details_instructions};
pub use prompts::{PromptDerivationStage, image_to_video_instructions, text_to_image_instructions};
pub use scenes::{SceneExpansionStage, scene_instructions};
