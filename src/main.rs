use std::fs;
use std::path::{Path, PathBuf};

use adboard::cli::CliOptions;
use adboard::completion::GeminiClient;
use adboard::config::setup_logging;
use adboard::format::{format_storyboard, image_prompts_from_block};
use adboard::images::ImageGenerator;
use adboard::pipeline::StoryboardPipeline;
use adboard::schema::CampaignRequest;
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;

fn read_request(path: &Path) -> Result<CampaignRequest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse request {}", path.display()))
}

fn create_run_dir(out_dir: &Path, product: &str) -> Result<PathBuf> {
    let slug: String = product
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let run_dir = out_dir.join(format!("{stamp}_{}", slug.trim_matches('_')));
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create {}", run_dir.display()))?;
    Ok(run_dir)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliOptions::parse();

    setup_logging(cli.debug)?;

    if cli.images && cli.replicate_api_token.is_none() {
        return Err(anyhow!("--images needs REPLICATE_API_TOKEN"));
    }

    let request = read_request(&cli.request)?;

    let mut client = GeminiClient::new(&cli.gemini_api_key, cli.model_config())
        .context("Invalid Gemini API base URL")?;
    if let Some(dir) = &cli.debug_dir {
        client = client.with_debug_dir(dir.clone());
    }

    let pipeline = StoryboardPipeline::new(client, cli.pipeline_config());
    let storyboard = pipeline.run(&request).await?;

    let run_dir = create_run_dir(&cli.out_dir, &storyboard.ad_details.product_name)?;

    let json_path = run_dir.join("storyboard.json");
    fs::write(&json_path, serde_json::to_vec_pretty(&storyboard)?)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;
    info!("Wrote {}", json_path.display());

    let formatted = format_storyboard(&storyboard);
    let md_path = run_dir.join("storyboard.md");
    fs::write(&md_path, formatted.to_markdown())
        .with_context(|| format!("Failed to write {}", md_path.display()))?;
    info!("Wrote {}", md_path.display());

    if cli.images
        && let Some(token) = &cli.replicate_api_token
    {
        let prompts = image_prompts_from_block(&formatted.image_prompts);
        let generator = ImageGenerator::new(token, cli.image_config())?;
        let written = generator.render_scenes(&prompts, &run_dir).await?;
        info!("Rendered {} scene images", written.len());
    }

    println!("{}", run_dir.display());
    Ok(())
}
