use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pinn_studio::api::gemini::GeminiClient;
use pinn_studio::api::veo::VeoClient;
use pinn_studio::config::{Config, DEFAULT_CONFIG_PATH};
use pinn_studio::credentials::Credentials;
use pinn_studio::generator::{GenerationRequest, MAX_SCENES, VISUAL_STYLES};
use pinn_studio::init;
use pinn_studio::jobs::{JobStatus, VideoJob};
use pinn_studio::scene::format_prompt;
use pinn_studio::studio::Studio;

type HttpStudio = Studio<GeminiClient, VeoClient>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn a story idea into scene prompts and 9:16 video clips", long_about = None)]
struct Cli {
    /// Path to the studio config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show or change the saved API keys.
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Write scene prompts for a story idea.
    Scenes {
        #[command(flatten)]
        story: StoryArgs,
        /// Write the scenes as a JSON array to this file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render a single scene prompt file to a clip.
    Render {
        /// File holding one scene prompt (JSON).
        #[arg(long)]
        prompt_file: PathBuf,
    },
    /// Render every scene in a scenes file (as written by `scenes --out`).
    Batch {
        #[arg(long)]
        scenes_file: PathBuf,
    },
    /// Write scenes for an idea and render them all.
    Story {
        #[command(flatten)]
        story: StoryArgs,
    },
}

#[derive(Debug, Subcommand)]
enum KeysAction {
    /// Report which keys are configured.
    Show,
    /// Save one or both keys.
    Set {
        /// Key used for scene generation.
        #[arg(long)]
        gemini: Option<String>,
        /// Key used for video rendering.
        #[arg(long)]
        veo: Option<String>,
    },
}

#[derive(Debug, clap::Args)]
struct StoryArgs {
    /// Main idea of the story.
    #[arg(long)]
    idea: String,
    /// Number of scenes to write (1-10).
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=MAX_SCENES as i64))]
    scenes: u8,
    /// Leave dialogue out of the scenes.
    #[arg(long)]
    no_dialogue: bool,
    /// Visual style for every scene.
    #[arg(long, default_value = "3D Cartoon")]
    style: String,
}

impl StoryArgs {
    fn request(&self) -> GenerationRequest {
        if !VISUAL_STYLES.contains(&self.style.as_str()) {
            eprintln!(
                "[WARN] '{}' is not one of the preset styles ({}); using it as given.",
                self.style,
                VISUAL_STYLES.join(", ")
            );
        }
        GenerationRequest {
            main_idea: self.idea.clone(),
            num_scenes: self.scenes as usize,
            include_dialogue: !self.no_dialogue,
            visual_style: self.style.clone(),
        }
    }
}

fn configured(flag: bool) -> &'static str {
    if flag { "configured" } else { "not configured" }
}

/// One line per job for the batch summary, e.g.
/// `Scene 2 (queued 14:03:11): success`.
fn status_line(scene: usize, job: &VideoJob) -> String {
    let queued = job.created_at.with_timezone(&Local).format("%H:%M:%S");
    match job.error() {
        Some(message) => format!("Scene {} (queued {}): error: {}", scene, queued, message),
        None => format!("Scene {} (queued {}): {}", scene, queued, job.status()),
    }
}

async fn render_all(studio: &HttpStudio) -> Result<i32> {
    let report = studio.generate_all().await?;
    for (index, job) in studio.registry().jobs().iter().enumerate() {
        let line = status_line(index + 1, job);
        if job.status() == JobStatus::Error {
            eprintln!("[ERROR] {}", line);
        } else {
            println!("{}", line);
        }
    }
    for path in studio.export_all()? {
        println!("Saved {}", path.display());
    }
    Ok(if report.failed == 0 { 0 } else { 1 })
}

async fn run(cli: Cli) -> Result<i32> {
    let cfg = Config::load_or_default(&cli.config).await?;
    init::ensure_directories(&cfg).await?;
    init::purge_stale_media(&cfg.media_dir);
    let mut studio = Studio::open(cfg)?;

    match cli.command {
        Command::Keys { action } => match action {
            KeysAction::Show => {
                let creds = studio.credentials();
                println!("Gemini API key: {}", configured(creds.has_gemini_key()));
                println!("VEO API key:    {}", configured(creds.has_veo_key()));
            }
            KeysAction::Set { gemini, veo } => {
                let current = studio.credentials().clone();
                let updated = Credentials {
                    gemini_api_key: gemini.unwrap_or(current.gemini_api_key),
                    veo_api_key: veo.unwrap_or(current.veo_api_key),
                };
                studio.save_credentials(updated)?;
                println!("Keys saved.");
            }
        },
        Command::Scenes { story, out } => {
            let scenes = studio.generate_scenes(&story.request()).await?;
            for (index, scene) in scenes.iter().enumerate() {
                println!("--- Scene {} ---\n{}", index + 1, format_prompt(scene));
            }
            if let Some(out) = out {
                let body = serde_json::to_string_pretty(&scenes)?;
                tokio::fs::write(&out, body)
                    .await
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                println!("Wrote {} scenes to {}", scenes.len(), out.display());
            }
        }
        Command::Render { prompt_file } => {
            let prompt = tokio::fs::read_to_string(&prompt_file)
                .await
                .with_context(|| format!("Failed to read {}", prompt_file.display()))?;
            studio.registry().replace_all([prompt]);
            return render_all(&studio).await;
        }
        Command::Batch { scenes_file } => {
            let raw = tokio::fs::read_to_string(&scenes_file)
                .await
                .with_context(|| format!("Failed to read {}", scenes_file.display()))?;
            let scenes: Vec<String> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of scene prompts", scenes_file.display()))?;
            studio.use_scenes(scenes);
            return render_all(&studio).await;
        }
        Command::Story { story } => {
            let scenes = studio.generate_scenes(&story.request()).await?;
            println!("Wrote {} scenes; rendering...", scenes.len());
            studio.use_scenes(scenes);
            return render_all(&studio).await;
        }
    }

    Ok(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let code = run(Cli::parse()).await?;
    std::process::exit(code);
}
