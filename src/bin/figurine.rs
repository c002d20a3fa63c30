//! CLI for Figurine - photo to collectible figure.

use clap::{Args, Parser, Subcommand, ValueEnum};
use figurine::view::{render_text, View};
use figurine::{
    ContentCheck, ControllerConfig, GeminiModel, GeminiProvider, GeneratedImage,
    GenerationController, ImageProvider, SourceImage, FIGURINE_PROMPT,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "figurine")]
#[command(about = "Turn a photo into a photorealistic collectible figure with Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a figure from a photo
    Generate(GenerateArgs),

    /// Check that the API key and model are usable
    Health(HealthArgs),

    /// Print the prompt sent with every photo
    Prompt,
}

#[derive(Args)]
struct GenerateArgs {
    /// Photo to transform (PNG, JPG, or WEBP)
    input: PathBuf,

    /// Output file path [default: <input>-figure.<ext>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Model to use
    #[arg(short, long, value_enum, default_value = "flash")]
    model: ModelArg,

    /// Reject files whose content does not match their extension
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct HealthArgs {
    /// Model to check
    #[arg(short, long, value_enum, default_value = "flash")]
    model: ModelArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Flash,
    Pro,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Flash => GeminiModel::NanoBanana,
            ModelArg::Pro => GeminiModel::NanoBananaPro,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate(args, cli.json).await,
        Commands::Health(args) => health(args, cli.json).await,
        Commands::Prompt => {
            if cli.json {
                println!("{}", serde_json::json!({ "prompt": FIGURINE_PROMPT }));
            } else {
                println!("{FIGURINE_PROMPT}");
            }
            Ok(())
        }
    }
}

fn default_output(input: &Path, image: &GeneratedImage) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}-figure.{}", image.format.extension()))
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let provider = GeminiProvider::builder().model(args.model.into()).build()?;
    let check = if args.strict {
        ContentCheck::Strict
    } else {
        ContentCheck::Permissive
    };
    let config = ControllerConfig::builder().content_check(check).build();
    let controller = GenerationController::new(provider, config);

    let mut updates = controller.subscribe();
    let printer = (!json_output).then(|| {
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let view = View::from_snapshot(&updates.borrow_and_update());
                eprintln!("{}\n", render_text(&view));
            }
        })
    });

    let source = SourceImage::from_path(&args.input)?;
    controller.select_image(source)?;
    let outcome = controller.generate().await;
    let snapshot = controller.snapshot();

    drop(controller);
    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            tracing::warn!(error = %e, "progress printer failed");
        }
    }

    let image = match outcome {
        Ok(image) => image,
        Err(e) => {
            let message = snapshot.error().unwrap_or(figurine::FALLBACK_MESSAGE);
            let stage = if e.is_local() { "local" } else { "remote" };
            tracing::debug!(stage, error = %e, "generation failed");
            if json_output {
                let result = serde_json::json!({
                    "success": false,
                    "state": snapshot.state,
                    "stage": stage,
                    "error": message,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if !e.is_local() {
                eprintln!("The request to the image service failed.");
            }
            return Err(anyhow::Error::new(e).context(message.to_string()));
        }
    };

    let output = args
        .output
        .unwrap_or_else(|| default_output(&args.input, &image));
    image.save(&output)?;

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "state": snapshot.state,
            "output": output.display().to_string(),
            "size_bytes": image.size(),
            "format": image.format.extension(),
            "provider": image.provider.to_string(),
            "model": image.metadata.model,
            "duration_ms": image.metadata.duration_ms,
            "text": image.metadata.text,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated figure: {} ({} bytes) via {}",
            output.display(),
            image.size(),
            image.provider
        );
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
        if let Some(text) = &image.metadata.text {
            println!("Model says: {}", text.trim());
        }
    }

    Ok(())
}

async fn health(args: HealthArgs, json_output: bool) -> anyhow::Result<()> {
    let model: GeminiModel = args.model.into();
    let provider = GeminiProvider::builder().model(model).build()?;
    let result = provider.health_check().await;

    if json_output {
        let report = serde_json::json!({
            "provider": provider.kind().to_string(),
            "model": model.as_str(),
            "healthy": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.user_message()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if result.is_ok() {
        println!("{} ({}): ok", provider.name(), model.as_str());
    }

    result?;
    Ok(())
}
