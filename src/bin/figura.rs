// figura - turn a photo into a stylized figure image

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use figura::prelude::*;
use figura::ExtrasError;
use figura::telemetry::SubscriberConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn a photo into a stylized collectible-figure image", long_about = None)]
struct Args {
    /// Photo to stylize
    #[arg(short, long, required_unless_present = "list_styles")]
    image: Option<PathBuf>,

    /// Style preset id (see --list-styles)
    #[arg(short, long, default_value_t = 1)]
    style: u32,

    /// Output file; defaults to figura-<style>.<ext> in the current directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// One combined call instead of analyze-then-generate
    #[arg(long)]
    single_stage: bool,

    /// Only run the analysis stage and print the generated prompt
    #[arg(long, conflicts_with = "single_stage")]
    analyze_only: bool,

    /// Model family used for the final image
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Total attempts per remote call
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Delay before the first retry, doubled after each failure
    #[arg(long)]
    base_delay_ms: Option<u64>,

    /// Timeout for each individual attempt
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the available style presets and exit
    #[arg(long)]
    list_styles: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum BackendArg {
    /// Imagen `:predict`
    Imagen,
    /// Image-capable Gemini model
    Gemini,
}

impl From<BackendArg> for ImageBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Imagen => ImageBackend::Imagen,
            BackendArg::Gemini => ImageBackend::Gemini,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match logging_config(args.verbose).and_then(figura::telemetry::init_subscriber) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            None
        }
    };

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn logging_config(verbose: bool) -> Result<SubscriberConfig, ExtrasError> {
    let mut config = SubscriberConfig::from_env()?;
    if verbose {
        config.log_level = tracing::Level::DEBUG;
    }
    Ok(config)
}

async fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let catalog = StyleCatalog::builtin();
    if args.list_styles {
        for style in catalog.iter() {
            println!("{:>3}  {}", style.id, style.title);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let Some(style) = catalog.get(args.style) else {
        eprintln!("unknown style id {} (see --list-styles)", args.style);
        return Ok(ExitCode::from(2));
    };
    let Some(path) = args.image.as_deref() else {
        eprintln!("--image is required");
        return Ok(ExitCode::from(2));
    };

    let mut builder = FiguraBuilder::from_env()?;
    if let Some(key) = args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(url) = args.base_url {
        builder = builder.base_url(url);
    }
    if let Some(backend) = args.backend {
        builder = builder.image_backend(backend.into());
    }
    if args.single_stage {
        builder = builder.single_stage();
    }
    if let Some(attempts) = args.max_attempts {
        builder = builder.max_attempts(attempts);
    }
    if let Some(ms) = args.base_delay_ms {
        builder = builder.base_delay(Duration::from_millis(ms));
    }
    if let Some(secs) = args.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let orchestrator = builder.build()?;

    let image = InputImage::from_path(path).await?;

    if args.analyze_only {
        return match orchestrator.analyze(&image, style).await {
            Ok(prompt) => {
                println!("{prompt}");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("{}", summarize_error(&e));
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let progress: Arc<dyn SessionObserver> = Arc::new(|snapshot: &SessionSnapshot| {
        if snapshot.phase.is_active() {
            eprintln!("… {}", snapshot.phase);
        }
    });
    let mut session = Session::new().with_observer(progress);
    session.select_input(image);

    let outcome = orchestrator.run(&mut session, Some(style)).await;
    if let Some(note) = outcome.report().and_then(recovery_note) {
        eprintln!("{note}");
    }

    if !session.phase().is_terminal() {
        eprintln!("run did not complete");
        return Ok(ExitCode::FAILURE);
    }
    match (session.result(), session.error()) {
        (Some(payload), _) => {
            let out = args.out.unwrap_or_else(|| {
                PathBuf::from(format!("figura-{}.{}", style.id, payload.file_extension()))
            });
            tokio::fs::write(&out, payload.decode()?).await?;
            println!("{}", out.display());
            Ok(ExitCode::SUCCESS)
        }
        (None, Some(error)) => {
            eprintln!("{}", summarize_error(error));
            Ok(ExitCode::FAILURE)
        }
        (None, None) => {
            eprintln!("run finished without a result");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Retry summary for a run that succeeded after backing off.
fn recovery_note(report: &RunReport) -> Option<String> {
    if report.phase != PipelinePhase::Succeeded || report.retries.is_empty() {
        return None;
    }
    Some(format!(
        "recovered from {} transient failure(s) in {:.1}s",
        report.retries.len(),
        report.elapsed.as_secs_f32()
    ))
}
