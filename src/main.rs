use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use code_mentor::analyzer::AnalyzerBridge;
use code_mentor::app::{Orchestrator, ReactiveMessage};
use code_mentor::config::{
    Config, CredentialProvider, EnvKeyringCredentials, StaticCredentials, API_KEY_ENV,
};
use code_mentor::report::{self, Palette};
use code_mentor::source::{LineSelection, SourceUnit};
use code_mentor::suggest::llm::{GenerationParams, OpenAiClient};
use code_mentor::suggest::SuggestionService;
use code_mentor::watch::FileWatcher;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "mentor",
    about = "Structural analysis and model-backed improvement suggestions for your code",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// API key for the completion endpoint (overrides env and keychain)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Colorize output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorChoice,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run structural analysis on a file
    Analyze {
        file: PathBuf,

        /// Also ask the model for improvement suggestions
        #[arg(long)]
        gpt: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask for suggestions steered by the file's structure
    Suggest {
        file: PathBuf,

        /// Only review lines START:END (1-based, inclusive)
        #[arg(long, value_name = "START:END")]
        lines: Option<LineSelection>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-analyze a file every time it is saved
    Watch { file: PathBuf },
    /// Store the API key in the system keychain
    Setup,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn palette(self) -> Palette {
        let enabled = match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
            }
        };
        Palette::new(enabled)
    }
}

struct Pipeline {
    orchestrator: Arc<Orchestrator>,
    suggestions: Arc<SuggestionService>,
    results: UnboundedReceiver<ReactiveMessage>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let palette = args.color.palette();
    match args.command {
        Command::Setup => setup(),
        Command::Analyze { file, gpt, json } => {
            let pipeline = build_pipeline(args.api_key)?;
            analyze(&pipeline, &file, gpt, json, palette).await
        }
        Command::Suggest { file, lines, json } => {
            let pipeline = build_pipeline(args.api_key)?;
            suggest(&pipeline, &file, lines, json, palette).await
        }
        Command::Watch { file } => {
            let pipeline = build_pipeline(args.api_key)?;
            watch(pipeline, &file, palette).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "code_mentor=debug,mentor=debug"
    } else {
        "code_mentor=info,mentor=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_pipeline(api_key: Option<String>) -> Result<Pipeline> {
    let config = Config::load();
    config
        .validate()
        .with_context(|| format!("Invalid config at {}", Config::config_location()))?;

    let credentials: Arc<dyn CredentialProvider> = match api_key {
        Some(key) => Arc::new(StaticCredentials(Some(key))),
        None => Arc::new(EnvKeyringCredentials),
    };
    let client = OpenAiClient::from_config(&config.endpoint)
        .context("Failed to set up the completion endpoint client")?;
    let suggestions = Arc::new(SuggestionService::new(
        credentials,
        Arc::new(client),
        GenerationParams::from_config(&config.endpoint),
        config.language.clone(),
    ));
    let analyzer = Arc::new(AnalyzerBridge::from_config(&config.analyzer));

    let (orchestrator, results) =
        Orchestrator::new(analyzer, Arc::clone(&suggestions), config.debounce());
    debug!(
        analyzer = %config.analyzer.program,
        model = %config.endpoint.model,
        debounce_ms = config.debounce_ms,
        "pipeline ready"
    );

    Ok(Pipeline {
        orchestrator,
        suggestions,
        results,
    })
}

fn read_source(file: &Path) -> Result<SourceUnit> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    Ok(SourceUnit::new(text, file.display().to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn analyze(
    pipeline: &Pipeline,
    file: &Path,
    gpt: bool,
    json: bool,
    palette: Palette,
) -> Result<()> {
    let source = read_source(file)?;
    let orchestrator = &pipeline.orchestrator;

    if gpt && !pipeline.suggestions.is_configured() {
        warn!(
            "no API key configured (set {} or run `mentor setup`); skipping suggestions",
            API_KEY_ENV
        );
    }

    if gpt && pipeline.suggestions.is_configured() {
        let combined = orchestrator.analyze_full(&source).await?;
        if json {
            return print_json(&combined);
        }
        print!("{}", report::render_structure(&combined.structure, palette));
        println!();
        print!(
            "{}",
            report::render_suggestion(
                &combined.suggestion,
                pipeline.suggestions.language(),
                palette
            )
        );
        return Ok(());
    }

    let structure = orchestrator.analyze_structure(&source).await?;
    if json {
        return print_json(&structure);
    }
    print!("{}", report::render_structure(&structure, palette));
    Ok(())
}

async fn suggest(
    pipeline: &Pipeline,
    file: &Path,
    lines: Option<LineSelection>,
    json: bool,
    palette: Palette,
) -> Result<()> {
    let mut source = read_source(file)?;
    if let Some(selection) = lines {
        source = source.narrow(selection).with_context(|| {
            format!(
                "Lines {} are outside {} ({} lines)",
                selection,
                file.display(),
                source.line_count()
            )
        })?;
    }

    let result = pipeline.orchestrator.suggest_focused(&source).await?;
    if json {
        return print_json(&result);
    }
    print!(
        "{}",
        report::render_suggestion(&result, pipeline.suggestions.language(), palette)
    );
    Ok(())
}

async fn watch(mut pipeline: Pipeline, file: &Path, palette: Palette) -> Result<()> {
    let (watcher, mut changes) = FileWatcher::start(file)?;
    info!(file = %watcher.path().display(), "watching for changes (Ctrl+C to stop)");

    let source = read_source(file)?;
    let mut last_text = source.text.clone();
    pipeline.orchestrator.notify_change(source);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                pipeline.orchestrator.cancel_pending();
                info!("stopped watching");
                return Ok(());
            }
            changed = changes.recv() => {
                if changed.is_none() {
                    return Err(anyhow!("file watcher stopped unexpectedly"));
                }
                let source = match read_source(file) {
                    Ok(source) => source,
                    Err(err) => {
                        warn!(error = %err, "couldn't read watched file");
                        continue;
                    }
                };
                if source.text == last_text {
                    continue;
                }
                last_text = source.text.clone();
                pipeline.orchestrator.notify_change(source);
            }
            message = pipeline.results.recv() => {
                let Some(message) = message else {
                    return Err(anyhow!("analysis channel closed unexpectedly"));
                };
                match message {
                    ReactiveMessage::Completed { result, .. } => {
                        print!("{}", report::render_structure(&result.structure, palette));
                        println!();
                        print!(
                            "{}",
                            report::render_suggestion(
                                &result.suggestion,
                                pipeline.suggestions.language(),
                                palette
                            )
                        );
                    }
                    ReactiveMessage::Failed { identity, error, .. } => {
                        error!(identity = %identity, stage = error.stage(), "{}", error);
                    }
                    ReactiveMessage::Superseded { identity, sequence } => {
                        debug!(identity = %identity, sequence, "stale analysis dropped");
                    }
                    ReactiveMessage::Cancelled { identity, sequence } => {
                        debug!(identity = %identity, sequence, "pending analysis cancelled");
                    }
                    ReactiveMessage::Crashed(detail) => {
                        error!("{}", detail);
                    }
                }
            }
        }
    }
}

fn setup() -> Result<()> {
    eprint!("Paste your API key for the completion endpoint: ");
    std::io::stderr().flush()?;

    let mut key = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut key)
        .context("Failed to read API key")?;
    let key = key.trim();
    if key.is_empty() {
        bail!("No API key entered");
    }

    code_mentor::keyring::set_api_key(key).map_err(|e| anyhow!(e))?;
    info!("API key saved to the system keychain");

    if Config::config_path().is_some_and(|path| !path.exists()) {
        Config::default()
            .save()
            .context("Failed to write default config")?;
        info!(path = %Config::config_location(), "wrote default config");
    }
    Ok(())
}
