use anyhow::{Context, Result};
use blogsmith::config::{
    default_config_path, find_config_file, load_config, Config, ConfigFile, LoggingConfig,
};
use blogsmith::export::{DocumentExporter, DocumentHandle};
use blogsmith::models::Style;
use blogsmith::pipeline::{PipelineError, PipelineState, PromptPipeline};
use blogsmith::provider::{GgufLoader, ModelProvider};
use blogsmith::ui::{self, Spinner, Status};
use blogsmith::utils::{compute_sha256, ensure_model, verify_sha256, ModelArtifact};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for a rejected request
const EXIT_REJECTED: i32 = 2;
/// Exit code for a failed generation
const EXIT_FAULTED: i32 = 1;
/// Exit code after Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

/// Blogsmith - Generate blog posts with a local language model and export them to PDF
#[derive(Parser, Debug)]
#[command(name = "blogsmith")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate blog posts with a local language model and export them to PDF", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (text if TTY, JSON otherwise)
    Auto,
    /// Plain text (human-readable)
    Text,
    /// JSON format (machine-readable)
    Json,
}

/// Writing style
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StyleArg {
    Researcher,
    DataAnalyst,
    CommonPeople,
}

impl From<StyleArg> for Style {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Researcher => Style::Researcher,
            StyleArg::DataAnalyst => Style::DataAnalyst,
            StyleArg::CommonPeople => Style::CommonPeople,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a blog post and export it to PDF
    #[command(alias = "g")]
    Generate {
        /// Topic of the post (asked for when omitted on a terminal)
        #[arg(long, short)]
        topic: Option<String>,

        /// Desired number of words (asked for when omitted on a terminal)
        #[arg(long, short)]
        words: Option<String>,

        /// Audience the post is written for
        #[arg(long, short, value_enum)]
        style: Option<StyleArg>,

        /// Directory to write the PDF into
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// PDF file name
        #[arg(long)]
        file_name: Option<String>,

        /// Print the post without writing a PDF
        #[arg(long)]
        no_export: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Auto)]
        format: OutputFormat,
    },

    /// Inspect or fetch the model artifact
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ModelCommands {
    /// Show the configured model and whether it is available
    Status,

    /// Download the model if it is missing
    Download,

    /// Check the model weights against `model.sha256`, or print their hash
    Verify,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a configuration file with the default settings
    Init {
        /// Where to write the file (default: user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

/// Result of `generate` in JSON form
#[derive(Debug, Serialize)]
struct GenerateOutput<'a> {
    status: &'static str,
    topic: &'a str,
    words: &'a str,
    style: Style,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    export_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<DocumentHandle>,
}

impl<'a> GenerateOutput<'a> {
    fn new(form: &GenerateForm<'a>, status: PipelineState) -> Self {
        Self {
            status: status.as_str(),
            topic: form.topic,
            words: form.words,
            style: form.style,
            text: None,
            error: None,
            export_error: None,
            document: None,
        }
    }
}

/// Print all available environment variables
fn print_env_vars() {
    println!("Blogsmith - Environment Variables");
    println!();
    println!("Model:");
    println!("  BLOGSMITH_MODEL__PATH               Path to the GGUF model weights");
    println!("  BLOGSMITH_MODEL__TOKENIZER_PATH     Path to tokenizer.json (default: beside the model)");
    println!("  BLOGSMITH_MODEL__DOWNLOAD_URL       URL to fetch the model from when missing");
    println!("  BLOGSMITH_MODEL__SHA256             Expected SHA256 of the downloaded model");
    println!();
    println!("Generation:");
    println!("  BLOGSMITH_GENERATION__TEMPERATURE     Sampling temperature (default: 0.01)");
    println!("  BLOGSMITH_GENERATION__SEED            Sampling seed");
    println!("  BLOGSMITH_GENERATION__TOKENS_PER_WORD Token budget per requested word (default: 2)");
    println!("  BLOGSMITH_GENERATION__MAX_TOKENS_CAP  Upper bound on the token budget (default: 512)");
    println!("  BLOGSMITH_GENERATION__TIMEOUT_SECS    Generation deadline in seconds (default: none)");
    println!();
    println!("Export:");
    println!("  BLOGSMITH_EXPORT__OUTPUT_DIR        Directory for the PDF (default: .)");
    println!("  BLOGSMITH_EXPORT__FILE_NAME         PDF file name (default: blog_output.pdf)");
    println!("  BLOGSMITH_EXPORT__FONT              Standard PDF font (default: Helvetica)");
    println!("  BLOGSMITH_EXPORT__FONT_SIZE         Font size in points (default: 12)");
    println!();
    println!("Logging:");
    println!("  BLOGSMITH_LOGGING__LEVEL            Log level (default: info)");
    println!("  BLOGSMITH_LOGGING__FORMAT           Set to 'json' for JSON logs");
    println!("  RUST_LOG                            Overrides the log filter entirely");
    println!();
    println!("Example:");
    println!("  export BLOGSMITH_MODEL__PATH=\"models/llama-2-7b-chat.Q8_0.gguf\"");
    println!("  export BLOGSMITH_GENERATION__TIMEOUT_SECS=\"300\"");
    std::process::exit(0);
}

/// Build the log filter directive from flags and settings
fn log_directive(verbose: u8, quiet: bool, logging: &LoggingConfig) -> String {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };
    format!("blogsmith={}", level)
}

fn init_tracing(cli: &Cli, logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| log_directive(cli.verbose, cli.quiet, logging)),
    );

    let (json, plain) = if logging.is_json() {
        (
            Some(tracing_subscriber::fmt::layer().json().with_writer(io::stderr)),
            None,
        )
    } else {
        (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(io::stderr)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show environment variables and exit if requested
    if cli.env {
        print_env_vars();
    }

    // Load configuration from file if specified or found in default locations
    let config_path = cli.config.clone().or_else(find_config_file);
    let mut config = load_config(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    init_tracing(&cli, &config.logging);
    if let Some(path) = &config_path {
        tracing::debug!("Using config file: {}", path.display());
    }

    match cli.command {
        Some(Commands::Generate {
            topic,
            words,
            style,
            output_dir,
            file_name,
            no_export,
            format,
        }) => {
            if let Some(dir) = output_dir {
                config.export.output_dir = dir;
            }
            if let Some(name) = file_name {
                config.export.file_name = name;
            }

            let json = match format {
                OutputFormat::Json => true,
                OutputFormat::Text => false,
                OutputFormat::Auto => !ui::is_terminal(),
            };

            let interactive = ui::is_interactive() && !json;
            if interactive && !cli.quiet && (topic.is_none() || words.is_none()) {
                ui::print_banner();
            }

            let topic = match topic {
                Some(topic) => topic,
                None if interactive => prompt_line("Enter the Blog Topic")?,
                None => String::new(),
            };
            let words = match words {
                Some(words) => words,
                None if interactive => prompt_line("No of Words")?,
                None => String::new(),
            };
            let style = match style {
                Some(style) => Style::from(style),
                None if interactive => prompt_style()?,
                None => Style::default(),
            };

            // Composition root: one provider per process, shared by the pipeline
            let provider = Arc::new(ModelProvider::new(Arc::new(GgufLoader::from_config(
                &config,
            ))));
            let pipeline = PromptPipeline::from_config(provider, &config.generation);
            let exporter = DocumentExporter::from_config(&config.export);

            let show_spinner = ui::is_terminal() && !cli.quiet && !json;
            let spinner = Spinner::with_visibility("Generating blog post...", show_spinner);
            if !show_spinner && !cli.quiet && !json {
                ui::print_status(Status::InProgress, "Generating blog post...");
            }

            let form = GenerateForm {
                topic: &topic,
                words: &words,
                style,
            };
            let options = GenerateOptions {
                json,
                quiet: cli.quiet,
                no_export,
            };
            let mut stdout = io::stdout();

            let outcome = tokio::select! {
                outcome = run_generate(&pipeline, &exporter, &form, &options, &spinner, &mut stdout) => outcome?,
                _ = tokio::signal::ctrl_c() => {
                    spinner.finish_with_error("Interrupted");
                    std::process::exit(EXIT_INTERRUPTED);
                }
            };

            if outcome != Outcome::Succeeded {
                std::process::exit(outcome.exit_code());
            }
        }

        Some(Commands::Model { command }) => match command {
            ModelCommands::Status => {
                print_model_status(&config);
            }
            ModelCommands::Download => {
                let artifact = ensure_model(&config.model)
                    .await
                    .context("Model download failed")?;
                match artifact {
                    ModelArtifact::Present(path) => ui::print_status(
                        Status::Info,
                        &format!("Model already present at {}", path.display()),
                    ),
                    ModelArtifact::Downloaded { path, bytes } => ui::print_status(
                        Status::Success,
                        &format!(
                            "Downloaded {} to {}",
                            ui::format_file_size(bytes),
                            path.display()
                        ),
                    ),
                }
            }
            ModelCommands::Verify => {
                let path = config
                    .model
                    .path
                    .as_deref()
                    .context("No model path configured (set model.path or BLOGSMITH_MODEL__PATH)")?;
                match config.model.sha256.as_deref() {
                    Some(expected) => {
                        if verify_sha256(path, expected)? {
                            ui::print_status(
                                Status::Success,
                                &format!("Checksum matches for {}", path.display()),
                            );
                        } else {
                            ui::print_status(
                                Status::Error,
                                &format!("SHA256 mismatch for {}", path.display()),
                            );
                            std::process::exit(EXIT_FAULTED);
                        }
                    }
                    None => {
                        let hash = compute_sha256(path)?;
                        println!("{}  {}", hash, path.display());
                    }
                }
            }
        },

        Some(Commands::Config { command }) => match command {
            ConfigCommands::Init { path, force } => {
                let path = path
                    .or_else(default_config_path)
                    .context("Could not determine a configuration directory; pass --path")?;
                ConfigFile::new(Config::default()).save(&path, force)?;
                ui::print_status(
                    Status::Success,
                    &format!("Wrote configuration to {}", path.display()),
                );
            }
            ConfigCommands::Show => {
                if !cli.quiet {
                    let source = config_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "defaults and environment".to_string());
                    println!("# Source: {}", source);
                }
                print!("{}", ConfigFile::new(config).to_toml()?);
            }
        },

        Some(Commands::Completions { shell }) => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "blogsmith", &mut io::stdout());
        }

        None => {
            // No command provided - show help
            println!("No command provided. Use --help for usage information.");
            println!("Common commands:");
            println!("  generate                                - Generate a post (asks for missing fields)");
            println!("  generate -t <topic> -w <words> -s <style> - Generate a post non-interactively");
            println!("  model status                            - Show the configured model");
            println!("  model download                          - Fetch the model if it is missing");
            println!("  model verify                            - Check the model checksum");
            println!("  config init                             - Write a default configuration file");
        }
    }

    Ok(())
}

/// Form fields of one `generate` request, as entered
#[derive(Debug, Clone, Copy)]
struct GenerateForm<'a> {
    topic: &'a str,
    words: &'a str,
    style: Style,
}

#[derive(Debug, Clone, Copy, Default)]
struct GenerateOptions {
    json: bool,
    quiet: bool,
    no_export: bool,
}

/// How a `generate` request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Rejected,
    Faulted,
    /// The post was generated and written out, but the PDF was not
    ExportFailed,
}

impl Outcome {
    fn exit_code(self) -> i32 {
        match self {
            Outcome::Succeeded => 0,
            Outcome::Rejected => EXIT_REJECTED,
            Outcome::Faulted | Outcome::ExportFailed => EXIT_FAULTED,
        }
    }
}

/// Run one request through the pipeline and the exporter, writing the result
/// to `out`. The generated text is written before the PDF, so an export
/// failure never loses it.
async fn run_generate(
    pipeline: &PromptPipeline,
    exporter: &DocumentExporter,
    form: &GenerateForm<'_>,
    options: &GenerateOptions,
    spinner: &Spinner,
    out: &mut impl Write,
) -> Result<Outcome> {
    let result = pipeline.generate(form.topic, form.words, form.style).await;
    spinner.finish_and_clear();

    let text = match result {
        Ok(text) => text,
        Err(PipelineError::ModelLoad(e)) => {
            if options.json {
                write_json(
                    out,
                    &GenerateOutput {
                        error: Some(e.to_string()),
                        ..GenerateOutput::new(form, PipelineState::Faulted)
                    },
                )?;
            }
            return Err(anyhow::Error::new(e)
                .context("Could not load the model (see `blogsmith model status`)"));
        }
        Err(err) => {
            let (status, outcome) = match err {
                PipelineError::Rejected(_) => (Status::Warning, Outcome::Rejected),
                _ => (Status::Error, Outcome::Faulted),
            };
            if options.json {
                write_json(
                    out,
                    &GenerateOutput {
                        error: Some(err.to_string()),
                        ..GenerateOutput::new(form, err.state())
                    },
                )?;
            } else {
                ui::print_status(status, &err.to_string());
            }
            return Ok(outcome);
        }
    };

    if !options.json {
        if !options.quiet {
            writeln!(out)?;
            writeln!(out, "{}", ui::section_header("Blog"))?;
        }
        writeln!(out, "{}", text)?;
        if !options.quiet {
            writeln!(out, "{}", ui::divider_line())?;
        }
        out.flush()?;
    }

    if options.no_export {
        if options.json {
            write_json(
                out,
                &GenerateOutput {
                    text: Some(&text),
                    ..GenerateOutput::new(form, PipelineState::Succeeded)
                },
            )?;
        } else if !options.quiet {
            writeln!(
                out,
                "{}",
                ui::status_line(Status::Success, "Generated blog post (export skipped)")
            )?;
        }
        return Ok(Outcome::Succeeded);
    }

    match exporter.export(&text) {
        Ok(handle) => {
            if options.json {
                write_json(
                    out,
                    &GenerateOutput {
                        text: Some(&text),
                        document: Some(handle),
                        ..GenerateOutput::new(form, PipelineState::Succeeded)
                    },
                )?;
            } else if !options.quiet {
                let size = handle.size().map(ui::format_file_size).unwrap_or_default();
                writeln!(
                    out,
                    "{}",
                    ui::status_line(
                        Status::Success,
                        &format!(
                            "Saved {} ({} pages, {})",
                            handle.path.display(),
                            handle.pages,
                            size
                        ),
                    )
                )?;
            }
            Ok(Outcome::Succeeded)
        }
        Err(e) => {
            tracing::error!(error = %e, "Export failed");
            if options.json {
                write_json(
                    out,
                    &GenerateOutput {
                        text: Some(&text),
                        export_error: Some(e.to_string()),
                        ..GenerateOutput::new(form, PipelineState::Succeeded)
                    },
                )?;
            } else {
                ui::print_status(Status::Error, &format!("PDF not saved: {}", e));
            }
            Ok(Outcome::ExportFailed)
        }
    }
}

fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn print_model_status(config: &Config) {
    ui::print_section("Model");

    match &config.model.path {
        Some(path) if path.is_file() => {
            let size = std::fs::metadata(path)
                .map(|m| ui::format_file_size(m.len()))
                .unwrap_or_default();
            ui::print_status(
                Status::Success,
                &format!("Weights:   {} ({})", path.display(), size),
            );
        }
        Some(path) => ui::print_status(
            Status::Warning,
            &format!("Weights:   {} (missing)", path.display()),
        ),
        None => ui::print_status(Status::Error, "Weights:   not configured"),
    }

    match config.model.resolved_tokenizer_path() {
        Some(path) if path.is_file() => ui::print_status(
            Status::Success,
            &format!("Tokenizer: {}", path.display()),
        ),
        Some(path) => ui::print_status(
            Status::Warning,
            &format!("Tokenizer: {} (missing)", path.display()),
        ),
        None => ui::print_status(Status::Idle, "Tokenizer: not configured"),
    }

    match &config.model.download_url {
        Some(url) => ui::print_status(Status::Info, &format!("Download:  {}", url)),
        None => ui::print_status(Status::Idle, "Download:  no URL configured"),
    }

    ui::print_status(
        Status::Info,
        &format!(
            "Sampling:  temperature {} / budget {} tokens per word, cap {}",
            config.generation.temperature,
            config.generation.tokens_per_word,
            config.generation.max_tokens_cap
        ),
    );
}

/// Ask for a single line on stdin
fn prompt_line(label: &str) -> Result<String> {
    let stdin = io::stdin();
    read_field(&mut stdin.lock(), &mut io::stdout(), label)
}

fn read_field(input: &mut impl BufRead, output: &mut impl Write, label: &str) -> Result<String> {
    write!(output, "{}: ", label)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line).context("Failed to read input")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Ask for a writing style by number or name; empty input picks the default
fn prompt_style() -> Result<Style> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    for (i, style) in Style::ALL.iter().enumerate() {
        println!("  {}) {}", i + 1, style);
    }

    loop {
        let answer = read_field(&mut input, &mut output, "Writing the blog for")?;
        match parse_style_choice(&answer) {
            Some(style) => return Ok(style),
            None => ui::print_status(
                Status::Warning,
                "choose 1-3 or one of: researcher, data analyst, common people",
            ),
        }
    }
}

fn parse_style_choice(answer: &str) -> Option<Style> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Some(Style::default());
    }
    if let Ok(n) = answer.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| Style::ALL.get(i).copied());
    }
    answer.parse().ok()
}
