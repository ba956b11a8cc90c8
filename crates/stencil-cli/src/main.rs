use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stencil_lexer::Delimiters;
use stencil_parser::ParseError;
use stencil_render::{FilterEngine, RenderOptions, Renderer, Value};

#[derive(Parser)]
#[command(name = "stencil")]
#[command(about = "stencil: render text templates against JSON data")]
#[command(version)]
struct Cli {
    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template
    Render {
        /// Template file
        template: PathBuf,

        /// JSON data file (defaults to an empty object)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Write output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop at the first render error
        #[arg(long)]
        throw_on_error: bool,

        /// Maximum nesting of if/for/block bodies
        #[arg(long, default_value_t = stencil_render::renderer::DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        #[command(flatten)]
        delimiters: DelimiterArgs,
    },

    /// Check a template for errors without rendering it
    Check {
        /// Template file
        template: PathBuf,

        #[command(flatten)]
        delimiters: DelimiterArgs,
    },
}

/// Delimiter overrides; unset ones keep their defaults.
#[derive(Args)]
struct DelimiterArgs {
    #[arg(long, value_name = "STR")]
    statement_start: Option<String>,
    #[arg(long, value_name = "STR")]
    statement_end: Option<String>,
    #[arg(long, value_name = "STR")]
    expression_start: Option<String>,
    #[arg(long, value_name = "STR")]
    expression_end: Option<String>,
    #[arg(long, value_name = "STR")]
    comment_start: Option<String>,
    #[arg(long, value_name = "STR")]
    comment_end: Option<String>,
}

impl DelimiterArgs {
    fn resolve(self) -> Delimiters {
        let defaults = Delimiters::default();
        Delimiters {
            statement_start: self.statement_start.unwrap_or(defaults.statement_start),
            statement_end: self.statement_end.unwrap_or(defaults.statement_end),
            expression_start: self.expression_start.unwrap_or(defaults.expression_start),
            expression_end: self.expression_end.unwrap_or(defaults.expression_end),
            comment_start: self.comment_start.unwrap_or(defaults.comment_start),
            comment_end: self.comment_end.unwrap_or(defaults.comment_end),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Data {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Lexer(#[from] stencil_lexer::LexerError),
    #[error(transparent)]
    Render(#[from] stencil_render::RenderError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Render {
            template,
            data,
            output,
            throw_on_error,
            max_depth,
            delimiters,
        } => {
            let mut options = RenderOptions::default().with_max_depth(max_depth);
            if throw_on_error {
                options = options.throw_on_error();
            }
            cmd_render(
                &template,
                data.as_deref(),
                output.as_deref(),
                options,
                &delimiters.resolve(),
            )
        }
        Command::Check {
            template,
            delimiters,
        } => cmd_check(&template, &delimiters.resolve()),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn read_file(path: &Path) -> Result<String, CliError> {
    if !path.exists() {
        return Err(CliError::NotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_data(path: Option<&Path>) -> Result<Value, CliError> {
    let Some(path) = path else {
        return Ok(Value::Object(Default::default()));
    };
    let text = read_file(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Data {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns whether the render was clean.
fn cmd_render(
    template: &Path,
    data: Option<&Path>,
    output: Option<&Path>,
    options: RenderOptions,
    delimiters: &Delimiters,
) -> Result<bool, CliError> {
    let source = read_file(template)?;
    let data = load_data(data)?;

    let parsed = stencil_parser::parse_source(&source, delimiters)?;
    for error in &parsed.errors {
        eprintln!("{}: {}", template.display(), format_diagnostic(error));
    }

    let renderer = Renderer::new(FilterEngine::new(), options);
    let result = renderer.render(&parsed.ast, &data)?;
    for error in &result.errors {
        match error.span {
            Some(span) => eprintln!("{}:{}: {error}", template.display(), span.start),
            None => eprintln!("{}: {error}", template.display()),
        }
    }

    match output {
        Some(path) => std::fs::write(path, &result.output).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        })?,
        None => print!("{}", result.output),
    }
    Ok(result.success)
}

/// Returns whether the template is free of diagnostics.
fn cmd_check(template: &Path, delimiters: &Delimiters) -> Result<bool, CliError> {
    let source = read_file(template)?;
    let parsed = stencil_parser::parse_source(&source, delimiters)?;

    for error in &parsed.errors {
        println!("{}", format_diagnostic(error));
    }
    if parsed.errors.is_empty() {
        eprintln!("OK: {}", template.display());
        Ok(true)
    } else {
        eprintln!(
            "{}: {} problem(s) found",
            template.display(),
            parsed.errors.len()
        );
        Ok(false)
    }
}

/// `line:column kind: message (suggestion)`
fn format_diagnostic(error: &ParseError) -> String {
    let mut line = format!(
        "{} {}: {}",
        error.location.start, error.kind, error.message
    );
    if let Some(suggestion) = &error.suggestion {
        line.push_str(&format!(" ({suggestion})"));
    }
    line
}
