use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use docsift_answer::summary::{estimate_tokens, prepare_document, DEFAULT_SUMMARY_TOKENS};
use docsift_answer::AnswerClient;
use docsift_core::{DocsiftConfig, DocsiftError, IndexMode, OutputFormat, ScoredResult};
use docsift_retrieval::chunker::chunk_spans;
use docsift_retrieval::{IndexObserver, NoopObserver, Retriever};

const CONFIG_FILE: &str = ".docsift.toml";

#[derive(Parser)]
#[command(
    name = "docsift",
    version,
    about = "Document retrieval for question answering",
    long_about = "Docsift splits a document into overlapping chunks, embeds them when an\n\
                   embedding provider is reachable, and ranks chunks against free-text queries.\n\
                   Without embeddings it falls back to keyword scoring.\n\n\
                   Examples:\n  \
                     docsift search notes.md 'cell division'   Show the best matching chunks\n  \
                     docsift ask notes.md 'What is mitosis?'     Answer using the matching chunks\n  \
                     docsift summarize notes.md                   Summarize the whole document\n  \
                     docsift chunks notes.md                      Show how the document is split\n  \
                     docsift init                                 Create a .docsift.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .docsift.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable output (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Rank a document's chunks against a query
    #[command(long_about = "Rank a document's chunks against a query.\n\n\
        Uses semantic similarity when the embedding provider is available and\n\
        keyword scoring otherwise.\n\n\
        Examples:\n  docsift search notes.md 'cell division'\n  docsift search notes.md osmosis --top-k 5 --format json")]
    Search {
        /// Text document to search
        file: PathBuf,

        /// Search query
        query: String,

        /// Number of chunks to return (default: from config, 3)
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Answer a question using the best matching chunks as context
    #[command(long_about = "Answer a question using the best matching chunks as context.\n\n\
        Retrieves the top chunks and posts them with the question to the answer\n\
        endpoint configured under [answer].\n\n\
        Examples:\n  docsift ask notes.md 'What is mitosis?'\n  docsift ask notes.md 'Explain osmosis' --mood confused --max-tokens 1000")]
    Ask {
        /// Text document to consult
        file: PathBuf,

        /// Question to answer
        question: String,

        /// Mood label that adjusts the answer's tone (default: from config)
        #[arg(long)]
        mood: Option<String>,

        /// Generation budget (default: from config, 600)
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Summarize a whole document
    #[command(long_about = "Summarize a whole document.\n\n\
        Joins every chunk, trims the text to about 5000 tokens, and asks the\n\
        answer endpoint for a summary.")]
    Summarize {
        /// Text document to summarize
        file: PathBuf,

        /// Mood label that adjusts the summary's tone (default: from config)
        #[arg(long)]
        mood: Option<String>,
    },
    /// Show how a document is split into chunks
    Chunks {
        /// Text document to split
        file: PathBuf,
    },
    /// Create a default .docsift.toml configuration file
    #[command(long_about = "Create a default .docsift.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .docsift.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Drives an indicatif bar from indexing notifications.
struct ProgressObserver {
    bar: indicatif::ProgressBar,
}

impl ProgressObserver {
    fn new() -> Self {
        let bar = indicatif::ProgressBar::new_spinner();
        if let Ok(style) =
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({elapsed})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }
}

impl IndexObserver for ProgressObserver {
    fn on_status_update(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn on_chunking_complete(&self, chunk_count: usize) {
        self.bar.set_length(chunk_count as u64);
        self.bar.set_position(0);
    }

    fn on_progress(&self, indexed: usize, _total: usize) {
        self.bar.set_position(indexed as u64);
    }

    fn on_indexing_complete(&self, _final_count: usize) {
        self.bar.finish_and_clear();
    }
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mdocsift\x1b[0m v{version}: find the parts of a document that answer a question\n");
        println!("Quick start:");
        println!("  \x1b[36mdocsift init\x1b[0m                       Create a .docsift.toml config file");
        println!("  \x1b[36mdocsift search notes.md 'query'\x1b[0m    Rank chunks against a query\n");
        println!("All commands:");
        println!("  \x1b[32msearch\x1b[0m     Semantic search with keyword fallback");
        println!("  \x1b[32mask\x1b[0m        Answer a question from the document");
        println!("  \x1b[32msummarize\x1b[0m  Summarize the document");
        println!("  \x1b[32mchunks\x1b[0m     Show how the document is split");
        println!("  \x1b[32minit\x1b[0m       Create default configuration\n");
    } else {
        println!("docsift v{version}: find the parts of a document that answer a question\n");
        println!("Quick start:");
        println!("  docsift init                       Create a .docsift.toml config file");
        println!("  docsift search notes.md 'query'    Rank chunks against a query\n");
        println!("All commands:");
        println!("  search     Semantic search with keyword fallback");
        println!("  ask        Answer a question from the document");
        println!("  summarize  Summarize the document");
        println!("  chunks     Show how the document is split");
        println!("  init       Create default configuration\n");
    }

    println!("Run 'docsift <command> --help' for details.");
}

fn init_tracing(verbose: bool, use_color: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(use_color)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DocsiftConfig> {
    let config = match path {
        Some(path) => DocsiftConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                DocsiftConfig::from_file(default_path)?
            } else {
                DocsiftConfig::default()
            }
        }
    };
    Ok(config)
}

/// Read a document as UTF-8 text.
fn extract_text(path: &Path) -> std::result::Result<String, DocsiftError> {
    if !path.exists() {
        return Err(DocsiftError::FileNotFound(path.to_path_buf()));
    }
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        return Err(DocsiftError::UnsupportedDocument(format!(
            "{}: PDF input is not supported, convert it to text first",
            path.display()
        )));
    }
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::InvalidData => {
            DocsiftError::UnsupportedDocument(format!("{}: not UTF-8 text", path.display()))
        }
        _ => DocsiftError::Io(e),
    })
}

fn require_text(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        miette::bail!("{label} must not be empty");
    }
    Ok(())
}

/// Build a retriever, index `file`, and return it ready to query.
async fn index_file(config: &DocsiftConfig, file: &Path, show_progress: bool) -> Result<Retriever> {
    let text = extract_text(file)?;

    let observer: Arc<dyn IndexObserver> = if show_progress {
        Arc::new(ProgressObserver::new())
    } else {
        Arc::new(NoopObserver)
    };
    let retriever = Retriever::from_config(config, observer)?;

    let count = retriever.index_document(&text).await?;
    tracing::debug!(count, mode = %retriever.mode(), file = %file.display(), "indexed");
    if retriever.mode() == IndexMode::Keyword {
        eprintln!("note: embedding model unavailable; using keyword search");
    }
    Ok(retriever)
}

fn print_results(query: &str, mode: IndexMode, results: &[ScoredResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "query": query,
                "mode": mode,
                "results": results,
            });
            println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Results for \"{query}\"\n");
            println!("_Search mode: {mode}_\n");
            for (i, result) in results.iter().enumerate() {
                println!("## {}. Score {:.3}\n", i + 1, result.score);
                for line in result.text.lines() {
                    println!("> {line}");
                }
                println!();
            }
        }
        OutputFormat::Text => {
            for (i, result) in results.iter().enumerate() {
                println!("[{}] score {:.3}", i + 1, result.score);
                println!("{}\n", result.text);
            }
            println!("{} result(s), {mode} search", results.len());
        }
    }
    Ok(())
}

fn print_answer(question: &str, answer: &str, context: &[ScoredResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "question": question,
                "answer": answer,
                "context": context,
            });
            println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("**Q:** {question}\n");
            println!("{answer}");
        }
        OutputFormat::Text => println!("{answer}"),
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Docsift Configuration

[retrieval]
# Characters per chunk and characters shared between neighbouring chunks
# chunk_size = 2000
# overlap = 400
# Chunks returned per query
# top_k = 3
# Chunks embedded concurrently
# batch_size = 5

[embedding]
# OpenAI-compatible embeddings endpoint ("openai" or "ollama")
# provider = "openai"
# model = "text-embedding-3-small"
# base_url = "https://api.openai.com/v1"
# api_key = ""   # or set DOCSIFT_EMBEDDING_API_KEY / OPENAI_API_KEY
# init_timeout_secs = 30

[answer]
# base_url = "http://localhost:3000"
# endpoint = "/api/answer"
# max_tokens = 600
# mood = "neutral"
# timeout_secs = 120
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };
    init_tracing(cli.verbose, use_color);

    let mut config = load_config(cli.config.as_deref())?;
    let show_progress = std::io::stderr().is_terminal() && !cli.verbose;

    match cli.command {
        None => print_welcome(use_color),
        Some(Command::Search {
            ref file,
            ref query,
            top_k,
        }) => {
            require_text("query", query)?;
            if let Some(top_k) = top_k {
                config.retrieval.top_k = top_k;
            }

            let retriever = index_file(&config, file, show_progress).await?;
            let results = retriever.search_default(query).await?;
            print_results(query, retriever.mode(), &results, cli.format)?;
        }
        Some(Command::Ask {
            ref file,
            ref question,
            ref mood,
            max_tokens,
        }) => {
            require_text("question", question)?;
            if let Some(max_tokens) = max_tokens {
                config.answer.max_tokens = max_tokens;
            }

            let retriever = index_file(&config, file, show_progress).await?;
            let context = retriever.context_for(question).await;

            let client = AnswerClient::new(&config.answer)?;
            let answer = client.ask(question, &context, mood.as_deref()).await?;
            print_answer(question, &answer, &context, cli.format)?;
        }
        Some(Command::Summarize { ref file, ref mood }) => {
            let retriever = index_file(&config, file, show_progress).await?;
            if !retriever.is_indexed() {
                miette::bail!("{} contains no text to summarize", file.display());
            }

            let texts = retriever.chunk_texts();
            let (document, truncated) = prepare_document(&texts, DEFAULT_SUMMARY_TOKENS);
            if truncated {
                let total = estimate_tokens(&texts.join("\n\n"));
                eprintln!("Document is large (~{total} tokens). Summarizing key sections...");
            }

            let client = AnswerClient::new(&config.answer)?;
            let summary = client.summarize(&document, mood.as_deref()).await?;
            match cli.format {
                OutputFormat::Json => {
                    let out = serde_json::json!({ "summary": summary, "truncated": truncated });
                    println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
                }
                OutputFormat::Markdown => println!("## Document Summary\n\n{summary}"),
                OutputFormat::Text => println!("{summary}"),
            }
        }
        Some(Command::Chunks { ref file }) => {
            let text = extract_text(file)?;
            let spans = chunk_spans(&text, config.retrieval.chunk_size, config.retrieval.overlap)?;
            let chars: Vec<char> = text.chars().collect();
            // Windows that are all whitespace are skipped when indexing.
            let blank: Vec<bool> = spans
                .iter()
                .map(|s| chars[s.start..s.end].iter().all(|c| c.is_whitespace()))
                .collect();
            let kept = blank.iter().filter(|b| !**b).count();

            match cli.format {
                OutputFormat::Json => {
                    let chunks: Vec<serde_json::Value> = spans
                        .iter()
                        .zip(&blank)
                        .enumerate()
                        .map(|(i, (s, blank))| {
                            serde_json::json!({
                                "index": i,
                                "start": s.start,
                                "end": s.end,
                                "chars": s.len(),
                                "blank": blank,
                            })
                        })
                        .collect();
                    let out = serde_json::json!({
                        "chunkSize": config.retrieval.chunk_size,
                        "overlap": config.retrieval.overlap,
                        "count": kept,
                        "windows": spans.len(),
                        "chunks": chunks,
                    });
                    println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("| # | start | end | chars | indexed |");
                    println!("|---|-------|-----|-------|---------|");
                    for (i, (s, blank)) in spans.iter().zip(&blank).enumerate() {
                        let indexed = if *blank { "no" } else { "yes" };
                        println!("| {} | {} | {} | {} | {indexed} |", i + 1, s.start, s.end, s.len());
                    }
                }
                OutputFormat::Text => {
                    println!(
                        "{kept} chunk(s) from {} window(s) (size {}, overlap {})",
                        spans.len(),
                        config.retrieval.chunk_size,
                        config.retrieval.overlap
                    );
                    for (i, (s, blank)) in spans.iter().zip(&blank).enumerate() {
                        let note = if *blank { "  (blank, skipped)" } else { "" };
                        println!(
                            "  {:>3}  {:>7}..{:<7} {} chars{note}",
                            i + 1,
                            s.start,
                            s.end,
                            s.len()
                        );
                    }
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "docsift", &mut std::io::stdout());
        }
    }

    Ok(())
}
