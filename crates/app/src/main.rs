use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_qa_core::{
    export_index, import_index, CharacterNgramEmbedder, ExtractionStrategy, HfTokenizer,
    HttpGenerator, IndexCatalog, IngestOutcome, IngestPipeline, IngestionOptions, PageExtractor,
    QueryEngine, QueryOptions, TextTokenizer, WhitespaceTokenizer, DEFAULT_INDEX_PREFIX,
    UPLOADED_INDEX_PREFIX,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding one subdirectory per named index
    #[arg(long, env = "PDF_QA_INDEX_DIR", default_value = "indexes")]
    index_dir: PathBuf,

    /// Hugging Face tokenizer.json used for chunk windows and context truncation
    #[arg(long, env = "PDF_QA_TOKENIZER")]
    tokenizer: Option<PathBuf>,

    /// Base URL of the text-generation server
    #[arg(long, env = "PDF_QA_GENERATOR_URL", default_value = "http://localhost:8080")]
    generator_url: String,

    /// Bearer token for the text-generation server
    #[arg(long, env = "PDF_QA_GENERATOR_API_KEY", hide_env_values = true)]
    generator_api_key: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Auto,
    Text,
    Ocr,
}

impl From<Strategy> for ExtractionStrategy {
    fn from(value: Strategy) -> Self {
        match value {
            Strategy::Auto => ExtractionStrategy::Auto,
            Strategy::Text => ExtractionStrategy::TextLayer,
            Strategy::Ocr => ExtractionStrategy::Ocr,
        }
    }
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Name of the index to query.
    #[arg(long)]
    index: String,
    /// Number of chunks retrieved per question.
    #[arg(long, default_value = "4")]
    top_k: usize,
    /// Token budget for the retrieved context.
    #[arg(long, default_value = "500")]
    max_context_tokens: usize,
    /// Upper bound on generated tokens.
    #[arg(long, default_value = "300")]
    max_new_tokens: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Split, extract, chunk and embed a PDF into a named index.
    Ingest {
        /// PDF to ingest.
        #[arg(long)]
        pdf: PathBuf,
        /// Index name; defaults to index_<n>.
        #[arg(long)]
        name: Option<String>,
        /// Pages per batch.
        #[arg(long, default_value = "50")]
        batch_size: u32,
        /// Tokens per chunk window.
        #[arg(long, default_value = "512")]
        chunk_tokens: usize,
        /// Tokens shared by consecutive windows.
        #[arg(long, default_value = "50")]
        chunk_overlap: usize,
        /// Chunks with fewer words are dropped.
        #[arg(long, default_value = "20")]
        min_words: usize,
        /// Text extraction strategy.
        #[arg(long, value_enum, default_value = "auto")]
        strategy: Strategy,
        /// Continue past batches whose extraction fails.
        #[arg(long, default_value_t = false)]
        skip_failed_batches: bool,
    },
    /// List the indexes in the index directory.
    List,
    /// Answer one question from an index.
    Ask {
        #[command(flatten)]
        query: QueryArgs,
        /// The question.
        #[arg(long)]
        question: String,
        /// Print the retrieved chunks with their page ranges.
        #[arg(long, default_value_t = false)]
        show_sources: bool,
    },
    /// Ask questions interactively; type `exit` to quit.
    Chat {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Pack an index directory into a zip archive.
    Export {
        /// Name of the index to export.
        #[arg(long)]
        index: String,
        /// Archive path; defaults to <index-dir>/<index>.zip.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Unpack a zip archive into a new index.
    Import {
        /// Archive produced by `export`.
        #[arg(long)]
        archive: PathBuf,
        /// Index name; defaults to uploaded_index_<n>.
        #[arg(long)]
        name: Option<String>,
    },
}

type Engine = QueryEngine<CharacterNgramEmbedder, Box<dyn TextTokenizer>, HttpGenerator>;

fn load_tokenizer(path: Option<&Path>) -> anyhow::Result<Box<dyn TextTokenizer>> {
    match path {
        Some(path) => Ok(Box::new(HfTokenizer::from_file(path)?)),
        None => Ok(Box::new(WhitespaceTokenizer)),
    }
}

fn load_engine(cli: &Cli, catalog: &IndexCatalog, args: &QueryArgs) -> anyhow::Result<Engine> {
    let index_path = catalog.path_for(&args.index)?;
    let generator = HttpGenerator::new(&cli.generator_url, cli.generator_api_key.clone())?;
    let mut options = QueryOptions {
        top_k: args.top_k,
        max_context_tokens: args.max_context_tokens,
        ..QueryOptions::default()
    };
    options.generation.max_new_tokens = args.max_new_tokens;

    let engine = QueryEngine::load(
        &index_path,
        CharacterNgramEmbedder::default(),
        load_tokenizer(cli.tokenizer.as_deref())?,
        generator,
        options,
    )
    .with_context(|| format!("failed to load index {}", args.index))?;

    info!(
        index = %args.index,
        chunks = engine.manifest().chunk_count,
        generator = %cli.generator_url,
        "query engine loaded"
    );
    Ok(engine)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-qa boot"
    );

    let catalog = IndexCatalog::open(&cli.index_dir)?;

    match &cli.command {
        Command::Ingest {
            pdf,
            name,
            batch_size,
            chunk_tokens,
            chunk_overlap,
            min_words,
            strategy,
            skip_failed_batches,
        } => {
            let name = match name {
                Some(name) => name.clone(),
                None => catalog.next_name(DEFAULT_INDEX_PREFIX)?,
            };
            let index_path = catalog.path_for(&name)?;
            let options = IngestionOptions {
                batch_size: *batch_size,
                chunk_tokens: *chunk_tokens,
                chunk_overlap_tokens: *chunk_overlap,
                min_words: *min_words,
                strategy: (*strategy).into(),
            };
            let tokenizer = load_tokenizer(cli.tokenizer.as_deref())?;
            let pdf = pdf.clone();
            let skip_failed = *skip_failed_batches;

            let report = tokio::task::spawn_blocking(move || {
                let pipeline = IngestPipeline::new(
                    PageExtractor::from_env(options.strategy),
                    CharacterNgramEmbedder::default(),
                    tokenizer,
                    options,
                );
                if skip_failed {
                    pipeline.run_best_effort(&pdf, &index_path)
                } else {
                    pipeline.run(&pdf, &index_path)
                }
            })
            .await?
            .context("failed to build index")?;

            for skipped in &report.skipped_batches {
                warn!(
                    start = skipped.pages.start,
                    end = skipped.pages.end,
                    reason = %skipped.reason,
                    "skipped batch"
                );
            }

            match report.outcome {
                IngestOutcome::Indexed { chunk_count } => println!(
                    "index {name} created: {chunk_count} chunks from {} pages in {} batches",
                    report.total_pages,
                    report.batches.len()
                ),
                IngestOutcome::NoContent => {
                    println!(
                        "no chunks found in {} pages; index not created",
                        report.total_pages
                    )
                }
            }
        }
        Command::List => {
            let names = catalog.list()?;
            if names.is_empty() {
                println!("no indexes in {}", catalog.root().display());
            }
            for name in names {
                println!("{name}");
            }
        }
        Command::Ask {
            query,
            question,
            show_sources,
        } => {
            let engine = load_engine(&cli, &catalog, query)?;
            let answer = engine.ask_with_sources(question).await?;

            println!("{}", answer.text);
            if *show_sources {
                for hit in &answer.sources {
                    println!(
                        "  [{}] score={:.4} pages={}-{} page={} chunk={}",
                        hit.chunk.source,
                        hit.score,
                        hit.chunk.page_start,
                        hit.chunk.page_end,
                        hit.chunk.page,
                        hit.chunk.chunk_id
                    );
                }
            }
            engine.close();
        }
        Command::Chat { query } => {
            let engine = load_engine(&cli, &catalog, query)?;
            let stdin = io::stdin();
            let mut lines = stdin.lock().lines();

            loop {
                print!("Ask: ");
                io::stdout().flush()?;
                let Some(line) = lines.next().transpose()? else {
                    break;
                };
                let question = line.trim();
                if question.eq_ignore_ascii_case("exit") {
                    break;
                }
                if question.is_empty() {
                    continue;
                }

                match engine.ask(question).await {
                    Ok(answer) => println!("{answer}"),
                    Err(error) => warn!(%error, "question failed"),
                }
            }
            engine.close();
        }
        Command::Export { index, output } => {
            let index_path = catalog.path_for(index)?;
            let archive = output
                .clone()
                .unwrap_or_else(|| catalog.root().join(format!("{}.zip", index.trim())));

            let files = export_index(&index_path, &archive)?;
            println!("exported {files} files to {}", archive.display());
        }
        Command::Import { archive, name } => {
            let name = match name {
                Some(name) => name.clone(),
                None => catalog.next_name(UPLOADED_INDEX_PREFIX)?,
            };
            if catalog.contains(&name) {
                bail!("index {name} already exists");
            }

            let files = import_index(archive, &catalog.path_for(&name)?)?;
            println!("index {name} imported ({files} files)");
        }
    }

    Ok(())
}
