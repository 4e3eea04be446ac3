use std::path::Path;

use clap::Parser;
use docrag::{
    DataDir,
    Language,
    Settings,
    chunking::{Chunk, ChunkingConfig, chunk_documents},
    document::documents_from_records,
    error::{self, Error},
    ingestion,
    llm::OllamaClient,
    pipeline::Pipeline,
    records,
    retriever::Retriever,
    tantivy_index::{FeedbackConfig, SearchIndex},
    templates::TemplatePool,
    text_util::{DEFAULT_PREVIEW_CHARS, preview},
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{ChunkArgs, Cli, Command, CorpusArgs, RunArgs, SearchArgs};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCRAG_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let settings = Settings::load(cli.config.as_deref(), &data_dir)?;

    match cli.command {
        Command::Run(args) => cmd_run(settings, &data_dir, &args)?,
        Command::Chunk(args) => cmd_chunk(settings, &args)?,
        Command::Search(args) => cmd_search(settings, &args)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

/// Apply command-line overrides on top of the loaded settings.
fn chunking_settings(
    mut config: ChunkingConfig,
    corpus: &CorpusArgs,
) -> ChunkingConfig {
    if let Some(size) = corpus.chunk_size {
        config.chunk_size = size;
    }
    if let Some(overlap) = corpus.chunk_overlap {
        config.chunk_overlap = overlap;
    }
    config
}

/// Load the documents file and chunk the documents in the target language.
fn load_corpus(
    corpus: &CorpusArgs,
    config: ChunkingConfig,
) -> error::Result<(Language, Vec<Chunk>)> {
    let language = Language::new(corpus.language.as_str());
    let records = records::load_jsonl(&corpus.docs_path)?;
    let documents = documents_from_records(&records);
    tracing::info!(
        path = %corpus.docs_path.display(),
        records = records.len(),
        documents = documents.len(),
        "loaded documents"
    );

    let chunks = chunk_documents(&documents, &language, config);
    if chunks.is_empty() {
        tracing::warn!(
            language = %language,
            "no documents in the target language, retrieval will find nothing"
        );
    }
    tracing::info!(chunks = chunks.len(), "chunked corpus");
    Ok((language, chunks))
}

fn load_templates(dir: Option<&Path>) -> error::Result<TemplatePool> {
    match dir {
        None => Ok(TemplatePool::new()),
        Some(dir) if !dir.is_dir() => Err(Error::NotFound {
            kind: "templates directory",
            name: dir.display().to_string(),
        }),
        Some(dir) => TemplatePool::load(dir),
    }
}

fn cmd_run(
    mut settings: Settings,
    data_dir: &DataDir,
    args: &RunArgs,
) -> error::Result<()> {
    settings.chunking = chunking_settings(settings.chunking, &args.corpus);
    if let Some(host) = &args.host {
        settings.ollama.host = host.clone();
    }
    if let Some(model) = &args.model {
        settings.ollama.model = model.clone();
    }
    if let Some(top_n) = args.top_n {
        settings.retrieval.top_n = top_n;
    }
    if let Some(top_k) = args.top_k {
        settings.retrieval.top_k = top_k;
    }
    if args.expand_query {
        settings.retrieval.expand_query = true;
    }
    if args.no_rerank {
        settings.retrieval.rerank = false;
    }
    if args.no_feedback {
        settings.retrieval.feedback.enabled = false;
    }
    settings.validate()?;

    let llm = OllamaClient::new(&settings.ollama)?;
    llm.check_reachable()?;
    tracing::info!(host = llm.host(), model = llm.model(), "model server ready");

    let templates = load_templates(args.templates.as_deref())?;
    let mut queries = records::load_jsonl(&args.query_path)?;
    tracing::info!(
        path = %args.query_path.display(),
        queries = queries.len(),
        "loaded queries"
    );

    let (language, chunks) = load_corpus(&args.corpus, settings.chunking)?;
    let index = if args.persist_index {
        let dir = data_dir.index_dir(&language)?;
        ingestion::open_or_build(&dir, &chunks, &language)?
    } else {
        ingestion::build_in_ram(&chunks, &language)?
    }
    .with_feedback(settings.retrieval.feedback);

    let pipeline = Pipeline::new(
        Retriever::new(&chunks, &index),
        &llm,
        &templates,
        language,
        settings.retrieval,
    );
    let answered = pipeline.answer_records(&mut queries, show_progress())?;

    records::save_jsonl(&args.output, &queries)?;
    tracing::info!(
        answered,
        total = queries.len(),
        path = %args.output.display(),
        "wrote predictions"
    );
    Ok(())
}

/// Draw the progress bar unless logging was turned down to warnings.
fn show_progress() -> bool {
    tracing::enabled!(tracing::Level::INFO)
}

fn cmd_chunk(settings: Settings, args: &ChunkArgs) -> error::Result<()> {
    let config = chunking_settings(settings.chunking, &args.corpus);
    config.validate()?;

    let (_, chunks) = load_corpus(&args.corpus, config)?;
    match &args.output {
        Some(path) => {
            records::save_jsonl(path, &chunks)?;
            tracing::info!(path = %path.display(), "wrote chunks");
        }
        None => records::write_jsonl(std::io::stdout().lock(), &chunks)?,
    }
    Ok(())
}

fn cmd_search(settings: Settings, args: &SearchArgs) -> error::Result<()> {
    let config = chunking_settings(settings.chunking, &args.corpus);
    config.validate()?;

    let (language, chunks) = load_corpus(&args.corpus, config)?;
    let feedback = if args.no_feedback {
        FeedbackConfig::disabled()
    } else {
        settings.retrieval.feedback
    };
    let index: SearchIndex =
        ingestion::build_in_ram(&chunks, &language)?.with_feedback(feedback);
    let candidates =
        Retriever::new(&chunks, &index).retrieve(&args.query, args.count);

    if args.json {
        let results: Vec<serde_json::Value> = candidates
            .iter()
            .map(|c| {
                serde_json::json!({
                    "score": c.score,
                    "chunk_index": c.chunk.index,
                    "page_content": c.chunk.text,
                    "metadata": c.chunk.metadata,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({
                "query": args.query,
                "results": results,
            }))?
        );
    } else if candidates.is_empty() {
        println!("No results.");
    } else {
        for (rank, c) in candidates.iter().enumerate() {
            println!(
                "{:>3}. [{:.3}] #{} {}",
                rank + 1,
                c.score,
                c.chunk.index,
                preview(&c.chunk.text, DEFAULT_PREVIEW_CHARS)
            );
        }
    }
    Ok(())
}
