use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "docrag",
    about = "Answer questions over a document set with BM25 retrieval and a local LLM"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Read settings from this TOML file instead of the data directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer every query in a JSONL file and write predictions
    Run(RunArgs),
    /// Split documents into chunks and print them as JSONL
    Chunk(ChunkArgs),
    /// List BM25 candidates for a query without calling the model
    Search(SearchArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Shared corpus arguments --

#[derive(Debug, Args)]
pub struct CorpusArgs {
    /// JSONL file of documents with `content` and `language` fields
    #[arg(long)]
    pub docs_path: PathBuf,

    /// Language tag of the documents to use (e.g. en, zh)
    #[arg(long)]
    pub language: String,

    /// Maximum chunk length in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters of trailing context carried into the next chunk
    #[arg(long)]
    pub chunk_overlap: Option<usize>,
}

// -- Run --

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// JSONL file of query records (`query.content`)
    #[arg(long)]
    pub query_path: PathBuf,

    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Where to write the query records with predictions
    #[arg(long)]
    pub output: PathBuf,

    /// Candidates retrieved per query
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Chunks kept after reranking
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Ask the model for extra search keywords first
    #[arg(long)]
    pub expand_query: bool,

    /// Keep the BM25 order instead of reranking with the model
    #[arg(long)]
    pub no_rerank: bool,

    /// Search with the plain query, without RM3 feedback expansion
    #[arg(long)]
    pub no_feedback: bool,

    /// Directory of `*.txt` prompt templates
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Keep the index in the data directory and reuse it across runs
    #[arg(long)]
    pub persist_index: bool,

    /// Ollama model name
    #[arg(long)]
    pub model: Option<String>,

    /// Ollama server URL
    #[arg(long)]
    pub host: Option<String>,
}

// -- Chunk --

#[derive(Debug, Parser)]
pub struct ChunkArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Write chunks here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Search with the plain query, without RM3 feedback expansion
    #[arg(long)]
    pub no_feedback: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docrag",
            &mut std::io::stdout(),
        );
    }
}
