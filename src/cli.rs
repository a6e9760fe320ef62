use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ower_dao::config_file::DEFAULT_CONFIG_FILE;
use ower_dao::diagnostics::AxisKind;

#[derive(Parser)]
#[command(name = "ower-dao")]
#[command(about = "Data access for OWER/POWER training directories", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// JSON config with default class/sentence counts and label sizes.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub(crate) config: PathBuf,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Write a config file with the given defaults.
    InitConfig {
        #[arg(long)]
        classes: Option<usize>,
        #[arg(long)]
        sents: Option<usize>,
        /// Pre-trained word vectors (GloVe/word2vec text format)
        #[arg(long)]
        vectors: Option<PathBuf>,
    },

    /// Create the triples table and its indexes in a new database.
    InitTriples { db: PathBuf },

    /// Bulk-insert a tab-separated `head rel tail` file into a triples database.
    InsertTriples { db: PathBuf, triples: PathBuf },

    /// Print the heads of all triples with the given relation and tail.
    Heads {
        db: PathBuf,
        #[arg(long)]
        rel: i64,
        #[arg(long)]
        tail: i64,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify that an OWER directory has all triples databases and samples tables.
    Check {
        dir: PathBuf,
        #[arg(long)]
        classes: Option<usize>,
        #[arg(long)]
        sents: Option<usize>,
    },

    /// Verify that a temp directory has all three triples databases.
    CheckTmp { dir: PathBuf },

    /// Read all splits of an OWER directory and report their sizes.
    Load {
        dir: PathBuf,
        #[arg(long)]
        classes: Option<usize>,
        #[arg(long)]
        sents: Option<usize>,
        /// Pre-trained word vectors (GloVe/word2vec text format)
        #[arg(long)]
        vectors: Option<PathBuf>,
        /// Write the vocabulary as JSON
        #[arg(long)]
        vocab_out: Option<PathBuf>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a labels TSV.
    Labels {
        tsv: PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the envelope of a model artifact.
    ArtifactInfo {
        path: PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a tensor dump (`{title, shape, data, labels?}`) as an SVG heatmap.
    Plot {
        tensor: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Label axes from the config's label sizes instead of the dump
        #[arg(long, value_delimiter = ',')]
        axes: Vec<AxisKind>,
        /// Vocabulary JSON, needed for `word` axes
        #[arg(long)]
        vocab: Option<PathBuf>,
    },
}
