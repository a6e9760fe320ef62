mod cli;

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use ower_dao::artifact;
use ower_dao::base::{DataDir, DataFile};
use ower_dao::config_file::{load_file_config, save_file_config, FileConfig};
use ower_dao::diagnostics::{plot_tensor, TensorDump};
use ower_dao::labels_tsv::LabelsTsv;
use ower_dao::ower_dir::OwerDir;
use ower_dao::tmp_dir::TmpDir;
use ower_dao::triples_db::{read_triples_tsv, TriplesDb};
use ower_dao::vocab::{PretrainedVectors, Vocab};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ower_dao=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_file_config(&cli.config);

    match cli.command {
        Command::InitConfig {
            classes,
            sents,
            vectors,
        } => {
            let mut updated = config;
            updated.class_count = classes.or(updated.class_count);
            updated.sent_count = sents.or(updated.sent_count);
            updated.vectors = vectors.or(updated.vectors);
            save_file_config(&cli.config, &updated)?;
            println!("Wrote {}", cli.config.display());
            Ok(())
        }

        Command::InitTriples { db } => {
            if db.exists() {
                eprintln!("Refusing to overwrite existing file: {}", db.display());
                std::process::exit(2);
            }
            TriplesDb::new("Triples DB", &db).create_schema()?;
            println!("Created {}", db.display());
            Ok(())
        }

        Command::InsertTriples { db, triples } => {
            let parsed = read_triples_tsv(&triples)?;
            let store = TriplesDb::new("Triples DB", &db);
            store.insert_many(&parsed)?;
            println!(
                "Inserted {} triples into {} ({} total)",
                parsed.len(),
                db.display(),
                store.count()?
            );
            Ok(())
        }

        Command::Heads {
            db,
            rel,
            tail,
            json,
        } => {
            let mut heads: Vec<i64> = TriplesDb::new("Triples DB", &db)
                .select_heads(rel, tail)?
                .into_iter()
                .collect();
            heads.sort_unstable();

            if json {
                let response = serde_json::json!({
                    "rel": rel,
                    "tail": tail,
                    "heads": heads,
                });
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for head in heads {
                    println!("{head}");
                }
            }
            Ok(())
        }

        Command::Check {
            dir,
            classes,
            sents,
        } => {
            let ower_dir = open_ower_dir(&dir, classes, sents, &config)?;
            ower_dir.check()?;
            println!("OK {}", dir.display());
            Ok(())
        }

        Command::CheckTmp { dir } => {
            let tmp_dir = TmpDir::new("Temp Directory", &dir);
            tmp_dir.check()?;
            for db in tmp_dir.triples_dbs() {
                println!("{}: {} triples", db.name(), db.count()?);
            }
            println!("OK {}", dir.display());
            Ok(())
        }

        Command::Load {
            dir,
            classes,
            sents,
            vectors,
            vocab_out,
            json,
        } => {
            let ower_dir = open_ower_dir(&dir, classes, sents, &config)?;
            let vectors = match vectors.or(config.vectors) {
                Some(path) => {
                    let loaded = PretrainedVectors::load(&path)?;
                    tracing::info!("{} pre-trained vectors of dim {}", loaded.len(), loaded.dim());
                    Some(loaded)
                }
                None => None,
            };
            let datasets = ower_dir.read_datasets(vectors.as_ref())?;

            if let Some(path) = vocab_out {
                datasets.vocab.save_json(&path)?;
            }

            if json {
                let response = serde_json::json!({
                    "train": datasets.train.len(),
                    "valid": datasets.valid.len(),
                    "test": datasets.test.len(),
                    "vocab": datasets.vocab.len(),
                    "vectors_dim": datasets.vocab.vectors().map(|v| v.ncols()),
                });
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!(
                    "train={} valid={} test={} vocab={}",
                    datasets.train.len(),
                    datasets.valid.len(),
                    datasets.test.len(),
                    datasets.vocab.len()
                );
            }
            Ok(())
        }

        Command::Labels { tsv, json } => {
            let labels = LabelsTsv::new("Labels TSV", &tsv).load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&labels)?);
            } else {
                for (id, lbl) in &labels {
                    println!("{id}\t{lbl}");
                }
            }
            Ok(())
        }

        Command::ArtifactInfo { path, json } => {
            let info = artifact::inspect(&path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("kind:      {} (schema v{})", info.kind, info.schema_version);
                println!("container: v{}", info.format_version);
                println!("created:   {}", info.created_at);
                println!("payload:   {} bytes", info.payload_bytes);
                println!(
                    "checksum:  {} ({})",
                    info.checksum,
                    if info.checksum_ok { "ok" } else { "MISMATCH" }
                );
            }
            Ok(())
        }

        Command::Plot {
            tensor,
            out,
            axes,
            vocab,
        } => {
            let dump = TensorDump::load(&tensor)?;
            let array = dump.to_array()?;

            let labels = if !axes.is_empty() {
                let mut ctx = config.labels;
                if let Some(path) = vocab {
                    ctx = ctx.with_vocab(Vocab::load_json(&path)?);
                }
                axes.iter()
                    .map(|kind| ctx.labels(*kind))
                    .collect::<Result<Vec<_>, _>>()?
            } else if let Some(labels) = dump.labels.clone() {
                labels
            } else {
                // numbered ticks when nothing else is known
                array.shape().iter().map(|n| (0..*n).map(|i| i.to_string()).collect()).collect()
            };

            plot_tensor(&array, &dump.title, &labels, &out)?;
            println!("Wrote {}", out.display());
            Ok(())
        }
    }
}

fn open_ower_dir(
    dir: &Path,
    classes: Option<usize>,
    sents: Option<usize>,
    config: &FileConfig,
) -> Result<OwerDir, Box<dyn std::error::Error>> {
    let class_count = classes
        .or(config.class_count)
        .ok_or("class count required: pass --classes or set class_count in the config")?;
    let sent_count = sents
        .or(config.sent_count)
        .ok_or("sentence count required: pass --sents or set sent_count in the config")?;
    Ok(OwerDir::new("OWER Directory", dir, class_count, sent_count))
}
