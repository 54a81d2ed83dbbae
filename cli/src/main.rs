use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tsundoku::catalog::MdClient;
use tsundoku::download::{download_chapters, IntervalGate};
use tsundoku::manga::{Manga, Review};
use tsundoku::store::{JsonStore, Store};
use tsundoku::sync::{register_manga, sync_feed, SyncMode};

use crate::config::Config;

mod config;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "tsundoku.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a series from the catalog
    Add {
        /// Catalog id of the series
        id: String,

        /// Full display title
        #[arg(short, long)]
        title: String,

        /// Short unique label used for paths and lookups
        #[arg(short, long)]
        abbrev: String,
    },

    /// Fetch new chapters for one series, or the whole library
    Sync {
        abbrev: Option<String>,

        /// Re-fetch the whole feed instead of only chapters published
        /// since the last sync
        #[arg(short, long, default_value_t = false)]
        full: bool,
    },

    /// Download pending chapters of a series
    Download {
        abbrev: String,

        /// Chapter numbers to download (default: everything pending)
        chapters: Vec<f64>,
    },

    /// List the library
    List,

    /// List the chapters of one series
    Chapters { abbrev: String },

    /// Mark a chapter as read
    MarkRead { abbrev: String, chapter: f64 },

    /// Set the review for a series
    Review {
        abbrev: String,
        rating: i32,
        text: String,
    },
}

fn find_by_abbrev(store: &JsonStore, abbrev: &str) -> Result<Manga, String> {
    let mangas = store.get_all().map_err(|e| format!("{:?}", e))?;

    mangas
        .into_iter()
        .find(|m| m.ser_title == abbrev)
        .ok_or_else(|| format!("no series '{}' in the library", abbrev))
}

fn sync_one(
    client: &MdClient,
    store: &mut JsonStore,
    config: &Config,
    manga: Manga,
    mode: SyncMode,
) -> Result<(), String> {
    let ser_title = manga.ser_title.clone();
    let outcome = sync_feed(client, store, manga, mode, &config.library_root)
        .map_err(|e| format!("sync of '{}' failed: {:?}", ser_title, e))?;

    println!(
        "{}: {} chapter(s) fetched",
        outcome.manga.ser_title, outcome.fetched
    );
    for skipped in &outcome.skipped {
        warn!(
            "{}: skipped {}: {:?}",
            outcome.manga.ser_title, skipped.chapter_hash, skipped.error
        );
    }

    Ok(())
}

fn run(args: Args) -> Result<(), String> {
    let config = Config::load(&args.config)?;
    let client = MdClient::new(config.endpoint.clone());
    let mut store =
        JsonStore::open(&config.store_path).map_err(|e| format!("{:?}", e))?;

    match args.command {
        Commands::Add { id, title, abbrev } => {
            let manga = register_manga(&client, &mut store, &id, &title, &abbrev)
                .map_err(|e| format!("failed to add '{}': {:?}", title, e))?;
            println!(
                "added '{}' as {} ({} tag(s))",
                manga.full_title,
                manga.ser_title,
                manga.tags.len()
            );
        }

        Commands::Sync { abbrev, full } => {
            let mode = if full {
                SyncMode::Full
            } else {
                SyncMode::NewSince
            };

            match abbrev {
                Some(abbrev) => {
                    let manga = find_by_abbrev(&store, &abbrev)?;
                    sync_one(&client, &mut store, &config, manga, mode)?;
                }
                None => {
                    let mangas =
                        store.get_all().map_err(|e| format!("{:?}", e))?;
                    info!("syncing {} series", mangas.len());
                    for manga in mangas {
                        sync_one(&client, &mut store, &config, manga, mode)?;
                    }
                }
            }
        }

        Commands::Download { abbrev, chapters } => {
            let manga = find_by_abbrev(&store, &abbrev)?;

            let pending = manga
                .chapters
                .into_iter()
                .filter(|c| {
                    chapters.is_empty()
                        || chapters.iter().any(|n| *n == c.chapter_num)
                })
                .filter(|c| !c.downloaded)
                .collect::<Vec<_>>();

            if pending.is_empty() {
                println!("{}: nothing to download", abbrev);
                return Ok(());
            }

            info!("{}: downloading {} chapter(s)", abbrev, pending.len());

            let mut gate = IntervalGate::default();
            let outcome =
                download_chapters(&client, &mut store, &mut gate, pending);

            for chapter in &outcome.completed {
                println!(
                    "{:.1}: {} downloaded",
                    chapter.chapter_num, chapter.chapter_name
                );
            }
            for failed in &outcome.failed {
                error!(
                    "{:.1}: {} failed: {:?}",
                    failed.chapter.chapter_num,
                    failed.chapter.chapter_name,
                    failed.error
                );
            }

            if !outcome.failed.is_empty() {
                return Err(format!(
                    "{} chapter(s) failed to download",
                    outcome.failed.len()
                ));
            }
        }

        Commands::List => {
            let mangas = store.get_all().map_err(|e| format!("{:?}", e))?;
            for manga in mangas {
                let downloaded =
                    manga.chapters.iter().filter(|c| c.downloaded).count();
                let read =
                    manga.chapters.iter().filter(|c| c.is_read).count();
                println!(
                    "{} ({}) [{} / {}] {} chapter(s), {} downloaded, {} read",
                    manga.full_title,
                    manga.ser_title,
                    manga.demographic.as_str(),
                    manga.pub_status.as_str(),
                    manga.chapters.len(),
                    downloaded,
                    read
                );
            }
        }

        Commands::Chapters { abbrev } => {
            let manga = find_by_abbrev(&store, &abbrev)?;
            for chapter in &manga.chapters {
                let dl = if chapter.downloaded { "D" } else { "-" };
                let read = if chapter.is_read { "R" } else { "-" };
                println!(
                    "[{}{}] {:6.1} {}",
                    dl, read, chapter.chapter_num, chapter.chapter_name
                );
            }
        }

        Commands::MarkRead { abbrev, chapter } => {
            let manga = find_by_abbrev(&store, &abbrev)?;
            let chapter = manga
                .chapters
                .iter()
                .find(|c| c.chapter_num == chapter)
                .ok_or_else(|| {
                    format!("no chapter {} in '{}'", chapter, abbrev)
                })?;

            store
                .update_chapter_read(chapter)
                .map_err(|e| format!("{:?}", e))?;
            println!("{:.1}: marked read", chapter.chapter_num);
        }

        Commands::Review {
            abbrev,
            rating,
            text,
        } => {
            let manga = find_by_abbrev(&store, &abbrev)?;
            store
                .insert_review(&Review {
                    manga_id: manga.manga_id,
                    rating,
                    rev: text,
                })
                .map_err(|e| format!("{:?}", e))?;
            println!("{}: review saved", abbrev);
        }
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
