use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::tty::IsTty;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use music_graph_recommender::analysis::{self, CatalogAnalysis, StoreHealth};
use music_graph_recommender::batch_loader::{
    BatchLoader, IndexStatus, LoadReport, OnExistingData,
};
use music_graph_recommender::cli_style::{
    get_prompt, get_styles, print_empty_list, print_error, print_info, print_key_value,
    print_key_value_highlight, print_list_item, print_section_footer, print_section_header,
    print_success, print_warning, TableBuilder,
};
use music_graph_recommender::config::{AppConfig, CliConfig, FileConfig};
use music_graph_recommender::document_store::{DocumentStore, SqliteDocumentStore};
use music_graph_recommender::graph_builder::{GraphBuildReport, GraphBuilder};
use music_graph_recommender::graph_store::{GraphStore, SqliteGraphStore};
use music_graph_recommender::recommender::{HybridRecommender, RecommendationOutcome};
use music_graph_recommender::track::{normalize_row, CsvTrackSource, TrackDocument};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "music-graph", version)]
#[command(about = "Load a track dataset, build its artist/genre graph and recommend tracks")]
#[command(styles = get_styles())]
struct CliArgs {
    /// Directory holding the document store (tracks.db) and graph store (graph.db).
    #[clap(long, global = true, value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override command line arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that both stores respond and print what they hold.
    Check,

    /// Load the CSV dataset into the document store and rebuild its indexes.
    Load {
        /// Dataset CSV file. Defaults to <data-dir>/dataset.csv.
        #[clap(long, value_parser = parse_path)]
        dataset: Option<PathBuf>,

        /// What to do when the store already holds tracks. Asked interactively when omitted.
        #[clap(long, value_enum)]
        on_existing: Option<OnExistingData>,

        /// Documents per insert batch.
        #[clap(long)]
        batch_size: Option<usize>,
    },

    /// Derive the song/artist/genre graph from the loaded tracks.
    BuildGraph {
        /// Graph rows per write transaction.
        #[clap(long)]
        batch_size: Option<usize>,
    },

    /// Print exploratory reports over both stores.
    Analyze {
        /// Print the reports as JSON.
        #[clap(long)]
        json: bool,
    },

    /// Recommend tracks for fans of an artist.
    Recommend {
        /// Seed artist, matched exactly. Asked interactively when omitted.
        artist: Option<String>,

        /// Maximum number of peer artists.
        #[clap(long)]
        peer_limit: Option<usize>,

        /// Maximum number of recommended tracks.
        #[clap(long)]
        track_limit: Option<usize>,

        /// Print the result as JSON.
        #[clap(long)]
        json: bool,
    },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        let mut cli = CliConfig {
            data_dir: self.data_dir.clone(),
            ..Default::default()
        };
        match &self.command {
            Command::Load {
                dataset,
                on_existing,
                batch_size,
            } => {
                cli.dataset_path = dataset.clone();
                cli.on_existing = *on_existing;
                cli.load_batch_size = *batch_size;
            }
            Command::BuildGraph { batch_size } => cli.graph_batch_size = *batch_size,
            Command::Recommend {
                peer_limit,
                track_limit,
                ..
            } => {
                cli.peer_limit = *peer_limit;
                cli.track_limit = *track_limit;
            }
            Command::Check | Command::Analyze { .. } => {}
        }
        cli
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    match cli_args.command {
        Command::Check => run_check(&config),
        Command::Load { .. } => run_load(&config),
        Command::BuildGraph { .. } => run_build_graph(&config),
        Command::Analyze { json } => run_analyze(&config, json),
        Command::Recommend { artist, json, .. } => run_recommend(&config, artist, json),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Interactive prompts
// ═══════════════════════════════════════════════════════════════════════════════

fn prompt_line(label: &str) -> Result<String> {
    let mut rl = DefaultEditor::new()?;
    match rl.readline(&get_prompt(label)) {
        Ok(line) => Ok(line),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => bail!("Aborted by user"),
        Err(e) => Err(e).context("Failed to read input"),
    }
}

fn prompt_on_existing(existing: u64) -> Result<OnExistingData> {
    if !std::io::stdin().is_tty() {
        bail!(
            "Track store already holds {} documents; pass --on-existing replace|skip-load or set on_existing in the config file",
            existing
        );
    }
    print_warning(&format!("The track store already holds {} documents.", existing));
    loop {
        let answer = prompt_line("Drop them and reload? [y/N]")?;
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(OnExistingData::Replace),
            "" | "n" | "no" => return Ok(OnExistingData::SkipLoad),
            _ => print_error("Please answer yes or no."),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// check
// ═══════════════════════════════════════════════════════════════════════════════

fn run_check(config: &AppConfig) -> Result<()> {
    let documents = SqliteDocumentStore::new(config.document_db_path());
    let graph = SqliteGraphStore::new(config.graph_db_path());

    let report = analysis::check_stores(
        documents.as_ref().map(|s| s as &dyn DocumentStore),
        graph.as_ref().map(|s| s as &dyn GraphStore),
    );

    print_section_header("Document store");
    print_key_value("Path", &config.document_db_path().display().to_string());
    match &report.documents {
        StoreHealth::Ok { version, inventory } => {
            print_success("Connected");
            print_key_value("SQLite version", version);
            print_key_value_highlight("Tracks", &inventory.to_string());
        }
        StoreHealth::Failed(e) => print_error(e),
    }
    print_section_footer();

    print_section_header("Graph store");
    print_key_value("Path", &config.graph_db_path().display().to_string());
    match &report.graph {
        StoreHealth::Ok { version, inventory } => {
            print_success("Connected");
            print_key_value("SQLite version", version);
            print_key_value_highlight("Song nodes", &inventory.songs.to_string());
            print_key_value_highlight("Artist nodes", &inventory.artists.to_string());
            print_key_value_highlight("Genre nodes", &inventory.genres.to_string());
            print_key_value("BY_ARTIST", &inventory.by_artist.to_string());
            print_key_value("IN_GENRE", &inventory.in_genre.to_string());
            print_key_value("PLAYS_GENRE", &inventory.plays_genre.to_string());
        }
        StoreHealth::Failed(e) => print_error(e),
    }
    print_section_footer();

    if let Ok(documents) = documents {
        documents.close()?;
    }
    if let Ok(graph) = graph {
        graph.close()?;
    }

    if !report.is_healthy() {
        bail!("Store check failed");
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// load
// ═══════════════════════════════════════════════════════════════════════════════

fn run_load(config: &AppConfig) -> Result<()> {
    let store = SqliteDocumentStore::new(config.document_db_path())?;

    let policy = match config.on_existing {
        Some(policy) => Some(policy),
        None => match store.count_tracks()? {
            0 => None,
            existing => Some(prompt_on_existing(existing)?),
        },
    };

    let loader = BatchLoader::new(&store, config.batching.load_batch_size);
    let report = if policy == Some(OnExistingData::SkipLoad) {
        loader.load(std::iter::empty::<TrackDocument>(), policy)?
    } else {
        info!("Reading dataset {:?}", config.dataset_path);
        let mut source = CsvTrackSource::open(&config.dataset_path)?;
        let report = loader.load(source.by_ref().map(|record| normalize_row(&record)), policy)?;
        let stats = source.finish()?;
        if stats.malformed_rows > 0 {
            print_warning(&format!(
                "{} malformed dataset rows were skipped",
                stats.malformed_rows
            ));
        }
        report
    };

    print_load_report(&report);
    store.close()
}

fn print_load_report(report: &LoadReport) {
    print_section_header("Load");
    if report.skipped_load() {
        print_info("Existing documents kept, load skipped");
    } else {
        if report.policy == Some(OnExistingData::Replace) {
            print_key_value("Replaced documents", &report.existing_documents.to_string());
        }
        print_key_value("Batches", &report.batches.len().to_string());
        print_key_value("Attempted", &report.attempted().to_string());
        print_key_value_highlight("Inserted", &report.inserted().to_string());
        print_key_value("Duplicates", &report.duplicates().to_string());
        print_key_value("Rejected", &report.rejected().to_string());
    }
    print_key_value_highlight("Documents in store", &report.final_count.to_string());
    print_key_value("Elapsed", &format!("{:.1}s", report.elapsed.as_secs_f64()));
    print_section_footer();

    if !report.samples.is_empty() {
        let mut samples =
            TableBuilder::new(vec!["Sample track", "Artists", "Genre", "Popularity", "Features"]);
        for doc in &report.samples {
            samples.add_row(vec![
                doc.track_name.clone(),
                doc.artists.clone(),
                doc.genre.clone(),
                doc.popularity.to_string(),
                doc.audio_features.len().to_string(),
            ]);
        }
        samples.print();
    }

    let mut table = TableBuilder::new(vec!["Index", "Status"]);
    for index in &report.indexes {
        let status = match &index.status {
            IndexStatus::Created => "created".to_string(),
            IndexStatus::AlreadyExists => "already exists".to_string(),
            IndexStatus::Failed(e) => format!("failed: {}", e),
        };
        table.add_row(vec![index.name.to_string(), status]);
    }
    table.print();

    if report.failed_indexes() > 0 {
        print_warning(&format!("{} indexes failed", report.failed_indexes()));
    } else {
        print_success("Load complete");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// build-graph
// ═══════════════════════════════════════════════════════════════════════════════

fn run_build_graph(config: &AppConfig) -> Result<()> {
    let documents = SqliteDocumentStore::new(config.document_db_path())?;
    let graph = SqliteGraphStore::new(config.graph_db_path())?;

    let report = GraphBuilder::new(
        &documents,
        &graph,
        config.batching.graph_batch_size,
        config.batching.projection_page_size,
    )
    .build()?;
    print_build_report(&report);

    documents.close()?;
    graph.close()
}

fn print_build_report(report: &GraphBuildReport) {
    print_section_header("Graph build");
    print_key_value("Documents scanned", &report.documents_scanned.to_string());
    print_key_value_highlight("Documents retained", &report.documents_retained.to_string());
    print_key_value("Skipped, no track id", &report.skipped.missing_track_id.to_string());
    print_key_value("Skipped, no genre", &report.skipped.missing_genre.to_string());
    print_key_value("Skipped, no artists", &report.skipped.no_artists.to_string());
    print_key_value("Rows emitted", &report.rows_emitted.to_string());
    print_key_value_highlight("Batches committed", &report.batches_committed.to_string());
    print_key_value("Elapsed", &format!("{:.1}s", report.elapsed.as_secs_f64()));
    print_section_footer();

    if report.failed_batches.is_empty() {
        print_success("Graph build complete");
        return;
    }
    print_warning(&format!(
        "{} batches rolled back, {} rows lost",
        report.failed_batches.len(),
        report.rows_lost()
    ));
    for failed in &report.failed_batches {
        print_list_item(
            &format!(
                "batch {} ({} rows): {}",
                failed.batch_number, failed.rows, failed.error
            ),
            1,
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// analyze
// ═══════════════════════════════════════════════════════════════════════════════

fn run_analyze(config: &AppConfig, json: bool) -> Result<()> {
    let documents = SqliteDocumentStore::new(config.document_db_path())?;
    let graph = SqliteGraphStore::new(config.graph_db_path())?;

    let analysis = analysis::analyze(&documents, &graph, config.queries.analysis_limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }

    documents.close()?;
    graph.close()
}

fn print_analysis(analysis: &CatalogAnalysis) {
    let docs = &analysis.documents;

    print_section_header("Most popular tracks");
    let mut table = TableBuilder::new(vec!["Track", "Artists", "Genre", "Popularity"]);
    for track in &docs.top_tracks {
        table.add_row(vec![
            track.track_name.clone(),
            track.artists.clone(),
            track.genre.clone(),
            track.popularity.to_string(),
        ]);
    }
    print_table_or_empty(&table, "No tracks loaded");

    print_section_header("Average energy by genre");
    let mut table = TableBuilder::new(vec!["Genre", "Energy"]);
    for avg in &docs.energy_by_genre {
        table.add_row(vec![avg.genre.clone(), format!("{:.3}", avg.average)]);
    }
    print_table_or_empty(&table, "No energy values reported");

    print_section_header("Artists with most tracks");
    let mut table = TableBuilder::new(vec!["Artists", "Tracks"]);
    for count in &docs.top_artists {
        table.add_row(vec![count.value.clone(), count.total.to_string()]);
    }
    print_table_or_empty(&table, "No tracks loaded");

    print_section_header("Genres with most tracks");
    let mut table = TableBuilder::new(vec!["Genre", "Tracks"]);
    for count in &docs.top_genres {
        table.add_row(vec![count.value.clone(), count.total.to_string()]);
    }
    print_table_or_empty(&table, "No tracks loaded");

    let graph = &analysis.graph;
    print_section_header("Graph");
    print_key_value("Song nodes", &graph.counts.songs.to_string());
    print_key_value("Artist nodes", &graph.counts.artists.to_string());
    print_key_value("Genre nodes", &graph.counts.genres.to_string());
    print_section_footer();

    print_section_header("Artists with most songs");
    let mut table = TableBuilder::new(vec!["Artist", "Songs"]);
    for count in &graph.top_artists {
        table.add_row(vec![count.name.clone(), count.total.to_string()]);
    }
    print_table_or_empty(&table, "Graph is empty");

    print_section_header("Genres with most songs");
    let mut table = TableBuilder::new(vec!["Genre", "Songs"]);
    for count in &graph.top_genres {
        table.add_row(vec![count.name.clone(), count.total.to_string()]);
    }
    print_table_or_empty(&table, "Graph is empty");

    for (label, sample) in [
        ("Songs by", &graph.top_artist_songs),
        ("Songs in", &graph.top_genre_songs),
    ] {
        if let Some(sample) = sample {
            print_section_header(&format!("{} {}", label, sample.name));
            for song in &sample.songs {
                print_list_item(song, 1);
            }
            print_section_footer();
        }
    }
}

fn print_table_or_empty(table: &TableBuilder, empty_message: &str) {
    if table.is_empty() {
        print_empty_list(empty_message);
        print_section_footer();
    } else {
        table.print();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// recommend
// ═══════════════════════════════════════════════════════════════════════════════

fn run_recommend(config: &AppConfig, artist: Option<String>, json: bool) -> Result<()> {
    let seed = match artist {
        Some(artist) => artist,
        None => prompt_line("Seed artist")?.trim().to_string(),
    };
    if seed.is_empty() {
        bail!("No seed artist given");
    }

    let documents = SqliteDocumentStore::new(config.document_db_path())?;
    let graph = SqliteGraphStore::new(config.graph_db_path())?;

    let outcome = HybridRecommender::new(&documents, &graph)
        .with_limits(config.queries.peer_limit, config.queries.track_limit)
        .recommend(&seed)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_recommendation(&seed, &outcome);
    }

    documents.close()?;
    graph.close()
}

fn print_recommendation(seed: &str, outcome: &RecommendationOutcome) {
    match outcome {
        RecommendationOutcome::UnknownSeed => {
            print_error(&format!("Artist {:?} is not in the graph", seed));
            return;
        }
        RecommendationOutcome::NoPeers => {
            print_warning(&format!("{} shares no genre with any other artist", seed));
            return;
        }
        _ => {}
    }

    print_section_header(&format!("Artists similar to {}", seed));
    let mut table = TableBuilder::new(vec!["Artist", "Shared genres", "Matches"]);
    for peer in outcome.peers() {
        table.add_row(vec![
            peer.artist.clone(),
            peer.shared_genres.join(", "),
            peer.match_count.to_string(),
        ]);
    }
    table.print();

    if outcome.tracks().is_empty() {
        print_warning("None of these artists has tracks in the document store");
        return;
    }

    print_section_header(&format!("Fans of {} might like", seed));
    let mut table = TableBuilder::new(vec!["Track", "Artists", "Genre", "Popularity"]);
    for track in outcome.tracks() {
        table.add_row(vec![
            track.track_name.clone(),
            track.artists.clone(),
            track.genre.clone(),
            track.popularity.to_string(),
        ]);
    }
    table.print();
}
