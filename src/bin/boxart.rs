use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use boxart::app::{
    App, BatchAction, BatchResult, LookupResult, SearchResult, SelectResult, SessionEvent,
    SessionSink,
};
use boxart::config::{ConfigLoader, ResolvedConfig};
use boxart::domain::{PlatformId, SourceConfig};
use boxart::error::BoxartError;
use boxart::http::ReqwestTransport;
use boxart::output::{JsonOutput, OutputMode};
use boxart::session::{SearchOptions, SearchOutcome};

#[derive(Parser)]
#[command(name = "boxart")]
#[command(about = "Find cover art for your games and keep it next to them")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show the cached artwork for a game, if any")]
    Lookup(GameArgs),
    #[command(about = "Search every applicable source for artwork")]
    Search(SearchArgs),
    #[command(about = "Download an image and store it as the game's artwork")]
    Select(SelectArgs),
    #[command(about = "Fetch artwork for every listed game that has none yet")]
    Fill(FillArgs),
}

#[derive(Args, Clone)]
struct GameArgs {
    platform: String,
    title: String,
}

#[derive(Args, Clone, Default)]
struct SourceArgs {
    #[arg(long)]
    steamgrid_key: Option<String>,

    #[arg(long)]
    giantbomb_key: Option<String>,

    #[arg(long, help = "Per-source timeout in seconds")]
    timeout: Option<u64>,

    #[arg(long, help = "Also search Wikimedia Commons")]
    commons: bool,
}

#[derive(Args, Clone)]
struct SearchArgs {
    #[command(flatten)]
    game: GameArgs,

    #[command(flatten)]
    sources: SourceArgs,

    #[arg(long, help = "Search even if artwork is already cached")]
    force: bool,

    #[arg(long, help = "Store the candidate at this position (1-based)")]
    pick: Option<usize>,
}

#[derive(Args, Clone)]
struct SelectArgs {
    #[command(flatten)]
    game: GameArgs,

    url: String,
}

#[derive(Args, Clone)]
struct FillArgs {
    platform: String,

    #[arg(required = true)]
    titles: Vec<String>,

    #[command(flatten)]
    sources: SourceArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<BoxartError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BoxartError) -> u8 {
    match error {
        BoxartError::MissingConfig | BoxartError::UnknownPlatform(_) => 2,
        error if error.is_download() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let transport = Arc::new(ReqwestTransport::new()?);
    let app = App::new(config.store(), transport);

    match cli.command {
        Commands::Lookup(args) => run_lookup(&app, args, output_mode),
        Commands::Search(args) => run_search(&app, &config, args, output_mode),
        Commands::Select(args) => run_select(&app, args, output_mode),
        Commands::Fill(args) => run_fill(&app, &config, args, output_mode),
    }
}

fn run_lookup(app: &App, args: GameArgs, output_mode: OutputMode) -> miette::Result<()> {
    let platform: PlatformId = args.platform.parse()?;
    let result = app.lookup(&platform, &args.title);
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_lookup(&result).into_diagnostic()?,
        OutputMode::Interactive => print_lookup(&result),
    }
    if result.path.is_none() {
        std::process::exit(2);
    }
    Ok(())
}

fn run_search(
    app: &App,
    config: &ResolvedConfig,
    args: SearchArgs,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let platform: PlatformId = args.game.platform.parse()?;
    let sources = source_config(config, &args.sources);
    let options = SearchOptions { force: args.force };

    let Some(pick) = args.pick else {
        let result = match output_mode {
            OutputMode::NonInteractive => {
                app.search(&platform, &args.game.title, &sources, options, &JsonOutput)?
            }
            OutputMode::Interactive => {
                app.search(&platform, &args.game.title, &sources, options, &StderrProgress)?
            }
        };
        match output_mode {
            OutputMode::NonInteractive => JsonOutput::print_search(&result).into_diagnostic()?,
            OutputMode::Interactive => print_search(&result),
        }
        return Ok(());
    };

    let sink: &dyn SessionSink = match output_mode {
        OutputMode::NonInteractive => &JsonOutput,
        OutputMode::Interactive => &StderrProgress,
    };
    let mut session = app.open_session(&platform, &args.game.title);
    let candidates = match session.search(&sources, options, sink)? {
        SearchOutcome::Cached(path) => {
            return Err(miette::Report::msg(format!(
                "artwork already cached at {path} (use --force to replace it)"
            )));
        }
        SearchOutcome::Candidates(candidates) => candidates,
    };
    let candidate = pick
        .checked_sub(1)
        .and_then(|index| candidates.get(index))
        .ok_or_else(|| {
            miette::Report::msg(format!(
                "--pick {pick} is out of range ({} candidates)",
                candidates.len()
            ))
        })?;
    let update = session.select(candidate, sink)?;
    let result = SelectResult {
        update,
        url: candidate.url().to_string(),
    };
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_select(&result).into_diagnostic()?,
        OutputMode::Interactive => print_select(&result),
    }
    Ok(())
}

fn run_select(app: &App, args: SelectArgs, output_mode: OutputMode) -> miette::Result<()> {
    let platform: PlatformId = args.game.platform.parse()?;
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.select_url(&args.url, &platform, &args.game.title, &JsonOutput)?;
            JsonOutput::print_select(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result =
                app.select_url(&args.url, &platform, &args.game.title, &StderrProgress)?;
            print_select(&result);
        }
    }
    Ok(())
}

fn run_fill(
    app: &App,
    config: &ResolvedConfig,
    args: FillArgs,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let platform: PlatformId = args.platform.parse()?;
    let sources = source_config(config, &args.sources);
    let titles = args.titles.iter().map(String::as_str);
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.fill_missing(&platform, titles, &sources, &JsonOutput)?;
            JsonOutput::print_batch(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.fill_missing(&platform, titles, &sources, &StderrProgress)?;
            print_batch(&result);
        }
    }
    Ok(())
}

/// Command-line keys, timeout and `--commons` take precedence over the config file.
fn source_config(config: &ResolvedConfig, args: &SourceArgs) -> SourceConfig {
    let mut sources = config.sources.clone();
    if let Some(key) = &args.steamgrid_key {
        sources = sources.with_steamgrid_key(key.clone());
    }
    if let Some(key) = &args.giantbomb_key {
        sources = sources.with_giantbomb_key(key.clone());
    }
    if let Some(secs) = args.timeout.filter(|secs| *secs > 0) {
        sources = sources.with_timeout(Duration::from_secs(secs));
    }
    if args.commons {
        sources = sources.with_commons(true);
    }
    sources
}

struct StderrProgress;

impl SessionSink for StderrProgress {
    fn event(&self, event: SessionEvent) {
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";
        match event {
            SessionEvent::Searching { key, sources } => {
                let names = sources
                    .iter()
                    .map(|source| source.label())
                    .collect::<Vec<_>>()
                    .join(", ");
                eprintln!("{cyan}searching {key} on {names}{reset}");
            }
            SessionEvent::Presenting {
                key,
                count,
                elapsed,
            } => {
                eprintln!(
                    "{cyan}{count} candidate(s) for {key} in {} ms{reset}",
                    elapsed.as_millis()
                );
            }
            SessionEvent::ArtworkUpdated(update) => {
                eprintln!("{cyan}stored {}{reset}", update.path);
            }
            SessionEvent::PersistFailed { key, message } => {
                eprintln!("{red}could not store artwork for {key}: {message}{reset}");
            }
        }
    }
}

fn print_lookup(result: &LookupResult) {
    match &result.path {
        Some(path) => println!("{path}"),
        None => println!(
            "\x1b[33mno cover art cached for {} ({}){reset}",
            result.title,
            result.platform,
            reset = "\x1b[0m"
        ),
    }
}

fn print_search(result: &SearchResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let reset = "\x1b[0m";

    if let Some(path) = &result.cached {
        println!("{green}cached: {path}{reset}");
        return;
    }
    if result.candidates.is_empty() {
        println!(
            "{yellow}no cover art found for {} ({}){reset}",
            result.title, result.platform
        );
        return;
    }
    for (index, candidate) in result.candidates.iter().enumerate() {
        println!(
            "{green}{:>3}{reset} [{}] {}",
            index + 1,
            candidate.source().label(),
            candidate.url()
        );
    }
}

fn print_select(result: &SelectResult) {
    println!(
        "\x1b[32mstored {} for {} ({})\x1b[0m",
        result.update.path, result.update.title, result.update.platform
    );
}

fn print_batch(result: &BatchResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    let downloaded = result
        .items
        .iter()
        .filter(|item| item.action == BatchAction::Downloaded)
        .count();
    let failed = result
        .items
        .iter()
        .filter(|item| item.action == BatchAction::Failed)
        .count();
    println!("{cyan}boxart fill: {}{reset}", result.platform);
    println!("{green}downloaded: {downloaded}{reset}");
    println!("{red}failed: {failed}{reset}");

    for item in &result.items {
        let color = match item.action {
            BatchAction::Cached | BatchAction::Downloaded => green,
            BatchAction::NoCandidates => yellow,
            BatchAction::Failed => red,
        };
        println!("{color}  {} ({:?}){reset}", item.title, item.action);
        if let Some(path) = &item.path {
            println!("{color}    {path}{reset}");
        }
        if let Some(error) = &item.error {
            println!("{color}    {error}{reset}");
        }
    }
}
