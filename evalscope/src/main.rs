//! evalscope - conversation analytics and batch reports for voice-agent calls
//!
//! Subcommands:
//! - `stats`: headline KPIs plus per-agent, per-mode, per-context and per-prompt tables
//! - `explore`: filtered, searched and sorted conversation listing
//! - `report`: run the batch report pipeline and write the rendered PDF
//! - `config`: show the resolved configuration and file locations
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/evalscope/config.toml (~/.config/evalscope/config.toml)
//! - Logs: $XDG_STATE_HOME/evalscope/ (~/.local/state/evalscope/)

mod render;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use evalscope_core::analytics::{sort_buckets, BucketSortKey, Dimension, Overview};
use evalscope_core::filter::{explore, ExplorerQuery};
use evalscope_core::report::{HttpReportBackend, PipelineState, ReportInput, ReportPipeline};
use evalscope_core::{
    Config, DateRange, FilterState, FilterType, InteractionMode, SortConfig, SortDirection, SortKey,
    TranscriptStore,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "evalscope")]
#[command(about = "Conversation analytics and batch reports for voice-agent calls")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show KPIs and per-dimension breakdowns
    Stats(StatsArgs),

    /// List conversations matching a filter
    Explore(ExploreArgs),

    /// Generate the PDF report through the remote evaluation service
    Report(ReportArgs),

    /// Show resolved configuration and paths
    Config,
}

/// Transcript sources and the date window shared by every data command.
#[derive(clap::Args)]
struct InputArgs {
    /// Transcript export files or glob patterns (JSON arrays of conversations)
    #[arg(short, long = "input", required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// First day to include, YYYY-MM-DD (UTC)
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,

    /// Last day to include, YYYY-MM-DD (UTC)
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,
}

impl InputArgs {
    fn load(&self) -> Result<TranscriptStore> {
        TranscriptStore::load_globs(&self.inputs).context("failed to load transcripts")
    }

    /// The range given on the command line, if any.
    fn explicit_range(&self) -> Result<Option<DateRange>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                if start > end {
                    bail!("--start {} is after --end {}", start, end);
                }
                Ok(Some(DateRange::new(start, end)))
            }
            _ => Ok(None),
        }
    }

    /// The command-line range, else the span of the loaded data.
    fn range(&self, store: &TranscriptStore) -> Result<Option<DateRange>> {
        Ok(self
            .explicit_range()?
            .or_else(|| store.default_date_range()))
    }
}

#[derive(clap::Args)]
struct StatsArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Order tables by: key, count, abandon, deep, tool-use, func-success, duration, turns
    #[arg(long, default_value = "count")]
    sort: BucketSortKey,

    /// Sort ascending instead of descending
    #[arg(long)]
    asc: bool,

    /// Output JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct ExploreArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Only this agent id
    #[arg(long)]
    agent: Option<String>,

    /// Only this context type (exact match)
    #[arg(long)]
    context_type: Option<String>,

    /// Only this context title (exact match)
    #[arg(long)]
    context_title: Option<String>,

    /// Interaction mode: standard or specialized (ignored when --filter is set)
    #[arg(long)]
    mode: Option<InteractionMode>,

    /// Outcome category: all, tech-failure, short, long, tool-used, tool-failure
    #[arg(short, long)]
    filter: Option<FilterType>,

    /// Conversation id substring or context title substring (case-insensitive)
    #[arg(short, long, default_value = "")]
    search: String,

    /// Single day label as shown in the trend, e.g. "Aug 01"
    #[arg(long, conflicts_with_all = ["start", "end"])]
    date: Option<String>,

    /// Order by: date, context, duration, turns, status
    #[arg(long, default_value = "date")]
    sort: SortKey,

    /// Sort ascending instead of descending
    #[arg(long)]
    asc: bool,

    /// Show at most N conversations
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Output JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct ReportArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Where to write the PDF (default: evalscope_report_<today>.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn direction(asc: bool) -> SortDirection {
    if asc {
        SortDirection::Asc
    } else {
        SortDirection::Desc
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        evalscope_core::logging::init(&config.logging).context("failed to initialize logging")?;

    match args.command {
        Command::Stats(cmd) => cmd_stats(&config, &cmd),
        Command::Explore(cmd) => cmd_explore(&cmd),
        Command::Report(cmd) => cmd_report(&config, &cmd),
        Command::Config => cmd_config(&config),
    }
}

fn cmd_stats(config: &Config, args: &StatsArgs) -> Result<()> {
    let store = args.input.load()?;
    let range = args.input.range(&store)?;
    let view = store.within(range.as_ref());

    let mut overview = Overview::compute(&view, &config.agents);
    let sort = SortConfig::new(args.sort, direction(args.asc));
    for dimension in Dimension::ALL {
        sort_buckets(overview.buckets_mut(dimension), &sort);
    }

    tracing::info!(
        conversations = view.len(),
        sort = ?args.sort,
        "evalscope stats"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    if view.is_empty() {
        println!("No conversations found in the selected date range.");
        return Ok(());
    }

    render::print_overview(&overview, range.as_ref());
    Ok(())
}

fn cmd_explore(args: &ExploreArgs) -> Result<()> {
    let store = args.input.load()?;

    let mut filter = FilterState {
        agent_id: args.agent.clone(),
        context_type: args.context_type.clone(),
        context_title: args.context_title.clone(),
        date: args.date.clone(),
        interaction_mode: args.mode,
        filter_type: args.filter,
        ..Default::default()
    };
    if let Some(range) = args.input.explicit_range()? {
        filter = filter.with_range(range);
    }

    let query = ExplorerQuery {
        filter,
        search: args.search.clone(),
        sort: SortConfig::new(args.sort, direction(args.asc)),
        date_range: store.default_date_range(),
    };

    let mut view = explore(&store, &query);
    let matched = view.len();
    if let Some(limit) = args.limit {
        view.truncate(limit);
    }

    tracing::info!(
        matched,
        shown = view.len(),
        filter = %query.filter.canonical_json(),
        "evalscope explore"
    );

    if args.json {
        let rows: Vec<_> = view.iter().map(|c| render::ConversationRow::from(*c)).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if view.is_empty() {
        println!("No conversations found matching these filters.");
        return Ok(());
    }

    render::print_conversations(&view);
    println!();
    if matched > view.len() {
        println!("Showing {} of {} conversation(s)", view.len(), matched);
    } else {
        println!("{} conversation(s)", matched);
    }
    Ok(())
}

fn cmd_report(config: &Config, args: &ReportArgs) -> Result<()> {
    let store = args.input.load()?;
    let range = args.input.range(&store)?;
    let conversations = store.within(range.as_ref());

    if conversations.is_empty() {
        bail!("No conversations in the selected date range");
    }

    let output_path = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "evalscope_report_{}.pdf",
            chrono::Local::now().format("%Y-%m-%d")
        ))
    });

    let backend =
        HttpReportBackend::new(&config.report).context("invalid report configuration")?;
    let pipeline = ReportPipeline::new(Arc::new(backend), config.report.clone());

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    println!(
        "Generating report for {} conversation(s) in {} batch(es)...",
        conversations.len(),
        conversations.len().div_ceil(config.report.chunk_size)
    );

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .context("invalid progress bar template")?
            .progress_chars("#>-"),
    );
    pb.set_message(PipelineState::Idle.status_line());

    // Mirror pipeline state into the progress bar until the run settles.
    let mut states = pipeline.subscribe();
    let bar = pb.clone();
    let watcher = runtime.spawn(async move {
        loop {
            let state = states.borrow_and_update().clone();
            if let Some(progress) = state.progress() {
                bar.set_position(u64::from(progress));
            } else if !state.is_idle() {
                bar.set_position(100);
            }
            bar.set_message(state.status_line());

            if state.is_terminal() || states.changed().await.is_err() {
                break;
            }
        }
    });

    let result = runtime.block_on(pipeline.run(ReportInput {
        conversations,
        date_range: range,
        registry: &config.agents,
    }));
    watcher.abort();

    let output = match result {
        Ok(output) => {
            pb.finish_and_clear();
            output
        }
        Err(e) => {
            pb.abandon_with_message(pipeline.state().status_line());
            return Err(e).context("report generation failed");
        }
    };

    std::fs::write(&output_path, &output.document)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    if output.chunks_failed > 0 {
        println!(
            "Warning: {} of {} batch(es) failed; the report covers the rest.",
            output.chunks_failed, output.chunks_total
        );
    }
    println!(
        "Report written to {} ({} bytes, run {})",
        output_path.display(),
        output.document.len(),
        output.run_id
    );

    tracing::info!(
        run_id = %output.run_id,
        path = %output_path.display(),
        bytes = output.document.len(),
        "evalscope report complete"
    );

    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let config_path = Config::config_path();

    println!("evalscope Configuration");
    println!("=======================");
    println!();
    println!(
        "Config file:     {}{}",
        config_path.display(),
        if config_path.exists() {
            ""
        } else {
            " (not found, using defaults)"
        }
    );
    println!("Log directory:   {}", Config::state_dir().display());
    println!(
        "API Key:         {}",
        if config.report.api_key.is_some() {
            "<set>"
        } else {
            "<not set>"
        }
    );
    println!();

    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
