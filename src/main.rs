use clap::{Parser, Subcommand, ValueEnum};
use gridcut::batch::{self, BatchSummary};
use gridcut::config::{self, GridcutConfig};
use gridcut::imaging::{FitPolicy, GridPolicy, GridSpec, OutputFormat, TargetSize};
use gridcut::pipeline::{SplitEvent, analyze_grid};
use gridcut::{SplitContext, SplitOptions, output};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Sender, channel};
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridcut")]
#[command(about = "Split image grids into uniform cells")]
#[command(long_about = "\
Split image grids into uniform cells

Image generators often return several results in one sheet: a 3x3 grid of
icons or a 2x2 grid of illustrations. gridcut cuts the sheet into its cells,
removes the thin frames generators paint around sheets and cells, trims each
cell to its content, and writes every cell at the same size.

Output files are named <stem>-r<row>c<col>.<ext>, row-major from r0c0.

Fit policies:
  contain   whole content visible, centred, transparent padding (icons)
  cover     cell filled edge to edge, overflow cropped (illustrations)

Run 'gridcut gen-config' to generate a documented gridcut.toml.")]
#[command(version)]
struct Cli {
    /// Config file (TOML); stock defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print per-cell progress and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// 3x3 grid
    Icons,
    /// 2x2 grid
    Illustrations,
}

#[derive(Clone, Copy, ValueEnum)]
enum FitArg {
    Contain,
    Cover,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Webp,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Even,
    Separators,
}

/// Grid layout flags, shared by every command that reads a sheet.
#[derive(clap::Args, Clone)]
struct GridArgs {
    /// Grid rows (1-16)
    #[arg(long, requires = "cols", conflicts_with = "preset")]
    rows: Option<u32>,

    /// Grid columns (1-16)
    #[arg(long, requires = "rows", conflicts_with = "preset")]
    cols: Option<u32>,

    /// Named layout instead of --rows/--cols
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// How cell rectangles are found
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
}

/// Output flags for commands that write cells.
#[derive(clap::Args, Clone)]
struct RenderArgs {
    /// Fit policy for the uniform cell size
    #[arg(long, value_enum)]
    fit: Option<FitArg>,

    /// Fixed cell size as WIDTHxHEIGHT; derived from content when omitted
    #[arg(long)]
    size: Option<TargetSize>,

    /// Lossless output encoding
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Maximum parallel cell workers
    #[arg(long)]
    max_workers: Option<usize>,

    /// Output directory
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Print a JSON manifest (with SHA-256 per cell) instead of a summary
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Split one sheet into cells
    Split {
        /// Sheet image
        input: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Split every sheet under a directory, one output folder per sheet
    Batch {
        /// Directory to search recursively
        dir: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Show frames, cell rectangles and content bounds without writing cells
    Inspect {
        /// Sheet image
        input: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock gridcut.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Split {
            input,
            grid,
            render,
        } => {
            let options = split_options(cli.config.as_deref(), &grid, Some(&render))?;
            let (tx, printer) = spawn_printer(cli.verbose);
            let mut ctx = SplitContext::new(input.display().to_string());
            if let Some(tx) = tx {
                ctx = ctx.with_events(tx);
            }
            let result = batch::split_file(&input, &render.out, &options, &ctx);
            drop(ctx);
            join_printer(printer)?;
            let manifest = result?;
            if render.json {
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            } else {
                output::print_sheet_output(&manifest);
            }
        }
        Command::Batch { dir, grid, render } => {
            let options = split_options(cli.config.as_deref(), &grid, Some(&render))?;
            let (tx, printer) = spawn_printer(cli.verbose);
            let result = batch::run_batch(&dir, &render.out, &options, |path| {
                sheet_context(path, tx.as_ref())
            });
            drop(tx);
            join_printer(printer)?;
            let summary: BatchSummary = result?;
            if render.json {
                println!("{}", serde_json::to_string_pretty(&summary.sheets)?);
            } else {
                output::print_batch_output(&summary);
            }
            if !summary.failed.is_empty() {
                return Err(format!("{} sheets failed", summary.failed.len()).into());
            }
        }
        Command::Inspect { input, grid, json } => {
            let options = split_options(cli.config.as_deref(), &grid, None)?;
            let bytes = std::fs::read(&input)?;
            let ctx = SplitContext::new(input.display().to_string());
            let analysis = analyze_grid(&bytes, &options, &ctx)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                let name = input
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_else(|| input.display().to_string());
                output::print_analysis(&name, &analysis);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Logs go to stderr so `--json` output stays clean. `RUST_LOG` wins.
fn init_tracing(verbose: bool) {
    let default = if verbose { "gridcut=debug" } else { "gridcut=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file, apply command-line overrides, validate.
fn split_options(
    path: Option<&Path>,
    grid: &GridArgs,
    render: Option<&RenderArgs>,
) -> Result<SplitOptions, Box<dyn std::error::Error>> {
    let mut config = config::load_config(path)?;
    apply_overrides(&mut config, grid, render);
    config.validate()?;
    Ok(SplitOptions::from_config(&config))
}

fn apply_overrides(config: &mut GridcutConfig, grid: &GridArgs, render: Option<&RenderArgs>) {
    let layout = match (grid.preset, grid.rows, grid.cols) {
        (Some(Preset::Icons), _, _) => Some(GridSpec::ICONS),
        (Some(Preset::Illustrations), _, _) => Some(GridSpec::ILLUSTRATIONS),
        (None, Some(rows), Some(cols)) => Some(GridSpec::new(rows, cols)),
        _ => None,
    };
    if let Some(grid_spec) = layout {
        config.grid.rows = grid_spec.rows;
        config.grid.cols = grid_spec.cols;
    }
    if let Some(policy) = grid.policy {
        config.grid.policy = match policy {
            PolicyArg::Even => GridPolicy::Even,
            PolicyArg::Separators => GridPolicy::Separators,
        };
    }

    let Some(render) = render else { return };
    if let Some(fit) = render.fit {
        config.output.fit = match fit {
            FitArg::Contain => FitPolicy::Contain,
            FitArg::Cover => FitPolicy::Cover,
        };
    }
    if let Some(size) = render.size {
        config.output.width = Some(size.width);
        config.output.height = Some(size.height);
    }
    if let Some(format) = render.format {
        config.output.format = match format {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Webp => OutputFormat::WebP,
        };
    }
    if let Some(n) = render.max_workers {
        config.processing.max_workers = Some(n);
    }
}

fn sheet_context(path: &Path, events: Option<&Sender<SplitEvent>>) -> SplitContext {
    let ctx = SplitContext::new(path.display().to_string());
    match events {
        Some(tx) => ctx.with_events(tx.clone()),
        None => ctx,
    }
}

/// Progress printer thread; only started in verbose mode.
fn spawn_printer(verbose: bool) -> (Option<Sender<SplitEvent>>, Option<JoinHandle<()>>) {
    if !verbose {
        return (None, None);
    }
    let (tx, rx) = channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_split_event(&event) {
                eprintln!("{}", line);
            }
        }
    });
    (Some(tx), Some(printer))
}

fn join_printer(printer: Option<JoinHandle<()>>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(handle) = printer {
        handle
            .join()
            .map_err(|_| "progress printer thread panicked")?;
    }
    Ok(())
}
