use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anstream::{AutoStream, ColorChoice};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use repos::config::{self, RepoConfig, RepoSet};
use repos::foreach::ForeachRunner;
use repos::git::Repository;
use repos::model::RepoInfo;
use repos::probe::ProbeOptions;
use repos::report::{self, ForeachView, StatusView};
use repos::scheduler::Scheduler;
use repos::shell_exec::{CommandRunner, ProcessRunner};
use repos::styling::{ERROR, ERROR_EMOJI, HINT, NAME, eprintln, println};
use repos::{shell, subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "repos",
    version,
    about = "Show which of your git repositories need attention",
    long_about = None
)]
struct Cli {
    /// Config file to use instead of ~/.config/repos.toml.
    #[arg(short = 'F', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of repositories to process at once.
    #[arg(
        short = 'j',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    jobs: u16,

    /// Do not fetch before comparing with upstream.
    #[arg(long)]
    no_fetch: bool,

    /// Show the current branch of each repository.
    #[arg(long)]
    branch: bool,

    /// Output format (defaults to `ansi`, or `text` when the config sets
    /// `color = false`).
    #[arg(long, value_enum)]
    output_format: Option<OutputFormat>,

    /// Show every repository, not only those that need attention.
    #[arg(long)]
    all: bool,

    /// Include repositories marked `ignore`.
    #[arg(long)]
    noignore: bool,

    /// Run a shell command in every repository.
    #[arg(long, value_name = "COMMAND")]
    foreach: Option<String>,

    /// Print foreach results as `name<sep>stdout`.
    #[arg(long, requires = "foreach")]
    csv: bool,

    /// Separator for --csv.
    #[arg(long, default_value = ",", value_name = "SEP")]
    csv_sep: String,

    /// Report on a single repository directory instead of the config.
    #[arg(long, value_name = "DIR")]
    path: Option<PathBuf>,

    /// Print a config file for the git repositories under the current directory.
    #[arg(long)]
    generate_config: bool,

    /// Print configured repository names.
    #[arg(long)]
    list_names: bool,

    /// Print configured repository paths.
    #[arg(long)]
    list_paths: bool,

    /// With --list-paths, print only repositories behind their upstream.
    #[arg(long, requires = "list_paths")]
    behind: bool,

    /// Print the directory of a repository.
    #[arg(long, value_name = "NAME")]
    get_dir: Option<String>,

    /// Start a login shell in a repository.
    #[arg(short = 'r', long = "repo", value_name = "NAME")]
    shell_repo: Option<String>,

    /// Show recent commits on all branches of each repository.
    #[arg(long)]
    recent: bool,

    /// How far back --recent looks.
    #[arg(long, default_value_t = 1, value_name = "N")]
    days: u32,

    /// Kill any git or foreach command running longer than this.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Log every command run (same as RUST_LOG=debug).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    external: Option<External>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum External {
    /// `repos <name> args...` runs `repos-<name>` from PATH.
    #[command(external_subcommand)]
    Run(Vec<String>),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Ansi,
    Text,
    Json,
}

impl OutputFormat {
    /// Stdout and stderr writers that keep styles for `ansi` (when the
    /// terminal supports them) and strip them otherwise.
    fn streams(self) -> (AutoStream<io::Stdout>, AutoStream<io::Stderr>) {
        let choice = match self {
            OutputFormat::Ansi => ColorChoice::Auto,
            OutputFormat::Text | OutputFormat::Json => ColorChoice::Never,
        };
        (
            AutoStream::new(io::stdout(), choice),
            AutoStream::new(io::stderr(), choice),
        )
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{ERROR_EMOJI} {ERROR}{e:#}{ERROR:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    if cli.generate_config {
        let dir = std::env::current_dir().context("failed to read current directory")?;
        let generated = config::generate_config(&dir)?;
        if generated.is_empty() {
            eprintln!(
                "{}",
                report::warning(format!("no git repositories found in {}", dir.display()))
            );
        } else {
            print!("{generated}");
        }
        return Ok(0);
    }

    if let Some(External::Run(argv)) = &cli.external {
        subcommand::dispatch(argv, cli.config.as_deref())?;
        return Ok(0);
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::with_timeout(
        cli.timeout.map(Duration::from_secs),
    ));
    let options = ProbeOptions {
        fetch: !cli.no_fetch,
        want_branch: cli.branch,
    };
    let view = StatusView {
        show_branch: cli.branch,
        all: cli.all,
        noignore: cli.noignore,
    };

    if let Some(path) = &cli.path {
        let format = cli.output_format.unwrap_or(OutputFormat::Ansi);
        let info = RepoInfo::probe(RepoConfig::from_path(path), options, runner.as_ref());
        print_single(&info, format, &view)?;
        return Ok(0);
    }

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let set = config::load(&config_path)?;
    if set.is_empty() {
        log::warn!("no repositories configured in {}", config_path.display());
    }
    let jobs = usize::from(cli.jobs);

    if cli.recent {
        print_recent(&set, cli.days, cli.noignore, runner.as_ref());
        return Ok(0);
    }

    if cli.list_names {
        for name in set.names() {
            println!("{name}");
        }
        return Ok(0);
    }

    if cli.list_paths {
        if cli.behind {
            let repos = set.active(cli.noignore).cloned().collect();
            let completion = Scheduler::new(jobs, options, runner).run(repos);
            report::stream_behind_paths(completion, &mut io::stdout().lock())?;
        } else {
            for repo in set.iter() {
                println!("{}", repo.path.display());
            }
        }
        return Ok(0);
    }

    if let Some(name) = &cli.shell_repo {
        let repo = find_repo(&set, name)?;
        eprintln!("{HINT}==> Starting new shell in {}{HINT:#}", repo.path.display());
        return shell::open_shell(&repo.path);
    }

    if let Some(name) = &cli.get_dir {
        println!("{}", find_repo(&set, name)?.path.display());
        return Ok(0);
    }

    let format = cli.output_format.unwrap_or(match set.settings().color {
        Some(false) => OutputFormat::Text,
        _ => OutputFormat::Ansi,
    });
    let (mut out, mut err) = format.streams();

    if let Some(command) = &cli.foreach {
        let completion = ForeachRunner::new(jobs, runner).run(set.to_vec(), command, cli.noignore);
        if format == OutputFormat::Json {
            report::write_foreach_json(completion, &mut out)?;
        } else {
            let view = if cli.csv {
                ForeachView::Csv {
                    separator: cli.csv_sep.clone(),
                }
            } else {
                ForeachView::Pretty {
                    command: command.clone(),
                }
            };
            report::stream_foreach(completion, &view, &mut out, &mut err)?;
        }
        return Ok(0);
    }

    let completion = Scheduler::new(jobs, options, runner).run(set.to_vec());
    if format == OutputFormat::Json {
        report::write_status_json(completion, &mut out)?;
    } else {
        let errors = report::stream_status(completion, &view, &mut out, &mut err)?;
        log::debug!("{errors} of {} repositories reported errors", set.len());
    }
    Ok(0)
}

fn find_repo<'a>(set: &'a RepoSet, name: &str) -> anyhow::Result<&'a RepoConfig> {
    set.find(name)
        .with_context(|| format!("no repository named '{name}'"))
}

/// Status of a repository given with `--path`, probed directly.
fn print_single(info: &RepoInfo, format: OutputFormat, view: &StatusView) -> anyhow::Result<()> {
    let (mut out, mut err) = format.streams();
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut out, &[info])?;
        writeln!(out)?;
        return Ok(());
    }
    if let Some(error) = &info.error {
        writeln!(err, "{ERROR_EMOJI} {ERROR}{error}{ERROR:#}")?;
    }
    writeln!(out, "{}", report::status_header(view))?;
    writeln!(out, "{}", report::status_row(info, view))?;
    Ok(())
}

fn print_recent(set: &RepoSet, days: u32, include_ignored: bool, runner: &dyn CommandRunner) {
    for config in set.active(include_ignored) {
        let repo = Repository::new(&config.path, &config.name, runner);
        // One extra day so "--days 1" covers yesterday as well as today.
        match repo.recent_commits(days.saturating_add(1)) {
            Ok(log) if log.trim().is_empty() => {}
            Ok(log) => {
                println!("{NAME}{}{NAME:#}", config.name);
                for line in log.lines() {
                    println!("    {line}");
                }
            }
            Err(e) => log::warn!("{}: {e}", config.name),
        }
    }
}
