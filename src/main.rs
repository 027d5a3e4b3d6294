use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use log::info;

use sbatcher::request::jobs::JobFile;
use sbatcher::request::profile::Profile;
use sbatcher::{CleanupPolicy, Dispatcher, JobSpec, Renderer, Sbatch};

/// Render SLURM job scripts for training runs and submit them with sbatch
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Cluster profile (JSON) with shared directives and environment setup
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Print rendered job scripts instead of submitting them
    #[arg(long)]
    dry_run: bool,

    /// What to do with job scripts after submission (overrides the profile)
    #[arg(long, value_enum)]
    cleanup: Option<CleanupPolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a single job
    Run {
        /// Job name, also used for the log file name
        #[arg(short = 'J', long, value_parser = NonEmptyStringValueParser::new())]
        name: String,

        /// Use the short smoke test time limit
        #[arg(long)]
        debug: bool,

        /// Iteration of an iterative training run, appended to the name
        #[arg(long)]
        iteration: Option<u32>,

        /// Extra #SBATCH directive, e.g. --directive=--gres=gpu:1 (repeatable)
        #[arg(long = "directive", allow_hyphen_values = true)]
        directives: Vec<String>,

        /// Extra shell line run before the command (repeatable)
        #[arg(long = "setup")]
        setup: Vec<String>,

        /// Training command and its arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Submit every job in a JSON job file, one after another
    Batch {
        /// Path to the job file
        jobs: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    info!("terve! starting up :)");

    let args = Args::parse();

    let profile = match &args.profile {
        Some(path) => Profile::read(path).with_context(|| format!("Loading profile {}", path.display()))?,
        None => {
            info!("No profile given, using defaults");
            Profile::default()
        }
    };

    let specs = match args.command {
        Commands::Run { name, debug, iteration, directives, setup, command } => {
            let spec = JobSpec::new(name, command.join(" "))
                .debug(debug)
                .resource_requests(&profile.resource_requests)
                .resource_requests(directives)
                .environment_setup(&profile.environment_setup)
                .environment_setup(setup);
            let spec = match iteration {
                Some(n) => spec.iteration(n),
                None => spec,
            };
            vec![spec]
        }
        Commands::Batch { jobs } => JobFile::read(&jobs)
            .with_context(|| format!("Loading job file {}", jobs.display()))?
            .specs(&profile),
    };

    let renderer = Renderer::new(profile.render_options())?;

    if args.dry_run {
        info!("--dry-run set, printing job scripts without submitting");
        for script in sbatcher::render_all(&renderer, &specs)? {
            println!("{}", script.text());
        }
        return Ok(());
    }

    let cleanup = args.cleanup.unwrap_or(profile.cleanup);
    let dispatcher = Dispatcher::new(Sbatch::new(&profile.submit_command), &profile.script_dir, cleanup);

    let failed = sbatcher::submit_all(&renderer, &dispatcher, &specs);
    if failed > 0 {
        bail!("{} of {} jobs failed to submit", failed, specs.len());
    }
    info!("Submitted {} jobs", specs.len());
    Ok(())
}
