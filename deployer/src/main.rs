//! Deployment helper.
//!
//! Clears assume-unchanged bits, holds repository hooks off, commits all
//! changes without verification, and pushes. With no subcommand it runs the
//! deployment using `.git/deploy.toml` under the working directory, or
//! built-in defaults when that file is absent.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use deployer::deploy::deploy_from_root;
use deployer::exit_codes;
use deployer::io::config::{
    DEFAULT_CONFIG_PATH, DeployConfig, load_config, render_config, write_config,
};
use deployer::io::console::Console;
use deployer::logging;

#[derive(Parser)]
#[command(
    name = "deployer",
    version,
    about = "Unlock, commit, and push a working tree with hooks held off"
)]
struct Cli {
    /// Repository working directory.
    #[arg(short = 'C', long, global = true, default_value = ".")]
    workdir: PathBuf,

    /// Config file [default: <WORKDIR>/.git/deploy.toml].
    ///
    /// Pass this explicitly in linked worktrees, where `.git` is a file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the deployment sequence (default).
    Run,
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective config as TOML.
    Config,
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.workdir.join(DEFAULT_CONFIG_PATH))
    }
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::INVALID);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path();
    match cli.command {
        None | Some(Command::Run) => cmd_run(&cli.workdir, &config_path),
        Some(Command::Init { force }) => cmd_init(&config_path, force),
        Some(Command::Config) => cmd_config(&config_path),
    }
}

fn cmd_run(workdir: &Path, config_path: &Path) -> Result<()> {
    let stdout = std::io::stdout();
    let mut console = Console::new(stdout.lock());
    deploy_from_root(workdir, config_path, &mut console)?;
    Ok(())
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if !force && config_path.exists() {
        bail!(
            "{} already exists (pass --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &DeployConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(())
}

fn cmd_config(config_path: &Path) -> Result<()> {
    let cfg = load_config(config_path)?;
    print!("{}", render_config(&cfg)?);
    Ok(())
}
