use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use weave_cli::WeaveError;
use weave_cli::config::{
	CONFIG_FILE_NAME, LoadedConfig, MergedConfig, discover_configs, generate_init_template,
	load_config_file, load_merged_config, merge_configs, parse_config_file, user_config_path,
};
use weave_cli::driver::Driver;
use weave_cli::rules::compile_rules;

#[derive(Parser)]
#[command(name = "weave")]
#[command(
	author,
	version,
	about = "Structural source rewriter that threads a context handle through function bodies and call sites"
)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	/// Create a template .weave.toml in the current directory
	#[arg(long)]
	init: bool,

	/// Overwrite existing .weave.toml when using --init
	#[arg(long, requires = "init")]
	force: bool,

	/// Use this config file instead of the directory cascade
	#[arg(short, long, value_name = "PATH", global = true)]
	config: Option<PathBuf>,

	/// Report what would change without writing the file
	#[arg(long)]
	dry_run: bool,

	/// Log every rule attempt to stderr
	#[arg(short, long, global = true)]
	verbose: bool,

	/// File to rewrite (defaults to the configured target)
	#[arg(conflicts_with = "init")]
	file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
	/// Configuration management commands
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand)]
enum ConfigAction {
	/// Display merged effective configuration with source annotations
	Show,
	/// Check all config files and compile their rules without rewriting anything
	Validate,
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn init_tracing(verbose: bool) {
	let default = if verbose { "weave_cli=debug" } else { "weave_cli=warn" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	if cli.init {
		return handle_init(cli.force);
	}

	if let Some(command) = cli.command {
		return match command {
			Commands::Config { action } => match action {
				ConfigAction::Show => handle_config_show(cli.config.as_deref()),
				ConfigAction::Validate => handle_config_validate(cli.config.as_deref()),
			},
		};
	}

	handle_run(cli.file.as_deref(), cli.config.as_deref(), cli.dry_run)
}

fn handle_init(force: bool) -> Result<ExitCode> {
	let config_path = PathBuf::from(CONFIG_FILE_NAME);

	if config_path.exists() && !force {
		anyhow::bail!("{} already exists. Use --force to overwrite.", CONFIG_FILE_NAME);
	}

	let template = generate_init_template();
	std::fs::write(&config_path, template)
		.with_context(|| format!("Failed to write {}", config_path.display()))?;

	println!("Created {}", CONFIG_FILE_NAME);
	Ok(ExitCode::SUCCESS)
}

fn load_config(config: Option<&Path>) -> Result<MergedConfig> {
	match config {
		Some(path) => load_config_file(path)
			.with_context(|| format!("Failed to load configuration from {}", path.display())),
		None => {
			let cwd = std::env::current_dir().context("Failed to get current directory")?;
			load_merged_config(&cwd).context("Failed to load configuration")
		}
	}
}

fn handle_config_show(config: Option<&Path>) -> Result<ExitCode> {
	let configs = match config {
		Some(path) => vec![LoadedConfig {
			config: parse_config_file(path)
				.with_context(|| format!("Failed to load configuration from {}", path.display()))?,
			path: path.to_path_buf(),
		}],
		None => {
			let cwd = std::env::current_dir().context("Failed to get current directory")?;
			discover_configs(&cwd).context("Failed to discover config files")?
		}
	};

	if configs.is_empty() {
		println!("No configuration files found.");
		return Ok(ExitCode::SUCCESS);
	}

	println!("Configuration files (in cascade order):\n");

	for loaded in &configs {
		println!("# Source: {}", loaded.path.display());
		println!("# root: {}", loaded.config.root);
		if let Some(ref env_var) = loaded.config.root_config_lookup_disable_env_var {
			println!("# root-config-lookup-disable-env-var: {}", env_var);
		}
		if let Some(ref target) = loaded.config.target {
			println!("# target: {}", target.display());
		}
		if let Some(ref hint) = loaded.config.verify_hint {
			println!("# verify-hint: {}", hint);
		}
		println!("# rules: {}", loaded.config.rules.len());
		println!();

		for rule in &loaded.config.rules {
			println!("  Rule {} ({}):", rule.name, rule.kind.as_str());
			if let Some(ref description) = rule.description {
				println!("    description: {}", description);
			}
			if !rule.after.is_empty() {
				println!("    after: {}", rule.after.join(", "));
			}
			if let Some(ref signature) = rule.signature {
				println!("    signature: {}", signature);
			}
			if let Some(ref anchor) = rule.anchor {
				println!("    anchor: {}", anchor);
			}
			if let Some(ref body) = rule.body {
				println!("    body: {} lines", body.len());
			}
			if let Some(ref callee) = rule.callee {
				println!("    callee: {}", callee);
			}
			if let Some(ref leading) = rule.leading {
				println!("    leading: {}", leading.join(", "));
			}
			if let Some(ref arg) = rule.arg {
				println!("    arg: {}", arg);
			}
			if let Some(index) = rule.index {
				println!("    index: {}", index);
			}
			if let Some(ref from) = rule.from {
				println!("    from: {}", from);
			}
			if let Some(ref to) = rule.to {
				println!("    to: {}", to);
			}
			if let Some(ref pattern) = rule.pattern {
				println!("    pattern: {}", pattern);
			}
			if let Some(ref replacement) = rule.replacement {
				println!("    replacement: {}", replacement);
			}
			if let Some(global) = rule.global {
				println!("    global: {}", global);
			}
			if let Some(ref substitution) = rule.substitution {
				println!("    substitution: {}", substitution);
			}
			println!();
		}
	}

	if config.is_none()
		&& let Ok(user_path) = user_config_path()
	{
		println!("User config path: {}", user_path.display());
		if user_path.exists() {
			println!("  (exists)");
		} else {
			println!("  (not found)");
		}
	}

	Ok(ExitCode::SUCCESS)
}

fn handle_config_validate(config: Option<&Path>) -> Result<ExitCode> {
	let configs = match config {
		Some(path) => parse_config_file(path).map(|config| {
			vec![LoadedConfig {
				config,
				path: path.to_path_buf(),
			}]
		}),
		None => {
			let cwd = std::env::current_dir().context("Failed to get current directory")?;
			discover_configs(&cwd)
		}
	};

	let configs = match configs {
		Ok(configs) => configs,
		Err(e) => {
			eprintln!("Configuration error: {}", e);
			return Ok(ExitCode::FAILURE);
		}
	};

	if configs.is_empty() {
		println!("No configuration files found.");
		return Ok(ExitCode::SUCCESS);
	}

	let merged = merge_configs(&configs);
	match compile_rules(&merged) {
		Ok(registry) => {
			println!("All configuration files are valid:");
			for loaded in &configs {
				println!(
					"  {} ({} rules)",
					loaded.path.display(),
					loaded.config.rules.len()
				);
			}
			let order: Vec<_> = registry.iter().map(|rule| rule.name.as_str()).collect();
			if !order.is_empty() {
				println!("Execution order: {}", order.join(" -> "));
			}
			Ok(ExitCode::SUCCESS)
		}
		Err(e) => {
			eprintln!("Configuration error: {}", e);
			Ok(ExitCode::FAILURE)
		}
	}
}

fn handle_run(file: Option<&Path>, config: Option<&Path>, dry_run: bool) -> Result<ExitCode> {
	let merged = load_config(config)?;
	let registry = compile_rules(&merged).context("Failed to compile rules")?;

	let target = match file {
		Some(file) => file.to_path_buf(),
		None => merged.target.clone().ok_or(WeaveError::NoTarget)?,
	};

	let report = Driver::new(&registry)
		.dry_run(dry_run)
		.run(&target)
		.with_context(|| format!("Failed to rewrite {}", target.display()))?;

	print!("{}", report);

	if report.written
		&& let Some(ref hint) = merged.verify_hint
	{
		println!("Run '{}' to verify the result", hint);
	}

	Ok(ExitCode::SUCCESS)
}
