// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

mod cli_commands;

use std::io::stdout;
use std::path::PathBuf;

use clap::builder::styling::Styles;
use clap::{Args, CommandFactory, Parser, crate_description, crate_version};
use clap_complete::{Shell, generate};
use color_eyre::config::HookBuilder;
use color_eyre::eyre::{Context, EyreHandler, InstallError, Result};
use log::{debug, info};
use owo_colors::OwoColorize;
use periphsim::config::SocConfig;

use crate::cli_commands::ToplevelCommands;

#[derive(Parser)]
#[command(
	version,
	about = format!("{} v{}", crate_description!(), crate_version!()),
	styles(style()),
	disable_colored_help(false),
	arg_required_else_help(true)
)]
struct CliArguments
{
	#[arg(global = true, short = 'c', long = "config")]
	/// Read the system configuration from the given JSON file
	config: Option<PathBuf>,
	#[arg(global = true, long = "event-log")]
	/// Write the events seen during the run to the given JSON file
	event_log: Option<PathBuf>,

	#[command(subcommand)]
	pub subcommand: ToplevelCommands,
}

impl CliArguments
{
	fn config(&self) -> Result<SocConfig>
	{
		match &self.config {
			Some(path) => SocConfig::from_path(path)
				.wrap_err_with(|| format!("Failed to load configuration from {}", path.display())),
			None => {
				debug!("No configuration given, using defaults");
				Ok(SocConfig::default())
			},
		}
	}
}

#[derive(Args)]
struct CompletionArguments
{
	shell: Shell,
}

type EyreHookFunc = Box<dyn Fn(&(dyn std::error::Error + 'static)) -> Box<dyn EyreHandler> + Send + Sync + 'static>;
type PanicHookFunc = Box<dyn Fn(&std::panic::PanicHookInfo<'_>) + Send + Sync + 'static>;

struct PeriphsimHook
{
	inner_hook: EyreHookFunc,
}

struct PeriphsimPanic
{
	inner_hook: PanicHookFunc,
}

struct PeriphsimHandler
{
	inner_handler: Box<dyn EyreHandler>,
}

impl PeriphsimHook
{
	fn build_handler(&self, error: &(dyn std::error::Error + 'static)) -> PeriphsimHandler
	{
		PeriphsimHandler {
			inner_handler: (*self.inner_hook)(error),
		}
	}

	pub fn install(self) -> Result<(), InstallError>
	{
		color_eyre::eyre::set_hook(self.into_eyre_hook())
	}

	pub fn into_eyre_hook(self) -> EyreHookFunc
	{
		Box::new(move |err| Box::new(self.build_handler(err)))
	}
}

impl PeriphsimPanic
{
	pub fn install(self)
	{
		std::panic::set_hook(self.into_panic_hook());
	}

	pub fn into_panic_hook(self) -> PanicHookFunc
	{
		Box::new(move |panic_info| {
			print_header();
			(*self.inner_hook)(panic_info);
			eprintln!();
			eprintln!("{}", "Please include all lines down to this one from the cut here marker".yellow());
			eprintln!("{}", "when reporting this issue".yellow());
		})
	}
}

fn print_header()
{
	eprintln!("------------[ ✂ cut here ✂ ]------------");
	eprintln!("Unhandled crash in periphsim-cli v{}", crate_version!());
	eprintln!();
}

impl EyreHandler for PeriphsimHandler
{
	fn debug(&self, error: &(dyn std::error::Error + 'static), fmt: &mut core::fmt::Formatter<'_>)
	-> core::fmt::Result
	{
		writeln!(fmt, "------------[ ✂ cut here ✂ ]------------")?;
		write!(fmt, "Unhandled error in periphsim-cli v{}", crate_version!())?;
		self.inner_handler.debug(error, fmt)?;
		writeln!(fmt)?;
		writeln!(fmt)?;
		writeln!(
			fmt,
			"{}",
			"Please include all lines down to this one from the cut here marker".yellow()
		)?;
		write!(fmt, "{}", "when reporting this issue".yellow())
	}

	fn track_caller(&mut self, location: &'static std::panic::Location<'static>)
	{
		self.inner_handler.track_caller(location);
	}
}

fn install_error_handler() -> Result<()>
{
	// Split the default handler into its panic and error halves
	let (panic_hook, eyre_hook) = HookBuilder::default().try_into_hooks()?;

	// Wrap each so the report gets our header and footer around it
	PeriphsimPanic {
		inner_hook: panic_hook.into_panic_hook(),
	}
	.install();
	PeriphsimHook {
		inner_hook: eyre_hook.into_eyre_hook(),
	}
	.install()?;
	Ok(())
}

/// Clap v3 style (approximate)
/// See https://stackoverflow.com/a/75343828
fn style() -> clap::builder::Styles
{
	Styles::styled()
		.usage(
			anstyle::Style::new()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)))
				.bold(),
		)
		.header(
			anstyle::Style::new()
				.bold()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
		)
		.literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
}

fn main() -> Result<()>
{
	install_error_handler()?;
	env_logger::Builder::new()
		.filter_level(log::LevelFilter::Info)
		.parse_default_env()
		.init();

	let cli_args = CliArguments::parse();

	let events = match &cli_args.subcommand {
		ToplevelCommands::Flash(flash_args) => flash_args.subcommand(&cli_args.config()?)?,
		ToplevelCommands::Uart(uart_args) => uart_args.subcommand(&cli_args.config()?)?,
		ToplevelCommands::Complete(comp_args) => {
			let mut cmd = CliArguments::command();
			generate(comp_args.shell, &mut cmd, "periphsim-cli", &mut stdout());
			return Ok(());
		},
	};

	if let Some(path) = &cli_args.event_log {
		events
			.save(path)
			.wrap_err_with(|| format!("Failed to write event log to {}", path.display()))?;
		info!("Wrote {} events to {}", events.events().len(), path.display());
	}
	Ok(())
}
