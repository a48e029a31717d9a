mod api;
mod cli;
mod commands;
mod dialog;
mod display;
mod error;
mod logging;
mod models;
mod ownership;
mod page;
mod resolve;
mod session;
mod settings;
mod store;
mod tags;
#[cfg(test)]
mod testing;
mod ui;
mod validate;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use cli::{ApplyFields, Cli, Commands, ProfileAction, ResourceAction};
use commands::Client;
use logging::Fallback;
use models::{Draft, PlanDraft, PostDraft, ProgressDraft};
use settings::{ClientConfig, Settings};
use ui::run_tui;

fn run_resource<D, F>(config: ClientConfig, action: ResourceAction<F>) -> Result<()>
where
    D: Draft,
    F: clap::Args + ApplyFields<D>,
{
    let client = Client::connect(config)?;
    match action {
        ResourceAction::List => client.list::<D>(),
        ResourceAction::Create { fields } => client.create::<D>(&fields),
        ResourceAction::Edit { target, fields } => client.edit::<D>(&target, &fields),
        ResourceAction::Delete { target, yes } => client.delete::<D>(&target, yes),
    }
}

fn print_completions(shell: Shell, out: &mut dyn std::io::Write) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "skillsync", out);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(Commands::Completions { shell }) = &cli.command {
        print_completions(*shell, &mut std::io::stdout());
        return Ok(());
    }

    let settings = Settings::open_default()
        .with_context(|| format!("failed to open {}", Settings::default_path().display()))?;

    // Local settings commands do not need a valid client configuration.
    match &cli.command {
        Some(Commands::Set { key, value }) => return commands::set_config(&settings, key, value),
        Some(Commands::Get { key }) => return commands::get_config(&settings, key),
        Some(Commands::ConfigList) => return commands::list_configs(&settings),
        Some(Commands::ConfigDelete { key }) => return commands::delete_config(&settings, key),
        _ => {}
    }

    let config = ClientConfig::resolve(&settings).context("invalid configuration")?;
    let fallback = match cli.command {
        None | Some(Commands::Tui) => Fallback::Discard,
        Some(_) => Fallback::Stderr,
    };
    logging::init(config.log_level, config.log_file.as_deref(), fallback)?;
    log::debug!("using API at {}", config.api_url);

    match cli.command {
        Some(Commands::Posts { action }) => run_resource::<PostDraft, _>(config, action)?,
        Some(Commands::Progress { action }) => run_resource::<ProgressDraft, _>(config, action)?,
        Some(Commands::Plans { action }) => run_resource::<PlanDraft, _>(config, action)?,
        Some(Commands::Whoami) => Client::connect(config)?.whoami()?,
        Some(Commands::Login) => Client::connect(config)?.login()?,
        Some(Commands::Profile { action }) => {
            let client = Client::connect(config)?;
            match action {
                ProfileAction::Show => client.profile_show()?,
                ProfileAction::Update(fields) => client.profile_update(&fields)?,
            }
        }
        Some(Commands::Tui) | None => {
            // Default behavior: launch TUI
            run_tui(config)?;
        }
        Some(
            Commands::Set { .. }
            | Commands::Get { .. }
            | Commands::ConfigList
            | Commands::ConfigDelete { .. }
            | Commands::Completions { .. },
        ) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_completions_cover_subcommands() {
        let mut out = Vec::new();
        print_completions(Shell::Bash, &mut out);
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("skillsync"));
        assert!(script.contains("config-list"));
    }
}
