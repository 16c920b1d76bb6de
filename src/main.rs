use venv_pipeline::cli::output::*;
use venv_pipeline::cli::{Cli, Command};
use venv_pipeline::cli::commands::{LocateCommand, PlanCommand, ProvisionCommand, ValidateCommand};
use venv_pipeline::core::config::ProvisionConfig;
use venv_pipeline::core::{InterpreterLocator, PathResolver, PipelineStatus};
use venv_pipeline::execution::{ChannelProgressSink, Provisioner};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Provision(cmd) => provision(cmd).await?,
        Command::Plan(cmd) => plan(cmd)?,
        Command::Validate(cmd) => validate(cmd)?,
        Command::Locate(cmd) => locate(cmd).await?,
    }

    Ok(())
}

async fn provision(cmd: &ProvisionCommand) -> Result<()> {
    let config = cmd.target.to_config()?;
    let provisioner = Provisioner::new(config);
    let environment = provisioner.environment();

    println!(
        "{} Provisioning {}",
        ROCKET,
        style(environment.root_path.display()).bold()
    );

    let (sink, mut events) = ChannelProgressSink::channel();
    let (done_tx, done_rx) = oneshot::channel();
    let handle = provisioner.start(Arc::new(sink), move |success, path, output| {
        let _ = done_tx.send((success, path, output));
    });

    let progress = create_progress_bar(0);
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());
    let mut cancelled = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                // The linger only matters to interactive hosts; stop at the outcome.
                Some(event) => {
                    if apply_progress_event(&progress, &event) || is_terminal_event(&event) {
                        break;
                    }
                }
                None => break,
            },
            _ = &mut ctrl_c, if !cancelled => {
                progress.println(format!("{} Cancelling...", WARN));
                handle.cancel();
                cancelled = true;
            }
        }
    }

    if !progress.is_finished() {
        progress.finish_and_clear();
    }

    let environment_path = handle.environment_path().to_path_buf();
    let state = handle.wait().await.context("Provisioning task failed")?;

    match state.status() {
        PipelineStatus::Succeeded => {
            println!(
                "\n{} Environment ready at {}",
                CHECK,
                style(environment_path.display()).bold()
            );
            Ok(())
        }
        PipelineStatus::Cancelled => {
            println!(
                "\n{} Provisioning {}",
                WARN,
                style("cancelled").yellow()
            );
            std::process::exit(130);
        }
        status => {
            let output = match done_rx.await {
                Ok((_, _, output)) => output,
                Err(_) => state.accumulated_output().to_string(),
            };
            println!(
                "\n{} Provisioning {} ({})",
                CROSS,
                style("failed").red(),
                format_status(status)
            );
            println!("{}", style(separator()).dim());
            println!("{}", format_output_tail(&output, cmd.tail));
            println!("{}", style(separator()).dim());
            error!(
                "Command {} of {} failed",
                state.current_index() + 1,
                state.total_steps()
            );
            std::process::exit(1);
        }
    }
}

fn plan(cmd: &PlanCommand) -> Result<()> {
    let config = cmd.target.to_config()?;
    let provisioner = Provisioner::new(config);

    let commands = match provisioner.plan() {
        Ok(commands) => commands,
        Err(e) => {
            println!("{} Planning failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&commands)?);
        return Ok(());
    }

    println!(
        "{} {} commands for {}",
        INFO,
        style(commands.len()).cyan(),
        style(provisioner.environment().root_path.display()).bold()
    );
    for (index, command) in commands.iter().enumerate() {
        println!("{}", format_command(index, command));
    }
    Ok(())
}

fn validate(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating manifest...", INFO);

    match ProvisionConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Manifest is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!(
                "  Base directory: {}",
                style(config.resolved_base_dir().display()).cyan()
            );
            println!("  Packages: {}", style(config.packages.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn locate(cmd: &LocateCommand) -> Result<()> {
    let config = cmd.target.to_config()?;
    let locator = InterpreterLocator::default().with_configured(config.interpreter.clone());
    let candidates = locator.candidates();
    let selected = locator.locate();

    let resolver = PathResolver::default();
    let environment = resolver.resolve(&config.resolved_base_dir(), &config.name);
    let site_packages = resolver.site_packages(&environment).await;

    if cmd.json {
        let candidates: Vec<_> = candidates
            .iter()
            .map(|candidate| {
                serde_json::json!({
                    "path": candidate,
                    "excluded": locator.is_excluded(candidate),
                    "exists": candidate.is_file(),
                })
            })
            .collect();
        let data = serde_json::json!({
            "interpreter": selected.as_ref().ok(),
            "error": selected.as_ref().err().map(|e| e.to_string()),
            "candidates": candidates,
            "environment": environment,
            "installer": environment.installer_binary(),
            "site_packages": site_packages,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    match &selected {
        Ok(interpreter) => println!(
            "{} Base interpreter {}",
            CHECK,
            style(interpreter.display()).bold()
        ),
        Err(e) => println!("{} {}", CROSS, style(e).red()),
    }

    println!("{} Candidates in priority order:", INFO);
    for candidate in &candidates {
        let is_selected = selected.as_ref().is_ok_and(|s| s == candidate);
        println!(
            "{}",
            format_candidate(
                candidate,
                is_selected,
                locator.is_excluded(candidate),
                candidate.is_file()
            )
        );
    }

    println!("\n{} Environment {}", INFO, style(&config.name).bold());
    println!("{}", format_environment(&environment));
    match site_packages {
        Some(path) => println!("  Site-packages: {}", style(path.display()).cyan()),
        None => println!("  Site-packages: {}", style("not found").yellow()),
    }

    if selected.is_err() {
        std::process::exit(1);
    }
    Ok(())
}
