mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use envault::error::JsonError;

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ENVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dir = cli::common::effective_dir(cli.dir.as_deref());
    let json = cli.json;

    let result = match &cli.command {
        Commands::Init => cli::init::run(&dir).await,

        Commands::Put {
            project,
            key,
            tag,
            every,
            event_triggered,
            expected_version,
        } => {
            cli::put::run(
                &dir,
                project,
                key,
                tag,
                every.as_deref(),
                *event_triggered,
                *expected_version,
                json,
            )
            .await
        }

        Commands::Get {
            project,
            key,
            version,
        } => cli::get::run(&dir, project, key, *version, json).await,

        Commands::List {
            project,
            tag,
            prefix,
        } => cli::list::run(&dir, project, tag.as_deref(), prefix.as_deref(), json).await,

        Commands::Remove { project, key } => cli::remove::run(&dir, project, key, json).await,

        Commands::Import {
            project,
            file,
            overwrite,
        } => cli::import::run(&dir, project, file, *overwrite, json).await,

        Commands::Export {
            project,
            format,
            backup,
        } => cli::export::run(&dir, project.as_deref(), format, backup.as_deref(), json).await,

        Commands::Restore { file } => cli::restore::run(&dir, file, json).await,

        Commands::Rotate { project, key } => cli::rotate::run(&dir, project, key, json).await,

        Commands::Due { within } => cli::rotate::due(&dir, within.as_deref(), json).await,

        Commands::Audit { command } => cli::audit::run(&dir, command, json).await,

        Commands::Watch => cli::watch::run(&dir).await,

        Commands::Config { command } => cli::config::run(&dir, command),
    };

    if let Err(e) = result {
        if json {
            if let Ok(body) = serde_json::to_string(&JsonError::from_error(&e)) {
                println!("{}", body);
            }
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(e.exit_code());
    }
}
