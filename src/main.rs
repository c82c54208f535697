use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    gutencheck::logging::init().context("init logging")?;

    let cli = gutencheck::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        gutencheck::cli::Command::Fetch(args) => {
            gutencheck::fetch::run(args).await.context("fetch")?;
        }
        gutencheck::cli::Command::Build(args) => {
            gutencheck::build::run(args).await.context("build")?;
        }
        gutencheck::cli::Command::Show(args) => {
            gutencheck::checklist::show(args).context("show")?;
        }
        gutencheck::cli::Command::Search(args) => {
            gutencheck::checklist::search(args).context("search")?;
        }
        gutencheck::cli::Command::Mark(args) => {
            gutencheck::checklist::mark(args).context("mark")?;
        }
        gutencheck::cli::Command::Unmark(args) => {
            gutencheck::checklist::unmark(args).context("unmark")?;
        }
    }

    Ok(())
}
