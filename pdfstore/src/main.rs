#![warn(clippy::unwrap_in_result)]
#![warn(clippy::unwrap_used)]

use std::env;
use std::process::ExitCode;

use clap::{arg, command, crate_name, ArgMatches, Command};
use cli::error::CliError;
use cli::settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

const DEFAULT_LOG_FILTER: &str = "pdfstore=info,client=info,provider=info";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = build_cli().get_matches();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn build_cli() -> Command {
    command!(crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .arg(
            arg!(--backend <URL>)
                .required(false)
                .global(true)
                .help("Backend URL. Overrides PDFSTORE_URL"),
        )
        .arg(
            arg!(-b --bucket <BUCKET>)
                .required(false)
                .global(true)
                .help("Storage bucket. Overrides PDFSTORE_BUCKET"),
        )
        .subcommand(Command::new(cli::VERSION_SUBCOMMAND).about(cli::VERSION_DESCRIPTION))
        .subcommand(Command::new(cli::BUGREPORT_SUBCOMMAND).about(cli::BUGREPORT_DESCRIPTION))
        .subcommand(
            Command::new(cli::SIGNUP_SUBCOMMAND)
                .about(cli::SIGNUP_DESCRIPTION)
                .arg(arg!(-e --email <EMAIL>).required(true).help("Account email"))
                .arg(
                    arg!(-p --password <PASSWORD>)
                        .required(false)
                        .help("Account password. Falls back to PDFSTORE_PASSWORD, then a prompt"),
                ),
        )
        .subcommand(
            Command::new(cli::SIGNIN_SUBCOMMAND)
                .about(cli::SIGNIN_DESCRIPTION)
                .arg(arg!(-e --email <EMAIL>).required(true).help("Account email"))
                .arg(
                    arg!(-p --password <PASSWORD>)
                        .required(false)
                        .help("Account password. Falls back to PDFSTORE_PASSWORD, then a prompt"),
                ),
        )
        .subcommand(Command::new(cli::SIGNOUT_SUBCOMMAND).about(cli::SIGNOUT_DESCRIPTION))
        .subcommand(Command::new(cli::WHOAMI_SUBCOMMAND).about(cli::WHOAMI_DESCRIPTION))
        .subcommand(Command::new(cli::LIST_SUBCOMMAND).about(cli::LIST_DESCRIPTION))
        .subcommand(
            Command::new(cli::UPLOAD_SUBCOMMAND)
                .about(cli::UPLOAD_DESCRIPTION)
                .arg(
                    arg!(-f --file <FILE>)
                        .required(true)
                        .help("Path to PDF file to upload"),
                ),
        )
        .subcommand(
            Command::new(cli::IMPORT_SUBCOMMAND)
                .about(cli::IMPORT_DESCRIPTION)
                .arg(
                    arg!(--url <URL>)
                        .required(true)
                        .help("Address of the PDF to import"),
                ),
        )
        .subcommand(
            Command::new(cli::RENAME_SUBCOMMAND)
                .about(cli::RENAME_DESCRIPTION)
                .arg(
                    arg!(-n --name <NAME>)
                        .required(true)
                        .help("Current file name as shown by list"),
                )
                .arg(
                    arg!(-t --to <NAME>)
                        .required(true)
                        .help("New name without extension"),
                ),
        )
        .subcommand(
            Command::new(cli::DELETE_SUBCOMMAND)
                .about(cli::DELETE_DESCRIPTION)
                .arg(
                    arg!(-n --name <NAME>)
                        .required(true)
                        .help("File name as shown by list"),
                )
                .arg(arg!(-y --yes "Do not ask for confirmation")),
        )
        .subcommand(Command::new(cli::STATS_SUBCOMMAND).about(cli::STATS_DESCRIPTION))
        .arg_required_else_help(true)
        .disable_version_flag(true)
}

async fn run(cli: &ArgMatches) -> Result<(), CliError> {
    match cli.subcommand() {
        Some((cli::VERSION_SUBCOMMAND, _)) => {
            cli::version::run();
            return Ok(());
        }
        Some((cli::BUGREPORT_SUBCOMMAND, _)) => {
            cli::bugreport::run();
            return Ok(());
        }
        _ => {}
    }

    let Some((name, matches)) = cli.subcommand() else {
        return Ok(());
    };
    let settings = Settings::new(matches)?;
    let app = cli::commands::open(&settings).await?;

    let result = match name {
        cli::SIGNUP_SUBCOMMAND => {
            cli::commands::sign_up(&app, value(matches, "email"), optional(matches, "password"))
                .await
        }
        cli::SIGNIN_SUBCOMMAND => {
            cli::commands::sign_in(&app, value(matches, "email"), optional(matches, "password"))
                .await
        }
        cli::SIGNOUT_SUBCOMMAND => cli::commands::sign_out(&app).await,
        cli::WHOAMI_SUBCOMMAND => {
            cli::commands::who_am_i(&app);
            Ok(())
        }
        cli::LIST_SUBCOMMAND => cli::commands::list(&app),
        cli::UPLOAD_SUBCOMMAND => cli::commands::upload(&app, value(matches, "file")).await,
        cli::IMPORT_SUBCOMMAND => cli::commands::import(&app, value(matches, "url")).await,
        cli::RENAME_SUBCOMMAND => {
            cli::commands::rename(&app, value(matches, "name"), value(matches, "to")).await
        }
        cli::DELETE_SUBCOMMAND => {
            cli::commands::delete(&app, value(matches, "name"), matches.get_flag("yes")).await
        }
        cli::STATS_SUBCOMMAND => cli::commands::stats(&app),
        _ => Ok(()),
    };
    app.shutdown();
    result
}

fn value<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

fn optional<'a>(matches: &'a ArgMatches, id: &str) -> Option<&'a str> {
    matches.get_one::<String>(id).map(String::as_str)
}
