//! Binary entry point for the `snapctl` CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use snapctl::{
    CommandError, CommandKind, ConnectionConfig, ConnectionOverrides, EXIT_FAILURE, EXIT_SUCCESS,
    Executor, OntapBackend, OperationArgs,
};

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                EXIT_FAILURE
            } else {
                EXIT_SUCCESS
            };
            err.print().ok();
            process::exit(code);
        }
    };

    init_logging(cli.debug);
    let exit_code = match dispatch(cli).await {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let mut filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    if let Ok(directive) = "hyper=warn".parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CommandError> {
    let operation = operation_args(&cli).validate()?;

    let settings = ConnectionConfig::load_without_cli_args()?
        .with_overrides(connection_overrides(cli))
        .settings()?;
    let backend =
        OntapBackend::connect(&settings).map_err(|err| CommandError::Connection(err.to_string()))?;
    debug!(url = %backend.base_url(), "using storage controller");

    Executor::new(&backend, io::stdout())
        .execute(&operation)
        .await
}

fn selected_command(cli: &Cli) -> Option<CommandKind> {
    [
        (cli.snaplist, CommandKind::SnapList),
        (cli.snapcreate, CommandKind::SnapCreate),
        (cli.snapdelete, CommandKind::SnapDelete),
        (cli.snaprotate, CommandKind::SnapRotate),
        (cli.snaprename, CommandKind::SnapRename),
        (cli.clonecreate, CommandKind::CloneCreate),
        (cli.clonesplit, CommandKind::CloneSplit),
        (cli.clonedelete, CommandKind::CloneDelete),
        (cli.lunmap, CommandKind::LunMap),
        (cli.lununmap, CommandKind::LunUnmap),
    ]
    .into_iter()
    .find_map(|(set, kind)| set.then_some(kind))
}

fn operation_args(cli: &Cli) -> OperationArgs {
    OperationArgs {
        command: selected_command(cli),
        volume: cli.volume.clone(),
        snapshot: cli.snapshot.clone(),
        clone: cli.clone.clone(),
        lun: cli.lun.clone(),
        igroup: cli.igroup.clone(),
        base_name: cli.base_name.clone(),
        new_name: cli.new_name.clone(),
        retention: cli.retention.clone(),
    }
}

fn connection_overrides(cli: Cli) -> ConnectionOverrides {
    ConnectionOverrides {
        host: cli.host,
        username: cli.username,
        password: cli.password,
    }
}

fn report_error(err: &CommandError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CommandError) {
    if err.is_usage() {
        writeln!(target, "{err}").ok();
    } else {
        writeln!(target, "Error: {err}").ok();
    }
}
