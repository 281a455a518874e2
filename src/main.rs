use std::{path::PathBuf, process::ExitCode};

use bot_runner::{
    std_init, Invocation, SystemExecutor, DEFAULT_CONTAINER_CLI, DEFAULT_DOCKERFILE,
    DEFAULT_PROJECT_DIR,
};
use clap::Parser;
use tracing::error;

/// Builds the docker image of a bot, runs it with a configuration and storage
/// directory mounted at `/config`, and then removes the image. Exits with the
/// exit code of the bot.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// An identifier for the bot that is used as the image name. If an image
    /// with this name already exists (including from using this previously) it
    /// will be replaced.
    #[arg(long, value_name = "N", env = "BOT_NAME")]
    name: String,
    /// A path to a directory that contains configuration and storage to be
    /// used by the bot. The bot finds it through the `config_path` environment
    /// variable.
    #[arg(long, value_name = "m", env = "BOT_MOUNT")]
    mount: PathBuf,
    /// Name of the dockerfile inside of the project directory
    #[arg(long, default_value = DEFAULT_DOCKERFILE)]
    dockerfile: String,
    /// The build context. The default is the `bot/` directory of the source
    /// tree this tool was compiled from, which no longer exists if the sources
    /// were removed (e.g. after `cargo install`), so pass this explicitly in
    /// that case.
    #[arg(long, default_value = DEFAULT_PROJECT_DIR)]
    project_dir: PathBuf,
    /// The container CLI to use, e.g. "podman"
    #[arg(long, env = "CONTAINER_CLI", default_value = DEFAULT_CONTAINER_CLI)]
    container_cli: String,
    /// Log the exact commands before they are run
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = std_init() {
        eprintln!("{e:?}");
        return ExitCode::FAILURE
    }

    let invocation = match Invocation::new(&args.name, &args.mount, &args.project_dir).await {
        Ok(invocation) => invocation
            .dockerfile(&args.dockerfile)
            .container_cli(&args.container_cli)
            .debug(args.debug),
        Err(e) => {
            error!("{e:?}");
            // the same code `clap` uses for bad arguments
            return ExitCode::from(2)
        }
    };

    match invocation.invoke(&mut SystemExecutor).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
