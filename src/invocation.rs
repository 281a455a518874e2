use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use stacked_errors::{Result, StackableErr};
use tracing::{info, warn};

use crate::{
    acquire_dir_path, acquire_file_path, ctrlc_issued_reset, Command, CommandResult, Executor,
    InvokeError, StepError,
};

/// The tag that every bot image is built with
pub const TAG: &str = "latest";
/// Where the configuration and storage directory ends up inside the container
pub const MOUNT_DEST: &str = "/config";
/// The environment variable that tells the bot where `MOUNT_DEST` is
pub const CONFIG_PATH_ENV: &str = "config_path";
pub const DEFAULT_DOCKERFILE: &str = "dockerfile.test";
/// The `bot/` directory of this crate, which holds only the default dockerfile
/// so that nothing else (such as `target/`) is sent as build context. This
/// path is fixed at compile time.
pub const DEFAULT_PROJECT_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/bot");
pub const DEFAULT_CONTAINER_CLI: &str = "docker";

/// Everything needed to build, run, and remove the image of one bot.
///
/// The three steps are always `build -> run -> rmi` with the same
/// `<name>:latest` tag, see [Invocation::invoke].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Identifier of the bot, used as the image name
    pub name: String,
    /// Absolute host directory that is bind mounted to `MOUNT_DEST`
    pub mount: PathBuf,
    /// Absolute directory used as the build context
    pub project_path: PathBuf,
    /// Name of the dockerfile inside of `project_path`
    pub dockerfile: String,
    /// The program used for `build`, `run`, and `rmi`
    pub container_cli: OsString,
    /// Log the exact commands before they are run
    pub debug: bool,
}

impl Invocation {
    /// Resolves `mount` and `project_path` to absolute paths, both of which
    /// need to be existing directories. Relative paths are relative to the
    /// current working directory.
    pub async fn new(
        name: impl AsRef<str>,
        mount: impl AsRef<Path>,
        project_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let mount = acquire_dir_path(mount.as_ref())
            .await
            .stack_err_locationless("Invocation::new -> the mount needs to be a directory")?;
        let project_path = acquire_dir_path(project_path.as_ref())
            .await
            .stack_err_locationless(
                "Invocation::new -> the project path needs to be a directory",
            )?;
        Ok(Self {
            name: name.as_ref().to_owned(),
            mount,
            project_path,
            dockerfile: DEFAULT_DOCKERFILE.to_owned(),
            container_cli: DEFAULT_CONTAINER_CLI.into(),
            debug: false,
        })
    }

    /// Sets `dockerfile`
    pub fn dockerfile(mut self, dockerfile: impl AsRef<str>) -> Self {
        dockerfile.as_ref().clone_into(&mut self.dockerfile);
        self
    }

    /// Sets `container_cli`
    pub fn container_cli(mut self, container_cli: impl Into<OsString>) -> Self {
        self.container_cli = container_cli.into();
        self
    }

    /// Sets `debug`
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// `<name>:latest`
    pub fn image_tag(&self) -> String {
        format!("{}:{TAG}", self.name)
    }

    pub fn dockerfile_path(&self) -> PathBuf {
        self.project_path.join(&self.dockerfile)
    }

    /// `<cli> build --force-rm -t <tag> -f <dockerfile> <project_path>`
    pub fn build_command(&self) -> Command {
        Command::new_os_str(&self.container_cli)
            .args(["build", "--force-rm", "-t"])
            .arg(self.image_tag())
            .arg("-f")
            .arg(self.dockerfile_path())
            .arg(&self.project_path)
    }

    /// `<cli> run --env config_path=/config -v <mount>:/config --rm <tag>`
    pub fn run_command(&self) -> Command {
        let mut volume = self.mount.clone().into_os_string();
        volume.push(":");
        volume.push(MOUNT_DEST);
        Command::new_os_str(&self.container_cli)
            .args(["run", "--env"])
            .arg(format!("{CONFIG_PATH_ENV}={MOUNT_DEST}"))
            .arg("-v")
            .arg(volume)
            .arg("--rm")
            .arg(self.image_tag())
    }

    /// `<cli> rmi <tag>`
    pub fn remove_command(&self) -> Command {
        Command::new_os_str(&self.container_cli)
            .arg("rmi")
            .arg(self.image_tag())
    }

    /// Builds the image, runs it, and then removes it.
    ///
    /// - A failed build returns `InvokeError::Build` immediately, nothing else
    ///   is run.
    /// - The removal is attempted whether or not the run succeeded, and its own
    ///   failure is only logged.
    /// - A failed run is returned as `InvokeError::Run` after the removal.
    pub async fn invoke<E: Executor>(
        &self,
        executor: &mut E,
    ) -> std::result::Result<(), InvokeError> {
        let tag = self.image_tag();

        let build = self.build_command();
        if let Err(error) = acquire_file_path(self.dockerfile_path()).await {
            return Err(InvokeError::Build(StepError::Launch {
                command: build.get_unified_command(),
                error,
            }))
        }
        info!("building image {tag}");
        self.step(executor, build)
            .await
            .map_err(InvokeError::Build)?;

        info!("running image {tag} with {:?} mounted", self.mount);
        let run_res = self.step(executor, self.run_command()).await;
        if ctrlc_issued_reset() {
            warn!("interrupted while running image {tag}, it will still be removed");
        }

        info!("removing image {tag}");
        if let Err(e) = self.step(executor, self.remove_command()).await {
            warn!("ignoring failure to remove image {tag}: {e}");
        }

        run_res.map(|_| ()).map_err(InvokeError::Run)
    }

    async fn step<E: Executor>(
        &self,
        executor: &mut E,
        command: Command,
    ) -> std::result::Result<CommandResult, StepError> {
        if self.debug {
            info!("{command:?}");
        }
        let unified = command.get_unified_command();
        let comres = executor
            .execute(command)
            .await
            .map_err(|error| StepError::Launch {
                command: unified.clone(),
                error,
            })?;
        if comres.successful() {
            Ok(comres)
        } else {
            Err(StepError::Unsuccessful {
                command: unified,
                status: comres.status,
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{collections::VecDeque, os::unix::process::ExitStatusExt, process::ExitStatus};

    use stacked_errors::bail;
    use tempfile::TempDir;

    use super::*;

    /// Each reply is either `Some(exit code)` or `None` for failing to launch
    #[derive(Default)]
    struct RecordingExecutor {
        replies: VecDeque<Option<i32>>,
        executed: Vec<Command>,
    }

    impl RecordingExecutor {
        fn new<I: IntoIterator<Item = Option<i32>>>(replies: I) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                executed: vec![],
            }
        }

        fn subcommands(&self) -> Vec<String> {
            self.executed
                .iter()
                .map(|c| c.args[0].to_string_lossy().into_owned())
                .collect()
        }
    }

    impl Executor for RecordingExecutor {
        async fn execute(&mut self, command: Command) -> Result<CommandResult> {
            self.executed.push(command.clone());
            match self.replies.pop_front().flatten() {
                Some(code) => Ok(CommandResult {
                    command,
                    status: ExitStatus::from_raw(code << 8),
                }),
                None => bail!("no container CLI available"),
            }
        }
    }

    async fn project() -> (TempDir, Invocation) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_DOCKERFILE), "FROM alpine\n").unwrap();
        std::fs::create_dir(dir.path().join("botdata")).unwrap();
        let invocation = Invocation::new("mybot", dir.path().join("botdata"), dir.path())
            .await
            .unwrap();
        (dir, invocation)
    }

    #[tokio::test]
    async fn commands() {
        let (dir, invocation) = project().await;
        let project_path = acquire_dir_path(dir.path()).await.unwrap();
        let mount = project_path.join("botdata");
        assert_eq!(invocation.image_tag(), "mybot:latest");
        assert_eq!(
            invocation.build_command().get_unified_command(),
            format!(
                "docker build --force-rm -t mybot:latest -f {} {}",
                project_path.join("dockerfile.test").display(),
                project_path.display()
            )
        );
        assert_eq!(
            invocation.run_command().get_unified_command(),
            format!(
                "docker run --env config_path=/config -v {}:/config --rm mybot:latest",
                mount.display()
            )
        );
        assert_eq!(
            invocation
                .clone()
                .container_cli("podman")
                .remove_command()
                .get_unified_command(),
            "podman rmi mybot:latest"
        );
    }

    #[tokio::test]
    async fn relative_mount_becomes_absolute() {
        let (dir, _) = project().await;
        // tests run from the package root
        let invocation = Invocation::new("mybot", "src", dir.path()).await.unwrap();
        assert!(invocation.mount.is_absolute());
        assert!(invocation.mount.ends_with("src"));
        assert_eq!(
            invocation.run_command().args[4],
            OsString::from(format!("{}:/config", invocation.mount.display()))
        );
    }

    #[tokio::test]
    async fn missing_mount() {
        let (dir, _) = project().await;
        assert!(Invocation::new("mybot", dir.path().join("nonexistent"), dir.path())
            .await
            .is_err());
        // a file is not a directory
        assert!(Invocation::new(
            "mybot",
            dir.path().join(DEFAULT_DOCKERFILE),
            dir.path()
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn all_steps_succeed() {
        let (_dir, invocation) = project().await;
        let mut executor = RecordingExecutor::new([Some(0), Some(0), Some(0)]);
        invocation.invoke(&mut executor).await.unwrap();
        assert_eq!(executor.subcommands(), ["build", "run", "rmi"]);
        // the tag is the last argument in every step
        for command in &executor.executed {
            assert_eq!(command.args.last().unwrap(), "mybot:latest");
        }
    }

    #[tokio::test]
    async fn build_failure_aborts() {
        let (_dir, invocation) = project().await;
        let mut executor = RecordingExecutor::new([Some(3)]);
        let e = invocation.invoke(&mut executor).await.unwrap_err();
        assert!(matches!(e, InvokeError::Build(StepError::Unsuccessful { .. })));
        assert_eq!(e.exit_code(), 3);
        assert_eq!(executor.subcommands(), ["build"]);

        let mut executor = RecordingExecutor::new([None]);
        let e = invocation.invoke(&mut executor).await.unwrap_err();
        assert!(matches!(e, InvokeError::Build(StepError::Launch { .. })));
        assert_eq!(e.exit_code(), 1);
        assert_eq!(executor.subcommands(), ["build"]);
    }

    #[tokio::test]
    async fn missing_dockerfile_aborts_before_build() {
        let (_dir, invocation) = project().await;
        let invocation = invocation.dockerfile("nonexistent.dockerfile");
        let mut executor = RecordingExecutor::default();
        let e = invocation.invoke(&mut executor).await.unwrap_err();
        assert!(matches!(e, InvokeError::Build(StepError::Launch { .. })));
        assert!(executor.executed.is_empty());
    }

    #[tokio::test]
    async fn run_failure_still_removes() {
        let (_dir, invocation) = project().await;
        // the removal failing too must not change the code
        let mut executor = RecordingExecutor::new([Some(0), Some(42), Some(1)]);
        let e = invocation.invoke(&mut executor).await.unwrap_err();
        assert!(matches!(e, InvokeError::Run(StepError::Unsuccessful { .. })));
        assert_eq!(e.exit_code(), 42);
        assert_eq!(executor.subcommands(), ["build", "run", "rmi"]);

        let mut executor = RecordingExecutor::new([Some(0), None, Some(0)]);
        let e = invocation.invoke(&mut executor).await.unwrap_err();
        assert!(matches!(e, InvokeError::Run(StepError::Launch { .. })));
        assert_eq!(executor.subcommands(), ["build", "run", "rmi"]);
    }

    #[tokio::test]
    async fn removal_failure_is_ignored() {
        let (_dir, invocation) = project().await;
        let mut executor = RecordingExecutor::new([Some(0), Some(0), Some(1)]);
        invocation.invoke(&mut executor).await.unwrap();

        let mut executor = RecordingExecutor::new([Some(0), Some(0), None]);
        invocation.invoke(&mut executor).await.unwrap();
        assert_eq!(executor.subcommands(), ["build", "run", "rmi"]);
    }
}
