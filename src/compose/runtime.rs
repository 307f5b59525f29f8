use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::config::ComposeConfig;
use crate::{Error, Result};

/// Captured result of a process run inside or against a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Operations the setup sequence needs from a container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Fails with [`Error::MissingTool`] if an executable the runtime
    /// shells out to is not available.
    async fn check_prerequisites(&self) -> Result<()>;

    /// Starts every service of the compose declaration in the background.
    async fn up(&self) -> Result<()>;

    async fn down(&self, remove_volumes: bool) -> Result<()>;

    /// Runs `args` inside a running container, feeding `stdin` if given.
    /// A non-zero exit is returned in the output, not as an error.
    async fn exec(&self, container: &str, args: &[String], stdin: Option<&[u8]>) -> Result<CommandOutput>;
}

/// [`ContainerRuntime`] backed by the `docker` and `docker-compose` CLIs.
pub struct DockerCompose {
    docker: String,
    compose: Vec<String>,
    file: PathBuf,
    project_name: Option<String>,
}

impl DockerCompose {
    pub fn new(config: &ComposeConfig) -> Result<Self> {
        let compose: Vec<String> = config.command.split_whitespace().map(str::to_string).collect();
        if compose.is_empty() {
            return Err(Error::Config("compose.command must not be empty".to_string()));
        }

        Ok(Self {
            docker: "docker".to_string(),
            compose,
            file: config.file.clone(),
            project_name: config.project_name.clone(),
        })
    }

    fn compose_args(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = self.compose[1..].to_vec();
        args.push("-f".to_string());
        args.push(self.file.display().to_string());
        if let Some(project) = &self.project_name {
            args.push("-p".to_string());
            args.push(project.clone());
        }
        args.extend(subcommand.iter().map(|s| s.to_string()));
        args
    }

    async fn run_compose(&self, subcommand: &[&str]) -> Result<()> {
        let program = &self.compose[0];
        let args = self.compose_args(subcommand);
        let output = run(program, &args, None).await?;
        if !output.success() {
            return Err(Error::CommandFailed {
                command: command_line(program, &args),
                code: output.code,
                stderr: output.stderr,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCompose {
    async fn check_prerequisites(&self) -> Result<()> {
        check_tool(&self.docker, &["--version".to_string()]).await?;

        let mut version_args: Vec<String> = self.compose[1..].to_vec();
        version_args.push("version".to_string());
        check_tool(&self.compose.join(" "), &version_args).await
    }

    #[instrument(skip(self), fields(file = %self.file.display()))]
    async fn up(&self) -> Result<()> {
        info!("Starting containers");
        self.run_compose(&["up", "-d"]).await?;
        info!("Containers started");
        Ok(())
    }

    async fn down(&self, remove_volumes: bool) -> Result<()> {
        info!(remove_volumes, "Stopping containers");
        if remove_volumes {
            self.run_compose(&["down", "-v"]).await
        } else {
            self.run_compose(&["down"]).await
        }
    }

    async fn exec(&self, container: &str, args: &[String], stdin: Option<&[u8]>) -> Result<CommandOutput> {
        let mut exec_args = vec!["exec".to_string(), "-i".to_string(), container.to_string()];
        exec_args.extend(args.iter().cloned());
        run(&self.docker, &exec_args, stdin).await
    }
}

/// Runs `program --version`-style probes. Anything but a clean exit
/// counts as the tool being unavailable.
async fn check_tool(tool: &str, args: &[String]) -> Result<()> {
    let program = tool.split_whitespace().next().unwrap_or(tool);
    match run(program, args, None).await {
        Ok(output) if output.success() => {
            debug!(tool, version = %output.stdout.trim(), "Found tool");
            Ok(())
        }
        Ok(_) | Err(Error::MissingTool { .. }) => Err(Error::MissingTool {
            tool: tool.to_string(),
        }),
        Err(e) => Err(e),
    }
}

async fn run(program: &str, args: &[String], stdin: Option<&[u8]>) -> Result<CommandOutput> {
    debug!(command = %command_line(program, args), "Running command");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::MissingTool {
                tool: program.to_string(),
            },
            _ => Error::Io(e),
        })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input).await?;
        pipe.shutdown().await?;
    }

    let output = child.wait_with_output().await?;
    Ok(CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
