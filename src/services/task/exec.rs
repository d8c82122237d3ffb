//! Executable launch task.
//!
//! Spawns a child in one of three modes: blocking (the task completes when
//! the child exits), deferred (handed to the deferred manager), or detached.
//! On Linux, Windows-native artefacts are bridged: `.bat` scripts run under
//! `sh`, and `.exe` executables run under the compatibility layer, which must
//! actually be present.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::domain::error::{ClifpError, ExecError};
use crate::domain::task::{ProcessType, Stage};
use crate::services::director::Directorate;
use crate::services::process::{BlockingProcessManager, DeferredProcessManager};
use crate::services::task::{StopToken, Task};

/// Launch parameters: either a raw command-line string straight from the
/// database, or an already-split argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecParams {
    Joined(String),
    List(Vec<String>),
}

impl ExecParams {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Joined(s) => s.is_empty(),
            Self::List(v) => v.is_empty(),
        }
    }

    /// Single-string form for logging and shell use.
    pub fn joined(&self) -> String {
        match self {
            Self::Joined(s) => s.clone(),
            Self::List(v) => join_arguments(v),
        }
    }

    /// Argument-vector form for direct spawning.
    pub fn list(&self) -> Vec<String> {
        match self {
            Self::Joined(s) => split_command_line(s),
            Self::List(v) => v.clone(),
        }
    }
}

/// Characters that force an argument into quotes when run through a shell.
const SHELL_SPECIAL_CHARS: &[char] = &[
    '^', '&', '<', '>', '[', ']', '|', '{', '}', '=', ';', '!', '\'', '+', ',', '`', '~', ' ',
    '$', '(', ')',
];

/// Quote `arg` for safe inclusion in a shell command line.
pub fn escape_for_shell(arg: &str) -> String {
    if !arg.chars().any(|c| SHELL_SPECIAL_CHARS.contains(&c)) && !arg.contains('"') {
        return arg.to_string();
    }

    let mut escaped = String::with_capacity(arg.len() + 2);
    escaped.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('"');
    escaped
}

/// Join an argument list into one shell-safe string.
pub fn join_arguments(args: &[String]) -> String {
    args.iter()
        .map(|a| escape_for_shell(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip outer quotes that wrap the entire argument for no reason.
pub fn strip_redundant_quotes(arg: &str) -> &str {
    if arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"') {
        let interior = &arg[1..arg.len() - 1];
        if !interior.contains('"') {
            return interior;
        }
    }
    arg
}

/// Minimal command-line splitter honoring double quotes.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Locate `name` on PATH.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// A fully prepared spawn: program plus argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

/// Bridge Windows-native artefacts into something this host can run.
#[cfg(unix)]
fn bridge_invocation(
    executable: &Path,
    params: &ExecParams,
    dirate: &Directorate,
) -> Result<Invocation, ExecError> {
    let ext = executable
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "bat" => {
            dirate.log_event("Forced use of 'sh' from Windows 'bat'");
            let command = format!(
                "'{}' {}",
                executable.to_string_lossy(),
                params.joined()
            );
            Ok(Invocation {
                program: "/bin/sh".into(),
                args: vec!["-c".into(), command],
            })
        }
        "exe" => {
            if find_on_path("wine").is_none() {
                return Err(ExecError::CompatLayerMissing(
                    executable.to_string_lossy().into_owned(),
                ));
            }
            dirate.log_event("Forced use of WINE from Windows 'exe'");
            let mut args = vec![
                "start".to_string(),
                "/wait".to_string(),
                "/unix".to_string(),
                executable.to_string_lossy().into_owned(),
            ];
            args.extend(params.list());
            Ok(Invocation {
                program: "wine".into(),
                args,
            })
        }
        _ => Ok(Invocation {
            program: executable.to_string_lossy().into_owned(),
            args: params.list(),
        }),
    }
}

#[cfg(not(unix))]
fn bridge_invocation(
    executable: &Path,
    params: &ExecParams,
    _dirate: &Directorate,
) -> Result<Invocation, ExecError> {
    Ok(Invocation {
        program: executable.to_string_lossy().into_owned(),
        args: params.list(),
    })
}

pub struct TExec {
    dirate: Directorate,
    stage: Stage,
    stop: StopToken,
    executable: String,
    directory: PathBuf,
    parameters: ExecParams,
    environment: HashMap<String, String>,
    process_type: ProcessType,
    identifier: String,
    deferred: Arc<DeferredProcessManager>,
}

impl TExec {
    pub const NAME: &'static str = "TExec";

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dirate: Directorate,
        stage: Stage,
        executable: impl Into<String>,
        directory: PathBuf,
        parameters: ExecParams,
        environment: HashMap<String, String>,
        process_type: ProcessType,
        identifier: impl Into<String>,
        deferred: Arc<DeferredProcessManager>,
    ) -> Self {
        Self {
            dirate,
            stage,
            stop: StopToken::new(),
            executable: executable.into(),
            directory,
            parameters,
            environment,
            process_type,
            identifier: identifier.into(),
            deferred,
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn process_type(&self) -> ProcessType {
        self.process_type
    }

    fn resolve_executable_path(&self) -> Result<PathBuf, ExecError> {
        let raw = Path::new(strip_redundant_quotes(&self.executable));
        let candidate = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.directory.join(raw)
        };

        if !candidate.exists() {
            // Bare names may still resolve through PATH.
            if raw.components().count() == 1 {
                if let Some(found) = find_on_path(&raw.to_string_lossy()) {
                    return Ok(found);
                }
            }
            return Err(ExecError::CouldNotFind(candidate.display().to_string()));
        }
        if !candidate.is_file() {
            return Err(ExecError::NotValid(candidate.display().to_string()));
        }
        Ok(candidate)
    }

    fn prepare_command(&self) -> Result<(Invocation, Command), ClifpError> {
        self.dirate.log_event(&format!(
            "Preparing {} process '{}' ({})",
            self.process_type,
            self.identifier,
            self.executable
        ));

        let resolved = self.resolve_executable_path()?;
        let invocation = bridge_invocation(&resolved, &self.parameters, &self.dirate)?;

        self.dirate
            .log_event(&format!("Final Executable: {}", invocation.program));
        self.dirate.log_event(&format!(
            "Final Parameters: {}",
            join_arguments(&invocation.args)
        ));

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&self.directory)
            .envs(&self.environment);
        self.dirate.log_event(&format!(
            "Changed current directory to: {}",
            self.directory.display()
        ));

        Ok((invocation, command))
    }

    async fn run_blocking(&mut self, mut command: Command) -> Result<(), ClifpError> {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let child = command
            .spawn()
            .map_err(|e| ExecError::CouldNotStart(format!("{}: {e}", self.identifier)))?;

        self.dirate
            .log_event(&format!("Started '{}'", self.identifier));

        let mut manager =
            BlockingProcessManager::new(child, self.identifier.clone(), &self.dirate);

        let result = tokio::select! {
            status = manager.wait() => {
                match status {
                    Ok(status) => {
                        self.dirate.log_event(&format!(
                            "Blocking process '{}' finished. Status: '{status}'",
                            self.identifier
                        ));
                        Ok(())
                    }
                    Err(e) => Err(ExecError::CouldNotStart(e.to_string()).into()),
                }
            }
            () = self.stop.triggered() => {
                self.dirate.log_event(&format!(
                    "Stopping blocking process '{}'...",
                    self.identifier
                ));
                manager.close().await;
                Err(ClifpError::Cancelled)
            }
        };

        result
    }

    fn run_deferred(&self, mut command: Command) -> Result<(), ClifpError> {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let child = command
            .spawn()
            .map_err(|e| ExecError::CouldNotStart(format!("{}: {e}", self.identifier)))?;

        self.dirate
            .log_event(&format!("Started '{}'", self.identifier));
        self.deferred.manage(&self.identifier, child);
        Ok(())
    }

    fn run_detached(&self, mut command: Command) -> Result<(), ClifpError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
            .spawn()
            .map_err(|e| ExecError::CouldNotStart(format!("{}: {e}", self.identifier)))?;

        self.dirate
            .log_event(&format!("Started '{}'", self.identifier));
        Ok(())
    }
}

#[async_trait]
impl Task for TExec {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![
            format!(".executable = \"{}\"", self.executable),
            format!(".directory = \"{}\"", self.directory.display()),
            format!(".parameters = \"{}\"", self.parameters.joined()),
            format!(".process_type = {}", self.process_type),
            format!(".identifier = \"{}\"", self.identifier),
        ]
    }

    fn stop_token(&self) -> Option<StopToken> {
        Some(self.stop.clone())
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        let (invocation, command) = self.prepare_command()?;
        self.dirate.log_event(&format!(
            "Starting '{}' ({})",
            self.identifier, invocation.program
        ));

        match self.process_type {
            ProcessType::Blocking => self.run_blocking(command).await,
            ProcessType::Deferred => self.run_deferred(command),
            ProcessType::Detached => self.run_detached(command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::Verbosity;
    use crate::services::director::Director;

    fn test_dirate() -> Directorate {
        let (director, _rx) = Director::new(Verbosity::Silent);
        Directorate::new(TExec::NAME, director)
    }

    fn exec_task(executable: &str, dir: &Path, params: ExecParams, pt: ProcessType) -> TExec {
        let dirate = test_dirate();
        let deferred = Arc::new(DeferredProcessManager::new(dirate.clone()));
        TExec::new(
            dirate,
            Stage::Primary,
            executable,
            dir.to_path_buf(),
            params,
            HashMap::new(),
            pt,
            "test-exec",
            deferred,
        )
    }

    #[test]
    fn test_escape_for_shell() {
        assert_eq!(escape_for_shell("plain"), "plain");
        assert_eq!(escape_for_shell("two words"), "\"two words\"");
        assert_eq!(escape_for_shell("a\"b"), "\"a\\\"b\"");
        assert_eq!(escape_for_shell("cost$5"), "\"cost\\$5\"");
    }

    #[test]
    fn test_strip_redundant_quotes() {
        assert_eq!(strip_redundant_quotes("\"whole thing\""), "whole thing");
        assert_eq!(strip_redundant_quotes("\"a\" \"b\""), "\"a\" \"b\"");
        assert_eq!(strip_redundant_quotes("plain"), "plain");
        assert_eq!(strip_redundant_quotes("\""), "\"");
    }

    #[test]
    fn test_split_command_line() {
        assert_eq!(
            split_command_line("game.swf -quality high"),
            vec!["game.swf", "-quality", "high"]
        );
        assert_eq!(
            split_command_line("\"two words\" single"),
            vec!["two words", "single"]
        );
        assert_eq!(split_command_line(""), Vec::<String>::new());
    }

    #[test]
    fn test_exec_params_round_trip() {
        let joined = ExecParams::Joined("a \"b c\"".into());
        assert_eq!(joined.list(), vec!["a", "b c"]);

        let list = ExecParams::List(vec!["a".into(), "b c".into()]);
        assert_eq!(list.joined(), "a \"b c\"");
    }

    #[tokio::test]
    async fn test_missing_executable_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = exec_task(
            "missing-binary-xyz/nope",
            dir.path(),
            ExecParams::List(vec![]),
            ProcessType::Blocking,
        );
        let err = task.perform().await.unwrap_err();
        assert!(matches!(err, ClifpError::Exec(ExecError::CouldNotFind(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_blocking_runs_to_exit() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("probe.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut task = exec_task(
            "probe.sh",
            dir.path(),
            ExecParams::List(vec![]),
            ProcessType::Blocking,
        );
        task.perform().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bat_is_bridged_to_sh() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("start.bat");
        // Runs fine under sh despite the extension.
        std::fs::write(&script, "exit 0\n").unwrap();

        let mut task = exec_task(
            "start.bat",
            dir.path(),
            ExecParams::Joined(String::new()),
            ProcessType::Blocking,
        );
        task.perform().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exe_without_wine_is_explicit_error() {
        if find_on_path("wine").is_some() {
            // Host has the layer; the bridged failure mode does not apply.
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("player.exe");
        std::fs::write(&exe, b"MZ").unwrap();

        let mut task = exec_task(
            "player.exe",
            dir.path(),
            ExecParams::List(vec![]),
            ProcessType::Blocking,
        );
        let err = task.perform().await.unwrap_err();
        assert!(matches!(
            err,
            ClifpError::Exec(ExecError::CompatLayerMissing(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_closes_blocking_child() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("linger.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut task = exec_task(
            "linger.sh",
            dir.path(),
            ExecParams::List(vec![]),
            ProcessType::Blocking,
        );
        let token = task.stop_token().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            token.request();
        });

        let err = task.perform().await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_deferred_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let dirate = test_dirate();
        let deferred = Arc::new(DeferredProcessManager::new(dirate.clone()));
        let mut task = TExec::new(
            dirate,
            Stage::Startup,
            "sleep",
            dir.path().to_path_buf(),
            ExecParams::List(vec!["30".into()]),
            HashMap::new(),
            ProcessType::Deferred,
            "service",
            Arc::clone(&deferred),
        );

        let started = std::time::Instant::now();
        task.perform().await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(deferred.managed_count(), 1);

        deferred.close_all().await;
    }
}
