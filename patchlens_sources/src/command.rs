use std::env;
use std::ffi::OsString;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use patchlens_api::MethodRef;
use patchlens_source_api::{ProviderCapabilities, SourceError, SourceProvider, SourceResult};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Decompiled text larger than this is rejected.
const DEFAULT_MAX_OUTPUT_BYTES: u64 = 4 * 1024 * 1024;
const MAX_STDERR_BYTES: u64 = 16 * 1024;
const BIN_ENV: &str = "PATCHLENS_DECOMPILER_BIN";
const ARGS_ENV: &str = "PATCHLENS_DECOMPILER_ARGS";
const TIMEOUT_ENV: &str = "PATCHLENS_DECOMPILER_TIMEOUT_SECS";
const PASSTHROUGH_PREFIX: &str = "PATCHLENS_DECOMPILER_";

/// Runs an external decompiler once per method and returns its stdout as
/// source text.
///
/// Argument templates may use `{type}`, `{method}` and `{identity}`
/// placeholders. The child sees only `PATH`, `HOME` and
/// `PATCHLENS_DECOMPILER_*` variables, is killed once the timeout elapses,
/// and its output is capped. A tool that exits non-zero without printing
/// anything is taken to mean "no such method" rather than a failure.
#[derive(Debug, Clone)]
pub struct CommandSource {
    binary: OsString,
    args: Vec<String>,
    timeout: Duration,
    max_output: u64,
    environment: Vec<(OsString, OsString)>,
}

impl CommandSource {
    /// Provider invoking `binary` with the given argument template.
    pub fn new(binary: impl Into<OsString>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output: DEFAULT_MAX_OUTPUT_BYTES,
            environment: inherited_environment(),
        }
    }

    /// Provider configured from `PATCHLENS_DECOMPILER_*`, if a binary is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let binary = env::var_os(BIN_ENV).filter(|value| !value.is_empty())?;
        let args = env::var(ARGS_ENV).map_or_else(
            |_| vec!["{identity}".to_owned()],
            |raw| raw.split_whitespace().map(str::to_owned).collect(),
        );
        let mut source = Self::new(binary, args);
        if let Some(secs) = env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
        {
            source = source.with_timeout(Duration::from_secs(secs));
        }
        Some(source)
    }

    /// Override the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the largest accepted output, in bytes.
    #[must_use]
    pub const fn with_max_output(mut self, bytes: u64) -> Self {
        self.max_output = bytes;
        self
    }

    /// Command line for one method, with placeholders filled in.
    fn invocation(&self, method: &MethodRef) -> Command {
        let identity = method.to_string();
        let mut command = Command::new(&self.binary);
        command
            .args(self.args.iter().map(|arg| {
                arg.replace("{identity}", &identity)
                    .replace("{type}", &method.declaring_type)
                    .replace("{method}", &method.name)
            }))
            .env_clear()
            .envs(self.environment.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    fn decompile(&self, method: &MethodRef) -> SourceResult<String> {
        let mut command = self.invocation(method);
        debug!(method = %method, ?command, "invoking decompiler");
        let mut child = command
            .spawn()
            .map_err(|err| SourceError::message(format!("failed to spawn decompiler: {err}")))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // readers drain both pipes so the child never blocks on a full buffer
        let (status, stdout, stderr) = thread::scope(|scope| {
            let stdout = scope.spawn(|| stdout.map(|pipe| capture(pipe, self.max_output)));
            let stderr = scope.spawn(|| stderr.map(|pipe| capture(pipe, MAX_STDERR_BYTES)));
            let status = self.wait(&mut child);
            (status, stdout.join(), stderr.join())
        });
        let status = status?;
        let stdout = joined(stdout, "stdout")?;
        let stderr = joined(stderr, "stderr")?;

        if stdout.truncated {
            return Err(SourceError::message(format!(
                "decompiler output exceeded {} bytes",
                self.max_output
            )));
        }
        let text = String::from_utf8_lossy(&stdout.bytes).into_owned();
        if status.success() {
            return Ok(text);
        }

        let code = status
            .code()
            .map_or_else(|| "terminated".to_owned(), |code| code.to_string());
        let detail = String::from_utf8_lossy(&stderr.bytes).trim().to_owned();
        if text.trim().is_empty() {
            let reason = if detail.is_empty() {
                format!("decompiler exited with status {code}")
            } else {
                detail
            };
            return Err(SourceError::NotFound { reason });
        }
        Err(SourceError::message(format!(
            "decompiler failed with status {code}: {detail}"
        )))
    }

    /// Wait for `child` within the timeout, killing it otherwise.
    fn wait(&self, child: &mut Child) -> SourceResult<ExitStatus> {
        let outcome = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => format!("decompiler timed out after {}s", self.timeout.as_secs_f32()),
            Err(err) => format!("failed waiting on decompiler: {err}"),
        };
        if let Err(err) = child.kill().and_then(|()| child.wait().map(drop)) {
            warn!(error = %err, "failed to stop decompiler");
        }
        Err(SourceError::message(outcome))
    }
}

impl SourceProvider for CommandSource {
    fn id(&self) -> &'static str {
        "decompiler"
    }

    fn label(&self) -> &'static str {
        "External decompiler"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::new(true, false)
    }

    fn fetch(&self, method: &MethodRef) -> SourceResult<Option<String>> {
        let output = self.decompile(method)?;
        if output.trim().is_empty() {
            debug!(method = %method, "decompiler printed nothing");
            return Ok(None);
        }
        Ok(Some(output))
    }
}

/// `PATH`, `HOME` and `PATCHLENS_DECOMPILER_*` from the current process.
fn inherited_environment() -> Vec<(OsString, OsString)> {
    env::vars_os()
        .filter(|(key, _)| {
            matches!(key.to_str(), Some("PATH" | "HOME"))
                || key.to_string_lossy().starts_with(PASSTHROUGH_PREFIX)
        })
        .collect()
}

struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Keep up to `limit` bytes of `pipe` and discard the rest.
fn capture(mut pipe: impl Read, limit: u64) -> io::Result<Captured> {
    let mut bytes = Vec::new();
    (&mut pipe).take(limit).read_to_end(&mut bytes)?;
    let discarded = io::copy(&mut pipe, &mut io::sink())?;
    Ok(Captured {
        bytes,
        truncated: discarded > 0,
    })
}

fn joined(
    reader: thread::Result<Option<io::Result<Captured>>>,
    stream: &str,
) -> SourceResult<Captured> {
    match reader {
        Ok(Some(Ok(captured))) => Ok(captured),
        Ok(None) => Ok(Captured {
            bytes: Vec::new(),
            truncated: false,
        }),
        Ok(Some(Err(err))) => Err(SourceError::message(format!(
            "failed to read decompiler {stream}: {err}"
        ))),
        Err(_) => Err(SourceError::message(format!(
            "decompiler {stream} reader panicked"
        ))),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use super::*;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("decompiler.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    #[test]
    fn expands_placeholders_and_returns_stdout() {
        let dir = TempDir::new().expect("tempdir");
        let bin = script(dir.path(), "echo \"// $1 / $2 / $3\"");
        let source = CommandSource::new(
            bin.into_os_string(),
            vec!["{type}".into(), "{method}".into(), "--identity={identity}".into()],
        );
        let method = MethodRef::parse("Verse.Pawn::Tick").expect("method");
        let text = source.fetch(&method).expect("fetch").expect("text");
        assert_eq!(text.trim(), "// Verse.Pawn / Tick / --identity=Verse.Pawn::Tick");
    }

    #[test]
    fn empty_output_means_no_source() {
        let dir = TempDir::new().expect("tempdir");
        let bin = script(dir.path(), "exit 0");
        let source = CommandSource::new(bin.into_os_string(), Vec::new());
        let method = MethodRef::parse("Foo::Bar").expect("method");
        assert!(source.fetch(&method).expect("fetch").is_none());
    }

    #[test]
    fn failing_tool_reports_status_and_stderr() {
        let dir = TempDir::new().expect("tempdir");
        let bin = script(dir.path(), "echo 'class Bar {'\necho 'crashed' >&2\nexit 3");
        let source = CommandSource::new(bin.into_os_string(), Vec::new());
        let method = MethodRef::parse("Foo::Bar").expect("method");
        let err = source.fetch(&method).expect_err("should fail");
        assert!(matches!(err, SourceError::Failure { .. }));
        let message = err.to_string();
        assert!(message.contains("status 3"), "unexpected: {message}");
        assert!(message.contains("crashed"), "unexpected: {message}");
    }

    #[test]
    fn silent_failure_means_method_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let bin = script(dir.path(), "echo 'no such type' >&2\nexit 3");
        let source = CommandSource::new(bin.into_os_string(), Vec::new());
        let method = MethodRef::parse("Foo::Bar").expect("method");
        match source.fetch(&method) {
            Err(SourceError::NotFound { reason }) => assert_eq!(reason, "no such type"),
            other => panic!("expected NotFound, got {other:?}"),
        }

        let quiet = script(dir.path(), "exit 4");
        let source = CommandSource::new(quiet.into_os_string(), Vec::new());
        match source.fetch(&method) {
            Err(SourceError::NotFound { reason }) => assert!(reason.contains("status 4")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn oversized_output_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let bin = script(dir.path(), "i=0\nwhile [ $i -lt 200 ]; do echo 'int x = 0;'; i=$((i+1)); done");
        let method = MethodRef::parse("Foo::Bar").expect("method");

        let capped = CommandSource::new(bin.clone().into_os_string(), Vec::new()).with_max_output(64);
        let err = source_error(capped.fetch(&method));
        assert!(err.contains("exceeded 64 bytes"), "unexpected: {err}");

        let roomy = CommandSource::new(bin.into_os_string(), Vec::new());
        let text = roomy.fetch(&method).expect("fetch").expect("text");
        assert_eq!(text.lines().count(), 200);
    }

    fn source_error(result: SourceResult<Option<String>>) -> String {
        result.expect_err("should fail").to_string()
    }

    #[test]
    fn slow_tool_times_out() {
        let dir = TempDir::new().expect("tempdir");
        let bin = script(dir.path(), "exec sleep 5");
        let source = CommandSource::new(bin.into_os_string(), Vec::new())
            .with_timeout(Duration::from_millis(200));
        let method = MethodRef::parse("Foo::Bar").expect("method");
        let err = source.fetch(&method).expect_err("should time out");
        assert!(err.to_string().contains("timed out"));
    }
}
