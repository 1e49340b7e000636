use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use anyhow::{bail, ensure, Result as AnyResult};
use tracing::debug;

use crate::config::RecognizerSettings;
use crate::error::{ExtractionError, Result};

const INPUT_PLACEHOLDER: &str = "{input}";

/// Produces timestamped recognizer output (`<time> <score> <phone>` per line)
/// for an audio file. Implementations must tolerate concurrent calls.
pub trait PhoneRecognizer: Send + Sync {
    fn recognize(&self, audio: &Path) -> Result<String>;
}

/// A recognizer that needs exclusive access while it runs, such as an
/// in-process model with mutable inference state.
pub trait ExclusiveRecognizer: Send {
    fn recognize_exclusive(&mut self, audio: &Path) -> Result<String>;
}

impl<T: PhoneRecognizer> ExclusiveRecognizer for T {
    fn recognize_exclusive(&mut self, audio: &Path) -> Result<String> {
        self.recognize(audio)
    }
}

/// Serializes every call to the wrapped recognizer behind a mutex so it can
/// be shared by the worker pool.
pub struct SerializedRecognizer<R> {
    inner: Mutex<R>,
}

impl<R: ExclusiveRecognizer> SerializedRecognizer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

impl<R: ExclusiveRecognizer> PhoneRecognizer for SerializedRecognizer<R> {
    fn recognize(&self, audio: &Path) -> Result<String> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ExtractionError::alignment("recognizer lock poisoned"))?;
        guard.recognize_exclusive(audio)
    }
}

/// Runs an external recognizer process and reads its stdout.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    /// Parse a shell-style command line. `{input}` marks where the audio path
    /// goes; without it the path is appended as the last argument.
    pub fn from_command_line(raw: &str) -> AnyResult<Self> {
        let parts = shell_words::split(raw.trim())?;
        ensure!(!parts.is_empty(), "recognizer command is empty");
        Ok(Self {
            program: parts[0].clone(),
            args: parts[1..].to_vec(),
        })
    }

    fn arguments_for(&self, audio: &Path) -> Vec<String> {
        let input = audio.to_string_lossy();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(INPUT_PLACEHOLDER, &input))
            .collect();
        if !self.args.iter().any(|arg| arg.contains(INPUT_PLACEHOLDER)) {
            args.push(input.into_owned());
        }
        args
    }
}

impl PhoneRecognizer for CommandRecognizer {
    fn recognize(&self, audio: &Path) -> Result<String> {
        let args = self.arguments_for(audio);
        debug!(program = %self.program, file = %audio.display(), "running recognizer");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|err| {
                ExtractionError::alignment(format!("failed to run {}: {err}", self.program))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::alignment(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Reads recognizer output that was computed ahead of time and stored next to
/// the audio file as `<audio>.<extension>`.
#[derive(Debug, Clone)]
pub struct SidecarRecognizer {
    extension: String,
}

impl SidecarRecognizer {
    pub fn new(extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn sidecar_path(&self, audio: &Path) -> PathBuf {
        let mut name = audio.as_os_str().to_owned();
        name.push(".");
        name.push(&self.extension);
        PathBuf::from(name)
    }
}

impl PhoneRecognizer for SidecarRecognizer {
    fn recognize(&self, audio: &Path) -> Result<String> {
        let path = self.sidecar_path(audio);
        fs::read_to_string(&path).map_err(|err| {
            ExtractionError::alignment(format!("failed to read {}: {err}", path.display()))
        })
    }
}

/// Build the recognizer described by `settings`. A sidecar extension takes
/// precedence over a command.
pub fn recognizer_from_settings(settings: &RecognizerSettings) -> AnyResult<Arc<dyn PhoneRecognizer>> {
    match (&settings.sidecar_extension, &settings.command) {
        (Some(extension), _) => Ok(wrap(SidecarRecognizer::new(extension), settings.exclusive)),
        (None, Some(command)) => Ok(wrap(
            CommandRecognizer::from_command_line(command)?,
            settings.exclusive,
        )),
        (None, None) => bail!("no phone recognizer configured; provide a command or a sidecar extension"),
    }
}

fn wrap<R: PhoneRecognizer + 'static>(recognizer: R, exclusive: bool) -> Arc<dyn PhoneRecognizer> {
    if exclusive {
        Arc::new(SerializedRecognizer::new(recognizer))
    } else {
        Arc::new(recognizer)
    }
}
