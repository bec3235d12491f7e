use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::{ExecError, Result};

/// The program part of a [`CommandSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandLine {
    /// A command string, either shell syntax or a line split into words.
    Text(String),
    /// Program and arguments, passed to the OS without interpretation.
    Argv(Box<[String]>),
}

impl CommandLine {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Argv(_) => None,
        }
    }

    #[must_use]
    pub fn as_argv(&self) -> Option<&[String]> {
        match self {
            Self::Text(_) => None,
            Self::Argv(argv) => Some(argv),
        }
    }
}

impl From<&str> for CommandLine {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(argv: Vec<String>) -> Self {
        Self::Argv(argv.into_boxed_slice())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

/// What to run and how: the identity under which results are cached.
///
/// Two specs are equal (and hash equal) when the command, the shell flag,
/// stderr visibility and the canonical working directory all match.
/// Building a spec never touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandSpec {
    command: CommandLine,
    shell: bool,
    hide_standard_error: bool,
    working_directory: Option<PathBuf>,
}

impl CommandSpec {
    /// Build a spec, rejecting `shell` together with an argv sequence.
    pub fn new(command: impl Into<CommandLine>, shell: bool) -> Result<Self> {
        let command = command.into();
        if shell && matches!(command, CommandLine::Argv(_)) {
            return Err(ExecError::invalid_shape(
                "a shell command must be a single string, not an argument sequence",
            ));
        }
        Ok(Self {
            command,
            shell,
            hide_standard_error: false,
            working_directory: None,
        })
    }

    /// A string command run without a shell; it is split into words on
    /// execution.
    #[must_use]
    pub fn from_string(text: impl Into<String>) -> Self {
        Self {
            command: CommandLine::Text(text.into()),
            shell: false,
            hide_standard_error: false,
            working_directory: None,
        }
    }

    /// A string command interpreted by the shell.
    #[must_use]
    pub fn shell(text: impl Into<String>) -> Self {
        Self {
            shell: true,
            ..Self::from_string(text)
        }
    }

    #[must_use]
    pub fn from_sequence<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: CommandLine::Argv(tokens.into_iter().map(Into::into).collect()),
            shell: false,
            hide_standard_error: false,
            working_directory: None,
        }
    }

    /// Translate a host directive into a spec.
    ///
    /// Extra arguments are appended to the command text after a single space.
    #[must_use]
    pub fn from_directive(record: &DirectiveRecord) -> Self {
        let text = match record.extra_arguments.as_deref() {
            Some(extra) => format!("{} {extra}", record.command),
            None => record.command.clone(),
        };
        Self {
            command: CommandLine::Text(text),
            shell: record.use_shell,
            hide_standard_error: record.hide_standard_error,
            working_directory: Some(normalize_path(&record.working_directory)),
        }
    }

    #[must_use]
    pub fn with_hidden_standard_error(mut self, hide: bool) -> Self {
        self.hide_standard_error = hide;
        self
    }

    #[must_use]
    pub fn with_working_directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_directory = Some(normalize_path(dir.as_ref()));
        self
    }

    #[must_use]
    pub const fn command(&self) -> &CommandLine {
        &self.command
    }

    #[must_use]
    pub const fn is_shell(&self) -> bool {
        self.shell
    }

    #[must_use]
    pub const fn hides_standard_error(&self) -> bool {
        self.hide_standard_error
    }

    #[must_use]
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(dir) = &self.working_directory {
            write!(f, " (in {})", dir.display())?;
        }
        Ok(())
    }
}

/// A command request as the host describes it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DirectiveRecord {
    pub command: String,
    #[serde(default)]
    pub use_shell: bool,
    #[serde(default)]
    pub hide_standard_error: bool,
    pub working_directory: PathBuf,
    #[serde(default)]
    pub extra_arguments: Option<String>,
}

/// Make `path` absolute and drop `.` and `..` components lexically.
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `pop` refuses to go above the root, like the OS does.
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
