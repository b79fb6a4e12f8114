//! Shell command construction and execution.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{SoakError, SoakResult};

const REDACTED: &str = "[redacted]";

/// Executes shell commands.
#[async_trait::async_trait]
pub trait CommandRunner: fmt::Debug + Send + Sync + 'static {
    /// Runs the command to completion and captures its output.
    ///
    /// Only failures to spawn the command are errors; a non-zero exit is reported in the output.
    async fn run(&self, command: &ShellCommand) -> SoakResult<CommandOutput>;
}

/// Exit status and captured output of a finished command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// The exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    /// Combined stdout and stderr.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs the command and turns a non-zero exit into [`SoakError::Execution`].
pub async fn run_checked(
    runner: &dyn CommandRunner,
    command: &ShellCommand,
) -> SoakResult<CommandOutput> {
    tracing::debug!(%command, "executing command");
    let output = runner.run(command).await?;
    if !output.success() {
        return Err(SoakError::Execution {
            command: command.redacted(),
            code: output.code,
            output: output.output,
        });
    }
    Ok(output)
}

/// Runs commands through `sh -c` on the local host.
#[derive(Debug, Default)]
pub struct ShellRunner;

#[async_trait::async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &ShellCommand) -> SoakResult<CommandOutput> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command.script())
            .kill_on_drop(true)
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            code: output.status.code(),
            output: combined,
        })
    }
}

#[derive(Clone)]
struct Part {
    value: String,
    shown: String,
}

impl Part {
    fn plain(value: String) -> Self {
        Self {
            shown: value.clone(),
            value,
        }
    }
}

/// A shell command line with a secret-free rendering for logs and errors.
///
/// The [`fmt::Display`] and [`fmt::Debug`] implementations print the redacted form. Use
/// [`ShellCommand::script`] to obtain the line that is actually executed.
#[derive(Clone)]
pub struct ShellCommand {
    env: Vec<Part>,
    args: Vec<Part>,
    append_output: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new(program: &str) -> Self {
        Self {
            env: Vec::new(),
            args: vec![Part::plain(quote(program).into_owned())],
            append_output: None,
        }
    }

    /// Appends a single argument.
    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        let arg = arg.to_string();
        self.args.push(Part::plain(quote(&arg).into_owned()));
        self
    }

    /// Appends an argument of the form `<flag>=<value>`.
    pub fn flag(self, flag: &str, value: impl fmt::Display) -> Self {
        self.arg(format_args!("{flag}={value}"))
    }

    /// Appends `<flag>=<secret>`, printing only the flag in the redacted form.
    pub fn secret_flag(mut self, flag: &str, secret: &str) -> Self {
        self.args.push(Part {
            value: quote(&format!("{flag}={secret}")).into_owned(),
            shown: format!("{flag}={REDACTED}"),
        });
        self
    }

    /// Sets an environment variable for the command.
    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.env.push(Part::plain(format!("{name}={}", quote(value))));
        self
    }

    /// Sets an environment variable whose value is redacted.
    pub fn secret_env(mut self, name: &str, value: &str) -> Self {
        self.env.push(Part {
            value: format!("{name}={}", quote(value)),
            shown: format!("{name}={REDACTED}"),
        });
        self
    }

    /// Appends stdout and stderr of the command to the given file.
    pub fn append_output_to(mut self, path: &Path) -> Self {
        self.append_output = Some(path.to_owned());
        self
    }

    /// The command line to execute.
    pub fn script(&self) -> String {
        self.render(|part| &part.value)
    }

    /// The command line with secrets replaced by `[redacted]`.
    pub fn redacted(&self) -> String {
        self.render(|part| &part.shown)
    }

    fn render(&self, select: impl Fn(&Part) -> &String) -> String {
        let mut line = self
            .env
            .iter()
            .chain(&self.args)
            .map(|part| select(part).as_str())
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(path) = &self.append_output {
            line.push_str(" >> ");
            line.push_str(&quote(&path.to_string_lossy()));
            line.push_str(" 2>&1");
        }

        line
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ShellCommand")
            .field(&self.redacted())
            .finish()
    }
}

/// Quotes a word for `sh` unless it consists only of safe characters.
fn quote(word: &str) -> Cow<'_, str> {
    let safe = |c: char| c.is_ascii_alphanumeric() || "_-./:=,@+%".contains(c);
    if !word.is_empty() && word.chars().all(safe) {
        return Cow::Borrowed(word);
    }
    Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(quote("s3bench"), "s3bench");
        assert_eq!(quote("-endpoint=http://h:9000"), "-endpoint=http://h:9000");
        assert_eq!(quote("two words"), "'two words'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote("*"), "'*'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn redacts_secrets() {
        let command = ShellCommand::new("tool")
            .secret_env("TOKEN", "abc")
            .flag("-user", "me")
            .secret_flag("-password", "hunter2")
            .append_output_to(Path::new("/tmp/out.log"));

        assert_eq!(
            command.script(),
            "TOKEN=abc tool -user=me -password=hunter2 >> /tmp/out.log 2>&1"
        );
        assert_eq!(
            command.redacted(),
            "TOKEN=[redacted] tool -user=me -password=[redacted] >> /tmp/out.log 2>&1"
        );
        assert!(!format!("{command:?}").contains("hunter2"));
        assert!(!command.to_string().contains("abc"));
    }

    #[tokio::test]
    async fn shell_runner_captures_output() {
        let output = ShellRunner
            .run(&ShellCommand::new("echo").arg("hello"))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.output.trim(), "hello");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_execution_error() {
        let command = ShellCommand::new("sh").arg("-c").arg("echo boom >&2; exit 3");
        let err = run_checked(&ShellRunner, &command).await.unwrap_err();

        match err {
            SoakError::Execution { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(output.trim(), "boom");
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }
}
