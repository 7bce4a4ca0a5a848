//! Code formatting
//!
//! Formatting is delegated to an external pretty-printer. The controller
//! only sees the `Formatter` trait: it hands over the code and a parser
//! name and gets back either the full formatted text or an error. A failed
//! format never yields partial output.

use std::future::Future;
use std::io;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::models::Language;

/// Pretty-printer parser names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parser {
    Babel,
    Python,
    Java,
    C,
}

impl Parser {
    pub fn as_str(self) -> &'static str {
        match self {
            Parser::Babel => "babel",
            Parser::Python => "python",
            Parser::Java => "java",
            Parser::C => "c",
        }
    }

    pub fn for_language(language: Language) -> Self {
        match language {
            Language::JavaScript => Parser::Babel,
            Language::Python => Parser::Python,
            Language::Java => Parser::Java,
            Language::C => Parser::C,
        }
    }

    /// Parser for a language identifier; unknown names use `babel`
    pub fn for_name(language: &str) -> Self {
        language
            .parse::<Language>()
            .map(Self::for_language)
            .unwrap_or(Parser::Babel)
    }
}

/// Style options passed to the pretty-printer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub semi: bool,
    pub single_quote: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            semi: true,
            single_quote: true,
        }
    }
}

#[derive(Error, Debug)]
pub enum FormatError {
    /// The formatter program could not be started
    #[error("Formatter '{program}' is not available: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The formatter rejected the input
    #[error("Formatter rejected the code ({parser}): {message}")]
    Rejected { parser: &'static str, message: String },

    #[error("Formatter produced output that is not valid UTF-8")]
    InvalidOutput,

    #[error("No formatter command configured")]
    NotConfigured,

    #[error("I/O error talking to formatter: {0}")]
    Io(#[from] io::Error),
}

/// An opaque pretty-printer
pub trait Formatter {
    /// Format `code` with `parser`, returning the complete formatted text
    fn format(
        &self,
        code: &str,
        parser: Parser,
    ) -> impl Future<Output = Result<String, FormatError>> + Send;
}

/// Formatter backed by an external command reading stdin and writing stdout
///
/// The command line is invoked as
/// `<program> <args..> --parser <p> [--no-semi] [--single-quote]`.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    program: String,
    args: Vec<String>,
    options: FormatOptions,
}

impl CommandFormatter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            options: FormatOptions::default(),
        }
    }

    /// Split a whitespace-separated command line such as `npx prettier`
    pub fn from_command_line(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            options: FormatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, parser: Parser) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg("--parser").arg(parser.as_str());
        if !self.options.semi {
            cmd.arg("--no-semi");
        }
        if self.options.single_quote {
            cmd.arg("--single-quote");
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Formatter for CommandFormatter {
    async fn format(&self, code: &str, parser: Parser) -> Result<String, FormatError> {
        if self.program.is_empty() {
            return Err(FormatError::NotConfigured);
        }

        let mut child = self
            .command(parser)
            .spawn()
            .map_err(|source| FormatError::Unavailable {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin while collecting output so large inputs cannot deadlock
        let stdin = child.stdin.take();
        let input = code.as_bytes().to_vec();
        let write = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), io::Error>(())
        };

        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(FormatError::Rejected {
                parser: parser.as_str(),
                message,
            });
        }
        // A formatter that exits early without reading all input succeeded anyway
        if let Err(e) = written {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(FormatError::Io(e));
            }
        }

        String::from_utf8(output.stdout).map_err(|_| FormatError::InvalidOutput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_mapping() {
        assert_eq!(Parser::for_language(Language::JavaScript), Parser::Babel);
        assert_eq!(Parser::for_language(Language::Python), Parser::Python);
        assert_eq!(Parser::for_language(Language::Java), Parser::Java);
        assert_eq!(Parser::for_language(Language::C), Parser::C);
        assert_eq!(Parser::for_name("rust"), Parser::Babel);
        assert_eq!(Parser::for_name("python"), Parser::Python);
    }

    #[test]
    fn test_command_line_split() {
        let formatter = CommandFormatter::from_command_line("npx  prettier");
        assert_eq!(formatter.program(), "npx");
        assert_eq!(formatter.args, vec!["prettier".to_string()]);

        let cmd = formatter.command(Parser::Java);
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["prettier", "--parser", "java", "--single-quote"]);
    }

    #[test]
    fn test_no_semi_flag() {
        let formatter = CommandFormatter::new("prettier").with_options(FormatOptions {
            semi: false,
            single_quote: false,
        });
        let cmd = formatter.command(Parser::Babel);
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["--parser", "babel", "--no-semi"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let formatter = CommandFormatter::new("definitely_not_a_real_formatter_12345");
        let err = formatter.format("x", Parser::Babel).await.unwrap_err();
        assert!(matches!(err, FormatError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_empty_command_not_configured() {
        let formatter = CommandFormatter::from_command_line("   ");
        let err = formatter.format("x", Parser::Babel).await.unwrap_err();
        assert!(matches!(err, FormatError::NotConfigured));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_format_returns_stdout() {
        // `sh -c <script> sh <formatter args>`: the script ignores its arguments
        let formatter = CommandFormatter {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "tr a-z A-Z".to_string(), "sh".to_string()],
            options: FormatOptions::default(),
        };
        let out = formatter.format("let x = 1;\n", Parser::Babel).await.unwrap();
        assert_eq!(out, "LET X = 1;\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_rejection() {
        let formatter = CommandFormatter {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "cat >/dev/null; echo 'SyntaxError: Unexpected token' >&2; exit 2".to_string(),
                "sh".to_string(),
            ],
            options: FormatOptions::default(),
        };
        let err = formatter.format("let = ;", Parser::Babel).await.unwrap_err();
        match err {
            FormatError::Rejected { parser, message } => {
                assert_eq!(parser, "babel");
                assert!(message.contains("Unexpected token"));
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }
}
