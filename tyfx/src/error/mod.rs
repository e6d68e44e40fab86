//! Load-time error types and reporting

use crate::ast::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, LoadError>;

/// Error raised before any effect runs
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Lexer error at {span:?}: {message}")]
    Lexer { message: String, span: Span },

    #[error("Parser error at {span:?}: {message}")]
    Parser { message: String, span: Span },

    /// Alias resolution problems found while lowering to descriptors
    #[error("Declaration error at {span:?}: {message}")]
    Declaration { message: String, span: Span },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("No \"{name}\" entrypoint defined in source file")]
    MissingEntry { name: String },

    #[error("Config error: {message}")]
    Config { message: String },
}

impl LoadError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn declaration(message: impl Into<String>, span: Span) -> Self {
        Self::Declaration {
            message: message.into(),
            span,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn missing_entry(name: impl Into<String>) -> Self {
        Self::MissingEntry { name: name.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } => Some(*span),
            Self::Parser { span, .. } => Some(*span),
            Self::Declaration { span, .. } => Some(*span),
            Self::Io { .. } | Self::MissingEntry { .. } | Self::Config { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Lexer { message, .. }
            | Self::Parser { message, .. }
            | Self::Declaration { message, .. }
            | Self::Io { message }
            | Self::Config { message } => message.clone(),
            Self::MissingEntry { .. } => self.to_string(),
        }
    }
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &LoadError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        LoadError::Lexer { .. } => "Lexer",
        LoadError::Parser { .. } => "Parser",
        LoadError::Declaration { .. } => "Declaration",
        LoadError::Io { .. } => "IO",
        LoadError::MissingEntry { .. } => "Entry",
        LoadError::Config { .. } => "Config",
    };

    let report = if let Some(span) = error.span() {
        Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {}", error.message()))
            .finish()
    };

    if report.eprint((filename, Source::from(source))).is_err() {
        eprintln!("{error}");
    }
}
