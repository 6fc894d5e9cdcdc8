use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no syntax definition for {0}")]
    MissingSyntax(&'static str),
    #[error("theme not bundled: {0}")]
    MissingTheme(&'static str),
    #[error("highlighting failed: {0}")]
    Highlight(#[from] syntect::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
