pub type LipsyncResult<T> = Result<T, LipsyncError>;

#[derive(thiserror::Error, Debug)]
pub enum LipsyncError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LipsyncError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}
