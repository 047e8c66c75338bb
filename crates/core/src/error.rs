use thiserror::Error;

pub type GrowthResult<T> = Result<T, GrowthError>;

#[derive(Error, Debug)]
pub enum GrowthError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unrecognized tier: {0}")]
    UnknownTier(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GrowthError {
    /// Short message safe to show to a non-admin user. Provider detail stays
    /// in the `Display` output, which only goes to logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnknownTier(_) => "Your plan couldn't be recognized.",
            Self::Io(_) => "We couldn't reach the server. Please try again.",
            Self::Config(_) | Self::Serialization(_) | Self::Internal(_) => {
                "Something went wrong on our side."
            }
        }
    }
}

impl From<config::ConfigError> for GrowthError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
