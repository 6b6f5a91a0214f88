use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbInfraError {
    #[error("Configuration error: {message}")]
    Config { message: String },
    #[error("Connection error: {message}")]
    Connect { message: String },
    #[error("Provisioning error: {message}")]
    Provision { message: String },
    #[error("Migration error: {message}")]
    Migration { message: String },
}

impl DbInfraError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    pub fn provision(message: impl Into<String>) -> Self {
        Self::Provision {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    /// The bare message, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Config { message }
            | Self::Connect { message }
            | Self::Provision { message }
            | Self::Migration { message } => message,
        }
    }
}
