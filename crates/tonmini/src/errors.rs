use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Rejected user input. Never mutates state.
    #[error("{0}")]
    Validation(String),

    /// Mnemonic could not be turned into keys or an address.
    #[error("invalid mnemonic: {0}")]
    Derivation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl WalletError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn derivation(e: impl std::fmt::Display) -> Self {
        Self::Derivation(e.to_string())
    }

    pub fn storage(e: &eyre::Report) -> Self {
        Self::Storage(format!("{e:#}"))
    }
}
