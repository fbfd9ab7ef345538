use thiserror::Error;

#[derive(Error, Debug)]
pub enum RankerError {
    #[error("query is empty after trimming")]
    InputError,

    #[error("ranking config invalid: {0}")]
    RankingConfigInvalid(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RankerError>;
