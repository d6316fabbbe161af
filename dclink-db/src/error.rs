use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] tokio_rusqlite::rusqlite::Error),

    #[error("database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("account is already linked")]
    AlreadyLinked,

    #[error("no linked account found")]
    AccountNotFound,

    #[error("registration limit reached")]
    RegistrationFull,
}

pub type Result<T> = std::result::Result<T, DbError>;
