#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Calendar API error: {0}")]
    Calendar(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),

    #[error("Link publication error: {0}")]
    LinkPublish(String),

    #[error("Schedule feed error: {0}")]
    Feed(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;
