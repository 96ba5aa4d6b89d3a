#[derive(Debug)]
pub enum BackendError {
    Io(std::io::Error),
    Decode(String),
    NotLoaded,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Io(err) => write!(f, "io error: {}", err),
            BackendError::Decode(message) => write!(f, "cannot decode: {}", message),
            BackendError::NotLoaded => write!(f, "no song loaded"),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err)
    }
}

#[derive(Debug)]
pub enum PlayerError {
    Backend(BackendError),
    QueueEmpty,
    AllSongsFailed,
}

impl std::fmt::Display for PlayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerError::Backend(err) => write!(f, "backend error: {}", err),
            PlayerError::QueueEmpty => write!(f, "nothing to play"),
            PlayerError::AllSongsFailed => write!(f, "no song in the queue could be loaded"),
        }
    }
}

impl std::error::Error for PlayerError {}

impl From<BackendError> for PlayerError {
    fn from(err: BackendError) -> Self {
        PlayerError::Backend(err)
    }
}
