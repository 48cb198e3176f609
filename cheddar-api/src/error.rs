#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request throttled, try again later")]
    Throttled,
}

impl Error {
    /// Throttle rejections are expected under repeated user requests and are
    /// usually not worth surfacing
    pub fn is_throttle(&self) -> bool {
        matches!(self, Error::Throttled)
    }
}
