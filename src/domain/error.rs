use thiserror::Error;

/// Rejections raised while building an [`EpisodeInfo`](super::models::EpisodeInfo).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EpisodeError {
    #[error("{0} is missing")]
    Missing(&'static str),
    #[error("{0} is empty")]
    Empty(&'static str),
    #[error("publish date '{0}' is not a unix timestamp")]
    InvalidPubdate(String),
    #[error("publish date {0} is out of range")]
    PubdateOutOfRange(i64),
}
