#![forbid(unsafe_code)]

//! Error taxonomy shared by the library modules.

use thiserror::Error;

pub type TransferResult<T> = Result<T, TransferError>;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("could not parse reference: {0}")]
    ReferenceParse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("catalog entry is missing field `{field}`")]
    RecordFieldMissing { field: &'static str },

    #[error("credential is missing required keys: {}", .missing.join(", "))]
    Credential { missing: Vec<&'static str> },

    #[error("no videos found for collection {collection_id} of owner {owner_id}")]
    EmptyCollection {
        owner_id: String,
        collection_id: String,
    },
}

impl TransferError {
    pub fn reference(msg: impl Into<String>) -> Self {
        Self::ReferenceParse(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }
}

impl From<ureq::Error> for TransferError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => {
                Self::Transport(format!("HTTP {code} from {}", response.get_url()))
            }
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(format!("reading response body: {err}"))
    }
}
