#![forbid(unsafe_code)]

//! Remote endpoints and the JSON envelope they share.
//!
//! Every response looks like `{"code": 0, "message": "...", "data": {...}}`.
//! A non-zero `code` is an application-level failure even when HTTP said 200.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{TransferError, TransferResult};

pub const NAV_PATH: &str = "x/web-interface/nav";
pub const SEASON_ARCHIVES_PATH: &str = "x/polymer/web-space/seasons_archives_list";
pub const SEASONS_SERIES_PATH: &str = "x/polymer/web-space/home/seasons_series";
pub const SERIES_ARCHIVES_PATH: &str = "x/series/archives";
pub const FAV_DEAL_PATH: &str = "x/v3/fav/resource/deal";

/// Resource type the favorites endpoint uses for plain videos.
pub const VIDEO_RESOURCE_TYPE: &str = "2";

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn decode(value: Value) -> TransferResult<Self> {
        serde_json::from_value(value)
            .map_err(|err| TransferError::transport(format!("malformed response: {err}")))
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Payload of a successful response; a non-zero code becomes an error
    /// carrying the service's message.
    pub fn into_data(self) -> TransferResult<Value> {
        if !self.is_ok() {
            return Err(TransferError::transport(self.describe()));
        }
        self.data
            .ok_or_else(|| TransferError::transport("response has no `data` field"))
    }

    pub fn describe(&self) -> String {
        if self.message.is_empty() {
            format!("code {}", self.code)
        } else {
            format!("code {}: {}", self.code, self.message)
        }
    }
}
