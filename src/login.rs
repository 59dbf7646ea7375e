#![forbid(unsafe_code)]

//! Login gate. Nothing is resolved or transferred until the service accepts
//! the session cookies.

use serde::Deserialize;
use tracing::{info, warn};

use crate::api::{Envelope, NAV_PATH};
use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::session::{Pairs, Session};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub uname: String,
    #[serde(default)]
    pub mid: u64,
}

#[derive(Debug, Deserialize)]
struct NavData {
    #[serde(rename = "isLogin", default)]
    is_login: bool,
    #[serde(flatten)]
    identity: UserIdentity,
}

pub struct LoginVerifier<'a> {
    session: &'a Session,
    url: String,
}

impl<'a> LoginVerifier<'a> {
    pub fn new(session: &'a Session, config: &TransferConfig) -> Self {
        Self {
            session,
            url: config.endpoint(NAV_PATH),
        }
    }

    /// `true` only when the status code is zero and `isLogin` is set. Every
    /// failure degrades to `false`.
    pub fn verify(&self) -> bool {
        match self.identity() {
            Ok(identity) => {
                info!(user = %identity.uname, uid = identity.mid, "login verified");
                true
            }
            Err(err) => {
                warn!("login verification failed: {err}");
                self.log_cookie_diagnostics();
                false
            }
        }
    }

    pub fn identity(&self) -> TransferResult<UserIdentity> {
        let response = self.session.get(&self.url, &Pairs::new(), &Pairs::new())?;
        let data = Envelope::decode(response)?.into_data()?;
        let nav: NavData = serde_json::from_value(data)
            .map_err(|err| TransferError::transport(format!("malformed nav payload: {err}")))?;
        if !nav.is_login {
            return Err(TransferError::authentication("service reports not logged in"));
        }
        Ok(nav.identity)
    }

    fn log_cookie_diagnostics(&self) {
        for (key, preview) in self.session.credential().diagnostics() {
            match preview {
                Some(value) => info!("cookie {key}: {value}..."),
                None => warn!("cookie {key}: missing"),
            }
        }
    }
}
