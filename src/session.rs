#![forbid(unsafe_code)]

//! Authenticated HTTP access. Every request carries the same browser-like
//! identification, a referer, and the user's cookies.

use serde_json::Value;
use tracing::debug;

use crate::config::TransferConfig;
use crate::credential::Credential;
use crate::error::TransferResult;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_REFERER: &str = "https://www.bilibili.com";

/// Owned `(name, value)` pairs used for query strings, form bodies and headers.
pub type Pairs = Vec<(&'static str, String)>;

/// Blocking request/response seam. The production implementation wraps
/// `ureq`; tests script responses.
pub trait HttpTransport {
    fn get_json(&self, url: &str, query: &Pairs, headers: &Pairs) -> TransferResult<Value>;

    fn post_form(&self, url: &str, form: &Pairs, headers: &Pairs) -> TransferResult<Value>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &TransferConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(config.http_timeout)
            .build();
        Self { agent }
    }
}

impl HttpTransport for UreqTransport {
    fn get_json(&self, url: &str, query: &Pairs, headers: &Pairs) -> TransferResult<Value> {
        let mut request = self.agent.get(url);
        for (name, value) in query {
            request = request.query(name, value);
        }
        for (name, value) in headers {
            request = request.set(name, value);
        }
        Ok(request.call()?.into_json()?)
    }

    fn post_form(&self, url: &str, form: &Pairs, headers: &Pairs) -> TransferResult<Value> {
        let mut request = self.agent.post(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        let body: Vec<(&str, &str)> = form
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        Ok(request.send_form(&body)?.into_json()?)
    }
}

/// One authenticated conversation with the remote service. Owned by a single
/// run; nothing here is shared between runs.
pub struct Session {
    credential: Credential,
    transport: Box<dyn HttpTransport>,
}

impl Session {
    pub fn new(credential: Credential, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            credential,
            transport,
        }
    }

    pub fn connect(credential: Credential, config: &TransferConfig) -> Self {
        Self::new(credential, Box::new(UreqTransport::new(config)))
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Empty when the cookie blob had no csrf token; mutating calls must treat
    /// that as fatal.
    pub fn csrf_token(&self) -> &str {
        self.credential.csrf_token()
    }

    /// GET returning the decoded JSON body. `headers` replace the session
    /// defaults with the same name.
    pub fn get(&self, url: &str, params: &Pairs, headers: &Pairs) -> TransferResult<Value> {
        debug!(url, ?params, "GET");
        self.transport
            .get_json(url, params, &self.headers_with(headers))
    }

    pub fn post(&self, url: &str, form: &Pairs) -> TransferResult<Value> {
        debug!(url, "POST");
        self.transport
            .post_form(url, form, &self.headers_with(&Pairs::new()))
    }

    fn headers_with(&self, extra: &Pairs) -> Pairs {
        let mut headers: Pairs = vec![
            ("User-Agent", USER_AGENT.to_string()),
            ("Referer", DEFAULT_REFERER.to_string()),
        ];
        let cookie = self.credential.cookie_header();
        if !cookie.is_empty() {
            headers.push(("Cookie", cookie));
        }
        for (name, value) in extra {
            match headers
                .iter()
                .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
            {
                Some(index) => headers[index].1 = value.clone(),
                None => headers.push((*name, value.clone())),
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FAV_DEAL_PATH, NAV_PATH};
    use crate::error::TransferError;
    use crate::testing::ScriptedTransport;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn get_attaches_cookie_and_default_referer() {
        let transport = ScriptedTransport::new(|_| Ok(json!({"code": 0})));
        let session = Session::new(
            Credential::parse("SESSDATA=s; bili_jct=c"),
            Box::new(transport.clone()),
        );
        session
            .get("http://api/x", &vec![("mid", "1".to_string())], &Pairs::new())
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.header("Cookie"), Some("SESSDATA=s; bili_jct=c"));
        assert_eq!(request.header("Referer"), Some(DEFAULT_REFERER));
        assert_eq!(request.header("User-Agent"), Some(USER_AGENT));
        assert_eq!(request.param("mid"), Some("1"));
    }

    #[test]
    fn extra_headers_replace_defaults() {
        let transport = ScriptedTransport::new(|_| Ok(json!({"code": 0})));
        let session = Session::new(Credential::default(), Box::new(transport.clone()));
        session
            .get(
                "http://api/x",
                &Pairs::new(),
                &vec![("referer", "https://space/1".to_string())],
            )
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.header("Referer"), Some("https://space/1"));
        assert_eq!(request.header("Cookie"), None);
        assert_eq!(
            request
                .headers
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case("referer"))
                .count(),
            1
        );
    }

    fn http_config(server: &mockito::ServerGuard) -> TransferConfig {
        TransferConfig {
            api_base: server.url(),
            ..TransferConfig::default()
        }
    }

    #[test]
    fn ureq_get_sends_query_cookie_and_browser_headers() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", format!("/{NAV_PATH}").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("mid".into(), "42".into()),
                Matcher::UrlEncoded("season_id".into(), "99".into()),
            ]))
            .match_header("cookie", "SESSDATA=s; bili_jct=c")
            .match_header("referer", "https://space.bilibili.com/42")
            .match_header("user-agent", USER_AGENT)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":0,"data":{"isLogin":true}}"#)
            .create();

        let config = http_config(&server);
        let session = Session::connect(Credential::parse("SESSDATA=s; bili_jct=c"), &config);
        let body = session
            .get(
                &config.endpoint(NAV_PATH),
                &vec![("mid", "42".to_string()), ("season_id", "99".to_string())],
                &vec![("Referer", "https://space.bilibili.com/42".to_string())],
            )
            .unwrap();

        mock.assert();
        assert_eq!(body, json!({"code": 0, "data": {"isLogin": true}}));
    }

    #[test]
    fn ureq_post_sends_form_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", format!("/{FAV_DEAL_PATH}").as_str())
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_header("cookie", "SESSDATA=s; bili_jct=tok")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("rid".into(), "5".into()),
                Matcher::UrlEncoded("add_media_ids".into(), "77".into()),
                Matcher::UrlEncoded("csrf".into(), "tok".into()),
            ]))
            .with_body(r#"{"code":0}"#)
            .create();

        let config = http_config(&server);
        let session = Session::connect(Credential::parse("SESSDATA=s; bili_jct=tok"), &config);
        let form: Pairs = vec![
            ("rid", "5".to_string()),
            ("add_media_ids", "77".to_string()),
            ("csrf", session.csrf_token().to_string()),
        ];
        let body = session
            .post(&config.endpoint(FAV_DEAL_PATH), &form)
            .unwrap();

        mock.assert();
        assert_eq!(body, json!({"code": 0}));
    }

    #[test]
    fn ureq_maps_status_and_garbage_to_transport_errors() {
        let mut server = mockito::Server::new();
        let _rejected = server
            .mock("GET", "/rejected")
            .with_status(412)
            .with_body("blocked")
            .create();
        let _garbage = server
            .mock("GET", "/garbage")
            .with_body("<html>not json</html>")
            .create();

        let transport = UreqTransport::new(&http_config(&server));
        let err = transport
            .get_json(&format!("{}/rejected", server.url()), &Pairs::new(), &Pairs::new())
            .unwrap_err();
        assert!(matches!(&err, TransferError::Transport(message) if message.contains("412")));

        let err = transport
            .get_json(&format!("{}/garbage", server.url()), &Pairs::new(), &Pairs::new())
            .unwrap_err();
        assert!(matches!(err, TransferError::Transport(_)));
    }

    #[test]
    fn csrf_token_comes_from_credential() {
        let transport = ScriptedTransport::new(|_| Ok(json!({})));
        let session = Session::new(Credential::parse("bili_jct=abc"), Box::new(transport));
        assert_eq!(session.csrf_token(), "abc");
    }
}
