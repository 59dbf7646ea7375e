#![forbid(unsafe_code)]

//! Scripted transport shared by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};

use crate::credential::Credential;
use crate::error::TransferResult;
use crate::session::{HttpTransport, Pairs, Session};

pub const FULL_COOKIES: &str = "SESSDATA=session-token; DedeUserID=42; \
    DedeUserID__ckMd5=0f0f0f; bili_jct=csrf-token-value";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub params: Pairs,
    pub headers: Pairs,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Query parameter for GET, form field for POST.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn hits(&self, path: &str) -> bool {
        self.url.ends_with(path)
    }
}

type Handler = dyn Fn(&RecordedRequest) -> TransferResult<Value>;

#[derive(Clone)]
pub struct ScriptedTransport {
    handler: Rc<Handler>,
    requests: Rc<RefCell<Vec<RecordedRequest>>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&RecordedRequest) -> TransferResult<Value> + 'static) -> Self {
        Self {
            handler: Rc::new(handler),
            requests: Rc::default(),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|request| request.method == method && request.hits(path))
            .count()
    }

    pub fn session(&self, cookies: &str) -> Session {
        Session::new(Credential::parse(cookies), Box::new(self.clone()))
    }

    fn record(&self, method: Method, url: &str, params: &Pairs, headers: &Pairs) -> TransferResult<Value> {
        let request = RecordedRequest {
            method,
            url: url.to_string(),
            params: params.clone(),
            headers: headers.clone(),
        };
        self.requests.borrow_mut().push(request.clone());
        (self.handler)(&request)
    }
}

impl HttpTransport for ScriptedTransport {
    fn get_json(&self, url: &str, query: &Pairs, headers: &Pairs) -> TransferResult<Value> {
        self.record(Method::Get, url, query, headers)
    }

    fn post_form(&self, url: &str, form: &Pairs, headers: &Pairs) -> TransferResult<Value> {
        self.record(Method::Post, url, form, headers)
    }
}

/// Catalog entry shaped like the remote archive payload.
pub fn archive(aid: i64) -> Value {
    json!({
        "aid": aid,
        "bvid": format!("BV1xx{aid}"),
        "title": format!("video {aid}"),
        "pic": format!("https://i0.hdslb.com/{aid}.jpg"),
        "duration": 60 + aid,
    })
}

pub fn archives(range: std::ops::Range<i64>) -> Vec<Value> {
    range.map(archive).collect()
}

pub fn ok(data: Value) -> TransferResult<Value> {
    Ok(json!({"code": 0, "message": "0", "data": data}))
}

pub fn api_error(code: i64, message: &str) -> TransferResult<Value> {
    Ok(json!({"code": code, "message": message}))
}
