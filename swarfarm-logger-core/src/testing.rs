//! In-memory transport for unit tests

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::{parse_body, ApiReply, ApiRequest, Method, Transport};

/// One scripted answer
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Status with a JSON body
    Json(u16, Value),
    /// Status with an empty body
    Raw(u16),
    /// Status with a body as raw text, JSON or not
    Text(u16, &'static str),
    /// No response at all
    Fail(&'static str),
}

struct Route {
    method: Method,
    path: String,
    steps: VecDeque<Step>,
}

/// Replays scripted answers per route and records every request.
///
/// The last step of a route repeats forever. Unrouted requests fail.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(self, method: Method, path: &str, steps: Vec<Step>) -> Self {
        self.routes.lock().push(Route {
            method,
            path: path.to_string(),
            steps: steps.into(),
        });
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiReply> {
        self.requests.lock().push(request.clone());

        let step = {
            let mut routes = self.routes.lock();
            let route = routes
                .iter_mut()
                .find(|r| r.method == request.method && r.path == request.path);
            match route {
                Some(route) if route.steps.len() > 1 => route.steps.pop_front(),
                Some(route) => route.steps.front().cloned(),
                None => None,
            }
        };

        match step {
            Some(Step::Json(status, body)) => Ok(ApiReply::new(status, body)),
            Some(Step::Raw(status)) => Ok(ApiReply { status, body: None }),
            Some(Step::Text(status, text)) => Ok(ApiReply {
                status,
                body: parse_body(text),
            }),
            Some(Step::Fail(message)) => Err(Error::Transport(message.to_string())),
            None => Err(Error::Transport(format!("no route for {}", request.path))),
        }
    }
}
