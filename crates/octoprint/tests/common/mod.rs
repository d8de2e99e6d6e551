//! Shared fixtures for the octoprint integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use printdeck_core::GatewayError;
use printdeck_octoprint::{EnvConfig, Gateway};
use serde_json::{json, Value};
use tokio::time::Instant;

/// A scripted reply: wait `delay`, then return `result`.
struct Reply<T> {
    delay: Duration,
    result: Result<T, GatewayError>,
}

/// In-memory [`Gateway`] replaying scripted responses.
///
/// Status requests pop the next scripted reply; once the script is used up
/// they repeat the fallback, or never resolve if there is none. Posts
/// succeed immediately unless scripted otherwise.
#[derive(Default)]
pub struct ScriptedGateway {
    status: Mutex<VecDeque<Reply<Value>>>,
    status_fallback: Mutex<Option<Value>>,
    posts: Mutex<VecDeque<Reply<()>>>,
    status_requests: Mutex<Vec<Instant>>,
    posted: Mutex<Vec<(String, Value)>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_status(&self, delay: Duration, result: Result<Value, GatewayError>) {
        self.status.lock().unwrap().push_back(Reply { delay, result });
    }

    /// Answer every unscripted status request with `value`.
    pub fn repeat_status(&self, value: Value) {
        *self.status_fallback.lock().unwrap() = Some(value);
    }

    pub fn push_post(&self, delay: Duration, result: Result<(), GatewayError>) {
        self.posts.lock().unwrap().push_back(Reply { delay, result });
    }

    /// When each status request was received.
    pub fn status_requests(&self) -> Vec<Instant> {
        self.status_requests.lock().unwrap().clone()
    }

    pub fn posted(&self) -> Vec<(String, Value)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn get_json(&self, path: &str) -> Result<Value, GatewayError> {
        assert_eq!(path, "job", "only the job endpoint is scripted");
        self.status_requests.lock().unwrap().push(Instant::now());

        let scripted = self.status.lock().unwrap().pop_front();
        let fallback = self.status_fallback.lock().unwrap().clone();
        let reply = match (scripted, fallback) {
            (Some(reply), _) => reply,
            (None, Some(value)) => Reply {
                delay: Duration::ZERO,
                result: Ok(value),
            },
            (None, None) => return std::future::pending().await,
        };

        tokio::time::sleep(reply.delay).await;
        reply.result
    }

    async fn post(&self, path: &str, body: Value) -> Result<(), GatewayError> {
        self.posted.lock().unwrap().push((path.to_string(), body));

        let scripted = self.posts.lock().unwrap().pop_front();
        match scripted {
            Some(reply) => {
                tokio::time::sleep(reply.delay).await;
                reply.result
            }
            None => Ok(()),
        }
    }
}

pub fn test_config() -> Arc<EnvConfig> {
    Arc::new(EnvConfig::new("http://octopi.local/api/", "test-key").expect("valid config"))
}

/// `GET /api/job` payload for a printing job.
pub fn printing(name: &str, filepos: u64, size: u64) -> Value {
    json!({
        "state": "Printing",
        "job": {
            "file": { "name": name, "display": name, "size": size },
            "estimatedPrintTime": 7200,
            "filament": { "tool0": { "length": 1000.0 } }
        },
        "progress": { "filepos": filepos, "printTime": 600, "printTimeLeft": 6600 }
    })
}

/// `GET /api/job` payload with no file loaded.
pub fn idle() -> Value {
    json!({ "state": "Operational", "job": null, "progress": null })
}
