//! Scripted fake backends for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{BlockingCompletions, ClientError, Completions};
use crate::model::{ChatCompletion, ChatRequest};

type Responder = Box<dyn Fn(&ChatRequest) -> Result<ChatCompletion, ClientError> + Send + Sync>;

/// Shared bookkeeping of both fakes: queued answers first, then the
/// responder, then a plain `"ok"`.
struct Script {
    queue: Mutex<VecDeque<Result<ChatCompletion, ClientError>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl Script {
    fn new(queue: Vec<Result<ChatCompletion, ClientError>>, responder: Option<Responder>) -> Self {
        Self {
            queue: Mutex::new(queue.into()),
            responder,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn answer(&self, request: &ChatRequest) -> Result<ChatCompletion, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            return next;
        }
        match &self.responder {
            Some(responder) => responder(request),
            None => Ok(ChatCompletion::text("ok")),
        }
    }
}

pub struct ScriptedClient {
    script: Script,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(queue: Vec<Result<ChatCompletion, ClientError>>) -> Self {
        Self::build(Script::new(queue, None))
    }

    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<ChatCompletion, ClientError> + Send + Sync + 'static,
    {
        Self::build(Script::new(Vec::new(), Some(Box::new(responder))))
    }

    fn build(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Hold every call open for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.script.requests.lock().unwrap().clone()
    }

    /// Highest number of calls observed in flight at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Completions for ScriptedClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ClientError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let answer = self.script.answer(request);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }
}

pub struct BlockingScriptedClient {
    script: Script,
}

impl BlockingScriptedClient {
    pub fn new(queue: Vec<Result<ChatCompletion, ClientError>>) -> Self {
        Self {
            script: Script::new(queue, None),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.script.requests.lock().unwrap().clone()
    }
}

impl BlockingCompletions for BlockingScriptedClient {
    fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ClientError> {
        self.script.answer(request)
    }
}
