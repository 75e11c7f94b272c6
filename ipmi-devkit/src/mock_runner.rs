/*!
Mock command runner for testing without BMCs

Stands in for the FreeIPMI binaries: responses are scripted per program
(optionally per `-h <host>`), every invocation is recorded, and responses
can be delayed to simulate slow or hung endpoints.
*/

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Scripted answer to one command invocation
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Zero exit with this stdout
    Output(Vec<u8>),
    /// Non-zero exit with this stderr
    Failure(String),
    /// Sleep, then answer with the inner response
    Delayed(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn output<S: Into<Vec<u8>>>(stdout: S) -> Self {
        MockResponse::Output(stdout.into())
    }

    pub fn failure<S: Into<String>>(stderr: S) -> Self {
        MockResponse::Failure(stderr.into())
    }

    pub fn delayed(self, delay: Duration) -> Self {
        MockResponse::Delayed(delay, Box::new(self))
    }
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Value following `-h`, if any
    pub fn host(&self) -> Option<&str> {
        host_arg(&self.args)
    }
}

#[derive(Default)]
struct Inner {
    // (program, host) -> response; host None matches every host
    responses: HashMap<(String, Option<String>), MockResponse>,
    calls: Vec<Invocation>,
}

/// Recording command runner with canned responses
#[derive(Clone, Default)]
pub struct MockRunner {
    inner: Arc<Mutex<Inner>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts `program` for every host
    pub fn on<S: Into<String>>(self, program: S, response: MockResponse) -> Self {
        self.inner
            .lock()
            .responses
            .insert((program.into(), None), response);
        self
    }

    /// Scripts `program` for one host only; wins over `on`
    pub fn on_host<S: Into<String>>(self, program: S, host: S, response: MockResponse) -> Self {
        self.inner
            .lock()
            .responses
            .insert((program.into(), Some(host.into())), response);
        self
    }

    /// Records the call and plays back the scripted response
    pub async fn respond(&self, program: &str, args: &[String]) -> Result<Vec<u8>, String> {
        let mut response = {
            let mut inner = self.inner.lock();
            inner.calls.push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
            });
            let host = host_arg(args).map(str::to_string);
            let found = inner
                .responses
                .get(&(program.to_string(), host))
                .or_else(|| inner.responses.get(&(program.to_string(), None)))
                .cloned();
            found
        }
        .ok_or_else(|| format!("no response scripted for {program}"))?;

        loop {
            match response {
                MockResponse::Output(stdout) => return Ok(stdout),
                MockResponse::Failure(stderr) => return Err(stderr),
                MockResponse::Delayed(delay, next) => {
                    tokio::time::sleep(delay).await;
                    response = *next;
                }
            }
        }
    }

    /// All invocations so far, in call order
    pub fn calls(&self) -> Vec<Invocation> {
        self.inner.lock().calls.clone()
    }

    /// Invocations of one program
    pub fn calls_for(&self, program: &str) -> Vec<Invocation> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.program == program)
            .cloned()
            .collect()
    }

    /// Forget recorded calls, keep the script
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }
}

fn host_arg(args: &[String]) -> Option<&str> {
    args.iter()
        .position(|a| a == "-h")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
