//! Scripted [`Session`] for driver, orchestrator and fleet tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use regex::bytes::Regex;
use secrecy::SecretString;

use super::{ConnectParams, Connector, Session};
use crate::error::{ChannelError, DriverError, Error, Result, TransportError};
use crate::inventory::DeviceDescriptor;
use crate::platform::VendorId;

/// One primitive call observed by a mock session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Open,
    CapturePrompt,
    Expect(String),
    Timed(String),
    Block(Vec<String>),
    Close,
}

/// How a scripted call fails.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Timeout,
    Closed,
}

impl Failure {
    fn into_error(self, timeout: Duration) -> Error {
        match self {
            Failure::Timeout => ChannelError::PatternTimeout(timeout).into(),
            Failure::Closed => ChannelError::Closed.into(),
        }
    }
}

type CallLog = Arc<Mutex<Vec<(String, Call)>>>;

/// A password-authenticated inventory entry for tests.
pub(crate) fn device(name: &str, vendor: VendorId) -> DeviceDescriptor {
    DeviceDescriptor {
        name: name.to_string(),
        host: format!("{}.lab.example.net", name),
        vendor,
        device_type: vendor.as_str().to_string(),
        username: "admin".to_string(),
        password: Some(SecretString::from("admin")),
        key_file: None,
        port: None,
        conn_timeout: None,
        timeout: None,
    }
}

/// What a mock device answers.
#[derive(Debug, Clone)]
pub(crate) struct MockScript {
    prompts: VecDeque<String>,
    outputs: HashMap<String, String>,
    fail_timed: HashMap<String, Failure>,
    fail_expect: HashMap<String, Failure>,
    fail_block: Option<Failure>,
    fail_prompt: bool,
    panic_on: Option<String>,
}

impl MockScript {
    /// A device showing `prompt` that accepts everything.
    pub(crate) fn new(prompt: &str) -> Self {
        Self {
            prompts: VecDeque::from([prompt.to_string()]),
            outputs: HashMap::new(),
            fail_timed: HashMap::new(),
            fail_expect: HashMap::new(),
            fail_block: None,
            fail_prompt: false,
            panic_on: None,
        }
    }

    /// Prompt returned by the next capture after the current one.
    pub(crate) fn then_prompt(mut self, prompt: &str) -> Self {
        self.prompts.push_back(prompt.to_string());
        self
    }

    /// Output returned when `text` is sent.
    pub(crate) fn output(mut self, text: &str, output: &str) -> Self {
        self.outputs.insert(text.to_string(), output.to_string());
        self
    }

    pub(crate) fn fail_timed(mut self, text: &str, failure: Failure) -> Self {
        self.fail_timed.insert(text.to_string(), failure);
        self
    }

    pub(crate) fn fail_expect(mut self, text: &str, failure: Failure) -> Self {
        self.fail_expect.insert(text.to_string(), failure);
        self
    }

    pub(crate) fn fail_block(mut self, failure: Failure) -> Self {
        self.fail_block = Some(failure);
        self
    }

    pub(crate) fn fail_prompt(mut self) -> Self {
        self.fail_prompt = true;
        self
    }

    /// Panic when `text` is sent by any primitive.
    pub(crate) fn panic_on(mut self, text: &str) -> Self {
        self.panic_on = Some(text.to_string());
        self
    }
}

/// A session that answers from a [`MockScript`] and logs every call.
pub(crate) struct MockSession {
    device: String,
    script: MockScript,
    log: CallLog,
}

impl MockSession {
    pub(crate) fn new(script: MockScript) -> Self {
        Self::with_log("mock", script, Arc::default())
    }

    fn with_log(device: &str, script: MockScript, log: CallLog) -> Self {
        Self {
            device: device.to_string(),
            script,
            log,
        }
    }

    /// Calls made on this session so far.
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(device, _)| *device == self.device)
            .map(|(_, call)| call.clone())
            .collect()
    }

    fn record(&self, call: Call) {
        if let Call::Expect(text) | Call::Timed(text) = &call {
            if self.script.panic_on.as_deref() == Some(text.as_str()) {
                panic!("scripted panic on '{text}'");
            }
        }
        self.log.lock().unwrap().push((self.device.clone(), call));
    }

    fn current_prompt(&self) -> &str {
        self.script.prompts.front().map_or("", String::as_str)
    }

    fn answer(&self, text: &str) -> String {
        match self.script.outputs.get(text) {
            Some(output) => output.clone(),
            None => format!("{}\n{}", text, self.current_prompt()),
        }
    }
}

impl Session for MockSession {
    async fn capture_prompt(&mut self) -> Result<String> {
        self.record(Call::CapturePrompt);
        if self.script.fail_prompt {
            return Err(DriverError::PromptDetection {
                message: "scripted".to_string(),
            }
            .into());
        }
        let prompt = self.current_prompt().to_string();
        if self.script.prompts.len() > 1 {
            self.script.prompts.pop_front();
        }
        Ok(prompt)
    }

    async fn send_line_expect(
        &mut self,
        text: &str,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<String> {
        self.record(Call::Expect(text.to_string()));
        if let Some(failure) = self.script.fail_expect.get(text) {
            return Err(failure.into_error(timeout));
        }
        let output = self.answer(text);
        if !pattern.is_match(output.as_bytes()) {
            return Err(Failure::Timeout.into_error(timeout));
        }
        Ok(output)
    }

    async fn send_line_timed(&mut self, text: &str, settle: Duration) -> Result<String> {
        self.record(Call::Timed(text.to_string()));
        if let Some(failure) = self.script.fail_timed.get(text) {
            return Err(failure.into_error(settle));
        }
        Ok(self.answer(text))
    }

    async fn send_block(&mut self, lines: &[String], timeout: Duration, _verify: bool) -> Result<String> {
        self.record(Call::Block(lines.to_vec()));
        if let Some(failure) = self.script.fail_block {
            return Err(failure.into_error(timeout));
        }
        let mut output: Vec<String> = lines.iter().map(|line| self.answer(line)).collect();
        output.push(self.current_prompt().to_string());
        Ok(output.join("\n"))
    }

    async fn close(self) -> Result<()> {
        self.record(Call::Close);
        Ok(())
    }
}

type OpenHook = Box<dyn Fn(&str) + Send + Sync>;

/// Hands out [`MockSession`]s sharing one call log.
#[derive(Default)]
pub(crate) struct MockConnector {
    scripts: HashMap<String, MockScript>,
    refused: HashSet<String>,
    on_open: Option<OpenHook>,
    log: CallLog,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Script for the device with inventory name `device`.
    pub(crate) fn device(mut self, device: &str, script: MockScript) -> Self {
        self.scripts.insert(device.to_string(), script);
        self
    }

    /// Make opening a session to `device` fail with a connection error.
    pub(crate) fn refuse(mut self, device: &str) -> Self {
        self.refused.insert(device.to_string());
        self
    }

    /// Run `hook` with the device name whenever a session is opened.
    pub(crate) fn on_open(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    /// Every call made on any session, tagged with the device name.
    pub(crate) fn calls(&self) -> Vec<(String, Call)> {
        self.log.lock().unwrap().clone()
    }

    /// Calls made on sessions for `device`.
    pub(crate) fn calls_for(&self, device: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == device)
            .map(|(_, call)| call)
            .collect()
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    async fn open(&self, params: &ConnectParams) -> Result<MockSession> {
        params.validate()?;
        self.log
            .lock()
            .unwrap()
            .push((params.device.clone(), Call::Open));
        if let Some(hook) = &self.on_open {
            hook(&params.device);
        }

        if self.refused.contains(&params.device) {
            return Err(TransportError::ConnectionFailed {
                host: params.ssh.host.clone(),
                port: params.ssh.port,
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            }
            .into());
        }

        let script = self
            .scripts
            .get(&params.device)
            .cloned()
            .unwrap_or_else(|| MockScript::new("<mock>"));
        Ok(MockSession::with_log(&params.device, script, self.log.clone()))
    }
}
