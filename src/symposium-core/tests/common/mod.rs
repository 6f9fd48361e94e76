//! Scripted in-process inference for session tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use symposium_core::{
    DebateEvent, DebateSession, Inference, InferenceError, InferenceRequest, SessionConfig,
    SpeakerSpec,
};

pub const SPEAKER: &str = "SpeakerResponse";
pub const DECISION: &str = "ModeratorDecision";
pub const ANALYSIS: &str = "Analysis";

type Reply = Box<dyn Fn(&InferenceRequest) -> Result<String, InferenceError> + Send + Sync>;

/// Answers each kind of request with its own closure and logs every call.
pub struct ScriptedInference {
    speaker: Reply,
    decision: Reply,
    analysis: Reply,
    introduction: Reply,
    log: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedInference {
    /// Speakers argue `<name> argues`, the moderator picks the first
    /// eligible speaker, analysis and introduction succeed.
    pub fn cooperative() -> Self {
        Self {
            speaker: Box::new(|req: &InferenceRequest| {
                Ok(format!(
                    r#"{{"argument": "{} argues"}}"#,
                    speaker_name(req).unwrap_or("someone")
                ))
            }),
            decision: Box::new(|req: &InferenceRequest| {
                Ok(format!(
                    r#"{{"action": "{}"}}"#,
                    first_eligible(req).unwrap_or("move_to_closing")
                ))
            }),
            analysis: Box::new(|_: &InferenceRequest| {
                Ok(r#"{"summary": "A bold claim.", "commentary": "Sparks will fly."}"#.to_string())
            }),
            introduction: Box::new(|_: &InferenceRequest| Ok("Welcome to the symposium.".to_string())),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `err`.
    pub fn failing(err: InferenceError) -> Self {
        let reply = |err: InferenceError| -> Reply {
            Box::new(move |_: &InferenceRequest| Err(err.clone()))
        };
        Self {
            speaker: reply(err.clone()),
            decision: reply(err.clone()),
            analysis: reply(err.clone()),
            introduction: reply(err),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_speaker(
        mut self,
        f: impl Fn(&InferenceRequest) -> Result<String, InferenceError> + Send + Sync + 'static,
    ) -> Self {
        self.speaker = Box::new(f);
        self
    }

    pub fn with_decision(
        mut self,
        f: impl Fn(&InferenceRequest) -> Result<String, InferenceError> + Send + Sync + 'static,
    ) -> Self {
        self.decision = Box::new(f);
        self
    }

    pub fn with_analysis(
        mut self,
        f: impl Fn(&InferenceRequest) -> Result<String, InferenceError> + Send + Sync + 'static,
    ) -> Self {
        self.analysis = Box::new(f);
        self
    }

    /// Number of calls made for a given output shape (`None` = free text).
    pub fn calls_for(&self, schema: Option<&str>) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.schema_name() == schema)
            .count()
    }

    pub fn requests_for(&self, schema: &str) -> Vec<InferenceRequest> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.schema_name() == Some(schema))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Inference for ScriptedInference {
    async fn complete(&self, request: InferenceRequest) -> Result<String, InferenceError> {
        self.log.lock().unwrap().push(request.clone());
        match request.schema_name() {
            Some(SPEAKER) => (self.speaker)(&request),
            Some(DECISION) => (self.decision)(&request),
            Some(ANALYSIS) => (self.analysis)(&request),
            Some(other) => Err(InferenceError::Malformed(format!("unexpected schema {other}"))),
            None => (self.introduction)(&request),
        }
    }
}

/// `Plato` from a speaker system prompt starting `You are Plato, ...`.
pub fn speaker_name(request: &InferenceRequest) -> Option<&str> {
    request
        .system
        .strip_prefix("You are ")
        .and_then(|rest| rest.split(',').next())
}

/// First name on the `Eligible speakers:` line of a moderator prompt.
pub fn first_eligible(request: &InferenceRequest) -> Option<&str> {
    request
        .prompt
        .lines()
        .find_map(|line| line.strip_prefix("Eligible speakers: "))
        .and_then(|names| names.split(", ").next())
}

pub fn two_speakers() -> Vec<SpeakerSpec> {
    vec![
        SpeakerSpec::new("A", "stance X"),
        SpeakerSpec::new("B", "stance Y"),
    ]
}

pub fn three_speakers() -> Vec<SpeakerSpec> {
    vec![
        SpeakerSpec::new("Plato", "idealism and forms"),
        SpeakerSpec::new("Nietzsche", "existentialism and will to power"),
        SpeakerSpec::new("Kant", "categorical imperative and ethics"),
    ]
}

/// Build a session and collect its events.
pub fn session_with_events(
    config: SessionConfig,
    speakers: Vec<SpeakerSpec>,
    inference: Arc<ScriptedInference>,
) -> (DebateSession, Arc<Mutex<Vec<DebateEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let session = DebateSession::new(config, speakers, inference)
        .unwrap()
        .with_callback(Box::new(move |event| sink.lock().unwrap().push(event)));
    (session, events)
}

/// `(speaker name, phase label)` for each utterance in order.
pub fn spoken(session: &DebateSession) -> Vec<(String, String)> {
    session
        .transcript()
        .utterances()
        .map(|u| (u.speaker_name.clone(), u.phase.to_string()))
        .collect()
}
