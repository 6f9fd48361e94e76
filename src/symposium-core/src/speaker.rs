//! Debate speakers.
//!
//! A [`Speaker`] is one participant with a fixed stance. Speakers are only
//! ever created through a validated [`Roster`], which assigns each one an
//! opaque [`SpeakerId`] and its set of opponents.

use std::collections::HashSet;
use std::fmt;
use std::ops::Index;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::{DebateError, InferenceError};
use crate::inference::{Inference, InferenceRequest, infer_structured};
use crate::phase::Phase;
use crate::retry::RetryPolicy;
use crate::text::sanitize_response;

/// Identity of a speaker within one roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeakerId(usize);

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// Configuration for one speaker, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpeakerSpec {
    /// Display name, unique within the roster.
    pub name: String,
    /// The philosophy or position the speaker argues from.
    pub stance: String,
    /// Model override for this speaker.
    #[serde(default)]
    pub model: Option<String>,
    /// Role preamble override. Supports `{name}`, `{stance}`, `{topic}` and
    /// `{opponents}` placeholders.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl SpeakerSpec {
    pub fn new(name: impl Into<String>, stance: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stance: stance.into(),
            model: None,
            system_prompt: None,
        }
    }

    /// Use a specific model for this speaker.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set a custom role preamble.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// The single field a speaker must answer with.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SpeakerResponse {
    pub argument: String,
}

const SPEAKER_RULES: &str = "Do not repeat points unnecessarily. \
Use quotes or references when appropriate. \
Respond to your opponents by name. \
Keep your argument to a single paragraph.";

const FORMAT_CONSTRAINT: &str = "Respond ONLY in JSON with one field: 'argument'. \
Do NOT include any text outside the JSON. \
Example: {\"argument\": \"your argument here\"}. \
If you do not follow this format, your answer will be rejected and you will be asked again.";

/// What a speaker sees when asked to speak.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub topic: &'a str,
    pub opponent_names: &'a [&'a str],
    /// Opponents' latest arguments, one `Name: text` line each. Empty for
    /// the opening.
    pub opponents_context: &'a str,
}

/// Utterance recorded when a speaker fails to produce a valid argument.
pub fn pass_utterance(name: &str, phase: Phase) -> String {
    format!(
        "[{} passes: no valid {} statement could be produced.]",
        name,
        phase.display_name().to_lowercase()
    )
}

/// What a speaker said on one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub text: String,
    /// No valid argument was produced and `text` is the pass notice.
    pub passed: bool,
}

impl Turn {
    fn argued(text: String) -> Self {
        Self {
            text,
            passed: false,
        }
    }

    fn pass(text: String) -> Self {
        Self { text, passed: true }
    }
}

/// One debate participant.
#[derive(Debug, Clone)]
pub struct Speaker {
    id: SpeakerId,
    name: String,
    stance: String,
    model: Option<String>,
    system_prompt: Option<String>,
    opponents: Vec<SpeakerId>,
    phase: Phase,
}

impl Speaker {
    pub fn id(&self) -> SpeakerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stance(&self) -> &str {
        &self.stance
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Every other speaker in the roster.
    pub fn opponents(&self) -> &[SpeakerId] {
        &self.opponents
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Who the speaker is, what they stand for and who they face.
    fn role_preamble(&self, topic: &str, opponent_names: &[&str]) -> String {
        let opponents = join_names(opponent_names);

        match &self.system_prompt {
            Some(template) => template
                .replace("{name}", &self.name)
                .replace("{stance}", &self.stance)
                .replace("{topic}", topic)
                .replace("{opponents}", &opponents),
            None => format!(
                "You are {}, an expert philosopher. \
                 Your arguments must be based entirely on {}. \
                 You are debating against {} on the topic \"{}\".",
                self.name, self.stance, opponents, topic
            ),
        }
    }

    /// The request for a turn in the current phase. Identical inputs always
    /// produce an identical request.
    pub fn request(&self, ctx: &TurnContext<'_>) -> InferenceRequest {
        let system = format!(
            "{} {} {} {}",
            self.role_preamble(ctx.topic, ctx.opponent_names),
            self.phase.instruction(),
            SPEAKER_RULES,
            FORMAT_CONSTRAINT
        );

        let mut prompt = format!("Debate topic: {}", ctx.topic);
        if self.phase.uses_opponent_context() {
            if ctx.opponents_context.trim().is_empty() {
                prompt.push_str("\n\nYour opponents have not made any arguments yet.");
            } else {
                prompt.push_str("\n\nYour opponents' latest arguments:\n");
                prompt.push_str(ctx.opponents_context);
            }
        }

        InferenceRequest::new(system, prompt)
            .with_model(self.model.clone())
            .with_max_tokens(self.phase.max_tokens())
    }

    /// Produce this speaker's argument for the current phase.
    ///
    /// Malformed or unavailable output is retried with the same request up
    /// to the policy's bound; after that the turn is passed with
    /// [`pass_utterance`]. This never fails.
    pub async fn produce_utterance(
        &self,
        inference: &dyn Inference,
        retry: &RetryPolicy,
        ctx: &TurnContext<'_>,
    ) -> Turn {
        let request = self.request(ctx);
        let name = self.name.as_str();
        let phase = self.phase;

        retry
            .run_or_else(
                |_: &InferenceError| true,
                move |attempt| {
                    let request = request.clone();
                    async move {
                        tracing::debug!(speaker = name, %phase, attempt, "requesting argument");
                        let response: SpeakerResponse = infer_structured(inference, request).await?;
                        let argument = sanitize_response(&response.argument);
                        if argument.is_empty() {
                            return Err(InferenceError::Malformed("empty argument".to_string()));
                        }
                        Ok::<_, InferenceError>(Turn::argued(argument))
                    }
                },
                |err| {
                    tracing::warn!(speaker = name, %phase, error = %err, "speaker passes turn");
                    Turn::pass(pass_utterance(name, phase))
                },
            )
            .await
    }
}

/// `A`, `A and B`, `A, B and C`.
pub(crate) fn join_names(names: &[&str]) -> String {
    match names {
        [] => "no one".to_string(),
        [only] => only.to_string(),
        [rest @ .., last] => format!("{} and {}", rest.join(", "), last),
    }
}

/// The validated, ordered set of speakers in a session.
#[derive(Debug, Clone)]
pub struct Roster {
    speakers: Vec<Speaker>,
}

impl Roster {
    /// A debate needs someone to disagree with.
    pub const MIN_SPEAKERS: usize = 2;

    /// Validate `specs` and assign identities in the given order.
    ///
    /// Names and stances are trimmed and must be non-empty. Names must also
    /// be unique ignoring case, since the moderator refers to speakers by name.
    pub fn new(specs: Vec<SpeakerSpec>) -> Result<Self, DebateError> {
        if specs.len() < Self::MIN_SPEAKERS {
            return Err(DebateError::InvalidSpeakerCount {
                min: Self::MIN_SPEAKERS,
                actual: specs.len(),
            });
        }

        let mut seen = HashSet::new();
        for (position, spec) in specs.iter().enumerate() {
            let name = spec.name.trim();
            if name.is_empty() {
                return Err(DebateError::EmptySpeakerName {
                    position: position + 1,
                });
            }
            if spec.stance.trim().is_empty() {
                return Err(DebateError::EmptySpeakerStance {
                    position: position + 1,
                });
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(DebateError::DuplicateSpeaker(name.to_string()));
            }
        }

        let count = specs.len();
        let speakers = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| Speaker {
                id: SpeakerId(i),
                name: spec.name.trim().to_string(),
                stance: spec.stance.trim().to_string(),
                model: spec.model,
                system_prompt: spec.system_prompt,
                opponents: (0..count).filter(|&j| j != i).map(SpeakerId).collect(),
                phase: Phase::Opening,
            })
            .collect();

        Ok(Self { speakers })
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Speakers in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &Speaker> {
        self.speakers.iter()
    }

    /// Ids in roster order.
    pub fn ids(&self) -> Vec<SpeakerId> {
        self.speakers.iter().map(|s| s.id).collect()
    }

    pub fn get(&self, id: SpeakerId) -> Option<&Speaker> {
        self.speakers.get(id.0)
    }

    pub(crate) fn set_phase(&mut self, id: SpeakerId, phase: Phase) {
        if let Some(speaker) = self.speakers.get_mut(id.0) {
            speaker.set_phase(phase);
        }
    }

    /// Resolve a name the way the moderator writes it: trimmed, any case.
    pub fn find_by_name(&self, name: &str) -> Option<SpeakerId> {
        let wanted = name.trim().to_lowercase();
        self.speakers
            .iter()
            .find(|s| s.name.to_lowercase() == wanted)
            .map(|s| s.id)
    }

    /// Names of `id`'s opponents in roster order.
    pub fn opponent_names(&self, id: SpeakerId) -> Vec<&str> {
        self.get(id)
            .map(|speaker| {
                speaker
                    .opponents
                    .iter()
                    .map(|&op| self[op].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The speaker after `last` in roster order, wrapping around; the first
    /// speaker if nobody has spoken.
    pub fn next_after(&self, last: Option<SpeakerId>) -> SpeakerId {
        match last {
            Some(id) => SpeakerId((id.0 + 1) % self.speakers.len()),
            None => SpeakerId(0),
        }
    }
}

impl Index<SpeakerId> for Roster {
    type Output = Speaker;

    fn index(&self, id: SpeakerId) -> &Speaker {
        &self.speakers[id.0]
    }
}
