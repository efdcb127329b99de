//! JSON envelope adapter.
//!
//! Requests arrive as a four-field envelope `{context, payload, intent, plan}`
//! where every field is itself a JSON-encoded string. Each field is decoded
//! and validated independently; errors name the offending field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    ExperimentContext, ExperimentIntent, ExperimentPayload, ExperimentPlan, OrchestrationResult,
    SchedulerRequest,
};

/// Errors raised while decoding an envelope
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Invalid JSON in '{field}' field: {source}")]
    InvalidJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid '{field}' field: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl EnvelopeError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Envelope field the error refers to, if any
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Malformed(_) => None,
            Self::InvalidJson { field, .. } | Self::Invalid { field, .. } => Some(*field),
        }
    }
}

/// Wire form of a run request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub context: String,
    pub payload: String,
    pub intent: String,
    pub plan: String,
}

fn decode_field<T: DeserializeOwned>(field: &'static str, raw: &str) -> Result<T, EnvelopeError> {
    serde_json::from_str(raw).map_err(|source| EnvelopeError::InvalidJson { field, source })
}

fn encode_field<T: Serialize>(value: &T) -> Result<String, EnvelopeError> {
    serde_json::to_string(value).map_err(EnvelopeError::Malformed)
}

/// Decode and validate an experiment intent
pub fn parse_experiment_intent(raw: &str) -> Result<ExperimentIntent, EnvelopeError> {
    let intent: ExperimentIntent = decode_field("intent", raw)?;

    if intent.run_id.trim().is_empty() {
        return Err(EnvelopeError::invalid("intent", "runId cannot be empty"));
    }
    if intent.tenant_id.trim().is_empty() {
        return Err(EnvelopeError::invalid("intent", "tenantId cannot be empty"));
    }
    if intent.phase.is_empty() {
        return Err(EnvelopeError::invalid("intent", "phase cannot be empty"));
    }

    Ok(intent)
}

/// Decode and validate an experiment context
pub fn parse_experiment_context(raw: &str) -> Result<ExperimentContext, EnvelopeError> {
    let context: ExperimentContext = decode_field("context", raw)?;

    if context.tenant_id.trim().is_empty() {
        return Err(EnvelopeError::invalid("context", "tenantId cannot be empty"));
    }

    Ok(context)
}

/// Decode an experiment payload (any JSON input is accepted)
pub fn parse_experiment_payload(raw: &str) -> Result<ExperimentPayload, EnvelopeError> {
    decode_field("payload", raw)
}

/// Decode and validate an experiment plan
pub fn parse_experiment_plan(raw: &str) -> Result<ExperimentPlan, EnvelopeError> {
    let plan: ExperimentPlan = decode_field("plan", raw)?;

    if plan.experiment_id.trim().is_empty() {
        return Err(EnvelopeError::invalid("plan", "experimentId cannot be empty"));
    }
    if let Some(idx) = plan.sequence.iter().position(|p| p.is_empty()) {
        return Err(EnvelopeError::invalid(
            "plan",
            format!("sequence entry {} is empty", idx),
        ));
    }

    Ok(plan)
}

/// Convert a decoded envelope into a typed request
pub fn parse_request(envelope: &RequestEnvelope) -> Result<SchedulerRequest, EnvelopeError> {
    let context = parse_experiment_context(&envelope.context)?;
    let payload = parse_experiment_payload(&envelope.payload)?;
    let intent = parse_experiment_intent(&envelope.intent)?;
    let plan = parse_experiment_plan(&envelope.plan)?;

    if context.tenant_id != intent.tenant_id {
        return Err(EnvelopeError::invalid(
            "context",
            format!(
                "tenantId '{}' does not match intent tenant '{}'",
                context.tenant_id, intent.tenant_id
            ),
        ));
    }

    Ok(SchedulerRequest::new(intent, context, payload, plan))
}

/// Decode a raw envelope document into a typed request
pub fn decode_envelope(raw: &str) -> Result<SchedulerRequest, EnvelopeError> {
    let envelope: RequestEnvelope = serde_json::from_str(raw).map_err(EnvelopeError::Malformed)?;
    parse_request(&envelope)
}

/// Encode a typed request back into envelope form
pub fn encode_request(request: &SchedulerRequest) -> Result<RequestEnvelope, EnvelopeError> {
    Ok(RequestEnvelope {
        context: encode_field(&request.context)?,
        payload: encode_field(&request.payload)?,
        intent: encode_field(&request.intent)?,
        plan: encode_field(&request.plan)?,
    })
}

/// Serialize a result for callers on the other side of the envelope
pub fn encode_result(result: &OrchestrationResult) -> Result<String, EnvelopeError> {
    encode_field(result)
}
