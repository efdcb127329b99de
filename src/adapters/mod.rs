//! Adapters between raw wire input and domain types.
//!
//! The envelope adapter is the only place stringified JSON is handled;
//! everything past it works with typed requests.

pub mod envelope;

pub use envelope::{
    decode_envelope, encode_request, encode_result, parse_experiment_context,
    parse_experiment_intent, parse_experiment_payload, parse_experiment_plan, parse_request,
    EnvelopeError, RequestEnvelope,
};
