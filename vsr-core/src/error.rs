//! Error types for every stage of a resolution.

use std::time::Duration;
use thiserror::Error;

/// Failure to obtain a response for one candidate request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Upstream answered with a non-2xx status.
    #[error("upstream answered with HTTP {status}")]
    Status { status: u16 },

    /// Request could not be completed (connect, tls, body read).
    #[error("request failed: {0}")]
    Request(String),

    /// Network wait exceeded the per-candidate timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Failure to turn a raw payload into readable text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Packed script signature was not found or its symbol table is inconsistent.
    #[error("packed script signature not recognised")]
    BadSignature,

    /// Envelope could not be split or decoded (segments, base64, hex, json fields).
    #[error("malformed envelope: {0}")]
    BadEnvelope(String),

    /// GCM authentication failed, payload was corrupted or the secret was rotated.
    #[error("authentication tag mismatch")]
    AuthTagMismatch,

    /// Block cipher rejected the key, iv or padding.
    #[error("cipher failure: {0}")]
    CipherFailure(String),

    /// Profile needs key material but none was configured.
    #[error("no key material configured for this profile")]
    MissingKey,

    /// Decrypted or fetched bytes are not valid UTF-8.
    #[error("payload is not valid utf-8")]
    InvalidUtf8,
}

/// Failure to extract streams from decoded text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("payload does not match the declared shape: {0}")]
    UnexpectedShape(String),

    #[error("no playable streams in payload")]
    NoStreams,
}

/// Failure that aborts a whole resolution call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no candidate requests could be built")]
    NoCandidates,

    #[error("invalid media reference: {0}")]
    InvalidReference(String),
}

/// Why a single candidate was dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CandidateError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("parse: {0}")]
    Parse(#[from] ParseError),

    #[error("template: {0}")]
    Template(String),

    #[error("task aborted: {0}")]
    Aborted(String),
}

impl CandidateError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
