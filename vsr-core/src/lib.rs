//! Resolve a movie or episode reference into ranked, playable stream sources.
//!
//! Hosting endpoints hide their stream tables behind packed player scripts,
//! AES envelopes and HLS master playlists. This crate reverses those layers
//! for every candidate request of a resolution, concurrently, and merges the
//! surviving sources into one deduplicated list.
//!
//! # Stages
//!
//! - [`unpack`]: `eval(function(p,a,c,k,e,d){...})` script unpacking.
//! - [`cipher`]: static key AES-CBC and PBKDF2 derived AES-256-GCM envelopes.
//! - [`manifest`]: HLS variants, audio renditions and subtitles.
//! - [`extract`]: stream links out of known JSON and player layouts.
//! - [`aggregate`]: deduplication and quality ranking.
//! - [`Pipeline`]: drives all of the above over a [`Transport`].
//!
//! Networking is left to the caller through the [`Transport`] trait.

pub mod aggregate;
pub mod cipher;
pub mod extract;
pub mod manifest;
pub mod unpack;

mod error;
mod model;
mod pipeline;
mod profile;
mod quality;
mod request;

pub use error::{CandidateError, DecodeError, ParseError, PipelineError, TransportError};
pub use model::*;
pub use pipeline::{DEFAULT_TIMEOUT, Outcome, Pipeline, Stage};
pub use profile::{ProfileRegistry, SiteProfile};
pub use quality::Quality;
pub use request::{CandidateRequest, CandidateTemplate, RawResponse, Transport, merge_headers};
pub use url::Url;
