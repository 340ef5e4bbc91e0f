//! Wire protocol for the meeting-intelligence stream.
//!
//! This crate defines the JSON envelopes the backend streams to the
//! client (transcripts, summaries, sentiment, contextual insights),
//! the outbound command objects, and the collaborative note updates.
//! Pure data and serde; no I/O.

#![warn(clippy::pedantic)]

pub mod command;
pub mod envelope;
pub mod notes;

pub use command::ClientCommand;
pub use envelope::{
    ConnectionStatus, ContextualInsightPayload, Envelope, MessageType, SentimentPayload,
    SummaryPayload, TranscriptPayload,
};
pub use notes::{NotesUpdate, ACTION_SAVE, ACTION_UPDATE};
