//! Core types for colloquy.

pub mod message;

pub use message::*;
