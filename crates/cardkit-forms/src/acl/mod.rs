//! Anti-Corruption Layer (ACL)
//!
//! The chat platform delivers card callbacks as loosely typed JSON. The
//! ACL validates that payload and translates it into domain requests
//! before anything reaches the engine, and wraps the engine's deltas in
//! the envelope the platform expects back.

pub mod card_callback;

pub use card_callback::*;
