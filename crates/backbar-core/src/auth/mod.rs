//! Session context for the signed-in user.
//!
//! This module provides `Session`, an explicit, cloneable handle shared by the
//! API client and the cabinet store. Tokens are obtained elsewhere; the session
//! only carries them, and can persist them to disk so they survive restarts.

pub mod session;

pub use session::{Session, SessionData};
