//! The seam between the client and whatever performs network I/O.
//!
//! # Design
//! A `TransferEngine` opens one `TransferSession` per transfer. The client
//! applies the prepared option set, performs the transfer once, reads the
//! metadata, and closes the session. `SessionGuard` owns the session for that
//! whole sequence and closes it on drop, so the native handle is released on
//! every exit path, including early returns and panics.

use std::ops::{Deref, DerefMut};

use crate::error::{ConfigurationError, CurlError, TransferError};
use crate::http::TransferInfo;
use crate::options::OptionSet;

pub trait TransferEngine {
    type Session: TransferSession;

    /// Fails when the engine cannot run on this host.
    fn check_available(&self) -> Result<(), ConfigurationError>;

    /// Open a session bound to `url`.
    fn open(&self, url: &str) -> Result<Self::Session, CurlError>;
}

pub trait TransferSession {
    fn apply(&mut self, options: &OptionSet) -> Result<(), CurlError>;

    /// Run the transfer. Returns the body captured in memory, which is empty
    /// when the options direct output elsewhere.
    fn perform(&mut self) -> Result<Vec<u8>, TransferError>;

    fn info(&mut self) -> TransferInfo;

    /// Release the native handle. Must be idempotent.
    fn close(&mut self);
}

/// Closes the wrapped session when dropped.
pub struct SessionGuard<S: TransferSession> {
    session: S,
}

impl<S: TransferSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }
}

impl<S: TransferSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: TransferSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: TransferSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.session.close();
    }
}
