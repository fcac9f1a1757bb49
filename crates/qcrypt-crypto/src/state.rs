//! Engine lifecycle shared by [`Encipher`](crate::Encipher) and
//! [`Decipher`](crate::Decipher).
//!
//! ```text
//! Initialized ──▶ Block0Decoded ──▶ Block0Done ──▶ Finished
//!      │          (decrypt only)       ▲   │
//!      └───────────────────────────────┘   └─▶ Block0Done (blockN)
//!
//! any ──▶ Error   (absorbing)
//! ```

use serde::Serialize;

use crate::error::{CipherError, CipherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CipherState {
    Initialized,
    Block0Decoded,
    Block0Done,
    Finished,
    Error,
}

impl CipherState {
    /// Check that moving from `self` to `next` is a legal step.
    ///
    /// `Error` is always reachable and never left.
    pub fn transition(self, next: CipherState) -> CipherResult<CipherState> {
        use CipherState::*;

        let allowed = match (self, next) {
            (Error, _) => false,
            (_, Error) => true,
            (Initialized, Block0Decoded) => true,
            // Encipher skips the decode step; a single-block stream may
            // finish straight away.
            (Initialized, Block0Done) | (Initialized, Finished) => true,
            (Block0Decoded, Block0Done) => true,
            (Block0Done, Block0Done) | (Block0Done, Finished) => true,
            (Initialized, Initialized)
            | (Block0Decoded, Initialized)
            | (Block0Decoded, Block0Decoded)
            | (Block0Decoded, Finished)
            | (Block0Done, Initialized)
            | (Block0Done, Block0Decoded)
            | (Finished, _) => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(CipherError::StateViolation {
                state: self,
                operation: next.entered_by(),
            })
        }
    }

    /// Fail with a state violation unless `self` is one of `expected`.
    pub(crate) fn require(self, expected: &[CipherState], operation: &'static str) -> CipherResult<()> {
        if expected.contains(&self) {
            Ok(())
        } else {
            Err(CipherError::StateViolation {
                state: self,
                operation,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CipherState::Finished | CipherState::Error)
    }

    fn entered_by(self) -> &'static str {
        match self {
            CipherState::Initialized => "reset",
            CipherState::Block0Decoded => "decode block0",
            CipherState::Block0Done => "process block",
            CipherState::Finished => "finish",
            CipherState::Error => "fail",
        }
    }
}
