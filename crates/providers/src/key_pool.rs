//! Credential pool with a shared rotation cursor.
//!
//! Every concurrent query draws from the same pool, so the cursor is behind a
//! mutex and each read-modify-write happens under one lock acquisition.
//! Round-robin is best effort; only atomicity of cursor updates is guaranteed.

use agrow_core::provider::Credential;
use std::sync::Mutex;

/// Ordered credentials plus the index the next call should start from.
pub struct KeyPool {
    credentials: Vec<Credential>,
    cursor: Mutex<usize>,
}

impl KeyPool {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self {
            credentials,
            cursor: Mutex::new(0),
        }
    }

    /// Build a pool from raw secrets, skipping blanks.
    pub fn from_secrets<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            secrets
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .map(Credential::new)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One full pass over the pool starting at the cursor, as `(index, credential)`.
    pub fn rotation(&self) -> Vec<(usize, Credential)> {
        let n = self.credentials.len();
        if n == 0 {
            return Vec::new();
        }
        let start = self.cursor() % n;
        (0..n)
            .map(|offset| {
                let index = (start + offset) % n;
                (index, self.credentials[index].clone())
            })
            .collect()
    }

    /// A call succeeded on `index`: the next call starts just past it.
    pub fn mark_success(&self, index: usize) {
        let n = self.credentials.len();
        if n == 0 {
            return;
        }
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        *cursor = (index + 1) % n;
    }

    /// `index` is rate limited or out of retries. Move the cursor past it,
    /// unless another caller already moved the cursor elsewhere.
    pub fn mark_exhausted(&self, index: usize) {
        let n = self.credentials.len();
        if n == 0 {
            return;
        }
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        if *cursor == index {
            *cursor = (index + 1) % n;
        }
    }
}

impl std::fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPool")
            .field("credentials", &self.credentials.len())
            .field("cursor", &self.cursor())
            .finish()
    }
}
