//! Command Handler Module
//!
//! This module executes decoded commands against the store and builds the
//! reply for each one.
//!
//! ## Semantics
//!
//! | Command   | Writes when            | Reply on success | Reply otherwise |
//! |-----------|------------------------|------------------|-----------------|
//! | `get`     | never                  | `VALUE ... END`  | `END`           |
//! | `set`     | always                 | `END` / `STORED` | -               |
//! | `add`     | key absent             | `STORED`         | `NOT_STORED`    |
//! | `replace` | key present            | `STORED`         | `NOT_STORED`    |
//! | `append`  | key present            | `STORED`         | `NOT_STORED`    |
//! | `prepend` | key present            | `STORED`         | `NOT_STORED`    |
//!
//! A key is present when it is stored and not expired at the moment of the
//! check. The check and the write of a conditional command happen inside one
//! [`Store::update`], so concurrent writers to the same key cannot interleave.
//!
//! Every write first rejects a payload longer than its declared size with
//! `CLIENT_ERROR bad data chunk`. `noreply` suppresses `STORED`, `NOT_STORED`
//! and the `set` acknowledgement, never an error.

use crate::config::SetReply;
use crate::protocol::{Action, Command, Response};
use crate::storage::{absolute_expiry, unix_now, Mutation, Record, Store, StoreResult};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Executes commands against a shared store.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<dyn Store>,
    set_reply: SetReply,
}

impl CommandHandler {
    /// Creates a new command handler with the given store.
    pub fn new(storage: Arc<dyn Store>) -> Self {
        Self {
            storage,
            set_reply: SetReply::default(),
        }
    }

    /// Chooses the acknowledgement sent after a successful `set`.
    pub fn with_set_reply(mut self, set_reply: SetReply) -> Self {
        self.set_reply = set_reply;
        self
    }

    /// Executes a command and returns the reply to send, if any.
    ///
    /// Returns `None` when the command asked for `noreply` and succeeded or
    /// was refused. Store failures are logged and answered with `ERROR`.
    pub fn execute(&self, command: Command) -> Option<Response> {
        let action = command.action;
        let noreply = command.noreply;

        trace!(
            action = %action,
            key = %String::from_utf8_lossy(&command.key),
            bytes = command.payload.len(),
            "Executing command"
        );

        let response = match self.dispatch(command) {
            Ok(response) => response,
            Err(e) => {
                error!(action = %action, error = %e, "Store operation failed");
                Response::Error
            }
        };

        if noreply && !response.is_error() {
            None
        } else {
            Some(response)
        }
    }

    fn dispatch(&self, command: Command) -> StoreResult<Response> {
        if command.payload_overflows() {
            debug!(
                declared = command.byte_count,
                received = command.payload.len(),
                "Data block longer than declared"
            );
            return Ok(Response::bad_data_chunk());
        }

        match command.action {
            Action::Get => self.cmd_get(command.key),
            Action::Set => self.cmd_set(command),
            Action::Add => self.cmd_add(command),
            Action::Replace => self.cmd_replace(command),
            Action::Append => self.cmd_append(command),
            Action::Prepend => self.cmd_prepend(command),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    /// Builds the record a storage command writes, with its expiration
    /// computed from the current time.
    fn new_record(command: &Command) -> Record {
        Record::new(
            Bytes::copy_from_slice(&command.payload),
            command.flags,
            absolute_expiry(command.exptime, unix_now()),
        )
    }

    /// Atomically writes the record returned by `f`, which sees the live
    /// (stored and not expired) record for `key`, if any.
    fn write_if(
        &self,
        key: Bytes,
        f: impl Fn(Option<&Record>) -> Option<Record>,
    ) -> StoreResult<Response> {
        let now = unix_now();
        let stored = self.storage.update(key, &mut |current| {
            let live = current.filter(|record| !record.is_expired_at(now));
            match f(live) {
                Some(record) => Mutation::Put(record),
                None => Mutation::Keep,
            }
        })?;

        Ok(if stored {
            Response::Stored
        } else {
            Response::NotStored
        })
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// get <key>
    fn cmd_get(&self, key: Bytes) -> StoreResult<Response> {
        let Some(record) = self.storage.get(&key)? else {
            return Ok(Response::End);
        };

        if record.is_expired() {
            // Only remove it if a concurrent writer has not replaced it meanwhile
            self.storage.update(key.clone(), &mut |current| match current {
                Some(record) if record.is_expired() => Mutation::Remove,
                _ => Mutation::Keep,
            })?;
            debug!(key = %String::from_utf8_lossy(&key), "Lazily expired record");
            return Ok(Response::End);
        }

        Ok(Response::Value {
            key,
            flags: record.flags(),
            data: record.data().clone(),
        })
    }

    /// set <key> <flags> <exptime> <bytes> [noreply]
    fn cmd_set(&self, command: Command) -> StoreResult<Response> {
        let record = Self::new_record(&command);
        self.storage.save(command.key, record)?;
        Ok(self.set_reply.response())
    }

    /// add <key> <flags> <exptime> <bytes> [noreply]
    fn cmd_add(&self, command: Command) -> StoreResult<Response> {
        let record = Self::new_record(&command);
        self.write_if(command.key, |live| live.is_none().then(|| record.clone()))
    }

    /// replace <key> <flags> <exptime> <bytes> [noreply]
    fn cmd_replace(&self, command: Command) -> StoreResult<Response> {
        let record = Self::new_record(&command);
        self.write_if(command.key, |live| live.map(|_| record.clone()))
    }

    /// append <key> <flags> <exptime> <bytes> [noreply]
    fn cmd_append(&self, command: Command) -> StoreResult<Response> {
        let expires_at = absolute_expiry(command.exptime, unix_now());
        let suffix = command.payload;
        self.write_if(command.key, |live| {
            live.map(|record| record.appended(&suffix, expires_at))
        })
    }

    /// prepend <key> <flags> <exptime> <bytes> [noreply]
    fn cmd_prepend(&self, command: Command) -> StoreResult<Response> {
        let expires_at = absolute_expiry(command.exptime, unix_now());
        let prefix = command.payload;
        self.write_if(command.key, |live| {
            live.map(|record| record.prepended(&prefix, expires_at))
        })
    }
}
