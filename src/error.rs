use std::fmt;

/// Transport-level status of a failed RPC, as classified by the stub.
///
/// The `rpc_` prefix is reserved for these statuses. Only
/// [Unavailable](RpcStatus::Unavailable) is considered transient; it is the
/// single status the resilient writer retries. Deadline expiry maps to
/// [Timeout](RpcStatus::Timeout) and is not retried.
#[derive(
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    PartialEq,
    Clone,
    Copy,
    thiserror::Error,
)]
#[repr(u8)]
pub enum RpcStatus {
    /// Server unreachable or shedding load
    #[strum(serialize = "rpc_unavailable")]
    Unavailable = 0,
    /// Deadline exceeded
    #[strum(serialize = "rpc_timeout")]
    Timeout = 1,
    /// Resource does not exist
    #[strum(serialize = "rpc_not_found")]
    NotFound = 2,
    /// Resource already exists
    #[strum(serialize = "rpc_already_exists")]
    AlreadyExists = 3,
    /// Request rejected by the server before execution
    #[strum(serialize = "rpc_invalid_argument")]
    InvalidArgument = 4,
    /// Server-side internal error
    #[strum(serialize = "rpc_internal_err")]
    Internal = 5,
}

// The default Debug derive would ignore the strum serializations
impl fmt::Debug for RpcStatus {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl RpcStatus {
    #[inline]
    pub fn is_unavailable(&self) -> bool {
        *self == Self::Unavailable
    }

    #[inline]
    pub fn as_bytes<'a>(&'a self) -> &'a [u8] {
        self.as_ref().as_bytes()
    }
}

/// The one error kind surfaced to callers of this crate.
///
/// Remote failures carry the original [RpcStatus] so a caller can branch on
/// "did the client give up retrying" without looking at transport codes.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// A single RPC failed; no retry was attempted (or applicable).
    #[error("rpc failed: {0}")]
    Rpc(#[from] RpcStatus),
    /// The writer exhausted its retry budget on transient unavailability.
    #[error("append gave up after {attempts} attempts: {source}")]
    RetriesExhausted { attempts: usize, source: RpcStatus },
    /// Malformed arguments rejected before any network call.
    #[error("precondition violated: {0}")]
    Precondition(String),
    /// No bootstrap address yielded a cluster description, or the topology
    /// holds no members.
    #[error("no cluster member reachable")]
    Unreachable,
    /// The client was closed; the channel provider released its handles.
    #[error("client closed")]
    Closed,
}
