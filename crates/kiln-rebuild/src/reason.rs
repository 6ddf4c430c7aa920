//! Why a rebuild was requested, and whether that means it can wait.

/// Which half of the host is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Client,
    Server,
}

/// Host-supplied reason code for a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RebuildReason {
    /// Initial startup; the first real reload rebuilds anyway
    ColdStart,
    /// Recovering from a crash or leaving a session
    CrashRecovery,
    /// Snapshot injected from a remote peer; a reload follows
    RemoteSnapshot,
    /// Snapshot injected locally
    LocalSnapshot,
    /// Content was reloaded
    ContentReload,
    /// Explicit request
    Manual,
}

/// Context signal consulted by the skip decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RebuildContext {
    pub reason: RebuildReason,
    pub side: Side,
}

impl RebuildContext {
    pub fn new(reason: RebuildReason, side: Side) -> Self {
        Self { reason, side }
    }

    /// Whether an unforced trigger in this context should be deferred.
    ///
    /// A local snapshot only defers on the client, where a dedicated reload
    /// follows it.
    pub fn should_defer(&self) -> bool {
        match self.reason {
            RebuildReason::ColdStart | RebuildReason::CrashRecovery | RebuildReason::RemoteSnapshot => true,
            RebuildReason::LocalSnapshot => self.side == Side::Client,
            RebuildReason::ContentReload | RebuildReason::Manual => false,
        }
    }
}
