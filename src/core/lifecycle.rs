//! # Exit classification.
//!
//! Every child exit is classified into one of three outcomes that drive
//! the respawn decision:
//!
//! ```text
//! exit(code, signal)
//!   ├─► code == 826                          → Reboot    (respawn, silent)
//!   ├─► keep_alive && (code != 0 || SIGKILL) → Accidental (respawn, silent)
//!   └─► otherwise                            → Terminal  (close handle,
//!                                                         fire exit events)
//! ```
//!
//! The reboot code is reserved: a worker that wants a controlled respawn
//! terminates with it, and the master respawns unconditionally, keep-alive
//! or not.

/// Exit code reserved to mean "the worker requests a controlled respawn".
pub const REBOOT_EXIT_CODE: i32 = 826;

/// Outcome of classifying one child exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitClass {
    /// The child requested a respawn via the reboot code.
    Reboot,
    /// Accidental death of a keep-alive worker; respawn silently.
    Accidental,
    /// Final exit; close the handle and fire exit events.
    Terminal,
}

/// Classifies one exit notification.
///
/// `code` is absent when the child was killed by a signal; an absent code
/// counts as abnormal.
pub(crate) fn classify_exit(
    code: Option<i32>,
    signal: Option<&str>,
    keep_alive: bool,
) -> ExitClass {
    if code == Some(REBOOT_EXIT_CODE) {
        return ExitClass::Reboot;
    }
    let accidental = code != Some(0) || signal == Some("SIGKILL");
    if keep_alive && accidental {
        ExitClass::Accidental
    } else {
        ExitClass::Terminal
    }
}
