//! # Event-name classification and the reserved-name guard.
//!
//! Three name classes exist on the wire and the emitter surface:
//! - **Lifecycle** names (`online`, `error`, `exit`) are raised by the
//!   lifecycle controller on handles and must never be injected by user
//!   code.
//! - **Control** names route internal operations between master and
//!   workers. The envelope enums carry them as variants; the legacy
//!   bracketed spellings (`----transmit----` and friends) remain reserved
//!   so user events can never collide with them, and any other name of
//!   the `----…----` shape is rejected as well.
//! - **User** names are everything else and are the only class accepted
//!   by `emit` and `broadcast`.

/// Legacy wire spelling for targeted relays.
pub const TRANSMIT: &str = "----transmit----";
/// Legacy wire spelling for fan-out relays.
pub const BROADCAST: &str = "----broadcast----";
/// Legacy wire spelling for respawn requests.
pub const REBOOT: &str = "----reboot----";
/// Legacy wire spelling for online-set queries.
pub const GET_WORKERS: &str = "----get-workers----";
/// Legacy wire spelling for the bootstrap notification.
pub const BOOTSTRAP: &str = "----online----";

/// Lifecycle event names raised by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleName {
    /// First successful connection of a worker.
    Online,
    /// A low-level channel error.
    Error,
    /// Terminal exit of a worker's child process.
    Exit,
}

/// Control-plane event names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlName {
    /// Relay to a named set of workers.
    Transmit,
    /// Relay to every worker, sender included.
    Broadcast,
    /// Controlled respawn request.
    Reboot,
    /// Online-set query.
    GetWorkers,
    /// Initial bootstrap notification.
    Bootstrap,
    /// Any other bracketed name; reserved to keep the namespace closed.
    Other(String),
}

/// Classified event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventName {
    /// Raised by the lifecycle controller; masked on the user surface.
    Lifecycle(LifecycleName),
    /// Routes internal operations; masked on the user surface.
    Control(ControlName),
    /// Deliverable user event.
    User(String),
}

impl EventName {
    /// Classifies a raw event name.
    pub fn classify(name: &str) -> EventName {
        match name {
            "online" => return EventName::Lifecycle(LifecycleName::Online),
            "error" => return EventName::Lifecycle(LifecycleName::Error),
            "exit" => return EventName::Lifecycle(LifecycleName::Exit),
            _ => {}
        }
        if name.len() >= 8 && name.starts_with("----") && name.ends_with("----") {
            let control = match name {
                TRANSMIT => ControlName::Transmit,
                BROADCAST => ControlName::Broadcast,
                REBOOT => ControlName::Reboot,
                GET_WORKERS => ControlName::GetWorkers,
                BOOTSTRAP => ControlName::Bootstrap,
                other => ControlName::Other(other.to_string()),
            };
            return EventName::Control(control);
        }
        EventName::User(name.to_string())
    }

    /// Returns the name if it is deliverable as a user event.
    pub fn user(name: &str) -> Option<&str> {
        match EventName::classify(name) {
            EventName::User(_) => Some(name),
            _ => None,
        }
    }

    /// True if the name is masked on the `emit`/`broadcast` surface.
    pub fn is_reserved(name: &str) -> bool {
        EventName::user(name).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_names_are_reserved() {
        for name in ["online", "error", "exit"] {
            assert!(EventName::is_reserved(name), "{name} must be reserved");
        }
        assert_eq!(
            EventName::classify("exit"),
            EventName::Lifecycle(LifecycleName::Exit)
        );
    }

    #[test]
    fn control_names_are_reserved() {
        for name in [TRANSMIT, BROADCAST, REBOOT, GET_WORKERS, BOOTSTRAP] {
            assert!(EventName::is_reserved(name), "{name} must be reserved");
        }
        assert_eq!(
            EventName::classify(REBOOT),
            EventName::Control(ControlName::Reboot)
        );
    }

    #[test]
    fn unknown_bracketed_names_stay_reserved() {
        assert_eq!(
            EventName::classify("----later----"),
            EventName::Control(ControlName::Other("----later----".into()))
        );
        // The shortest bracketed spelling is prefix plus suffix alone.
        assert!(EventName::is_reserved("--------"));
    }

    #[test]
    fn ordinary_names_pass() {
        for name in ["hello", "Online", "exit-now", "--almost--", "---x---"] {
            assert_eq!(EventName::user(name), Some(name), "{name} must pass");
        }
    }
}
