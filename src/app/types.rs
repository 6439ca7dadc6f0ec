use std::fmt;

/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Long-lived parts of the running system whose lifecycle is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    EventLog,
    Pipeline,
    Server,
    Monitor,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::EventLog => "event_log",
            Component::Pipeline => "pipeline",
            Component::Server => "server",
            Component::Monitor => "monitor",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    EndOfStream,
    UserRequest,
}
