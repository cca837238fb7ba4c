/// Control events that drive the interactive bridge.
///
/// OS signals are translated into these by [`signals::listen`](crate::signals::listen);
/// callers of [`Session::interact_with`](crate::Session::interact_with) can
/// also send them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// The controlling terminal changed size; propagate it to the pty.
    Resize { rows: u16, cols: u16 },

    /// End the interactive session (interrupt, suspend, ...).
    Terminate,
}

impl ControlEvent {
    /// Create a Resize event
    pub fn resize(rows: u16, cols: u16) -> Self {
        ControlEvent::Resize { rows, cols }
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, ControlEvent::Terminate)
    }
}
