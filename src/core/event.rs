//! Host-facing events
//!
//! Every callback runs on the dispatch context, i.e. the thread that drives
//! [`Session::process_output`](super::session::Session::process_output).

use std::sync::mpsc::Sender;

use super::term::ParseError;

/// Events raised while interpreting shell output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// BEL received in ground state
    Bell,
    /// OSC 0/1/2
    TitleChanged(String),
    /// Recoverable parser failure; the offending bytes were dropped
    ParseError(ParseError),
}

/// Callbacks for a terminal host. All methods default to no-ops.
pub trait TerminalListener: Send {
    fn on_bell(&mut self) {}

    fn on_title_changed(&mut self, _title: &str) {}

    /// Fired once after each processed input chunk
    fn on_screen_updated(&mut self) {}

    /// Fired when the child process exits (not on read errors)
    fn on_session_finished(&mut self, _exit_code: i32) {}

    fn on_parse_error(&mut self, _error: &ParseError) {}

    /// Route a parser event to the matching callback
    fn dispatch(&mut self, event: TerminalEvent) {
        match event {
            TerminalEvent::Bell => self.on_bell(),
            TerminalEvent::TitleChanged(title) => self.on_title_changed(&title),
            TerminalEvent::ParseError(error) => self.on_parse_error(&error),
        }
    }
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl TerminalListener for NoopListener {}

/// Session events, for hosts that prefer a channel over callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Bell,
    TitleChanged(String),
    /// Screen updated
    Output,
    /// Session has exited
    Exited(i32),
    Error(String),
}

impl TerminalListener for Sender<SessionEvent> {
    fn on_bell(&mut self) {
        let _ = self.send(SessionEvent::Bell);
    }

    fn on_title_changed(&mut self, title: &str) {
        let _ = self.send(SessionEvent::TitleChanged(title.to_string()));
    }

    fn on_screen_updated(&mut self) {
        let _ = self.send(SessionEvent::Output);
    }

    fn on_session_finished(&mut self, exit_code: i32) {
        let _ = self.send(SessionEvent::Exited(exit_code));
    }

    fn on_parse_error(&mut self, error: &ParseError) {
        let _ = self.send(SessionEvent::Error(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_channel_listener_forwards() {
        let (tx, rx) = mpsc::channel();
        let mut listener = tx;

        listener.dispatch(TerminalEvent::Bell);
        listener.dispatch(TerminalEvent::TitleChanged("vim".to_string()));
        listener.on_session_finished(3);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SessionEvent::Bell,
                SessionEvent::TitleChanged("vim".to_string()),
                SessionEvent::Exited(3),
            ]
        );
    }
}
