//! Stream lifecycle shared by both tools.
//!
//! ```text
//! Idle --start--> Running --request_stop--> Stopping --finish_stop--> Idle
//! ```

use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamState {
    /// No active stream.
    #[default]
    Idle,
    /// Polling and rendering on a cadence.
    Running,
    /// Shutdown requested; waiting for acquisition to exit and the camera to be released.
    Stopping,
}

#[derive(Clone, Debug, Default)]
pub struct StreamController {
    state: StreamState,
    starts: u32,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == StreamState::Running
    }

    /// Number of Idle -> Running transitions so far.
    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(StreamState::Idle, StreamState::Running)?;
        self.starts += 1;
        Ok(())
    }

    pub fn request_stop(&mut self) -> Result<()> {
        self.transition(StreamState::Running, StreamState::Stopping)
    }

    pub fn finish_stop(&mut self) -> Result<()> {
        self.transition(StreamState::Stopping, StreamState::Idle)
    }

    fn transition(&mut self, from: StreamState, to: StreamState) -> Result<()> {
        if self.state != from {
            return Err(anyhow!(
                "invalid stream transition {:?} -> {:?} (current state {:?})",
                from,
                to,
                self.state
            ));
        }
        log::debug!("stream state {:?} -> {:?}", from, to);
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() -> Result<()> {
        let mut ctl = StreamController::new();
        assert_eq!(ctl.state(), StreamState::Idle);
        ctl.start()?;
        assert!(ctl.is_running());
        ctl.request_stop()?;
        assert_eq!(ctl.state(), StreamState::Stopping);
        ctl.finish_stop()?;
        assert_eq!(ctl.state(), StreamState::Idle);
        ctl.start()?;
        assert_eq!(ctl.starts(), 2);
        Ok(())
    }

    #[test]
    fn rejects_out_of_order_transitions() {
        let mut ctl = StreamController::new();
        assert!(ctl.request_stop().is_err());
        assert!(ctl.finish_stop().is_err());
        ctl.start().unwrap();
        assert!(ctl.start().is_err());
        assert!(ctl.finish_stop().is_err());
        assert_eq!(ctl.state(), StreamState::Running);
    }
}
