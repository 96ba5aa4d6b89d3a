use tracing::info;

use crate::backend::CallState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptionAction {
    Pause,
    Resume,
    Nothing,
}

/// Tracks why playback was suspended by the platform. A call and a headset unplug are
/// separate reasons; playback comes back only once neither applies.
#[derive(Debug, Default, Clone)]
pub struct InterruptionCoordinator {
    stopped_by_call: bool,
    stopped_by_plug: bool,
    headset: Option<bool>,
}

impl InterruptionCoordinator {
    pub fn stopped_by_call(&self) -> bool {
        self.stopped_by_call
    }

    pub fn stopped_by_plug(&self) -> bool {
        self.stopped_by_plug
    }

    pub fn is_interrupted(&self) -> bool {
        self.stopped_by_call || self.stopped_by_plug
    }

    /// Forget both reasons. The last known headset state is kept.
    pub fn clear(&mut self) {
        self.stopped_by_call = false;
        self.stopped_by_plug = false;
    }

    pub fn on_call(&mut self, state: CallState, playing: bool) -> InterruptionAction {
        match state {
            CallState::Ringing | CallState::Active => {
                if playing {
                    self.stopped_by_call = true;
                    info!("Sound stopped by call");
                    InterruptionAction::Pause
                } else {
                    if self.stopped_by_plug {
                        self.stopped_by_call = true;
                    }
                    InterruptionAction::Nothing
                }
            }
            CallState::Idle => {
                if !self.stopped_by_call {
                    return InterruptionAction::Nothing;
                }
                self.stopped_by_call = false;
                if self.stopped_by_plug {
                    info!("Call ended; headset still unplugged");
                    InterruptionAction::Nothing
                } else {
                    info!("Sound resumed after call");
                    InterruptionAction::Resume
                }
            }
        }
    }

    /// Only transitions count; the first report just records the current state.
    pub fn on_headset(&mut self, plugged: bool, playing: bool) -> InterruptionAction {
        let previous = self.headset.replace(plugged);
        match (previous, plugged) {
            (Some(true), false) => {
                if playing {
                    self.stopped_by_plug = true;
                    info!("Headset plug removed. Song paused");
                    InterruptionAction::Pause
                } else {
                    if self.stopped_by_call {
                        self.stopped_by_plug = true;
                    }
                    InterruptionAction::Nothing
                }
            }
            (Some(false), true) => {
                if !self.stopped_by_plug {
                    return InterruptionAction::Nothing;
                }
                self.stopped_by_plug = false;
                if self.stopped_by_call {
                    info!("Headset plugged back; call still in progress");
                    InterruptionAction::Nothing
                } else {
                    info!("Headset plugged back. Song resumed");
                    InterruptionAction::Resume
                }
            }
            _ => InterruptionAction::Nothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugged() -> InterruptionCoordinator {
        let mut coordinator = InterruptionCoordinator::default();
        assert_eq!(coordinator.on_headset(true, true), InterruptionAction::Nothing);
        coordinator
    }

    #[test]
    fn call_pauses_and_idle_resumes() {
        let mut coordinator = plugged();
        assert_eq!(
            coordinator.on_call(CallState::Ringing, true),
            InterruptionAction::Pause
        );
        assert_eq!(
            coordinator.on_call(CallState::Active, false),
            InterruptionAction::Nothing
        );
        assert!(coordinator.stopped_by_call());
        assert_eq!(
            coordinator.on_call(CallState::Idle, false),
            InterruptionAction::Resume
        );
        assert!(!coordinator.is_interrupted());
    }

    #[test]
    fn call_while_paused_by_user_is_ignored() {
        let mut coordinator = plugged();
        assert_eq!(
            coordinator.on_call(CallState::Ringing, false),
            InterruptionAction::Nothing
        );
        assert_eq!(
            coordinator.on_call(CallState::Idle, false),
            InterruptionAction::Nothing
        );
    }

    #[test]
    fn both_reasons_must_clear_before_resuming() {
        let mut coordinator = plugged();
        assert_eq!(
            coordinator.on_call(CallState::Ringing, true),
            InterruptionAction::Pause
        );
        assert_eq!(coordinator.on_headset(false, false), InterruptionAction::Nothing);
        assert!(coordinator.stopped_by_call() && coordinator.stopped_by_plug());

        assert_eq!(coordinator.on_headset(true, false), InterruptionAction::Nothing);
        assert!(coordinator.stopped_by_call());
        assert_eq!(
            coordinator.on_call(CallState::Idle, false),
            InterruptionAction::Resume
        );
    }

    #[test]
    fn unplug_then_call_waits_for_the_headset() {
        let mut coordinator = plugged();
        assert_eq!(coordinator.on_headset(false, true), InterruptionAction::Pause);
        assert_eq!(
            coordinator.on_call(CallState::Ringing, false),
            InterruptionAction::Nothing
        );
        assert_eq!(
            coordinator.on_call(CallState::Idle, false),
            InterruptionAction::Nothing
        );
        assert_eq!(coordinator.on_headset(true, false), InterruptionAction::Resume);
    }

    #[test]
    fn first_headset_report_is_not_a_transition() {
        let mut coordinator = InterruptionCoordinator::default();
        assert_eq!(coordinator.on_headset(false, true), InterruptionAction::Nothing);
        assert!(!coordinator.stopped_by_plug());
    }
}
