// Safety supervisor: everything between a decoded sample and the solver

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::Pose;

mod slew;
mod watchdog;

pub use slew::{SlewLimiter, SlewSteps};
pub use watchdog::Watchdog;

pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(500);

/// Slew limiting, loss-of-signal watchdog and soft e-stop homing.
///
/// Samples go through [`Supervisor::on_sample`]; the periodic activity calls
/// [`Supervisor::tick`], which yields a pose whenever the supervisor itself
/// is driving the platform (homing after a watchdog trip or soft stop).
#[derive(Debug, Clone)]
pub struct Supervisor {
    slew: SlewLimiter,
    watchdog: Watchdog,
    homing: bool,
}

impl Supervisor {
    pub fn new(steps: SlewSteps, timeout: Duration) -> Self {
        Self {
            slew: SlewLimiter::new(steps),
            watchdog: Watchdog::new(timeout),
            homing: false,
        }
    }

    /// A decoded sample arrived: feed the watchdog, cancel any homing ramp
    /// and step toward `target`.
    pub fn on_sample(&mut self, target: &Pose, now: Instant) -> Pose {
        self.watchdog.feed(now);
        self.homing = false;
        self.slew.advance(target)
    }

    /// Begin ramping to home; returns the first step.
    pub fn soft_stop(&mut self) -> Pose {
        self.homing = true;
        self.step_home()
    }

    /// Jump straight to home, discarding the smoothed state.
    pub fn hard_home(&mut self) -> Pose {
        self.homing = false;
        self.slew.reset_to(Pose::HOME);
        Pose::HOME
    }

    /// Periodic check. Returns the pose to command when the supervisor is
    /// homing, `None` when samples are in control.
    pub fn tick(&mut self, now: Instant) -> Option<Pose> {
        if self.watchdog.check(now) {
            warn!(
                timeout_ms = self.watchdog.timeout().as_millis() as u64,
                "input lost, homing"
            );
            self.homing = true;
        }
        if self.homing {
            Some(self.step_home())
        } else {
            None
        }
    }

    fn step_home(&mut self) -> Pose {
        let pose = self.slew.advance(&Pose::HOME);
        if pose.is_home() {
            debug!("reached home");
            self.homing = false;
        }
        pose
    }

    pub fn is_homing(&self) -> bool {
        self.homing
    }

    pub fn watchdog_fired(&self) -> bool {
        self.watchdog.fired()
    }

    pub fn steps(&self) -> SlewSteps {
        self.slew.steps()
    }

    pub fn set_steps(&mut self, steps: SlewSteps) {
        self.slew.set_steps(steps);
    }

    pub fn current(&self) -> Option<Pose> {
        self.slew.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor() -> Supervisor {
        Supervisor::new(SlewSteps::new(0.5, 0.05), DEFAULT_WATCHDOG_TIMEOUT)
    }

    #[test]
    fn watchdog_homes_after_silence() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        let target = Pose::new([1.0, 0.0, 0.0, 0.1, 0.0, 0.0]);
        assert_eq!(sup.on_sample(&target, t0), target);

        assert_eq!(sup.tick(t0 + Duration::from_millis(400)), None);

        let first = sup.tick(t0 + Duration::from_millis(600)).unwrap();
        assert_eq!(first, Pose::new([0.5, 0.0, 0.0, 0.05, 0.0, 0.0]));
        assert!(sup.watchdog_fired());

        let second = sup.tick(t0 + Duration::from_millis(620)).unwrap();
        assert!(second.is_home());
        assert!(!sup.is_homing());
        assert_eq!(sup.tick(t0 + Duration::from_millis(640)), None);
    }

    #[test]
    fn sample_cancels_homing() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        sup.on_sample(&Pose::new([3.0, 0.0, 0.0, 0.0, 0.0, 0.0]), t0);
        sup.soft_stop();
        assert!(sup.is_homing());

        let resumed = sup.on_sample(&Pose::new([3.0, 0.0, 0.0, 0.0, 0.0, 0.0]), t0);
        assert!(!sup.is_homing());
        assert_eq!(resumed.0[0], 3.0);
        assert!(!sup.watchdog_fired());
    }

    #[test]
    fn soft_stop_ramps_through_slew() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        sup.on_sample(&Pose::new([2.0, 0.0, 0.0, 0.0, 0.0, 0.0]), t0);
        assert_eq!(sup.soft_stop().0[0], 1.5);

        let mut ticks = 0;
        while let Some(pose) = sup.tick(t0 + Duration::from_millis(10)) {
            ticks += 1;
            if pose.is_home() {
                break;
            }
        }
        assert_eq!(ticks, 3);
    }

    #[test]
    fn hard_home_is_immediate() {
        let mut sup = supervisor();
        sup.on_sample(&Pose::new([2.0, 2.0, 2.0, 0.3, 0.3, 0.3]), Instant::now());
        assert!(sup.hard_home().is_home());
        assert_eq!(sup.current(), Some(Pose::HOME));
        assert!(!sup.is_homing());
    }
}
