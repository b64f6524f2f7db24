use log::debug;
use std::time::{Duration, Instant};

use crate::vehicle::CoarseState;

/// How long to keep polling normally after the vehicle stops driving.
pub const STAY_AWAKE_AFTER_DRIVING: Duration = Duration::from_secs(30 * 60);
/// How long to suppress polling so the vehicle can fall asleep.
pub const TRY_TO_SLEEP: Duration = Duration::from_secs(15 * 60);

/// Per-tick decision from the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SleepVerdict {
    /// Fetch drive telemetry this tick (keeps the vehicle awake).
    Proceed,
    /// Vehicle is already asleep; leave it alone.
    SkipAsleep,
    /// A sleep-attempt window is active; suppress telemetry polling.
    SkipSleepWindow,
}

/// Expiry instants for the stay-awake / try-to-sleep cycle.
/// At most one of the two is ever set.
#[derive(Clone, Copy, Debug, Default)]
pub struct SleepTimers {
    pub stay_awake_until: Option<Instant>,
    pub try_sleep_until: Option<Instant>,
}

impl SleepTimers {
    pub fn clear(&mut self) {
        self.stay_awake_until = None;
        self.try_sleep_until = None;
    }

    pub fn none_set(&self) -> bool {
        self.stay_awake_until.is_none() && self.try_sleep_until.is_none()
    }
}

/// Decides, once per poll tick, whether the vehicle should be queried for
/// drive telemetry or left alone so it can enter low-power sleep.
pub struct SleepCoordinator {
    timers: SleepTimers,
    stay_awake_duration: Duration,
    try_sleep_duration: Duration,
}

impl SleepCoordinator {
    pub fn new() -> Self {
        SleepCoordinator {
            timers: SleepTimers::default(),
            stay_awake_duration: STAY_AWAKE_AFTER_DRIVING,
            try_sleep_duration: TRY_TO_SLEEP,
        }
    }

    #[cfg(test)]
    fn with_durations(stay_awake: Duration, try_sleep: Duration) -> Self {
        SleepCoordinator {
            timers: SleepTimers::default(),
            stay_awake_duration: stay_awake,
            try_sleep_duration: try_sleep,
        }
    }

    pub fn timers(&self) -> &SleepTimers {
        &self.timers
    }

    /// Must be called exactly once per tick, before any telemetry fetch.
    pub fn evaluate(
        &mut self,
        now: Instant,
        coarse_state: CoarseState,
        force_awake: bool,
    ) -> SleepVerdict {
        if force_awake {
            // Explicit wake-up mode overrides all sleep logic.
            return SleepVerdict::Proceed;
        }

        self.advance(now);

        if coarse_state == CoarseState::Asleep {
            self.timers.clear();
            debug!("vehicle is sleeping, not polling until it wakes up");
            return SleepVerdict::SkipAsleep;
        }

        if self.timers.try_sleep_until.is_some() {
            debug!("waiting for the vehicle to go to sleep; a drive starting now may be missed");
            return SleepVerdict::SkipSleepWindow;
        }

        SleepVerdict::Proceed
    }

    /// Timer expiry cascade. Applied even on ticks that end in a skip, so
    /// the cycle self-advances without telemetry.
    fn advance(&mut self, now: Instant) {
        if let Some(expiry) = self.timers.stay_awake_until {
            if now > expiry {
                debug!("stay-awake timer expired, starting sleep-attempt window");
                self.timers.stay_awake_until = None;
                self.timers.try_sleep_until = Some(now + self.try_sleep_duration);
            }
        }
        if let Some(expiry) = self.timers.try_sleep_until {
            if now > expiry {
                debug!("sleep-attempt window lapsed, restarting stay-awake timer");
                self.timers.try_sleep_until = None;
                self.timers.stay_awake_until = Some(now + self.stay_awake_duration);
            }
        }
    }

    /// The vehicle is driving; no sleep cycle while active.
    pub fn note_driving(&mut self) {
        if !self.timers.none_set() {
            debug!("vehicle is active, stopping sleep timers");
            self.timers.clear();
        }
    }

    /// The vehicle just stopped (or is still parked); start the inactivity
    /// countdown unless a cycle is already running.
    pub fn note_stopped(&mut self, now: Instant) {
        if self.timers.none_set() {
            debug!("vehicle became inactive, setting stay-awake timer");
            self.timers.stay_awake_until = Some(now + self.stay_awake_duration);
        }
    }
}

impl Default for SleepCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exclusive(timers: &SleepTimers) -> bool {
        !(timers.stay_awake_until.is_some() && timers.try_sleep_until.is_some())
    }

    #[test]
    fn test_proceeds_with_no_timers() {
        let mut coord = SleepCoordinator::new();
        let verdict = coord.evaluate(Instant::now(), CoarseState::Awake, false);
        assert_eq!(verdict, SleepVerdict::Proceed);
        assert!(coord.timers().none_set());
    }

    #[test]
    fn test_asleep_skips_and_clears_timers() {
        let mut coord = SleepCoordinator::new();
        let now = Instant::now();
        coord.note_stopped(now);
        assert!(coord.timers().stay_awake_until.is_some());

        let verdict = coord.evaluate(now, CoarseState::Asleep, false);
        assert_eq!(verdict, SleepVerdict::SkipAsleep);
        assert!(coord.timers().none_set());
    }

    #[test]
    fn test_stay_awake_expiry_opens_sleep_window() {
        let mut coord = SleepCoordinator::new();
        let start = Instant::now();
        coord.note_stopped(start);

        // Still inside the stay-awake window: polling continues.
        let mid = start + Duration::from_secs(10 * 60);
        assert_eq!(
            coord.evaluate(mid, CoarseState::Awake, false),
            SleepVerdict::Proceed
        );

        // One second past expiry: window flips and the tick is suppressed.
        let late = start + STAY_AWAKE_AFTER_DRIVING + Duration::from_secs(1);
        assert_eq!(
            coord.evaluate(late, CoarseState::Awake, false),
            SleepVerdict::SkipSleepWindow
        );
        assert_eq!(coord.timers().stay_awake_until, None);
        assert_eq!(coord.timers().try_sleep_until, Some(late + TRY_TO_SLEEP));
    }

    #[test]
    fn test_sleep_window_lapse_restarts_cycle() {
        let mut coord = SleepCoordinator::with_durations(
            Duration::from_secs(30),
            Duration::from_secs(15),
        );
        let start = Instant::now();
        coord.note_stopped(start);

        let t1 = start + Duration::from_secs(31);
        assert_eq!(
            coord.evaluate(t1, CoarseState::Awake, false),
            SleepVerdict::SkipSleepWindow
        );

        // Vehicle never fell asleep; after the 15s window the stay-awake
        // timer starts over and polling resumes.
        let t2 = t1 + Duration::from_secs(16);
        assert_eq!(
            coord.evaluate(t2, CoarseState::Awake, false),
            SleepVerdict::Proceed
        );
        assert_eq!(
            coord.timers().stay_awake_until,
            Some(t2 + Duration::from_secs(30))
        );
        assert_eq!(coord.timers().try_sleep_until, None);
    }

    #[test]
    fn test_force_awake_never_touches_timers() {
        let mut coord = SleepCoordinator::new();
        let start = Instant::now();
        coord.note_stopped(start);
        let before = *coord.timers();

        let late = start + STAY_AWAKE_AFTER_DRIVING + Duration::from_secs(5);
        assert_eq!(
            coord.evaluate(late, CoarseState::Asleep, true),
            SleepVerdict::Proceed
        );
        assert_eq!(coord.timers().stay_awake_until, before.stay_awake_until);
        assert_eq!(coord.timers().try_sleep_until, before.try_sleep_until);
    }

    #[test]
    fn test_driving_clears_timers() {
        let mut coord = SleepCoordinator::new();
        coord.note_stopped(Instant::now());
        coord.note_driving();
        assert!(coord.timers().none_set());
    }

    #[test]
    fn test_note_stopped_does_not_restart_running_timer() {
        let mut coord = SleepCoordinator::new();
        let start = Instant::now();
        coord.note_stopped(start);
        let first = coord.timers().stay_awake_until;

        coord.note_stopped(start + Duration::from_secs(60));
        assert_eq!(coord.timers().stay_awake_until, first);
    }

    #[test]
    fn test_timers_never_both_set() {
        let mut coord = SleepCoordinator::with_durations(
            Duration::from_secs(30),
            Duration::from_secs(15),
        );
        let start = Instant::now();
        let states = [
            CoarseState::Awake,
            CoarseState::Awake,
            CoarseState::Asleep,
            CoarseState::Awake,
            CoarseState::Unknown,
            CoarseState::Awake,
        ];

        let mut now = start;
        coord.note_stopped(now);
        for (i, state) in states.iter().cycle().take(40).enumerate() {
            now = start + Duration::from_secs(10 * i as u64);
            coord.evaluate(now, *state, false);
            assert!(exclusive(coord.timers()));
            if i % 7 == 0 {
                coord.note_stopped(now);
                assert!(exclusive(coord.timers()));
            }
        }
    }
}
