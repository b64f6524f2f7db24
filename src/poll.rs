use anyhow::Result;
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::gpx::TrackWriter;
use crate::sleep::{SleepCoordinator, SleepVerdict};
use crate::tracker::DriveTracker;
use crate::vehicle::{VehicleApi, VehicleId};

/// Poll cadence and overrides. Defaults follow the canonical policy:
/// 900ms base tick, 4s extra while parked, 30s quiescent delay while asleep.
#[derive(Clone, Copy, Debug)]
pub struct PollConfig {
    pub base_tick: Duration,
    pub parked_delay: Duration,
    pub asleep_delay: Duration,
    pub force_awake: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            base_tick: Duration::from_millis(900),
            parked_delay: Duration::from_secs(4),
            asleep_delay: Duration::from_secs(30),
            force_awake: false,
        }
    }
}

/// Transient classification of a single poll tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    ProceedingDriving,
    ProceedingNotDriving,
    SkippedBySleepWindow,
    SkippedByAsleep,
    FetchError,
}

/// Top-level cooperative loop tying the API client, the sleep coordinator
/// and the drive tracker together.
pub struct PollLoop<C, W> {
    client: C,
    vehicle: VehicleId,
    writer: Arc<Mutex<W>>,
    coordinator: SleepCoordinator,
    tracker: DriveTracker,
    config: PollConfig,
}

impl<C: VehicleApi, W: TrackWriter> PollLoop<C, W> {
    pub fn new(
        client: C,
        vehicle: VehicleId,
        writer: Arc<Mutex<W>>,
        config: PollConfig,
        single_track: bool,
    ) -> Self {
        PollLoop {
            client,
            vehicle,
            writer,
            coordinator: SleepCoordinator::new(),
            tracker: DriveTracker::new(single_track),
            config,
        }
    }

    /// One poll tick: coarse state, sleep verdict, drive telemetry, track
    /// emission. API errors are recovered per tick; output-stream errors
    /// propagate and end the loop.
    pub async fn tick(&mut self, now: Instant) -> Result<TickOutcome> {
        let snapshot = match self.client.vehicle(self.vehicle).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("couldn't retrieve vehicle state: {:#}", err);
                return Ok(TickOutcome::FetchError);
            }
        };
        debug!("vehicle state {:?}", snapshot.coarse_state);

        match self
            .coordinator
            .evaluate(now, snapshot.coarse_state, self.config.force_awake)
        {
            SleepVerdict::SkipAsleep => return Ok(TickOutcome::SkippedByAsleep),
            SleepVerdict::SkipSleepWindow => return Ok(TickOutcome::SkippedBySleepWindow),
            SleepVerdict::Proceed => {}
        }

        let drive = match self.client.drive_state(self.vehicle).await {
            Ok(drive) => drive,
            Err(err) => {
                // Happens routinely while the vehicle is waking up.
                debug!("couldn't retrieve drive state: {:#}", err);
                return Ok(TickOutcome::FetchError);
            }
        };
        debug!("shift state {:?}", drive.shift_state);

        let outcome = {
            let mut writer = self.writer.lock().unwrap();
            self.tracker.process(drive, &mut *writer)?
        };

        if outcome.driving {
            self.coordinator.note_driving();
            Ok(TickOutcome::ProceedingDriving)
        } else {
            self.coordinator.note_stopped(now);
            Ok(TickOutcome::ProceedingNotDriving)
        }
    }

    /// Runs until the output stream fails or the task is cancelled from
    /// outside (termination signal). A failed API call never ends the loop;
    /// the tick cadence itself is the retry mechanism.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            sleep(self.config.base_tick).await;
            match self.tick(Instant::now()).await? {
                TickOutcome::ProceedingNotDriving => sleep(self.config.parked_delay).await,
                TickOutcome::SkippedByAsleep => sleep(self.config.asleep_delay).await,
                TickOutcome::ProceedingDriving
                | TickOutcome::SkippedBySleepWindow
                | TickOutcome::FetchError => {}
            }
        }
    }
}
