//! Streams a GPX track-log of a vehicle's position by polling its telemetry
//! API, while coordinating with the vehicle's sleep state so that polling
//! does not keep it awake between drives.

pub mod gpx;
pub mod poll;
pub mod sleep;
pub mod tracker;
pub mod vehicle;

pub use gpx::{GpxWriter, TrackWriter};
pub use poll::{PollConfig, PollLoop, TickOutcome};
pub use sleep::{SleepCoordinator, SleepVerdict};
pub use tracker::{DriveOutcome, DriveTracker};
pub use vehicle::{CoarseState, DriveState, OwnerApiClient, ShiftState, VehicleApi, VehicleId};
