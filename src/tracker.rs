use anyhow::Result;
use log::{debug, info};

use crate::gpx::{gps_time, TrackWriter};
use crate::vehicle::DriveState;

/// Result of processing one drive-telemetry sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriveOutcome {
    pub driving: bool,
    pub emitted: bool,
}

/// Turns drive-telemetry samples into track-log records: detects
/// driving/parked edges, opens and closes segments, and drops consecutive
/// identical position reports.
pub struct DriveTracker {
    prev: Option<DriveState>,
    segment_open: bool,
    single_track: bool,
}

impl DriveTracker {
    pub fn new(single_track: bool) -> Self {
        DriveTracker {
            prev: None,
            // In single-track mode the segment is opened once by the GPX
            // header and stays open for the process lifetime.
            segment_open: single_track,
            single_track,
        }
    }

    pub fn prev(&self) -> Option<&DriveState> {
        self.prev.as_ref()
    }

    /// Whether a track segment is currently open. Points are only ever
    /// emitted while this holds.
    pub fn segment_open(&self) -> bool {
        self.segment_open
    }

    pub fn process<W: TrackWriter + ?Sized>(
        &mut self,
        drive: DriveState,
        writer: &mut W,
    ) -> Result<DriveOutcome> {
        let was_driving = self
            .prev
            .as_ref()
            .map(|p| p.shift_state.is_driving())
            .unwrap_or(false);
        let driving = drive.shift_state.is_driving();
        let mut emitted = false;

        if driving {
            if !was_driving {
                if !self.single_track {
                    info!("vehicle became active, opening track segment");
                    writer.open_segment()?;
                    self.segment_open = true;
                }
            }

            let duplicate = self.prev.as_ref().is_some_and(|p| {
                p.shift_state.is_driving()
                    && p.latitude == drive.latitude
                    && p.longitude == drive.longitude
                    && p.gps_as_of == drive.gps_as_of
            });
            if duplicate {
                debug!("unchanged position sample, skipping point");
            } else {
                writer.write_point(drive.latitude, drive.longitude, gps_time(drive.gps_as_of))?;
                emitted = true;
            }
        } else if was_driving && !self.single_track {
            info!("vehicle became inactive, closing track segment");
            writer.close_segment()?;
            self.segment_open = false;
        }

        self.prev = Some(drive);
        Ok(DriveOutcome { driving, emitted })
    }
}
