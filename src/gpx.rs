use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::io::{self, Write};

const CREATOR: &str = "drivelog";

/// Sink for track-log records. One implementation writes GPX text; tests
/// substitute a recording fake.
pub trait TrackWriter {
    fn open_segment(&mut self) -> io::Result<()>;
    fn close_segment(&mut self) -> io::Result<()>;
    fn write_point(&mut self, latitude: f64, longitude: f64, time: DateTime<Utc>)
        -> io::Result<()>;
}

/// Renders an epoch-seconds GPS timestamp as RFC3339 UTC.
pub fn gps_time(epoch_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch_secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Streaming GPX emitter. The header goes out once at startup, the footer
/// exactly once via `finish`, whichever exit path runs first.
pub struct GpxWriter<W: Write> {
    out: W,
    in_segment: bool,
    finished: bool,
}

impl<W: Write> GpxWriter<W> {
    pub fn new(out: W) -> Self {
        GpxWriter {
            out,
            in_segment: false,
            finished: false,
        }
    }

    pub fn write_header(&mut self, single_track: bool) -> io::Result<()> {
        self.out
            .write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
        writeln!(
            self.out,
            "<gpx version=\"1.1\" creator=\"{}\" xmlns=\"http://www.topografix.com/GPX/1/1\">",
            CREATOR
        )?;
        if single_track {
            self.open_segment()?;
        }
        self.out.flush()
    }

    /// Closes an open segment and the root element. Safe to call from both
    /// the loop exit path and the signal path; only the first call emits.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.in_segment {
            self.close_segment()?;
        }
        self.out.write_all(b"</gpx>\n")?;
        self.out.flush()?;
        self.finished = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TrackWriter for GpxWriter<W> {
    fn open_segment(&mut self) -> io::Result<()> {
        self.out.write_all(b"<trk>\n<trkseg>\n")?;
        self.in_segment = true;
        self.out.flush()
    }

    fn close_segment(&mut self) -> io::Result<()> {
        self.out.write_all(b"</trkseg>\n</trk>\n")?;
        self.in_segment = false;
        self.out.flush()
    }

    fn write_point(
        &mut self,
        latitude: f64,
        longitude: f64,
        time: DateTime<Utc>,
    ) -> io::Result<()> {
        // One record, one write: finalization from the signal path must
        // never interleave mid-point.
        let record = format!(
            "<trkpt lat=\"{}\" lon=\"{}\">\n<time>{}</time>\n</trkpt>\n",
            latitude,
            longitude,
            time.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        self.out.write_all(record.as_bytes())?;
        self.out.flush()
    }
}
