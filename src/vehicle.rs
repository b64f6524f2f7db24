use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub type VehicleId = u64;

/// Coarse power state reported by the vehicle list endpoint.
/// Reading it does not keep the vehicle awake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoarseState {
    Awake,
    Asleep,
    Unknown,
}

impl CoarseState {
    pub fn parse(s: &str) -> Self {
        match s {
            "online" => CoarseState::Awake,
            "asleep" => CoarseState::Asleep,
            _ => CoarseState::Unknown,
        }
    }
}

/// Transmission gear selection. The API reports `null` while parked,
/// which maps to `Park` here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftState {
    Park,
    Drive,
    Reverse,
    Neutral,
    Unknown,
}

impl ShiftState {
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            None | Some("P") => ShiftState::Park,
            Some("D") => ShiftState::Drive,
            Some("R") => ShiftState::Reverse,
            Some("N") => ShiftState::Neutral,
            Some(_) => ShiftState::Unknown,
        }
    }

    /// D, R and N all count as driving.
    pub fn is_driving(self) -> bool {
        matches!(
            self,
            ShiftState::Drive | ShiftState::Reverse | ShiftState::Neutral
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VehicleSnapshot {
    pub coarse_state: CoarseState,
}

/// One drive-telemetry sample. Fetching this keeps the vehicle awake.
#[derive(Clone, Debug, PartialEq)]
pub struct DriveState {
    pub latitude: f64,
    pub longitude: f64,
    pub gps_as_of: i64,
    pub shift_state: ShiftState,
}

/// Contract required from the telemetry API. All calls may fail with a
/// transport or auth error; callers decide whether that is fatal.
pub trait VehicleApi {
    async fn vehicles(&self) -> Result<Vec<VehicleId>>;
    async fn vehicle(&self, id: VehicleId) -> Result<VehicleSnapshot>;
    async fn drive_state(&self, id: VehicleId) -> Result<DriveState>;
    async fn wake(&self, id: VehicleId) -> Result<()>;
}

const DEFAULT_BASE_URL: &str = "https://owner-api.teslamotors.com";

/// Thin HTTP client for the owner API.
pub struct OwnerApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Deserialize)]
struct VehicleRecord {
    id: VehicleId,
    state: String,
}

#[derive(Deserialize)]
struct DriveStateRecord {
    latitude: f64,
    longitude: f64,
    gps_as_of: i64,
    shift_state: Option<String>,
}

impl OwnerApiClient {
    /// Reads a bearer token from `path`. Fails fatally at startup if the
    /// file is missing or empty.
    pub fn from_token_file(path: &Path) -> Result<Self> {
        let token = std::fs::read_to_string(path)
            .with_context(|| format!("couldn't read token file {}", path.display()))?
            .trim()
            .to_string();
        if token.is_empty() {
            anyhow::bail!("token file {} is empty", path.display());
        }
        Ok(OwnerApiClient {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("request to {} failed", path))?
            .error_for_status()
            .with_context(|| format!("request to {} rejected", path))?;
        let envelope: Envelope<T> = resp
            .json()
            .await
            .with_context(|| format!("couldn't decode response from {}", path))?;
        Ok(envelope.response)
    }
}

impl VehicleApi for OwnerApiClient {
    async fn vehicles(&self) -> Result<Vec<VehicleId>> {
        let records: Vec<VehicleRecord> = self.get_json("/api/1/vehicles").await?;
        Ok(records.into_iter().map(|v| v.id).collect())
    }

    async fn vehicle(&self, id: VehicleId) -> Result<VehicleSnapshot> {
        let record: VehicleRecord = self.get_json(&format!("/api/1/vehicles/{}", id)).await?;
        Ok(VehicleSnapshot {
            coarse_state: CoarseState::parse(&record.state),
        })
    }

    async fn drive_state(&self, id: VehicleId) -> Result<DriveState> {
        let record: DriveStateRecord = self
            .get_json(&format!("/api/1/vehicles/{}/data_request/drive_state", id))
            .await?;
        Ok(DriveState {
            latitude: record.latitude,
            longitude: record.longitude,
            gps_as_of: record.gps_as_of,
            shift_state: ShiftState::parse(record.shift_state.as_deref()),
        })
    }

    async fn wake(&self, id: VehicleId) -> Result<()> {
        let url = format!("{}/api/1/vehicles/{}/wake_up", self.base_url, id);
        self.http
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("wake request failed")?
            .error_for_status()
            .context("wake request rejected")?;
        Ok(())
    }
}
