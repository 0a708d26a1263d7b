//! Telescope executor backed by the RTS2 JSON API.
//!
//! The observer pass and the listener only need a handful of controller
//! operations, grouped in [`TelescopeExecutor`]. [`Rts2Client`] drives a real
//! RTS2 installation over HTTP basic auth; [`DryRunExecutor`] records the
//! commands it is given.
//!
//! RTS2 endpoints used:
//!
//! - `GET /api/getall`: every device with its values (`type` 2 is the mount,
//!   `type` 3 the camera, `centrald` carries the night boundaries)
//! - `GET /api/update_target?id=<id>&enabled=<0|1>`
//! - `GET /api/cmd?d=<device>&c=<command>`
//! - `GET /api/set?d=<device>&n=<variable>&v=<value>`

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use qtty::Degrees;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{handle_empty_response, handle_response, ClientError};
use crate::api::{ExposureParameters, ObserverLocation};
use crate::services::report::NightWindow;

/// RTS2 device type of telescope mounts.
const DEVICE_TYPE_MOUNT: i64 = 2;
/// RTS2 device type of CCD cameras.
const DEVICE_TYPE_CCD: i64 = 3;
const CENTRALD: &str = "centrald";

/// Where the telescope is and when tonight's observing window falls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteState {
    pub location: ObserverLocation,
    pub night: NightWindow,
}

/// Operations the bridge needs from the telescope controller.
#[async_trait]
pub trait TelescopeExecutor: Send + Sync {
    /// Observatory position and night boundaries.
    async fn site_state(&self) -> Result<SiteState, ClientError>;

    /// Enable or disable the scheduler target that runs the observer pass.
    async fn set_target_enabled(&self, target_id: i64, enabled: bool) -> Result<(), ClientError>;

    /// Slew to equatorial coordinates.
    async fn point(&self, ra: Degrees, dec: Degrees) -> Result<(), ClientError>;

    /// Acquire `exposure.count` frames labelled with `object`.
    async fn expose(&self, object: &str, exposure: &ExposureParameters) -> Result<(), ClientError>;
}

/// Device names discovered from `/api/getall`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Devices {
    mount: String,
    camera: String,
}

/// HTTP client for the RTS2 JSON API.
#[derive(Debug)]
pub struct Rts2Client {
    base_url: String,
    username: String,
    password: String,
    client: Client,
    devices: RwLock<Option<Devices>>,
}

impl Rts2Client {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            client: Client::new(),
            devices: RwLock::new(None),
        }
    }

    /// Build a request with basic auth.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn get_all(&self) -> Result<Value, ClientError> {
        let response = self.request(Method::GET, "/api/getall").send().await?;
        handle_response(response).await
    }

    async fn devices(&self) -> Result<Devices, ClientError> {
        if let Some(devices) = self.devices.read().clone() {
            return Ok(devices);
        }
        let state = self.get_all().await?;
        let devices = Devices {
            mount: find_device(&state, DEVICE_TYPE_MOUNT)
                .ok_or_else(|| ClientError::InvalidResponse("no telescope device".to_string()))?,
            camera: find_device(&state, DEVICE_TYPE_CCD)
                .ok_or_else(|| ClientError::InvalidResponse("no camera device".to_string()))?,
        };
        debug!("RTS2 devices: mount {}, camera {}", devices.mount, devices.camera);
        *self.devices.write() = Some(devices.clone());
        Ok(devices)
    }

    async fn command(&self, device: &str, command: &str) -> Result<(), ClientError> {
        let response = self
            .request(Method::GET, "/api/cmd")
            .query(&[("d", device), ("c", command)])
            .send()
            .await?;
        handle_empty_response(response).await
    }

    async fn set_value(&self, device: &str, name: &str, value: &str) -> Result<(), ClientError> {
        let response = self
            .request(Method::GET, "/api/set")
            .query(&[("d", device), ("n", name), ("v", value)])
            .send()
            .await?;
        handle_empty_response(response).await
    }
}

#[async_trait]
impl TelescopeExecutor for Rts2Client {
    async fn site_state(&self) -> Result<SiteState, ClientError> {
        parse_site_state(&self.get_all().await?)
    }

    async fn set_target_enabled(&self, target_id: i64, enabled: bool) -> Result<(), ClientError> {
        let response = self
            .request(Method::GET, "/api/update_target")
            .query(&[
                ("id", target_id.to_string()),
                ("enabled", u8::from(enabled).to_string()),
            ])
            .send()
            .await?;
        handle_empty_response(response).await?;
        info!(
            "Successfully {} target {}",
            if enabled { "enabled" } else { "disabled" },
            target_id
        );
        Ok(())
    }

    async fn point(&self, ra: Degrees, dec: Degrees) -> Result<(), ClientError> {
        let devices = self.devices().await?;
        self.command(
            &devices.mount,
            &format!("move {:.6} {:.6}", ra.value(), dec.value()),
        )
        .await
    }

    async fn expose(&self, object: &str, exposure: &ExposureParameters) -> Result<(), ClientError> {
        let devices = self.devices().await?;
        let camera = devices.camera.as_str();
        self.set_value(camera, "exposure", &exposure.exposure_time.value().to_string())
            .await?;
        self.set_value(camera, "FILTER", &exposure.filter).await?;
        self.set_value(camera, "SHUTTER", "LIGHT").await?;
        self.set_value(camera, "OBJECT", object).await?;
        for _ in 0..exposure.count {
            self.command(camera, "expose").await?;
        }
        Ok(())
    }
}

/// Name of the first device of the given RTS2 type.
fn find_device(state: &Value, device_type: i64) -> Option<String> {
    state.as_object()?.iter().find_map(|(name, device)| {
        (device.get("type").and_then(Value::as_i64) == Some(device_type)).then(|| name.clone())
    })
}

fn device_value(state: &Value, device: &str, name: &str) -> Result<f64, ClientError> {
    state
        .get(device)
        .and_then(|d| d.get("d"))
        .and_then(|d| d.get(name))
        .and_then(Value::as_f64)
        .ok_or_else(|| ClientError::InvalidResponse(format!("{} has no value {}", device, name)))
}

/// Extract the site position and night window from a `/api/getall` reply.
pub fn parse_site_state(state: &Value) -> Result<SiteState, ClientError> {
    let mount = find_device(state, DEVICE_TYPE_MOUNT)
        .ok_or_else(|| ClientError::InvalidResponse("no telescope device".to_string()))?;

    let location = ObserverLocation::new(
        device_value(state, &mount, "LATITUDE")?,
        device_value(state, &mount, "LONGITUD")?,
        device_value(state, &mount, "ALTITUDE")?,
    )
    .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

    let night = NightWindow::from_unix(
        device_value(state, CENTRALD, "night_beginning")?,
        device_value(state, CENTRALD, "night_ending")?,
    );

    Ok(SiteState { location, night })
}

/// A command accepted by the [`DryRunExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorCommand {
    SetTargetEnabled { target_id: i64, enabled: bool },
    Point { ra: f64, dec: f64 },
    Expose { object: String, exposure: ExposureParameters },
}

/// Executor that logs and records commands instead of moving a telescope.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    site: Option<SiteState>,
    commands: Mutex<Vec<ExecutorCommand>>,
    failing_pointings: Mutex<usize>,
}

impl DryRunExecutor {
    pub fn new(site: Option<SiteState>) -> Self {
        Self {
            site,
            ..Self::default()
        }
    }

    /// Make the next `count` pointings fail.
    pub fn fail_next_pointings(&self, count: usize) {
        *self.failing_pointings.lock() = count;
    }

    /// Commands received so far.
    pub fn commands(&self) -> Vec<ExecutorCommand> {
        self.commands.lock().clone()
    }

    fn record(&self, command: ExecutorCommand) {
        debug!("dry run: {:?}", command);
        self.commands.lock().push(command);
    }
}

#[async_trait]
impl TelescopeExecutor for DryRunExecutor {
    async fn site_state(&self) -> Result<SiteState, ClientError> {
        self.site
            .ok_or_else(|| ClientError::Unavailable("no site configured for dry run".to_string()))
    }

    async fn set_target_enabled(&self, target_id: i64, enabled: bool) -> Result<(), ClientError> {
        self.record(ExecutorCommand::SetTargetEnabled { target_id, enabled });
        Ok(())
    }

    async fn point(&self, ra: Degrees, dec: Degrees) -> Result<(), ClientError> {
        {
            let mut failing = self.failing_pointings.lock();
            if *failing > 0 {
                *failing -= 1;
                return Err(ClientError::Server("simulated pointing failure".to_string()));
            }
        }
        self.record(ExecutorCommand::Point {
            ra: ra.value(),
            dec: dec.value(),
        });
        Ok(())
    }

    async fn expose(&self, object: &str, exposure: &ExposureParameters) -> Result<(), ClientError> {
        self.record(ExecutorCommand::Expose {
            object: object.to_string(),
            exposure: exposure.clone(),
        });
        Ok(())
    }
}
