//! Home directory: which devices the account can control

use serde::{Deserialize, Deserializer};
use tracing::{error, info, warn};

use crate::authn::token::AccessToken;
use crate::errors::AppError;
use crate::http::client::{error_message, HttpClient};
use crate::models::device::DeviceDescriptor;

/// Home as returned by `/homeManagement/homes`
#[derive(Debug, Clone, Deserialize)]
pub struct HomeRecord {
    #[serde(rename = "homeId", default)]
    pub home_id: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub spaces: Vec<SpaceRecord>,
}

/// Room inside a home
#[derive(Debug, Clone, Deserialize)]
pub struct SpaceRecord {
    #[serde(rename = "Devices", alias = "devices", default, deserialize_with = "null_as_empty")]
    pub devices: Vec<DeviceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: String,

    #[serde(default)]
    pub device_name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub topic: Vec<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl DeviceRecord {
    fn into_descriptor(self, home_id: &str, token: &AccessToken) -> DeviceDescriptor {
        DeviceDescriptor {
            device_id: self.device_id,
            name: self.device_name,
            topics: self.topic,
            home_id: home_id.to_string(),
            token: token.clone(),
        }
    }
}

/// Flatten the home tree into the devices of the first populated space.
///
/// Homes and spaces are walked in order and the walk stops at the first space
/// with at least one device; everything after it is ignored.
pub fn flatten_homes(homes: Vec<HomeRecord>, token: &AccessToken) -> Vec<DeviceDescriptor> {
    homes
        .into_iter()
        .find_map(|home| {
            let home_id = home.home_id;
            home.spaces
                .into_iter()
                .find(|space| !space.devices.is_empty())
                .map(|space| (home_id, space))
        })
        .map(|(home_id, space)| {
            space
                .devices
                .into_iter()
                .map(|device| device.into_descriptor(&home_id, token))
                .collect()
        })
        .unwrap_or_default()
}

impl HttpClient {
    /// Fetch the homes of the logged in account and return its devices
    pub async fn fetch_homes(&self) -> Result<Vec<DeviceDescriptor>, AppError> {
        let url = self.app_url("/homeManagement/homes");
        let response = self.send(self.get(&url)).await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            error!("Fetching homes failed: {} - {}", status, message);
            return Err(AppError::FetchRejected(message));
        }

        let homes: Vec<HomeRecord> = response.json().await?;
        let token = self.token().await.unwrap_or_default();
        let devices = flatten_homes(homes, &token);

        if devices.is_empty() {
            warn!("no devices found");
        } else {
            info!("found {} devices", devices.len());
        }
        Ok(devices)
    }
}
