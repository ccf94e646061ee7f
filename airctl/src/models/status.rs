//! Device status and control payloads

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::AppError;

/// Declares a string-backed enum that keeps values it does not recognise.
///
/// The broker is trusted as-is: a firmware that reports a mode we have no
/// variant for must still round-trip, so unknown strings land in `Unknown`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $wire:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Unknown(String),
        }

        impl $name {
            /// Every known value, in menu order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::Unknown(raw) => raw.as_str(),
                }
            }

            /// Human-readable menu label
            pub fn label(&self) -> &str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Unknown(raw) => raw.as_str(),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::Unknown(String::new())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($wire => $name::$variant,)+
                    _ => $name::Unknown(raw),
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Unknown(raw) => raw,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match $name::from(s.to_lowercase()) {
                    $name::Unknown(raw) => Err(format!("Invalid {}: {}", stringify!($name), raw)),
                    known => Ok(known),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Power state as reported in `ps`
    pub enum PowerState {
        On => "on", "ON";
        Off => "off", "OFF";
    }
}

string_enum! {
    /// Operating mode as reported in `acmd`
    pub enum AcMode {
        Auto => "auto", "Auto";
        Dry => "dry", "Dry";
        Fan => "fan", "Fan";
    }
}

string_enum! {
    /// Fan speed as reported in `acfs`
    pub enum FanSpeed {
        Auto => "auto", "Auto";
        Quiet => "quiet", "Quiet";
        Low => "low", "Low";
        Medium => "medium", "Medium";
        High => "high", "High";
    }
}

impl PowerState {
    /// State a power toggle should request next
    pub fn toggled(&self) -> PowerState {
        match self {
            PowerState::On => PowerState::Off,
            _ => PowerState::On,
        }
    }
}

/// Last status pushed by the device on `<topic>/status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "ps", default, deserialize_with = "null_as_default")]
    pub power: PowerState,

    /// Target temperature, a decimal string such as `"24.0"`
    #[serde(rename = "actmp", default, deserialize_with = "null_as_default")]
    pub temperature: String,

    #[serde(rename = "acmd", default, deserialize_with = "null_as_default")]
    pub mode: AcMode,

    #[serde(rename = "acfs", default, deserialize_with = "null_as_default")]
    pub speed: FanSpeed,
}

/// Firmware sends `null` for fields it has nothing to say about
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Status {
    /// Decode a raw status payload
    ///
    /// Only a JSON object is a status; serde would otherwise take a sequence
    /// as the fields in declaration order.
    pub fn from_payload(payload: &[u8]) -> Result<Self, AppError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| AppError::DecodeError(e.to_string()))?;
        if !value.is_object() {
            return Err(AppError::DecodeError(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value(value).map_err(|e| AppError::DecodeError(e.to_string()))
    }

    /// Whole degrees of the target temperature, if it parses
    pub fn temperature_degrees(&self) -> Option<i64> {
        self.temperature
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
            .map(|t| t.trunc() as i64)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Command envelope published on `<topic>/control`.
///
/// The firmware rejects commands without the `ki`/`cnt`/`sid` triple; every
/// other field is sparse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub ki: u8,
    pub cnt: String,
    pub sid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ps: Option<PowerState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actmp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acmd: Option<AcMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acfs: Option<FanSpeed>,
}

impl ControlMessage {
    fn envelope() -> Self {
        Self {
            ki: 1,
            cnt: "an".to_string(),
            sid: "1".to_string(),
            ps: None,
            actmp: None,
            acmd: None,
            acfs: None,
        }
    }

    pub fn power(state: PowerState) -> Self {
        Self {
            ps: Some(state),
            ..Self::envelope()
        }
    }

    /// The firmware wants one decimal place, `22` goes out as `"22.0"`
    pub fn temperature(celsius: i32) -> Self {
        Self {
            actmp: Some(format!("{:.1}", f64::from(celsius))),
            ..Self::envelope()
        }
    }

    pub fn mode(mode: AcMode) -> Self {
        Self {
            acmd: Some(mode),
            ..Self::envelope()
        }
    }

    pub fn speed(speed: FanSpeed) -> Self {
        Self {
            acfs: Some(speed),
            ..Self::envelope()
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, AppError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_temperature_payload() {
        let payload = ControlMessage::temperature(22).to_payload().unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(
            value,
            json!({"ki": 1, "cnt": "an", "sid": "1", "actmp": "22.0"})
        );
    }

    #[test]
    fn test_sparse_payloads() {
        let value: Value =
            serde_json::from_slice(&ControlMessage::mode(AcMode::Dry).to_payload().unwrap())
                .unwrap();
        assert_eq!(value, json!({"ki": 1, "cnt": "an", "sid": "1", "acmd": "dry"}));

        let value: Value =
            serde_json::from_slice(&ControlMessage::speed(FanSpeed::Quiet).to_payload().unwrap())
                .unwrap();
        assert_eq!(value, json!({"ki": 1, "cnt": "an", "sid": "1", "acfs": "quiet"}));

        let value: Value =
            serde_json::from_slice(&ControlMessage::power(PowerState::Off).to_payload().unwrap())
                .unwrap();
        assert_eq!(value, json!({"ki": 1, "cnt": "an", "sid": "1", "ps": "off"}));
    }

    #[test]
    fn test_status_accepts_unknown_values() {
        let status =
            Status::from_payload(br#"{"ps":"on","actmp":"31.5","acmd":"cool","acfs":"turbo"}"#)
                .unwrap();
        assert_eq!(status.power, PowerState::On);
        assert_eq!(status.mode, AcMode::Unknown("cool".to_string()));
        assert_eq!(status.speed, FanSpeed::Unknown("turbo".to_string()));
        assert_eq!(status.temperature_degrees(), Some(31));
        assert_eq!(String::from(status.mode), "cool");
    }

    #[test]
    fn test_status_rejects_malformed_payloads() {
        assert!(matches!(
            Status::from_payload(b"not json"),
            Err(AppError::DecodeError(_))
        ));
        assert!(Status::from_payload(br#"{"ps":5}"#).is_err());
        assert!(Status::from_payload(br#"["on"]"#).is_err());
        let payloads: [&[u8]; 4] = [b"[]", b"null", b"\"on\"", b"42"];
        for payload in payloads {
            assert!(matches!(
                Status::from_payload(payload),
                Err(AppError::DecodeError(_))
            ));
        }
    }

    #[test]
    fn test_status_null_fields_fall_back_to_defaults() {
        let status =
            Status::from_payload(br#"{"ps":"on","actmp":null,"acmd":"fan","acfs":"auto"}"#)
                .unwrap();
        assert_eq!(status.power, PowerState::On);
        assert_eq!(status.temperature, "");
        assert_eq!(status.mode, AcMode::Fan);
        assert_eq!(status.speed, FanSpeed::Auto);

        let status = Status::from_payload(br#"{"ps":null,"acmd":null,"acfs":null}"#).unwrap();
        assert_eq!(status, Status::default());
    }

    #[test]
    fn test_temperature_degrees() {
        let mut status = Status::default();
        assert_eq!(status.temperature_degrees(), None);
        status.temperature = "24.9".to_string();
        assert_eq!(status.temperature_degrees(), Some(24));
        status.temperature = "warm".to_string();
        assert_eq!(status.temperature_degrees(), None);
    }

    #[test]
    fn test_toggled_alternates() {
        assert_eq!(PowerState::On.toggled(), PowerState::Off);
        assert_eq!(PowerState::Off.toggled(), PowerState::On);
        assert_eq!(PowerState::default().toggled(), PowerState::On);
    }

    #[test]
    fn test_parse_from_cli() {
        assert_eq!("High".parse::<FanSpeed>().unwrap(), FanSpeed::High);
        assert!("cool".parse::<AcMode>().is_err());
    }
}
