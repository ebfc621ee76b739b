use serde::{Deserialize, Serialize};

/// An organizational environment the user belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: i64,
    pub name: String,
    /// The user's role within the environment
    pub role: String,
}

/// A room inside an environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(default)]
    pub device_speed: Option<i64>,
}

/// A measured parameter of a room, with its acceptable range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub min_value: f64,
    pub max_value: f64,
}

impl Parameter {
    /// Whether the current value lies within `[min_value, max_value]`
    pub fn in_range(&self) -> bool {
        self.value >= self.min_value && self.value <= self.max_value
    }
}

/// Body of `POST /auth`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "pushToken")]
    pub push_token: String,
}

/// Envelope wrapping list responses
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    /// Absent when the backend sends no payload
    pub data: Option<Vec<T>>,
}
