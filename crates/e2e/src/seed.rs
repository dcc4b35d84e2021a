//! Browser storage seed injected before the quiz page loads
//!
//! The quiz page refuses to start without a reservation in `sessionStorage`,
//! so the run plants one (plus the matching `localStorage` record) through a
//! script that the browser evaluates on every new document, ahead of any
//! page script.

use serde::{Deserialize, Serialize};

/// Session storage key the quiz page reads its reservation id from.
pub const RESERVATION_ID_KEY: &str = "reservationId";

/// Reservation state planted into browser storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSeed {
    /// Value stored under `sessionStorage.reservationId`
    pub reservation_id: String,

    /// Guest name stored in the reservation record
    pub name: String,

    /// Prefix joined with the id to form the `localStorage` key
    pub storage_key_prefix: String,
}

impl Default for SessionSeed {
    fn default() -> Self {
        Self {
            reservation_id: "verify-ui-123".to_string(),
            name: "Test User".to_string(),
            storage_key_prefix: "reservation_".to_string(),
        }
    }
}

impl SessionSeed {
    /// `localStorage` key holding the reservation record
    pub fn storage_key(&self) -> String {
        format!("{}{}", self.storage_key_prefix, self.reservation_id)
    }

    /// Serialized reservation record, exactly as the page will read it back
    pub fn record_json(&self) -> String {
        serde_json::json!({ "id": self.reservation_id, "name": self.name }).to_string()
    }

    /// Render the init script.
    ///
    /// Every literal goes through JSON string encoding, which is also valid
    /// JavaScript string syntax, so ids and names are inserted verbatim.
    pub fn init_script(&self) -> String {
        format!(
            "(() => {{\n  sessionStorage.setItem({}, {});\n  localStorage.setItem({}, {});\n}})();\n",
            js_string(RESERVATION_ID_KEY),
            js_string(&self.reservation_id),
            js_string(&self.storage_key()),
            js_string(&self.record_json()),
        )
    }
}

/// Quote a value as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
