//! DTOs for the room endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::HubError;

/// Longest accepted display name, in characters.
pub const MAX_NAME_CHARS: usize = 64;

/// Name used when the client does not supply one.
const ANONYMOUS: &str = "anonymous";

/// Query parameters of `GET /room`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JoinParams {
    /// Display name shown to other clients. Defaults to `anonymous`.
    pub name: Option<String>,
}

impl JoinParams {
    /// Returns the validated, trimmed display name.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidName`] if the supplied name is blank or
    /// longer than [`MAX_NAME_CHARS`] characters.
    pub fn display_name(&self) -> Result<String, HubError> {
        let Some(raw) = self.name.as_deref() else {
            return Ok(ANONYMOUS.to_string());
        };
        let name = raw.trim();
        if name.is_empty() {
            return Err(HubError::InvalidName("must not be empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(HubError::InvalidName(format!(
                "must be at most {MAX_NAME_CHARS} characters"
            )));
        }
        Ok(name.to_string())
    }
}

/// Response of `GET /room/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    /// Registrations currently in the hub's client set.
    pub clients: usize,
}
