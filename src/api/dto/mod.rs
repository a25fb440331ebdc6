//! Request and response data transfer objects.

pub mod room_dto;

pub use room_dto::{JoinParams, MAX_NAME_CHARS, StatsResponse};
