//! Data models for IoT Apps cloud payloads.
//!
//! - `ApiResponseBase`: the `resultCode` envelope every response carries
//! - Auth types: `LoginResponse`, `SendPasscodeRequest`, `KeyType`, ...
//! - Location types: `Narrative`, `GetNarrativesResponse`, `LocationUsersModel`

pub mod auth;
pub mod common;
pub mod location;

pub use auth::{
    AuthorizationParams, KeyType, LoginResponse, PasswordParams, SendPasscodeRequest,
    SendPasscodeResponse, PASSCODE_DELIVERY_SMS,
};
pub use common::ApiResponseBase;
pub use location::{
    GetNarrativesResponse, LocationAccessLevel, LocationUser, LocationUserSchedule,
    LocationUsersModel, Narrative, NarrativePriority, NarrativeStatus, NarrativeType,
    NarrativeUser, NarrativeUserEmail, NarrativesQuery,
};
