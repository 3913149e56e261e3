//! Status codes returned across the plugin boundary.
//!
//! The numeric values are part of the ABI: plugins compiled against any
//! interface version compare the raw integers, so variants may be added but
//! never renumbered.

use thiserror::Error;

/// Raw status as it crosses the C boundary.
pub type ErrorRaw = i32;

/// Raw value of a successful call.
pub const STATUS_OK: ErrorRaw = 0;

/// Result of a single API call.
pub type ApiResult<T> = Result<T, ErrorCode>;

/// Every non-OK status a plugin API call can produce.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    #[error("internal error")]
    InternalError = -2,
    #[error("generic error")]
    GenericError = -1,
    #[error("pointer not found")]
    PointerNotFound = 1,
    #[error("no active server connection")]
    NoActiveConnection = 2,
    #[error("user not found")]
    UserNotFound = 3,
    #[error("channel not found")]
    ChannelNotFound = 4,
    #[error("connection not found")]
    ConnectionNotFound = 5,
    #[error("unknown transmission mode")]
    UnknownTransmissionMode = 6,
    #[error("audio output not available")]
    AudioNotAvailable = 7,
    #[error("invalid sample")]
    InvalidSample = 8,
    #[error("invalid plugin id")]
    InvalidPluginId = 9,
    #[error("invalid mute target")]
    InvalidMuteTarget = 10,
    #[error("connection not yet synchronized")]
    ConnectionUnsynchronized = 11,
    #[error("invalid API version")]
    InvalidApiVersion = 12,
    #[error("blob has not been synchronized yet")]
    UnsynchronizedBlob = 13,
    #[error("unknown settings key")]
    UnknownSettingsKey = 14,
    #[error("wrong type for settings key")]
    WrongSettingsType = 15,
    #[error("setting was removed")]
    SettingWasRemoved = 16,
    #[error("data too big")]
    DataTooBig = 17,
    #[error("data id too long")]
    DataIdTooLong = 18,
    #[error("API request timed out")]
    ApiRequestTimeout = 19,
    #[error("operation unsupported by server")]
    OperationUnsupportedByServer = 20,
}

impl ErrorCode {
    const ALL: [ErrorCode; 22] = [
        ErrorCode::InternalError,
        ErrorCode::GenericError,
        ErrorCode::PointerNotFound,
        ErrorCode::NoActiveConnection,
        ErrorCode::UserNotFound,
        ErrorCode::ChannelNotFound,
        ErrorCode::ConnectionNotFound,
        ErrorCode::UnknownTransmissionMode,
        ErrorCode::AudioNotAvailable,
        ErrorCode::InvalidSample,
        ErrorCode::InvalidPluginId,
        ErrorCode::InvalidMuteTarget,
        ErrorCode::ConnectionUnsynchronized,
        ErrorCode::InvalidApiVersion,
        ErrorCode::UnsynchronizedBlob,
        ErrorCode::UnknownSettingsKey,
        ErrorCode::WrongSettingsType,
        ErrorCode::SettingWasRemoved,
        ErrorCode::DataTooBig,
        ErrorCode::DataIdTooLong,
        ErrorCode::ApiRequestTimeout,
        ErrorCode::OperationUnsupportedByServer,
    ];

    pub const fn raw(self) -> ErrorRaw {
        self as ErrorRaw
    }

    /// Decode a raw status. `Ok(())` for [`STATUS_OK`], `None` for values
    /// this host does not know.
    pub fn from_raw(raw: ErrorRaw) -> Option<ApiResult<()>> {
        if raw == STATUS_OK {
            return Some(Ok(()));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.raw() == raw)
            .map(Err)
    }
}

/// Collapse a result into the raw status handed back to C.
pub fn status_of<T>(result: &ApiResult<T>) -> ErrorRaw {
    match result {
        Ok(_) => STATUS_OK,
        Err(code) => code.raw(),
    }
}

/// Human-readable message for a raw status, including OK.
pub fn describe(raw: ErrorRaw) -> String {
    match ErrorCode::from_raw(raw) {
        Some(Ok(())) => "OK".into(),
        Some(Err(code)) => code.to_string(),
        None => format!("unknown status code {raw}"),
    }
}
