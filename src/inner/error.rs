use btleplug::api::CharPropFlags;

use crate::inner::model::request::RequestKind;

#[derive(Debug, thiserror::Error)]
pub(crate) enum QueueError {
    #[error("Bluetooth error: {0:?}")]
    BluetoothError(#[from] btleplug::Error),

    #[error("End of stream")]
    EndOfStream,

    #[error("IoError: {0:?}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization Error: {0:?}")]
    SerializationError(#[from] serde_yaml::Error),

    #[error("Timeout error: {0:?}")]
    TimeoutError(#[from] tokio::time::error::Elapsed),

    #[error("Error: {0:?}")]
    AnyError(#[from] anyhow::Error),

    #[error("Peripheral is not connected")]
    NotConnected,

    #[error("{0} request has no target")]
    MissingTarget(RequestKind),

    #[error("{0} request has no payload")]
    MissingPayload(RequestKind),

    #[error("{kind} request target lacks {required:?}")]
    MissingProperty { kind: RequestKind, required: CharPropFlags },

    #[error("No peripheral matches the configured filters")]
    PeripheralNotFound,
}

pub(crate) type QueueResult<T> = Result<T, QueueError>;
