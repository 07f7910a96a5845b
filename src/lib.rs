pub mod command;
pub mod connection;
pub mod convert;
pub mod error;
pub mod mat;
pub mod scope;

pub use command::ScpiCommand;
pub use connection::{Connection, ConnectionConfig, TcpConnection};
pub use convert::ScaleParameters;
pub use error::CaptureError;
pub use mat::{
    CompressedSection, ContainerWriter, DataElement, DataType, Matrix, NumericArray, TextElement,
};
pub use scope::{ASCII_BATCH_SIZE, BYTE_BATCH_SIZE, Channel, Scope, TriggerState};
