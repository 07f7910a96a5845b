//! MAT-style binary container output: tagged, 8-byte-aligned data
//! elements behind a fixed file header, with an optional zlib-wrapped
//! element for compressed storage. Write-only.

mod compressed;
mod element;
mod writer;

pub use compressed::CompressedSection;
pub use element::{
    DataElement, DataType, ELEMENT_HEADER_SIZE, Matrix, NumericArray, Scalar, TextElement,
};
pub use writer::{ContainerWriter, HEADER_SIZE};
