use crate::error::CaptureError;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Size of the tag + length header preceding every element payload.
pub const ELEMENT_HEADER_SIZE: u32 = 8;

/// Type tags of the container's data elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DataType {
    Int8 = 1,
    Uint8 = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Single = 7,
    Double = 9,
    Int64 = 12,
    Uint64 = 13,
    Matrix = 14,
    Compressed = 15,
    Utf8 = 16,
    Utf16 = 17,
    Utf32 = 18,
}

impl DataType {
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// A typed binary payload in the output container.
///
/// Every element is written as an 8-byte header (type tag, unpadded
/// payload size, both little-endian u32) followed by the payload and
/// zero padding up to the next multiple of 8 bytes. A reader can skip
/// any element from its declared sizes alone.
pub trait DataElement {
    fn data_type(&self) -> DataType;

    /// Unpadded payload size. Fails for elements whose size is not yet
    /// defined, such as an unfinished compressed section.
    fn byte_size(&self) -> Result<u32, CaptureError>;

    fn write_payload(&self, out: &mut dyn Write) -> Result<(), CaptureError>;

    /// Payload size rounded up to the next multiple of 8 bytes.
    fn aligned_size(&self) -> Result<u32, CaptureError> {
        Ok(self.byte_size()?.div_ceil(8) * 8)
    }

    /// Serialize header, payload and padding.
    fn write_to(&self, out: &mut dyn Write) -> Result<(), CaptureError> {
        let size = self.byte_size()?;
        out.write_u32::<LittleEndian>(self.data_type().tag())?;
        out.write_u32::<LittleEndian>(size)?;
        self.write_payload(out)?;
        let padding = (self.aligned_size()? - size) as usize;
        out.write_all(&[0u8; 8][..padding])?;
        Ok(())
    }
}

/// Scalar sample types a [`NumericArray`] can carry.
pub trait Scalar: Copy {
    const DATA_TYPE: DataType;
    const SIZE: u32;

    fn write_le(self, out: &mut dyn Write) -> std::io::Result<()>;
}

macro_rules! impl_scalar {
    ($ty:ty, $tag:ident, $write:ident) => {
        impl Scalar for $ty {
            const DATA_TYPE: DataType = DataType::$tag;
            const SIZE: u32 = std::mem::size_of::<$ty>() as u32;

            fn write_le(self, out: &mut dyn Write) -> std::io::Result<()> {
                out.$write::<LittleEndian>(self)
            }
        }
    };
}

impl Scalar for i8 {
    const DATA_TYPE: DataType = DataType::Int8;
    const SIZE: u32 = 1;

    fn write_le(self, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_i8(self)
    }
}

impl Scalar for u8 {
    const DATA_TYPE: DataType = DataType::Uint8;
    const SIZE: u32 = 1;

    fn write_le(self, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_u8(self)
    }
}

impl_scalar!(i16, Int16, write_i16);
impl_scalar!(u16, Uint16, write_u16);
impl_scalar!(i32, Int32, write_i32);
impl_scalar!(u32, Uint32, write_u32);
impl_scalar!(i64, Int64, write_i64);
impl_scalar!(u64, Uint64, write_u64);
impl_scalar!(f32, Single, write_f32);
impl_scalar!(f64, Double, write_f64);

/// Borrowed numeric array, written little-endian.
pub struct NumericArray<'a, T: Scalar> {
    values: &'a [T],
}

impl<'a, T: Scalar> NumericArray<'a, T> {
    pub fn new(values: &'a [T]) -> Self {
        NumericArray { values }
    }
}

impl<T: Scalar> DataElement for NumericArray<'_, T> {
    fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    fn byte_size(&self) -> Result<u32, CaptureError> {
        Ok(self.values.len() as u32 * T::SIZE)
    }

    fn write_payload(&self, out: &mut dyn Write) -> Result<(), CaptureError> {
        for &value in self.values {
            value.write_le(out)?;
        }
        Ok(())
    }
}

/// A name string, written with the signed-byte tag.
pub struct TextElement<'a> {
    text: &'a str,
}

impl<'a> TextElement<'a> {
    pub fn new(text: &'a str) -> Self {
        TextElement { text }
    }
}

impl DataElement for TextElement<'_> {
    fn data_type(&self) -> DataType {
        DataType::Int8
    }

    fn byte_size(&self) -> Result<u32, CaptureError> {
        Ok(self.text.len() as u32)
    }

    fn write_payload(&self, out: &mut dyn Write) -> Result<(), CaptureError> {
        out.write_all(self.text.as_bytes())?;
        Ok(())
    }
}

/// Interleaved (time, voltage) sample data; each pair is one column of
/// the enclosing 2-by-n matrix.
struct PairColumns<'a> {
    pairs: &'a [(f64, f64)],
}

impl DataElement for PairColumns<'_> {
    fn data_type(&self) -> DataType {
        DataType::Double
    }

    fn byte_size(&self) -> Result<u32, CaptureError> {
        Ok(self.pairs.len() as u32 * 16)
    }

    fn write_payload(&self, out: &mut dyn Write) -> Result<(), CaptureError> {
        for &(time, voltage) in self.pairs {
            out.write_f64::<LittleEndian>(time)?;
            out.write_f64::<LittleEndian>(voltage)?;
        }
        Ok(())
    }
}

/// One acquired channel: a named 2-by-n matrix of (time, voltage)
/// pairs. The payload is the concatenation of three sub-elements, each
/// tagged and aligned by the same rule as any top-level element:
/// dimensions, name, sample data.
pub struct Matrix<'a> {
    name: String,
    dimensions: [i32; 2],
    data: &'a [(f64, f64)],
}

impl<'a> Matrix<'a> {
    pub fn new(name: impl Into<String>, data: &'a [(f64, f64)]) -> Self {
        Matrix {
            name: name.into(),
            dimensions: [2, data.len() as i32],
            data,
        }
    }
}

impl DataElement for Matrix<'_> {
    fn data_type(&self) -> DataType {
        DataType::Matrix
    }

    fn byte_size(&self) -> Result<u32, CaptureError> {
        let dims = NumericArray::new(&self.dimensions);
        let name = TextElement::new(&self.name);
        let data = PairColumns { pairs: self.data };
        Ok(ELEMENT_HEADER_SIZE
            + dims.aligned_size()?
            + ELEMENT_HEADER_SIZE
            + name.aligned_size()?
            + ELEMENT_HEADER_SIZE
            + data.aligned_size()?)
    }

    fn write_payload(&self, out: &mut dyn Write) -> Result<(), CaptureError> {
        NumericArray::new(&self.dimensions).write_to(out)?;
        TextElement::new(&self.name).write_to(out)?;
        PairColumns { pairs: self.data }.write_to(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize(element: &dyn DataElement) -> Vec<u8> {
        let mut out = Vec::new();
        element.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_alignment_invariant() {
        // Payload sizes and the aligned sizes they must round up to.
        for (payload, aligned) in [(0, 0), (1, 8), (7, 8), (8, 8), (9, 16), (16, 16), (17, 24)] {
            let values = vec![0xABu8; payload];
            let element = NumericArray::new(&values);
            assert_eq!(element.byte_size().unwrap(), payload as u32);
            assert_eq!(element.aligned_size().unwrap(), aligned as u32);

            let written = serialize(&element);
            assert_eq!(written.len(), 8 + aligned);
            // Padding bytes must be exactly zero.
            for &byte in &written[8 + payload..] {
                assert_eq!(byte, 0);
            }
        }
    }

    #[test]
    fn test_element_header_layout() {
        let values: [u16; 3] = [0x0102, 0x0304, 0x0506];
        let written = serialize(&NumericArray::new(&values));

        assert_eq!(&written[0..4], &4u32.to_le_bytes()); // Uint16 tag
        assert_eq!(&written[4..8], &6u32.to_le_bytes()); // unpadded size
        assert_eq!(&written[8..10], &[0x02, 0x01]); // little-endian data
        assert_eq!(&written[14..16], &[0, 0]); // padding
        assert_eq!(written.len(), 16);
    }

    #[test]
    fn test_text_element_uses_int8_tag() {
        let written = serialize(&TextElement::new("CHANNEL_1"));
        assert_eq!(&written[0..4], &1u32.to_le_bytes());
        assert_eq!(&written[4..8], &9u32.to_le_bytes());
        assert_eq!(&written[8..17], b"CHANNEL_1");
        assert_eq!(written.len(), 8 + 16);
    }

    #[test]
    fn test_matrix_layout() {
        let data = [(0.0, 1.0), (1.0, 2.0), (2.0, 4.0)];
        let matrix = Matrix::new("CHANNEL_1", &data);

        // dims: 8 + 8, name (9 chars): 8 + 16, data: 8 + 48
        assert_eq!(matrix.byte_size().unwrap(), 16 + 24 + 56);

        let written = serialize(&matrix);
        assert_eq!(written.len() as u32, 8 + matrix.aligned_size().unwrap());

        // Outer header.
        assert_eq!(&written[0..4], &14u32.to_le_bytes());
        // First sub-element: Int32 dimensions [2, 3].
        assert_eq!(&written[8..12], &5u32.to_le_bytes());
        assert_eq!(&written[12..16], &8u32.to_le_bytes());
        assert_eq!(&written[16..20], &2i32.to_le_bytes());
        assert_eq!(&written[20..24], &3i32.to_le_bytes());
        // Second sub-element: the name.
        assert_eq!(&written[24..28], &1u32.to_le_bytes());
        assert_eq!(&written[32..41], b"CHANNEL_1");
        // Third sub-element: Double pair data, interleaved.
        assert_eq!(&written[48..52], &9u32.to_le_bytes());
        assert_eq!(&written[52..56], &48u32.to_le_bytes());
        assert_eq!(&written[56..64], &0.0f64.to_le_bytes());
        assert_eq!(&written[64..72], &1.0f64.to_le_bytes());
        assert_eq!(&written[96..104], &4.0f64.to_le_bytes());
    }

    #[test]
    fn test_matrix_empty_data() {
        let matrix = Matrix::new("CHANNEL_2", &[]);
        let written = serialize(&matrix);
        // Empty data sub-element still carries its header.
        assert_eq!(written.len() as u32, 8 + matrix.byte_size().unwrap());
    }
}
