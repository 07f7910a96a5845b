use crate::error::CaptureError;
use crate::mat::element::DataElement;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Total size of the fixed file header.
pub const HEADER_SIZE: usize = 128;

/// Size of the space-padded description text at the start of the header.
const DESCRIPTION_SIZE: usize = 116;

const HEADER_VERSION: u16 = 0x0100;
const HEADER_ENDIAN: &[u8; 2] = b"IM";

/// Writes the container: the fixed header once, then one aligned data
/// element per acquired channel, in request order.
///
/// Owns the output stream for the file's lifetime. There is no
/// recovery on failure; a partially written file is the caller's to
/// discard.
pub struct ContainerWriter<W: Write> {
    out: W,
}

impl<W: Write> ContainerWriter<W> {
    /// Write the file header and return a writer ready for elements.
    pub fn new(mut out: W) -> Result<Self, CaptureError> {
        let mut description = [b' '; DESCRIPTION_SIZE];
        let text: &[u8] = b"MATLAB 5.0 MAT-file, created by scope-capture";
        description[..text.len()].copy_from_slice(text);

        out.write_all(&description)?;
        out.write_all(&[0u8; 8])?; // subsystem data offset, unused
        out.write_u16::<LittleEndian>(HEADER_VERSION)?;
        out.write_all(HEADER_ENDIAN)?;

        Ok(ContainerWriter { out })
    }

    pub fn write_element(&mut self, element: &dyn DataElement) -> Result<(), CaptureError> {
        element.write_to(&mut self.out)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat::element::{Matrix, NumericArray};

    #[test]
    fn test_header_layout() {
        let writer = ContainerWriter::new(Vec::new()).unwrap();
        let out = writer.into_inner();

        assert_eq!(out.len(), HEADER_SIZE);
        assert!(out.starts_with(b"MATLAB 5.0 MAT-file"));
        // Description padded with spaces, then the reserved bytes.
        assert_eq!(out[115], b' ');
        assert_eq!(&out[116..124], &[0u8; 8]);
        assert_eq!(&out[124..126], &[0x00, 0x01]);
        assert_eq!(&out[126..128], b"IM");
    }

    #[test]
    fn test_elements_follow_header_in_order() {
        let mut writer = ContainerWriter::new(Vec::new()).unwrap();

        let first: [u8; 3] = [1, 2, 3];
        let pairs = [(0.0, 1.0)];
        writer.write_element(&NumericArray::new(&first)).unwrap();
        writer.write_element(&Matrix::new("CHANNEL_1", &pairs)).unwrap();

        let out = writer.into_inner();
        // First element directly after the header.
        assert_eq!(&out[128..132], &2u32.to_le_bytes());
        assert_eq!(&out[132..136], &3u32.to_le_bytes());
        // Second element after the first one's aligned span.
        assert_eq!(&out[144..148], &14u32.to_le_bytes());
    }
}
