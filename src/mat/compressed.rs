use crate::error::CaptureError;
use crate::mat::element::{DataElement, DataType};
use flate2::{Compress, Compression, FlushCompress, Status};
use log::debug;
use std::io::Write;

/// Size of the input accumulation buffer and of the per-round deflate
/// output buffer.
const BUFFER_SIZE: usize = 16 * 1024;

/// A data element holding the zlib-compressed image of another element.
///
/// The section is a two-state machine. While open, arbitrary-length
/// input may be appended; the input accumulates in a fixed-size buffer
/// and is fed through incremental deflate whenever the buffer fills.
/// `finish` closes the stream; only then do `byte_size` and
/// serialization become valid, and no further input is accepted.
///
/// The wrapped element itself never reaches the output file, only its
/// compressed image does.
pub struct CompressedSection {
    deflate: Compress,
    pending: Vec<u8>,
    compressed: Vec<u8>,
    finished: bool,
}

impl CompressedSection {
    /// Open a section compressing at the given zlib level (1-9).
    pub fn new(level: u32) -> Self {
        CompressedSection {
            deflate: Compress::new(Compression::new(level), true),
            pending: Vec::with_capacity(BUFFER_SIZE),
            compressed: Vec::new(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Append input bytes to the open section.
    pub fn append(&mut self, mut input: &[u8]) -> Result<(), CaptureError> {
        if self.finished {
            return Err(CaptureError::Logic(
                "tried to insert more data into finished buffer".to_string(),
            ));
        }

        while !input.is_empty() {
            let space = BUFFER_SIZE - self.pending.len();
            let take = space.min(input.len());
            self.pending.extend_from_slice(&input[..take]);
            input = &input[take..];

            if self.pending.len() == BUFFER_SIZE {
                self.deflate_pending(false)?;
            }
        }
        Ok(())
    }

    /// Serialize a whole element (header, payload, padding) into the
    /// section as its input stream.
    pub fn compress_element(&mut self, element: &dyn DataElement) -> Result<(), CaptureError> {
        if self.finished {
            return Err(CaptureError::Logic(
                "tried to insert more data into finished buffer".to_string(),
            ));
        }
        element.write_to(self)
    }

    /// Close the stream. Afterwards the section's size and serialized
    /// form are valid and no further input is accepted. Finishing an
    /// already-finished section is a no-op.
    pub fn finish(&mut self) -> Result<(), CaptureError> {
        if self.finished {
            return Ok(());
        }
        self.deflate_pending(true)?;
        self.finished = true;
        debug!("Compressed section finished: {} bytes", self.compressed.len());
        Ok(())
    }

    /// Run deflate over the accumulated input, draining the output
    /// buffer into the compressed accumulation each time the algorithm
    /// reports it saturated. With `Finish` the rounds continue until
    /// the stream-end signal.
    fn deflate_pending(&mut self, finalize: bool) -> Result<(), CaptureError> {
        let flush = if finalize {
            FlushCompress::Finish
        } else {
            FlushCompress::None
        };
        let mut out_buf = [0u8; BUFFER_SIZE];
        let mut consumed = 0;
        loop {
            let in_before = self.deflate.total_in();
            let out_before = self.deflate.total_out();

            let status = self
                .deflate
                .compress(&self.pending[consumed..], &mut out_buf, flush)?;

            consumed += (self.deflate.total_in() - in_before) as usize;
            let produced = (self.deflate.total_out() - out_before) as usize;
            self.compressed.extend_from_slice(&out_buf[..produced]);

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    let input_done = consumed == self.pending.len();
                    let output_drained = produced < out_buf.len();
                    if !finalize && input_done && output_drained {
                        break;
                    }
                }
            }
        }
        self.pending.clear();
        Ok(())
    }
}

/// Lets a data element stream its serialized form into the section in
/// multi-byte chunks.
impl Write for CompressedSection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.append(buf).map_err(std::io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl DataElement for CompressedSection {
    fn data_type(&self) -> DataType {
        DataType::Compressed
    }

    fn byte_size(&self) -> Result<u32, CaptureError> {
        if !self.finished {
            return Err(CaptureError::Logic(
                "tried to get size of not finished buffer".to_string(),
            ));
        }
        Ok(self.compressed.len() as u32)
    }

    fn write_payload(&self, out: &mut dyn Write) -> Result<(), CaptureError> {
        if !self.finished {
            return Err(CaptureError::Logic(
                "tried to serialize not finished buffer".to_string(),
            ));
        }
        out.write_all(&self.compressed)?;
        Ok(())
    }
}
