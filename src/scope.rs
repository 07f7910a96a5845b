use crate::command::ScpiCommand;
use crate::connection::Connection;
use crate::convert::ScaleParameters;
use crate::error::CaptureError;
use log::debug;
use std::fmt;

/// Largest number of samples one `:WAV:DATA?` response can carry in
/// ASCII format. Set by the instrument's single-transfer limit, not a
/// tuning knob.
pub const ASCII_BATCH_SIZE: usize = 15_625;

/// Largest number of samples one `:WAV:DATA?` response can carry in
/// BYTE format.
pub const BYTE_BATCH_SIZE: usize = 250_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
}

impl Channel {
    /// Parse a channel from its digit character, as used on the
    /// command line.
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '1' => Some(Channel::Ch1),
            '2' => Some(Channel::Ch2),
            '3' => Some(Channel::Ch3),
            '4' => Some(Channel::Ch4),
            _ => None,
        }
    }

    /// Argument text for the waveform source select instruction.
    fn source_arg(self) -> &'static str {
        match self {
            Channel::Ch1 => "CHAN1",
            Channel::Ch2 => "CHAN2",
            Channel::Ch3 => "CHAN3",
            Channel::Ch4 => "CHAN4",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Ch1 => write!(f, "CHANNEL_1"),
            Channel::Ch2 => write!(f, "CHANNEL_2"),
            Channel::Ch3 => write!(f, "CHANNEL_3"),
            Channel::Ch4 => write!(f, "CHANNEL_4"),
        }
    }
}

/// Trigger sweep state as reported by `:TRIG:STAT?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Triggered,
    Wait,
    Run,
    Auto,
    Stop,
}

/// Parse the eleven-character block header `#9` + nine decimal digits
/// and return the declared payload length together with whatever
/// follows the header on the same line.
fn parse_block_header(line: &str) -> Result<(usize, &str), CaptureError> {
    let bytes = line.as_bytes();
    if bytes.len() < 11 || &bytes[..2] != b"#9" {
        return Err(CaptureError::Protocol(format!(
            "invalid data header, expected #9; whole line: {line}"
        )));
    }
    let count = std::str::from_utf8(&bytes[2..11])
        .ok()
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or_else(|| {
            CaptureError::Protocol(format!("cannot parse data length field; whole line: {line}"))
        })?;
    Ok((count, line.get(11..).unwrap_or("")))
}

/// Driver for a Rigol DS1000Z-class oscilloscope over a SCPI byte
/// stream.
///
/// Owns the connection exclusively for the lifetime of a capture run.
/// All operations block; failures abort the current acquisition and
/// are never retried.
pub struct Scope<C: Connection> {
    conn: C,
}

impl<C: Connection> Scope<C> {
    pub fn new(conn: C) -> Self {
        Scope { conn }
    }

    pub fn run(&mut self) -> Result<(), CaptureError> {
        ScpiCommand::instruction(&["RUN"], None).run_on(&mut self.conn)
    }

    pub fn stop(&mut self) -> Result<(), CaptureError> {
        ScpiCommand::instruction(&["STOP"], None).run_on(&mut self.conn)
    }

    pub fn single(&mut self) -> Result<(), CaptureError> {
        ScpiCommand::instruction(&["SING"], None).run_on(&mut self.conn)
    }

    pub fn trigger_state(&mut self) -> Result<TriggerState, CaptureError> {
        let mut cmd = ScpiCommand::query(&["TRIG", "STAT"]);
        cmd.run_on(&mut self.conn)?;

        match cmd.last_response() {
            "TG" => Ok(TriggerState::Triggered),
            "WAIT" => Ok(TriggerState::Wait),
            "RUN" => Ok(TriggerState::Run),
            "AUTO" => Ok(TriggerState::Auto),
            "STOP" => Ok(TriggerState::Stop),
            other => Err(CaptureError::Config(format!(
                "unknown trigger state response '{other}'"
            ))),
        }
    }

    pub fn select_channel(&mut self, channel: Channel) -> Result<(), CaptureError> {
        ScpiCommand::instruction(&["WAV", "SOUR"], Some(channel.source_arg()))
            .run_on(&mut self.conn)
    }

    /// Total sample count of the current acquisition. A dynamic "AUTO"
    /// depth cannot be used to compute batch ranges and is rejected.
    pub fn memory_depth(&mut self) -> Result<usize, CaptureError> {
        let mut cmd = ScpiCommand::query(&["ACQ", "MDEP"]);
        cmd.run_on(&mut self.conn)?;

        let response = cmd.last_response();
        if response == "AUTO" {
            return Err(CaptureError::Config(
                "cannot read buffer with 'AUTO' memory depth".to_string(),
            ));
        }
        response.trim().parse::<usize>().map_err(|_| {
            CaptureError::Protocol(format!("cannot parse memory depth '{response}'"))
        })
    }

    /// Retrieve the full waveform of the selected channel in ASCII
    /// format, one comma-separated float list per batch.
    pub fn read_ascii(&mut self) -> Result<Vec<f32>, CaptureError> {
        let depth = self.memory_depth()?;
        let mut buffer = Vec::with_capacity(depth);

        ScpiCommand::instruction(&["WAV", "MODE"], Some("RAW")).run_on(&mut self.conn)?;
        ScpiCommand::instruction(&["WAV", "FORM"], Some("ASC")).run_on(&mut self.conn)?;

        let mut get_data = ScpiCommand::query(&["WAV", "DATA"]);
        let mut start = 0;
        while start < depth {
            let to_read = ASCII_BATCH_SIZE.min(depth - start);
            self.set_batch_range(start + 1, start + to_read)?;

            get_data.run_on(&mut self.conn)?;
            let (_count, payload) = parse_block_header(get_data.last_response())?;

            let mut parsed = 0usize;
            if !payload.is_empty() {
                for token in payload.split(',') {
                    let value = token.trim().parse::<f32>().map_err(|_| {
                        CaptureError::Protocol(format!("cannot parse sample '{token}'"))
                    })?;
                    buffer.push(value);
                    parsed += 1;
                }
            }
            debug!("Read {parsed} floats");

            start += to_read;
        }

        Self::check_depth(buffer.len(), depth)?;
        Ok(buffer)
    }

    /// Retrieve the full waveform of the selected channel as raw bytes.
    ///
    /// Each batch response carries the eleven-byte block header followed
    /// by `count + 1` bytes; the final byte is taken to be the line
    /// terminator and is discarded.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, CaptureError> {
        let depth = self.memory_depth()?;
        let mut buffer = Vec::with_capacity(depth);

        ScpiCommand::instruction(&["WAV", "MODE"], Some("RAW")).run_on(&mut self.conn)?;
        ScpiCommand::instruction(&["WAV", "FORM"], Some("BYTE")).run_on(&mut self.conn)?;

        let get_data = ScpiCommand::query(&["WAV", "DATA"]);
        let mut start = 0;
        while start < depth {
            let to_read = BYTE_BATCH_SIZE.min(depth - start);
            self.set_batch_range(start + 1, start + to_read)?;

            debug!("Sending query: {}", get_data.text().trim_end());
            self.conn.write_all(get_data.text().as_bytes())?;

            let mut header = [0u8; 11];
            self.conn.read_exact(&mut header)?;
            let header = String::from_utf8_lossy(&header).into_owned();
            let (count, _) = parse_block_header(&header)?;
            if count == 0 {
                return Err(CaptureError::Protocol(
                    "empty waveform data batch".to_string(),
                ));
            }

            let mut chunk = vec![0u8; count + 1];
            self.conn.read_exact(&mut chunk)?;
            chunk.pop();
            buffer.extend_from_slice(&chunk);
            debug!("Read {count} bytes");

            start += count;
        }

        Self::check_depth(buffer.len(), depth)?;
        Ok(buffer)
    }

    /// Fetch the x/y scale and offset parameter set for the selected
    /// channel.
    pub fn scale_parameters(&mut self) -> Result<ScaleParameters, CaptureError> {
        Ok(ScaleParameters {
            x_origin: self.query_f64(&["WAV", "XOR"])?,
            x_increment: self.query_f64(&["WAV", "XINC"])?,
            x_reference: self.query_f64(&["WAV", "XREF"])?,
            y_origin: self.query_f64(&["WAV", "YOR"])?,
            y_increment: self.query_f64(&["WAV", "YINC"])?,
            y_reference: self.query_f64(&["WAV", "YREF"])?,
        })
    }

    fn set_batch_range(&mut self, first: usize, last: usize) -> Result<(), CaptureError> {
        ScpiCommand::instruction(&["WAV", "START"], Some(&first.to_string()))
            .run_on(&mut self.conn)?;
        ScpiCommand::instruction(&["WAV", "STOP"], Some(&last.to_string()))
            .run_on(&mut self.conn)
    }

    fn query_f64(&mut self, parts: &[&str]) -> Result<f64, CaptureError> {
        let mut cmd = ScpiCommand::query(parts);
        cmd.run_on(&mut self.conn)?;
        cmd.last_response().trim().parse::<f64>().map_err(|_| {
            CaptureError::Protocol(format!(
                "cannot parse numeric response '{}' to {}",
                cmd.last_response(),
                cmd.text().trim_end()
            ))
        })
    }

    fn check_depth(received: usize, expected: usize) -> Result<(), CaptureError> {
        if received != expected {
            return Err(CaptureError::Protocol(format!(
                "received {received} samples, memory depth reported {expected}"
            )));
        }
        Ok(())
    }
}
