use crate::connection::Connection;
use crate::error::CaptureError;
use log::debug;

/// A single SCPI exchange with the instrument.
///
/// Commands are built from a colon-separated path of segments, e.g.
/// `["WAV", "SOUR"]` becomes `:WAV:SOUR`. An instruction optionally
/// carries an argument after a single space and expects no reply; a
/// query appends `?` and expects exactly one line of text back. The
/// command text is fixed at construction; only a query's cached
/// response changes between runs.
#[derive(Debug, Clone)]
pub enum ScpiCommand {
    /// Fire-and-forget instruction, no reply expected.
    Instruction(String),
    /// Query expecting a single line of text in response.
    Query { text: String, last_response: String },
}

fn join_segments(parts: &[&str]) -> String {
    let len: usize = parts.iter().map(|s| s.len()).sum();
    let mut text = String::with_capacity(len + parts.len() + 2);
    for part in parts {
        text.push(':');
        text.push_str(part);
    }
    text
}

impl ScpiCommand {
    pub fn instruction(parts: &[&str], arg: Option<&str>) -> Self {
        let mut text = join_segments(parts);
        if let Some(arg) = arg {
            text.push(' ');
            text.push_str(arg);
        }
        text.push('\n');
        ScpiCommand::Instruction(text)
    }

    pub fn query(parts: &[&str]) -> Self {
        let mut text = join_segments(parts);
        text.push('?');
        text.push('\n');
        ScpiCommand::Query {
            text,
            last_response: String::new(),
        }
    }

    /// The literal command text, including the terminating newline.
    pub fn text(&self) -> &str {
        match self {
            ScpiCommand::Instruction(text) => text,
            ScpiCommand::Query { text, .. } => text,
        }
    }

    /// Send the command; for a query, also block reading the one-line
    /// response into `last_response`. Response text is not validated
    /// beyond line splitting.
    pub fn run_on(&mut self, conn: &mut dyn Connection) -> Result<(), CaptureError> {
        match self {
            ScpiCommand::Instruction(text) => {
                debug!("Sending command: {}", text.trim_end());
                conn.write_all(text.as_bytes())
            }
            ScpiCommand::Query {
                text,
                last_response,
            } => {
                debug!("Sending query: {}", text.trim_end());
                conn.write_all(text.as_bytes())?;
                *last_response = conn.read_line()?;
                debug!("Got response: {last_response}");
                Ok(())
            }
        }
    }

    /// The response cached by the most recent `run_on` of a query.
    /// Empty for instructions and for queries that have not run yet.
    pub fn last_response(&self) -> &str {
        match self {
            ScpiCommand::Instruction(_) => "",
            ScpiCommand::Query { last_response, .. } => last_response,
        }
    }
}
