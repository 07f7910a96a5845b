mod config;

use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{LevelFilter, error, info};
use scope_capture::{
    CaptureError, Channel, CompressedSection, ContainerWriter, Matrix, Scope, TcpConnection,
    TriggerState,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use crate::config::{AppConfig, load_config_or_default};

/// Data receiver for Rigol DS1000Z series scopes that saves waveforms
/// in MATLAB mat file format.
#[derive(Parser, Debug)]
#[command(name = "scope-capture")]
#[command(about = "Capture oscilloscope waveforms into a MAT container", long_about = None)]
struct Args {
    /// Print only errors and warnings to the console
    #[arg(long)]
    silent: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output filename
    #[arg(short = 'f', long, value_name = "FILE")]
    outfile: Option<PathBuf>,

    /// Scope's IP address
    #[arg(short = 's', long, value_name = "ADDR")]
    scopeip: Option<String>,

    /// Scope's port number
    #[arg(short = 'p', long, value_name = "PORT")]
    scopeport: Option<u16>,

    /// Channels to read, list (not separated) of one or more of: 1, 2, 3, 4
    #[arg(short = 'c', long, value_name = "SET")]
    channels: Option<String>,

    /// Trigger mode
    #[arg(short = 't', long, value_enum)]
    trigger: Option<TriggerMode>,

    /// Waveform transfer format
    #[arg(long, value_enum)]
    format: Option<TransferFormat>,

    /// Use zlib compression, level 1-9
    #[arg(short = 'z', long, value_name = "LEVEL")]
    zlib: Option<u32>,

    /// Path to an optional configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TriggerMode {
    Stop,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransferFormat {
    Byte,
    Ascii,
}

/// Fully resolved run settings: CLI flags override config file values,
/// which override built-in defaults.
#[derive(Debug)]
struct Settings {
    outfile: PathBuf,
    address: String,
    port: u16,
    channels: Vec<Channel>,
    trigger: TriggerMode,
    format: TransferFormat,
    compression: Option<u32>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    initialize_logging(&args);

    let file_config = load_config_or_default(args.config.as_deref());
    let settings = match resolve_settings(&args, &file_config) {
        Ok(settings) => settings,
        Err(message) => {
            error!("{message}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&settings) {
        error!("Error during execution: {e}");
        process::exit(2);
    }
}

fn initialize_logging(args: &Args) {
    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.silent {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();
}

fn resolve_settings(args: &Args, file_config: &AppConfig) -> Result<Settings, String> {
    let outfile = args
        .outfile
        .clone()
        .or_else(|| file_config.capture.outfile.as_ref().map(PathBuf::from))
        .ok_or("argument --outfile is required")?;

    let address = args
        .scopeip
        .clone()
        .or_else(|| file_config.scope.address.clone())
        .ok_or("argument --scopeip is required")?;

    let port = args.scopeport.unwrap_or(file_config.scope.port);

    let channel_set = args
        .channels
        .clone()
        .unwrap_or_else(|| file_config.capture.channels.clone());
    let channels = parse_channels(&channel_set)?;

    let trigger = match args.trigger {
        Some(trigger) => trigger,
        None => match file_config.capture.trigger.as_deref() {
            Some("stop") => TriggerMode::Stop,
            Some("single") => TriggerMode::Single,
            Some(other) => {
                return Err(format!(
                    "'{other}' is not a valid trigger mode, expected stop or single"
                ));
            }
            None => return Err("argument --trigger is required".to_string()),
        },
    };

    let format = match args.format {
        Some(format) => format,
        None => match file_config.capture.format.as_str() {
            "byte" => TransferFormat::Byte,
            "ascii" => TransferFormat::Ascii,
            other => {
                return Err(format!(
                    "'{other}' is not a valid transfer format, expected byte or ascii"
                ));
            }
        },
    };

    let compression = args.zlib.or(file_config.capture.compression);
    if let Some(level) = compression {
        if !(1..=9).contains(&level) {
            return Err("compression level has to be between 1 and 9".to_string());
        }
    }

    Ok(Settings {
        outfile,
        address,
        port,
        channels,
        trigger,
        format,
        compression,
    })
}

fn parse_channels(set: &str) -> Result<Vec<Channel>, String> {
    let mut channels = Vec::new();
    for ch in set.chars() {
        match Channel::from_digit(ch) {
            Some(channel) => channels.push(channel),
            None => {
                return Err(format!(
                    "'{ch}' is not a valid channel specifier, expected one of: 1, 2, 3, 4"
                ));
            }
        }
    }
    if channels.is_empty() {
        return Err("at least one channel must be selected".to_string());
    }
    Ok(channels)
}

fn run(settings: &Settings) -> Result<(), CaptureError> {
    let connection = TcpConnection::connect(&settings.address, settings.port)?;
    let mut scope = Scope::new(connection);

    wait_for_trigger(&mut scope, settings.trigger)?;

    let file = File::create(&settings.outfile)?;
    let mut writer = ContainerWriter::new(BufWriter::new(file))?;

    for &channel in &settings.channels {
        info!("Reading data for {channel}");
        scope.select_channel(channel)?;
        let pairs = read_channel_data(&mut scope, settings.format)?;
        info!("Read {} items", pairs.len());

        let matrix = Matrix::new(channel.to_string(), &pairs);
        match settings.compression {
            Some(level) => {
                info!("Compressing data for {channel}");
                let mut section = CompressedSection::new(level);
                section.compress_element(&matrix)?;
                section.finish()?;
                info!("Saving data for {channel}");
                writer.write_element(&section)?;
            }
            None => {
                info!("Saving data for {channel}");
                writer.write_element(&matrix)?;
            }
        }
    }

    info!("Done");
    Ok(())
}

fn wait_for_trigger(
    scope: &mut Scope<TcpConnection>,
    trigger: TriggerMode,
) -> Result<(), CaptureError> {
    match trigger {
        TriggerMode::Stop => {
            info!("Stopping the scope");
            scope.stop()?;
        }
        TriggerMode::Single => {
            info!("Arming the scope");
            scope.single()?;
            thread::sleep(Duration::from_millis(400));
            info!("Waiting for trigger");
        }
    }

    // Busy poll; one instrument on a fast local link answers each query.
    while scope.trigger_state()? != TriggerState::Stop {}
    Ok(())
}

fn read_channel_data(
    scope: &mut Scope<TcpConnection>,
    format: TransferFormat,
) -> Result<Vec<(f64, f64)>, CaptureError> {
    match format {
        TransferFormat::Byte => {
            let buffer = scope.read_bytes()?;
            let params = scope.scale_parameters()?;
            Ok(params.convert(&buffer))
        }
        TransferFormat::Ascii => {
            let buffer = scope.read_ascii()?;
            let params = scope.scale_parameters()?;
            Ok(params.convert(&buffer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> Args {
        Args {
            silent: false,
            verbose: false,
            outfile: Some(PathBuf::from("out.mat")),
            scopeip: Some("192.168.1.50".to_string()),
            scopeport: None,
            channels: None,
            trigger: Some(TriggerMode::Stop),
            format: None,
            zlib: None,
            config: None,
        }
    }

    #[test]
    fn test_defaults_fill_missing_flags() {
        let settings = resolve_settings(&bare_args(), &AppConfig::default()).unwrap();
        assert_eq!(settings.port, 5555);
        assert_eq!(settings.channels.len(), 4);
        assert_eq!(settings.format, TransferFormat::Byte);
        assert_eq!(settings.compression, None);
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut args = bare_args();
        args.scopeport = Some(5025);
        args.channels = Some("21".to_string());

        let mut file_config = AppConfig::default();
        file_config.scope.port = 1234;
        file_config.capture.channels = "34".to_string();

        let settings = resolve_settings(&args, &file_config).unwrap();
        assert_eq!(settings.port, 5025);
        assert_eq!(settings.channels, vec![Channel::Ch2, Channel::Ch1]);
    }

    #[test]
    fn test_missing_scope_address_is_an_error() {
        let mut args = bare_args();
        args.scopeip = None;
        let err = resolve_settings(&args, &AppConfig::default()).unwrap_err();
        assert!(err.contains("--scopeip"));
    }

    #[test]
    fn test_missing_trigger_is_an_error() {
        let mut args = bare_args();
        args.trigger = None;
        let err = resolve_settings(&args, &AppConfig::default()).unwrap_err();
        assert!(err.contains("--trigger"));
    }

    #[test]
    fn test_invalid_channel_specifier() {
        let err = parse_channels("125").unwrap_err();
        assert!(err.contains("'5'"));
    }

    #[test]
    fn test_compression_level_bounds() {
        let mut args = bare_args();
        args.zlib = Some(10);
        let err = resolve_settings(&args, &AppConfig::default()).unwrap_err();
        assert!(err.contains("between 1 and 9"));

        args.zlib = Some(9);
        let settings = resolve_settings(&args, &AppConfig::default()).unwrap();
        assert_eq!(settings.compression, Some(9));
    }
}
