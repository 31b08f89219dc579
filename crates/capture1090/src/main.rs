#![doc = include_str!("../readme.md")]

use clap::Parser;
use color_eyre::eyre::{bail, eyre, Result};
use iq1090::demod::{DemodSettings, Demodulator, PositionReport};
use iq1090::source::FileSource;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "capture1090",
    version,
    about = "Decode ADS-B position reports from RTL-SDR capture files"
)]
struct Options {
    /// Raw capture file: interleaved unsigned 8-bit I/Q at 2 MSPS
    file: Option<PathBuf>,

    /// Individual demodulated frames to decode (28 hex characters each)
    #[arg(short, long = "message")]
    messages: Vec<String>,

    /// Write the reports as a JSON array, one object per line
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the reports as CSV (lat,lon,alt,icao)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Keep frames whose 24-bit parity syndrome is nonzero
    #[arg(long, default_value = "false")]
    no_crc: bool,

    /// Require quiet samples between the preamble pulses
    #[arg(long, default_value = "false")]
    strict: bool,

    /// Detection threshold, as a multiple of the mean magnitude
    #[arg(long, default_value = "5.0")]
    threshold: f32,
}

/// One serialized record; coordinates fall back to the 0.0 sentinel so
/// every record carries the same keys
#[derive(Serialize)]
struct Record {
    lat: f64,
    lon: f64,
    alt: Option<i32>,
    icao: String,
}

impl From<&PositionReport> for Record {
    fn from(report: &PositionReport) -> Self {
        Record {
            lat: report.latitude.unwrap_or(0.0),
            lon: report.longitude.unwrap_or(0.0),
            alt: report.altitude,
            icao: report.icao.to_string(),
        }
    }
}

fn parse_frame(msg: &str) -> Result<[u8; 14]> {
    let bytes = hex::decode(msg)?;
    bytes
        .try_into()
        .map_err(|_| eyre!("expected 28 hex characters, got {}", msg.len()))
}

fn print_table(reports: &[PositionReport]) {
    println!("{:-<60}", "");
    println!(
        "{:<8} | {:<9} | {:<10} | {:<10} | RAW",
        "ICAO", "ALT (ft)", "LAT", "LON"
    );
    println!("{:-<60}", "");
    for report in reports {
        let altitude = report
            .altitude
            .map_or_else(|| "-".to_string(), |alt| alt.to_string());
        match (report.latitude, report.longitude) {
            (Some(lat), Some(lon)) => println!(
                "{:<8} | {:<9} | {:<10.5} | {:<10.5} | {}",
                report.icao, altitude, lat, lon, report.raw_hex
            ),
            _ => println!(
                "{:<8} | {:<9} | {:<10} | {:<10} | {}",
                report.icao, altitude, "partial", "partial", report.raw_hex
            ),
        }
    }
}

fn write_json(path: &Path, reports: &[PositionReport]) -> Result<()> {
    let lines = reports
        .iter()
        .map(|report| {
            Ok(format!(
                "    {}",
                serde_json::to_string(&Record::from(report))?
            ))
        })
        .collect::<Result<Vec<String>>>()?;
    let mut file = File::create(path)?;
    write!(file, "[\n{}\n]", lines.join(",\n"))?;
    Ok(())
}

fn write_csv(path: &Path, reports: &[PositionReport]) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "lat,lon,alt,icao")?;
    for report in reports {
        let record = Record::from(report);
        let altitude = record
            .alt
            .map_or_else(String::new, |alt| alt.to_string());
        writeln!(
            file,
            "{},{},{},{}",
            record.lat, record.lon, altitude, record.icao
        )?;
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let options = Options::parse();
    let settings = DemodSettings {
        threshold_factor: options.threshold,
        check_crc: !options.no_crc,
        strict_preamble: options.strict,
    };
    let mut demod = Demodulator::new(settings);
    let mut reports: Vec<PositionReport> = Vec::new();

    if !options.messages.is_empty() {
        for msg in &options.messages {
            let frame = parse_frame(msg)?;
            if let Some(report) = demod.decode_frame(frame) {
                println!("{}", serde_json::to_string(&report)?);
                reports.push(report);
            }
        }
    } else if let Some(path) = &options.file {
        let mut source = FileSource::new(path);
        demod.run(&mut source, &mut reports)?;
        print_table(&reports);
        info!("{:?}", demod.stats());
    } else {
        bail!("a capture file or at least one --message is required");
    }

    if let Some(path) = &options.json {
        write_json(path, &reports)?;
        info!("JSON output saved to {}", path.display());
    }
    if let Some(path) = &options.csv {
        write_csv(path, &reports)?;
        info!("CSV output saved to {}", path.display());
    }
    Ok(())
}
