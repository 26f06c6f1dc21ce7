//! Input normalizer: loads the PV, EV, and mall series and aligns them to a
//! common 8,760-hour local-time index.
//!
//! Each file goes through the same pipeline: sniff the delimiter, pick the
//! timestamp and value columns, parse every row, detect the granularity
//! (hourly or 15-minute), convert power columns to energy, fold quarters into
//! hours, and finally check length and calendar alignment.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDateTime, TimeZone, Timelike};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, InputConfig};
use crate::error::{Error, InputError};
use crate::sim::types::HourlyInput;

/// Hours in the simulated year.
pub const HOURS_PER_YEAR: usize = 8760;

const QUARTERS_PER_HOUR: usize = 4;

const TIMESTAMP_COLUMNS: &[&str] = &[
    "timestamp",
    "datetime",
    "fechahora",
    "fecha_hora",
    "horafecha",
    "date",
    "fecha",
    "time",
];

const PV_COLUMNS: &[&str] = &[
    "pv_kwh",
    "pv_generation_kwh",
    "ac_energy_kwh",
    "energia_kwh",
    "ac_power_kw",
    "potencia_kw",
    "p_ac",
];

const EV_COLUMNS: &[&str] = &["ev_demand_kwh", "ev_kwh", "ev_energia_total_kwh"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Which of the three inputs a file holds; decides the value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Pv,
    Ev,
    Mall,
}

impl SeriesKind {
    fn label(self) -> &'static str {
        match self {
            SeriesKind::Pv => "pv",
            SeriesKind::Ev => "ev",
            SeriesKind::Mall => "mall",
        }
    }
}

/// Whether a column holds energy per interval or average power.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Energy,
    Power,
}

impl Unit {
    fn from_header(name: &str) -> Self {
        if name.contains("kwh") {
            Unit::Energy
        } else if name.contains("kw") || name.contains("power") || name == "p_ac" {
            Unit::Power
        } else {
            Unit::Energy
        }
    }
}

struct Columns {
    timestamp: usize,
    values: Vec<(usize, Unit)>,
}

/// Parsed rows before granularity handling.
struct RawSeries {
    timestamps: Vec<DateTime<FixedOffset>>,
    /// Summed value columns, in their own unit.
    values: Vec<f64>,
    units: Unit,
}

/// An hourly series with the local start of its first hour.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries {
    pub start: DateTime<FixedOffset>,
    pub kwh: Vec<f64>,
}

fn local_offset(cfg: &InputConfig) -> Result<FixedOffset, Error> {
    cfg.fixed_offset().ok_or_else(|| {
        Error::from(ConfigError {
            field: "input.utc_offset_hours".to_string(),
            message: format!("offset {} h is out of range", cfg.utc_offset_hours),
        })
    })
}

/// The common index: consecutive local hours from January 1st 00:00.
///
/// # Errors
///
/// Returns `Error::Config` if the year or offset cannot form a timestamp.
pub fn hourly_index(cfg: &InputConfig) -> Result<Vec<DateTime<FixedOffset>>, Error> {
    let start = cfg.start_of_year().ok_or_else(|| {
        Error::from(ConfigError {
            field: "input.year".to_string(),
            message: format!("cannot build January 1st of {}", cfg.year),
        })
    })?;
    Ok((0..HOURS_PER_YEAR)
        .map(|h| start + Duration::hours(h as i64))
        .collect())
}

fn sniff_delimiter(header: &str) -> u8 {
    if header.contains(';') { b';' } else { b',' }
}

/// Parses a number that may use a comma decimal with `.` thousands.
fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.contains(',') {
        s.replace('.', "").replace(',', ".").parse().ok()
    } else {
        s.parse().ok()
    }
}

/// Parses a timestamp in any accepted layout into `offset` local time.
fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&offset));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&offset));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c))
}

fn select_columns(kind: SeriesKind, headers: &[String], file: &Path) -> Result<Columns, InputError> {
    let timestamp = find_column(headers, TIMESTAMP_COLUMNS).unwrap_or(0);
    let values: Vec<(usize, Unit)> = match kind {
        SeriesKind::Pv => find_column(headers, PV_COLUMNS)
            .map(|i| vec![(i, Unit::from_header(&headers[i]))])
            .unwrap_or_default(),
        SeriesKind::Ev => match find_column(headers, EV_COLUMNS) {
            Some(i) => vec![(i, Unit::from_header(&headers[i]))],
            None => headers
                .iter()
                .enumerate()
                .filter(|(_, h)| {
                    h.starts_with("socket_")
                        && (h.ends_with("_kw") || h.ends_with("_kwh") || h.contains("power"))
                })
                .map(|(i, h)| (i, Unit::from_header(h)))
                .collect(),
        },
        SeriesKind::Mall => headers
            .iter()
            .enumerate()
            .find(|(i, _)| *i != timestamp)
            .map(|(i, h)| vec![(i, Unit::from_header(h))])
            .unwrap_or_default(),
    };

    if values.is_empty() {
        let expected = match kind {
            SeriesKind::Pv => PV_COLUMNS.join(", "),
            SeriesKind::Ev => format!("{} or socket_* power columns", EV_COLUMNS.join(", ")),
            SeriesKind::Mall => "a value column after the timestamp".to_string(),
        };
        return Err(InputError::new(
            file,
            format!("missing required {} column (expected {expected})", kind.label()),
        ));
    }
    let first_unit = values[0].1;
    if values.iter().any(|(_, u)| *u != first_unit) {
        return Err(InputError::new(file, "value columns mix kW and kWh units"));
    }
    Ok(Columns { timestamp, values })
}

fn read_rows(
    kind: SeriesKind,
    text: &str,
    file: &Path,
    offset: FixedOffset,
) -> Result<RawSeries, InputError> {
    let header_line = text.lines().next().unwrap_or_default();
    let delimiter = sniff_delimiter(header_line);
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| InputError::new(file, format!("unreadable header: {e}")))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect();
    let cols = select_columns(kind, &headers, file)?;
    debug!(
        file = %file.display(),
        delimiter = %char::from(delimiter),
        timestamp_column = %headers[cols.timestamp],
        value_columns = cols.values.len(),
        "reading {} series",
        kind.label()
    );

    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let row = i + 1;
        let record = record.map_err(|e| InputError::at_row(file, row, e.to_string()))?;

        let raw_ts = record.get(cols.timestamp).unwrap_or_default();
        let ts = parse_timestamp(raw_ts, offset)
            .ok_or_else(|| InputError::at_row(file, row, format!("unparseable timestamp \"{raw_ts}\"")))?;

        let mut sum = 0.0;
        for &(idx, _) in &cols.values {
            let raw = record.get(idx).unwrap_or_default();
            let v = parse_number(raw).ok_or_else(|| {
                InputError::at_row(file, row, format!("non-numeric value \"{raw}\" in column {}", headers[idx]))
            })?;
            if !v.is_finite() {
                return Err(InputError::at_row(file, row, "non-finite value"));
            }
            if v < 0.0 {
                return Err(InputError::at_row(file, row, format!("negative energy {v}")));
            }
            sum += v;
        }
        timestamps.push(ts);
        values.push(sum);
    }

    Ok(RawSeries {
        timestamps,
        values,
        units: cols.values[0].1,
    })
}

/// Detects the step, converts to energy, and folds quarters into hours.
fn to_hourly(raw: RawSeries, file: &Path) -> Result<HourlySeries, InputError> {
    if raw.timestamps.len() < 2 {
        return Err(InputError::new(file, "need at least two rows to detect granularity"));
    }
    let step = raw.timestamps[1] - raw.timestamps[0];
    let quarter = Duration::minutes(15);
    if step != Duration::hours(1) && step != quarter {
        return Err(InputError::at_row(
            file,
            2,
            format!("unsupported step of {} min (expected 60 or 15)", step.num_minutes()),
        ));
    }
    for (i, pair) in raw.timestamps.windows(2).enumerate() {
        if pair[1] - pair[0] != step {
            return Err(InputError::at_row(
                file,
                i + 2,
                format!(
                    "timestamps not strictly increasing by {} min ({} -> {})",
                    step.num_minutes(),
                    pair[0],
                    pair[1]
                ),
            ));
        }
    }

    let step_hours = step.num_minutes() as f64 / 60.0;
    let energy: Vec<f64> = match raw.units {
        Unit::Energy => raw.values,
        Unit::Power => raw.values.into_iter().map(|kw| kw * step_hours).collect(),
    };
    let start = raw.timestamps[0];

    if step == quarter {
        if start.minute() != 0 {
            return Err(InputError::at_row(file, 1, "15-minute series must start on the hour"));
        }
        if energy.len() % QUARTERS_PER_HOUR != 0 {
            return Err(InputError::new(
                file,
                format!("{} quarter-hour rows do not form whole hours", energy.len()),
            ));
        }
        let kwh = energy
            .chunks(QUARTERS_PER_HOUR)
            .map(|c| c.iter().sum())
            .collect();
        return Ok(HourlySeries { start, kwh });
    }

    Ok(HourlySeries { start, kwh: energy })
}

/// Checks length and calendar position against the common index.
fn align(
    kind: SeriesKind,
    mut series: HourlySeries,
    file: &Path,
    cfg: &InputConfig,
) -> Result<Vec<f64>, InputError> {
    let n = series.kwh.len();
    if n < HOURS_PER_YEAR {
        return Err(InputError::new(
            file,
            format!("{n} hourly values, expected {HOURS_PER_YEAR}"),
        ));
    }
    if n > HOURS_PER_YEAR {
        if kind == SeriesKind::Mall && cfg.truncate_mall_overflow {
            warn!(
                file = %file.display(),
                hours = n,
                "truncating mall series to {HOURS_PER_YEAR} hours"
            );
            series.kwh.truncate(HOURS_PER_YEAR);
        } else {
            return Err(InputError::new(
                file,
                format!("{n} hourly values, expected {HOURS_PER_YEAR}"),
            ));
        }
    }

    let s = series.start;
    if (s.month(), s.day(), s.hour(), s.minute()) != (1, 1, 0, 0) {
        return Err(InputError::at_row(
            file,
            1,
            format!("series starts at {s}, expected January 1st 00:00 local time"),
        ));
    }
    if s.year() != cfg.year {
        warn!(
            file = %file.display(),
            series_year = s.year(),
            index_year = cfg.year,
            "re-stamping {} series onto the configured year",
            kind.label()
        );
    }
    Ok(series.kwh)
}

/// Normalizes one series from CSV text already in memory.
///
/// `file` only labels errors and log lines.
///
/// # Errors
///
/// Returns `Error::Input` for any malformed, negative, gapped, or
/// wrongly-sized series.
pub fn parse_series(
    kind: SeriesKind,
    text: &str,
    file: &Path,
    cfg: &InputConfig,
) -> Result<Vec<f64>, Error> {
    let offset = local_offset(cfg)?;
    let raw = read_rows(kind, text, file, offset)?;
    let hourly = to_hourly(raw, file)?;
    Ok(align(kind, hourly, file, cfg)?)
}

fn load_series(kind: SeriesKind, path: &Path, cfg: &InputConfig) -> Result<Vec<f64>, Error> {
    let text = fs::read_to_string(path)
        .map_err(|e| InputError::new(path, format!("cannot read file: {e}")))?;
    let series = parse_series(kind, &text, path, cfg)?;
    debug!(
        file = %path.display(),
        total_kwh = series.iter().sum::<f64>(),
        "loaded {} series",
        kind.label()
    );
    Ok(series)
}

/// Loads the hourly PV generation (kWh).
///
/// # Errors
///
/// See [`parse_series`].
pub fn load_pv(path: &Path, cfg: &InputConfig) -> Result<Vec<f64>, Error> {
    load_series(SeriesKind::Pv, path, cfg)
}

/// Loads the EV charging demand, folding 15-minute rows into hours.
///
/// # Errors
///
/// See [`parse_series`].
pub fn load_ev(path: &Path, cfg: &InputConfig) -> Result<Vec<f64>, Error> {
    load_series(SeriesKind::Ev, path, cfg)
}

/// Loads the mall demand (semicolon-delimited, comma decimal).
///
/// # Errors
///
/// See [`parse_series`].
pub fn load_mall(path: &Path, cfg: &InputConfig) -> Result<Vec<f64>, Error> {
    load_series(SeriesKind::Mall, path, cfg)
}

/// Zips three normalized series onto the common index.
///
/// # Errors
///
/// Returns `Error::Config` if the index cannot be built.
pub fn assemble(
    pv: &[f64],
    ev: &[f64],
    mall: &[f64],
    cfg: &InputConfig,
) -> Result<Vec<HourlyInput>, Error> {
    let index = hourly_index(cfg)?;
    Ok(index
        .into_iter()
        .zip(pv.iter().zip(ev.iter().zip(mall.iter())))
        .map(|(timestamp, (&pv_kwh, (&ev_kwh, &mall_kwh)))| HourlyInput {
            timestamp,
            pv_kwh,
            ev_kwh,
            mall_kwh,
        })
        .collect())
}

/// Loads all three inputs and aligns them into the annual hourly table.
///
/// # Errors
///
/// Returns the first `Error::Input` encountered, naming the file and row.
pub fn load_inputs(
    pv_path: &Path,
    ev_path: &Path,
    mall_path: &Path,
    cfg: &InputConfig,
) -> Result<Vec<HourlyInput>, Error> {
    let pv = load_pv(pv_path, cfg)?;
    let ev = load_ev(ev_path, cfg)?;
    let mall = load_mall(mall_path, cfg)?;
    let inputs = assemble(&pv, &ev, &mall, cfg)?;
    info!(
        hours = inputs.len(),
        pv_kwh = pv.iter().sum::<f64>(),
        ev_kwh = ev.iter().sum::<f64>(),
        mall_kwh = mall.iter().sum::<f64>(),
        "inputs normalized"
    );
    Ok(inputs)
}
