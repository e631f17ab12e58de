//! GTFS static feed reader.
//!
//! Reads the subset of a GTFS zip needed for journey planning:
//! `stops.txt`, `routes.txt`, `trips.txt` and `stop_times.txt`, plus the
//! optional `transfers.txt`, `calendar.txt` and `calendar_dates.txt`.
//! Columns are located by header name, so extra columns are ignored.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek};

use chrono::{Datelike, NaiveDate};
use csv::StringRecord;
use tracing::{debug, info, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::domain::{Mode, RouteId, ServiceTime, StopId, TripId};

use super::error::FormatError;
use super::snapshot::{
    RouteRecord, ScheduleSnapshot, StopRecord, StopTimeRecord, TransferRecord, TransferRule,
    TripRecord,
};

/// Maximum total decompressed size accepted (2 GB).
const MAX_DECOMPRESSED_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Decode a GTFS zip held in memory.
///
/// With `service_date`, trips whose service does not run on that date are
/// dropped. Without it every trip is treated as running.
pub fn read_gtfs_zip(
    bytes: &[u8],
    service_date: Option<NaiveDate>,
) -> Result<ScheduleSnapshot, FormatError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut total_uncompressed: u64 = 0;
    for i in 0..archive.len() {
        total_uncompressed += archive.by_index(i)?.size();
    }
    if total_uncompressed > MAX_DECOMPRESSED_SIZE {
        return Err(FormatError::TooLarge {
            size: total_uncompressed,
            limit: MAX_DECOMPRESSED_SIZE,
        });
    }

    let StopsFile { stops, stations } = parse_stops(&read_required(&mut archive, "stops.txt")?)?;
    info!(count = stops.len(), stations = stations.len(), "Parsed GTFS stops");

    let routes = parse_routes(&read_required(&mut archive, "routes.txt")?)?;
    info!(count = routes.len(), "Parsed GTFS routes");

    let mut trips = parse_trips(&read_required(&mut archive, "trips.txt")?)?;
    info!(count = trips.len(), "Parsed GTFS trips");

    if let Some(date) = service_date {
        let calendar = ServiceCalendar::read(&mut archive)?;
        let before = trips.len();
        trips.retain(|t| calendar.is_active(&t.service_id, date));
        info!(%date, kept = trips.len(), dropped = before - trips.len(), "Filtered trips by service date");
    }

    let mut stop_times = parse_stop_times(&read_required(&mut archive, "stop_times.txt")?)?;
    let total: usize = stop_times.values().map(Vec::len).sum();
    info!(trips_with_times = stop_times.len(), total_stop_times = total, "Parsed GTFS stop_times");

    let transfers = match read_optional(&mut archive, "transfers.txt")? {
        Some(data) => platform_transfers(parse_transfers(&data)?, &stops, &stations),
        None => {
            debug!("No transfers.txt in GTFS zip (optional file)");
            Vec::new()
        }
    };

    let trips = trips
        .into_iter()
        .map(|t| TripRecord {
            stop_times: stop_times
                .remove(&t.id)
                .unwrap_or_default()
                .into_iter()
                .map(|(_, st)| st)
                .collect(),
            id: t.id,
            route: t.route,
            headsign: t.headsign,
        })
        .collect();

    Ok(ScheduleSnapshot {
        service_date,
        stops,
        routes,
        trips,
        transfers,
    })
}

fn read_optional<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &'static str,
) -> Result<Option<Vec<u8>>, FormatError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_required<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &'static str,
) -> Result<Vec<u8>, FormatError> {
    read_optional(archive, name)?.ok_or(FormatError::MissingFile(name))
}

/// Header positions for one CSV file.
struct Columns {
    file: &'static str,
    headers: StringRecord,
}

impl Columns {
    fn new(file: &'static str, reader: &mut csv::Reader<&[u8]>) -> Result<Self, FormatError> {
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();
        Ok(Self { file, headers })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    fn required(&self, column: &'static str) -> Result<usize, FormatError> {
        self.optional(column).ok_or(FormatError::MissingColumn {
            file: self.file,
            column,
        })
    }

    fn invalid(&self, record: &StringRecord, column: &'static str, value: &str) -> FormatError {
        FormatError::InvalidField {
            file: self.file,
            row: record.position().map(|p| p.line()).unwrap_or(0),
            column,
            value: value.to_string(),
        }
    }
}

fn field(record: &StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new().flexible(true).from_reader(data)
}

/// Boarding stops, and the boarding stops of each station.
struct StopsFile {
    stops: Vec<StopRecord>,
    stations: HashMap<StopId, Vec<StopId>>,
}

fn parse_stops(data: &[u8]) -> Result<StopsFile, FormatError> {
    let mut rdr = reader(data);
    let cols = Columns::new("stops.txt", &mut rdr)?;
    let idx_id = Some(cols.required("stop_id")?);
    let idx_name = cols.optional("stop_name");
    let idx_code = cols.optional("stop_code");
    let idx_lat = Some(cols.required("stop_lat")?);
    let idx_lon = Some(cols.required("stop_lon")?);
    let idx_type = cols.optional("location_type");
    let idx_parent = cols.optional("parent_station");

    let mut stops = Vec::new();
    let mut stations: HashMap<StopId, Vec<StopId>> = HashMap::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let raw_id = field(&record, idx_id);
        let id = StopId::parse(raw_id).map_err(|_| cols.invalid(&record, "stop_id", raw_id))?;

        match field(&record, idx_type) {
            "" | "0" => {}
            "1" => {
                stations.entry(id).or_default();
                continue;
            }
            // Entrances, generic nodes and boarding areas
            _ => {
                skipped += 1;
                continue;
            }
        }

        let raw_lat = field(&record, idx_lat);
        let lat = raw_lat
            .parse()
            .map_err(|_| cols.invalid(&record, "stop_lat", raw_lat))?;
        let raw_lon = field(&record, idx_lon);
        let lon = raw_lon
            .parse()
            .map_err(|_| cols.invalid(&record, "stop_lon", raw_lon))?;
        let name = non_empty(field(&record, idx_name)).unwrap_or_else(|| id.to_string());

        if let Ok(parent) = StopId::parse(field(&record, idx_parent)) {
            stations.entry(parent).or_default().push(id.clone());
        }
        stops.push(StopRecord {
            id,
            name,
            lat,
            lon,
            aliases: non_empty(field(&record, idx_code)).into_iter().collect(),
        });
    }
    if skipped > 0 {
        debug!(skipped, "Skipped non-boarding stops.txt records");
    }
    Ok(StopsFile { stops, stations })
}

/// Rewrite transfer rules onto boarding stops.
///
/// A rule naming a station applies to each of its boarding stops. Rules
/// about anything else that is not a boarding stop are dropped. Rules
/// naming two boarding stops come last so they override station rules.
fn platform_transfers(
    transfers: Vec<TransferRecord>,
    stops: &[StopRecord],
    stations: &HashMap<StopId, Vec<StopId>>,
) -> Vec<TransferRecord> {
    let boarding: HashSet<&StopId> = stops.iter().map(|s| &s.id).collect();
    let expand = |id: &StopId| -> Vec<StopId> {
        if boarding.contains(id) {
            vec![id.clone()]
        } else {
            stations.get(id).cloned().unwrap_or_default()
        }
    };

    let (direct, via_station): (Vec<_>, Vec<_>) = transfers
        .into_iter()
        .partition(|t| boarding.contains(&t.from) && boarding.contains(&t.to));

    let mut out = Vec::with_capacity(direct.len() + via_station.len());
    let mut dropped = 0usize;
    for record in via_station {
        let (from, to) = (expand(&record.from), expand(&record.to));
        if from.is_empty() || to.is_empty() {
            dropped += 1;
            continue;
        }
        for f in &from {
            for t in &to {
                out.push(TransferRecord {
                    from: f.clone(),
                    to: t.clone(),
                    rule: record.rule,
                });
            }
        }
    }
    if dropped > 0 {
        warn!(dropped, "Dropped transfers.txt records naming no boarding stop");
    }
    out.extend(direct);
    out
}

fn parse_routes(data: &[u8]) -> Result<Vec<RouteRecord>, FormatError> {
    let mut rdr = reader(data);
    let cols = Columns::new("routes.txt", &mut rdr)?;
    let idx_id = Some(cols.required("route_id")?);
    let idx_short = cols.optional("route_short_name");
    let idx_long = cols.optional("route_long_name");
    let idx_type = Some(cols.required("route_type")?);

    let mut routes = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let raw_id = field(&record, idx_id);
        let id = RouteId::parse(raw_id).map_err(|_| cols.invalid(&record, "route_id", raw_id))?;
        let raw_type = field(&record, idx_type);
        let route_type: u16 = raw_type
            .parse()
            .map_err(|_| cols.invalid(&record, "route_type", raw_type))?;
        let name = non_empty(field(&record, idx_short))
            .or_else(|| non_empty(field(&record, idx_long)))
            .unwrap_or_default();

        routes.push(RouteRecord {
            id,
            name,
            mode: Mode::from_gtfs_route_type(route_type),
        });
    }
    Ok(routes)
}

struct TripRow {
    id: TripId,
    route: RouteId,
    service_id: String,
    headsign: Option<String>,
}

fn parse_trips(data: &[u8]) -> Result<Vec<TripRow>, FormatError> {
    let mut rdr = reader(data);
    let cols = Columns::new("trips.txt", &mut rdr)?;
    let idx_route = Some(cols.required("route_id")?);
    let idx_trip = Some(cols.required("trip_id")?);
    let idx_service = cols.optional("service_id");
    let idx_headsign = cols.optional("trip_headsign");

    let mut trips = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let raw_trip = field(&record, idx_trip);
        let id = TripId::parse(raw_trip).map_err(|_| cols.invalid(&record, "trip_id", raw_trip))?;
        let raw_route = field(&record, idx_route);
        let route =
            RouteId::parse(raw_route).map_err(|_| cols.invalid(&record, "route_id", raw_route))?;
        trips.push(TripRow {
            id,
            route,
            service_id: field(&record, idx_service).to_string(),
            headsign: non_empty(field(&record, idx_headsign)),
        });
    }
    Ok(trips)
}

/// Stop times per trip, ordered by `stop_sequence`.
fn parse_stop_times(
    data: &[u8],
) -> Result<HashMap<TripId, Vec<(u32, StopTimeRecord)>>, FormatError> {
    let mut rdr = reader(data);
    let cols = Columns::new("stop_times.txt", &mut rdr)?;
    let idx_trip = Some(cols.required("trip_id")?);
    let idx_seq = Some(cols.required("stop_sequence")?);
    let idx_stop = Some(cols.required("stop_id")?);
    let idx_arr = cols.optional("arrival_time");
    let idx_dep = cols.optional("departure_time");

    let parse_time = |record: &StringRecord,
                      idx: Option<usize>,
                      column: &'static str|
     -> Result<Option<ServiceTime>, FormatError> {
        let raw = field(record, idx);
        if raw.is_empty() {
            return Ok(None);
        }
        ServiceTime::parse(raw)
            .map(Some)
            .map_err(|_| cols.invalid(record, column, raw))
    };

    let mut stop_times: HashMap<TripId, Vec<(u32, StopTimeRecord)>> = HashMap::new();
    for result in rdr.records() {
        let record = result?;
        let raw_trip = field(&record, idx_trip);
        let trip = TripId::parse(raw_trip).map_err(|_| cols.invalid(&record, "trip_id", raw_trip))?;
        let raw_seq = field(&record, idx_seq);
        let sequence: u32 = raw_seq
            .parse()
            .map_err(|_| cols.invalid(&record, "stop_sequence", raw_seq))?;
        let raw_stop = field(&record, idx_stop);
        let stop = StopId::parse(raw_stop).map_err(|_| cols.invalid(&record, "stop_id", raw_stop))?;

        let st = StopTimeRecord {
            stop,
            arrival: parse_time(&record, idx_arr, "arrival_time")?,
            departure: parse_time(&record, idx_dep, "departure_time")?,
        };
        stop_times.entry(trip).or_default().push((sequence, st));
    }

    for sts in stop_times.values_mut() {
        sts.sort_by_key(|(seq, _)| *seq);
    }
    Ok(stop_times)
}

fn parse_transfers(data: &[u8]) -> Result<Vec<TransferRecord>, FormatError> {
    let mut rdr = reader(data);
    let cols = Columns::new("transfers.txt", &mut rdr)?;
    let idx_from = Some(cols.required("from_stop_id")?);
    let idx_to = Some(cols.required("to_stop_id")?);
    let idx_type = cols.optional("transfer_type");
    let idx_min = cols.optional("min_transfer_time");

    let mut transfers = Vec::new();
    let mut ignored = 0usize;
    for result in rdr.records() {
        let record = result?;
        let raw_from = field(&record, idx_from);
        let raw_to = field(&record, idx_to);
        // Trip- and route-scoped rules leave the stop ids empty
        let (Ok(from), Ok(to)) = (StopId::parse(raw_from), StopId::parse(raw_to)) else {
            ignored += 1;
            continue;
        };

        let rule = match field(&record, idx_type) {
            "2" => {
                let raw = field(&record, idx_min);
                let min_transfer_secs = raw
                    .parse()
                    .map_err(|_| cols.invalid(&record, "min_transfer_time", raw))?;
                TransferRule::MinimumTime { min_transfer_secs }
            }
            "3" => TransferRule::NotPossible,
            // Recommended and timed transfers carry no duration
            _ => {
                ignored += 1;
                continue;
            }
        };
        transfers.push(TransferRecord { from, to, rule });
    }
    if ignored > 0 {
        debug!(ignored, "Ignored transfers.txt records without a stop-level rule");
    }
    Ok(transfers)
}

/// Regular weekly service plus dated exceptions.
struct ServiceCalendar {
    /// service_id -> (mon..sun, start, end)
    weekly: HashMap<String, ([bool; 7], NaiveDate, NaiveDate)>,
    added: HashSet<(String, NaiveDate)>,
    removed: HashSet<(String, NaiveDate)>,
}

impl ServiceCalendar {
    fn read<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Self, FormatError> {
        let mut calendar = ServiceCalendar {
            weekly: HashMap::new(),
            added: HashSet::new(),
            removed: HashSet::new(),
        };

        if let Some(data) = read_optional(archive, "calendar.txt")? {
            calendar.parse_weekly(&data)?;
        }
        if let Some(data) = read_optional(archive, "calendar_dates.txt")? {
            calendar.parse_exceptions(&data)?;
        }
        if calendar.weekly.is_empty() && calendar.added.is_empty() {
            warn!("GTFS zip has no calendar data; no trips will run on the service date");
        }
        Ok(calendar)
    }

    fn parse_weekly(&mut self, data: &[u8]) -> Result<(), FormatError> {
        const DAYS: [&str; 7] = [
            "monday",
            "tuesday",
            "wednesday",
            "thursday",
            "friday",
            "saturday",
            "sunday",
        ];

        let mut rdr = reader(data);
        let cols = Columns::new("calendar.txt", &mut rdr)?;
        let idx_service = Some(cols.required("service_id")?);
        let idx_days = DAYS.map(|d| cols.optional(d));
        let idx_start = Some(cols.required("start_date")?);
        let idx_end = Some(cols.required("end_date")?);

        for result in rdr.records() {
            let record = result?;
            let service_id = field(&record, idx_service).to_string();
            let days = idx_days.map(|idx| field(&record, idx) == "1");
            let raw_start = field(&record, idx_start);
            let start =
                parse_gtfs_date(raw_start).ok_or_else(|| cols.invalid(&record, "start_date", raw_start))?;
            let raw_end = field(&record, idx_end);
            let end =
                parse_gtfs_date(raw_end).ok_or_else(|| cols.invalid(&record, "end_date", raw_end))?;
            self.weekly.insert(service_id, (days, start, end));
        }
        Ok(())
    }

    fn parse_exceptions(&mut self, data: &[u8]) -> Result<(), FormatError> {
        let mut rdr = reader(data);
        let cols = Columns::new("calendar_dates.txt", &mut rdr)?;
        let idx_service = Some(cols.required("service_id")?);
        let idx_date = Some(cols.required("date")?);
        let idx_type = Some(cols.required("exception_type")?);

        for result in rdr.records() {
            let record = result?;
            let service_id = field(&record, idx_service).to_string();
            let raw_date = field(&record, idx_date);
            let date = parse_gtfs_date(raw_date).ok_or_else(|| cols.invalid(&record, "date", raw_date))?;
            match field(&record, idx_type) {
                "1" => {
                    self.added.insert((service_id, date));
                }
                "2" => {
                    self.removed.insert((service_id, date));
                }
                other => return Err(cols.invalid(&record, "exception_type", other)),
            }
        }
        Ok(())
    }

    fn is_active(&self, service_id: &str, date: NaiveDate) -> bool {
        let key = (service_id.to_string(), date);
        if self.removed.contains(&key) {
            return false;
        }
        if self.added.contains(&key) {
            return true;
        }
        match self.weekly.get(service_id) {
            Some((days, start, end)) => {
                *start <= date && date <= *end && days[date.weekday().num_days_from_monday() as usize]
            }
            None => false,
        }
    }
}

/// Parse a GTFS date ("YYYYMMDD").
fn parse_gtfs_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}
