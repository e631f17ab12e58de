use std::process::ExitCode;

use chrono::NaiveDate;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transit_engine::domain::{ServiceTime, StopId};
use transit_engine::engine::{EngineConfig, JourneyRequest, StopRef, TransitEngine};
use transit_engine::network::ScheduleFormat;
use transit_engine::realtime::{FeedSource, FileFeedSource};

const USAGE: &str = "\
usage: transit-engine plan <from> <to> <HH:MM> [--arrive-by]
       transit-engine departures <stop> <HH:MM> [limit]

Stops are matched by name; prefix with id: to give a stop id.

Environment:
  TRANSIT_SCHEDULE          schedule file (required)
  TRANSIT_SCHEDULE_FORMAT   json (default) or gtfs
  TRANSIT_SERVICE_DATE      YYYY-MM-DD, keeps only GTFS trips running that day
  TRANSIT_REALTIME          GTFS-Realtime feed file applied before answering";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<(), BoxError> {
    let command = Command::parse(args).ok_or(USAGE)?;

    let config = EngineConfig::from_env()?;
    let engine = TransitEngine::new(config);

    let path = std::env::var("TRANSIT_SCHEDULE").map_err(|_| "TRANSIT_SCHEDULE not set")?;
    let bytes = tokio::fs::read(&path).await?;
    let version = engine.load_schedule(&bytes, schedule_format()?).await?;
    info!(%path, version, "Loaded schedule");

    if let Ok(feed) = std::env::var("TRANSIT_REALTIME") {
        let source = FileFeedSource::new(&feed);
        match source.fetch().await {
            Ok(bytes) => {
                let summary = engine.apply_realtime_feed(&bytes).await?;
                info!(%feed, applied = summary.applied, "Applied realtime feed");
            }
            Err(e) => warn!(%feed, error = %e, "Ignoring unreadable realtime feed"),
        }
    }

    let output = match command {
        Command::Plan(request) => {
            let set = engine.plan_journey(request).await?;
            serde_json::to_string_pretty(&set.to_response())?
        }
        Command::Departures { stop, after, limit } => {
            let departures = engine.next_departures(&stop, after, limit).await?;
            serde_json::to_string_pretty(&departures)?
        }
    };
    println!("{output}");
    Ok(())
}

enum Command {
    Plan(JourneyRequest),
    Departures {
        stop: StopRef,
        after: ServiceTime,
        limit: usize,
    },
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["plan", from, to, at, rest @ ..] => {
                let (from, to, at) = (stop_ref(from)?, stop_ref(to)?, ServiceTime::parse(at).ok()?);
                match rest {
                    [] => Some(Command::Plan(JourneyRequest::depart_after(from, to, at))),
                    ["--arrive-by"] => Some(Command::Plan(JourneyRequest::arrive_by(from, to, at))),
                    _ => None,
                }
            }
            ["departures", stop, at, rest @ ..] => {
                let limit = match rest {
                    [] => 10,
                    [limit] => limit.parse().ok()?,
                    _ => return None,
                };
                Some(Command::Departures {
                    stop: stop_ref(stop)?,
                    after: ServiceTime::parse(at).ok()?,
                    limit,
                })
            }
            _ => None,
        }
    }
}

fn stop_ref(arg: &str) -> Option<StopRef> {
    match arg.strip_prefix("id:") {
        Some(id) => StopId::parse(id).ok().map(StopRef::Id),
        None => Some(StopRef::name(arg)),
    }
}

fn schedule_format() -> Result<ScheduleFormat, BoxError> {
    let format = std::env::var("TRANSIT_SCHEDULE_FORMAT").unwrap_or_else(|_| "json".to_string());
    match format.as_str() {
        "json" => Ok(ScheduleFormat::Json),
        "gtfs" => {
            let service_date = match std::env::var("TRANSIT_SERVICE_DATE") {
                Ok(date) => Some(NaiveDate::parse_from_str(&date, "%Y-%m-%d")?),
                Err(_) => None,
            };
            Ok(ScheduleFormat::GtfsZip { service_date })
        }
        other => Err(format!("unknown schedule format {other:?}").into()),
    }
}
