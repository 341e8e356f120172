use chrono::NaiveDate;
use chrono_tz::Australia::Sydney;
use chrono_tz::Tz;
use nightscreen_core::{EventInfo, EventSourceKind, EventType, NightscreenError};
use std::io::Read;

const MARKET_TZ: Tz = Sydney;

#[derive(Debug, serde::Deserialize)]
struct CalendarRow {
    ticker: String,
    event_type: String,
    date: String,
    title: Option<String>,
    url: Option<String>,
}

/// Parses the manual ASX event calendar (`ticker,event_type,date,title,url`).
/// Dates are plain `YYYY-MM-DD` strings; they are market-timezone dates by
/// construction (Australia/Sydney trading calendar), not UTC instants, so no
/// timezone conversion happens here beyond tagging the source as
/// `CalendarCsv` — it's the callers comparing against "today" that must use
/// a Sydney-anchored today, which `EventRiskGuard::assess` does.
pub fn parse_calendar(csv_bytes: impl Read) -> Result<Vec<EventInfo>, NightscreenError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(csv_bytes);

    let mut events = Vec::new();
    for result in reader.deserialize::<CalendarRow>() {
        let row = result.map_err(|e| NightscreenError::ConfigError(format!("calendar csv: {e}")))?;

        let Some(event_type) = EventType::from_str(&row.event_type) else {
            tracing::warn!(
                ticker = row.ticker,
                event_type = row.event_type,
                "calendar row skipped: unrecognized event_type"
            );
            continue;
        };

        let date = match NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(ticker = row.ticker, date = row.date, error = %e, "calendar row skipped: bad date");
                continue;
            }
        };

        events.push(EventInfo {
            symbol: row.ticker,
            event_type,
            date,
            source: EventSourceKind::CalendarCsv,
            title: row.title,
            url: row.url,
        });
    }

    Ok(events)
}

/// Market-timezone "today" used for all event-date comparisons, so naive and
/// aware dates never get mixed.
pub fn market_today() -> NaiveDate {
    chrono::Utc::now().with_timezone(&MARKET_TZ).date_naive()
}
