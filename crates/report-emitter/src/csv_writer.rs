use std::io::Write;

use nightscreen_core::{ModelName, NightscreenError, Opportunity};

/// Full per-candidate results, one row per Opportunity. Grounded on
/// `portfolio-manager`'s `csv::ReaderBuilder`/`csv::Writer` usage, the
/// other direction: writing rather than parsing.
pub fn write_full_results(opportunities: &[Opportunity], out: impl Write) -> Result<(), NightscreenError> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(out);

    writer
        .write_record([
            "symbol",
            "sector",
            "name",
            "price",
            "avg_volume",
            "volatility",
            "beta",
            "screening_score",
            "score",
            "rating",
            "direction",
            "confidence",
            "expected_change_pct",
            "final_confidence",
            "volume_adjustment",
            "event_adjustment",
            "lstm_direction",
            "lstm_confidence",
            "lstm_weight",
            "trend_direction",
            "trend_confidence",
            "trend_weight",
            "technical_direction",
            "technical_confidence",
            "technical_weight",
            "sentiment_direction",
            "sentiment_confidence",
            "sentiment_weight",
            "has_upcoming_event",
            "days_to_event",
            "event_type",
            "avg_sentiment_72h",
            "vol_spike",
            "risk_score",
            "weight_haircut",
            "skip_trading",
            "suggested_hedge_beta",
            "warning_message",
            "entry_price",
            "stop_price",
            "target_price",
        ])
        .map_err(csv_error)?;

    for o in opportunities {
        let contribution = |model: ModelName| o.prediction.contributions.iter().find(|c| c.model == model);
        let lstm = contribution(ModelName::Lstm);
        let trend = contribution(ModelName::Trend);
        let technical = contribution(ModelName::Technical);
        let sentiment = contribution(ModelName::Sentiment);

        let entry = o.candidate.price;
        let stop = entry * (1.0 - o.candidate.volatility.max(0.02));
        let target = entry * (1.0 + o.prediction.expected_change_pct.abs().max(0.01));

        writer
            .write_record([
                o.candidate.symbol.clone(),
                o.candidate.sector.as_str().to_string(),
                o.candidate.name.clone(),
                o.candidate.price.to_string(),
                o.candidate.avg_volume.to_string(),
                o.candidate.volatility.to_string(),
                o.candidate.beta.to_string(),
                o.candidate.screening_score.to_string(),
                o.score.to_string(),
                o.rating.as_str().to_string(),
                format!("{:?}", o.prediction.direction),
                o.prediction.confidence.to_string(),
                o.prediction.expected_change_pct.to_string(),
                o.prediction.final_confidence.to_string(),
                o.prediction.volume_adjustment.to_string(),
                o.prediction.event_adjustment.to_string(),
                lstm.map(|c| format!("{:?}", c.direction)).unwrap_or_default(),
                lstm.map(|c| c.confidence.to_string()).unwrap_or_default(),
                lstm.map(|c| c.weight.to_string()).unwrap_or_default(),
                trend.map(|c| format!("{:?}", c.direction)).unwrap_or_default(),
                trend.map(|c| c.confidence.to_string()).unwrap_or_default(),
                trend.map(|c| c.weight.to_string()).unwrap_or_default(),
                technical.map(|c| format!("{:?}", c.direction)).unwrap_or_default(),
                technical.map(|c| c.confidence.to_string()).unwrap_or_default(),
                technical.map(|c| c.weight.to_string()).unwrap_or_default(),
                sentiment.map(|c| format!("{:?}", c.direction)).unwrap_or_default(),
                sentiment.map(|c| c.confidence.to_string()).unwrap_or_default(),
                sentiment.map(|c| c.weight.to_string()).unwrap_or_default(),
                o.guard.has_upcoming_event.to_string(),
                o.guard.days_to_event.map(|d| d.to_string()).unwrap_or_default(),
                o.guard.event_type.map(|e| e.as_str().to_string()).unwrap_or_default(),
                o.guard.avg_sentiment_72h.map(|s| s.to_string()).unwrap_or_default(),
                o.guard.vol_spike.to_string(),
                o.guard.risk_score.to_string(),
                o.guard.weight_haircut.to_string(),
                o.guard.skip_trading.to_string(),
                o.guard.suggested_hedge_beta.map(|b| b.to_string()).unwrap_or_default(),
                o.guard.warning_message.clone(),
                entry.to_string(),
                stop.to_string(),
                target.to_string(),
            ])
            .map_err(csv_error)?;
    }

    writer.flush().map_err(io_error)?;
    Ok(())
}

/// Focused event-risk view: symbol, event_type, days_to_event, risk_score,
/// skip_trading, warning.
pub fn write_event_risk_summary(opportunities: &[Opportunity], out: impl Write) -> Result<(), NightscreenError> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(out);

    writer
        .write_record(["symbol", "event_type", "days_to_event", "risk_score", "skip_trading", "warning"])
        .map_err(csv_error)?;

    for o in opportunities {
        writer
            .write_record([
                o.candidate.symbol.clone(),
                o.guard.event_type.map(|e| e.as_str().to_string()).unwrap_or_default(),
                o.guard.days_to_event.map(|d| d.to_string()).unwrap_or_default(),
                o.guard.risk_score.to_string(),
                o.guard.skip_trading.to_string(),
                o.guard.warning_message.clone(),
            ])
            .map_err(csv_error)?;
    }

    writer.flush().map_err(io_error)?;
    Ok(())
}

fn csv_error(e: csv::Error) -> NightscreenError {
    NightscreenError::ReportWrite { reason: e.to_string() }
}

fn io_error(e: std::io::Error) -> NightscreenError {
    NightscreenError::ReportWrite { reason: e.to_string() }
}
