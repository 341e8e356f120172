use nightscreen_core::{Direction, MarketSentiment, Opportunity};

/// Hand-built HTML report. Plain `format!`/string-builder style, the same
/// shape `EmailTemplate::render` uses for a single alert body, extended
/// here to a multi-section document.
pub struct MorningReportHtml;

impl MorningReportHtml {
    pub fn render(
        run_date: &str,
        market: &MarketSentiment,
        ranked: &[Opportunity],
        watchlist: &[&Opportunity],
        sit_outs: &[&Opportunity],
    ) -> String {
        let overview = render_overview(run_date, market);
        let top10 = render_top10(ranked);
        let watchlist_html = render_watchlist(watchlist);
        let warnings_html = render_warnings(sit_outs);
        let sector_breakdown = render_sector_breakdown(ranked);

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="760" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td>
        {overview}
        {top10}
        {watchlist_html}
        {warnings_html}
        {sector_breakdown}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">Generated for {run_date}.</p>
      </td></tr>
    </table>
    <p style="color:#94a3b8;font-size:11px;margin-top:16px;">Nightscreen Overnight Pipeline</p>
  </td></tr>
</table>
</body>
</html>"#
        )
    }
}

fn render_overview(run_date: &str, market: &MarketSentiment) -> String {
    let bias_color = match market.gap_direction {
        nightscreen_core::GapDirection::Up => "#22c55e",
        nightscreen_core::GapDirection::Down => "#ef4444",
        nightscreen_core::GapDirection::Flat => "#64748b",
    };
    format!(
        r#"<div style="background:#1e293b;color:#fff;padding:12px 20px;font-size:18px;font-weight:700;">Market Overview &mdash; {run_date}</div>
<table style="width:100%;border-collapse:collapse;">
  <tr><td style="padding:8px 20px;color:#94a3b8;">SPI Change</td><td style="padding:8px 20px;font-weight:600;">{:.2}%</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 20px;color:#94a3b8;">Gap Direction</td><td style="padding:8px 20px;font-weight:600;color:{bias_color};">{:?}</td></tr>
  <tr><td style="padding:8px 20px;color:#94a3b8;">Overall Sentiment</td><td style="padding:8px 20px;font-weight:600;">{:?}</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 20px;color:#94a3b8;">Sentiment Score</td><td style="padding:8px 20px;font-weight:600;">{:.0}</td></tr>
</table>"#,
        market.spi_change_pct, market.gap_direction, market.overall_sentiment, market.sentiment_score,
    )
}

fn render_top10(ranked: &[Opportunity]) -> String {
    let rows: String = ranked
        .iter()
        .take(10)
        .map(|o| {
            let direction_color = match o.prediction.direction {
                Direction::Buy => "#22c55e",
                Direction::Sell => "#ef4444",
                Direction::Hold => "#64748b",
            };
            let entry = o.candidate.price;
            let stop = entry * (1.0 - o.candidate.volatility.max(0.02));
            let target = entry * (1.0 + o.prediction.expected_change_pct.abs().max(0.01));
            format!(
                r#"<tr><td style="padding:6px 20px;">{}</td><td style="padding:6px 20px;">{}</td><td style="padding:6px 20px;font-weight:600;color:{direction_color};">{:?}</td><td style="padding:6px 20px;">{}</td><td style="padding:6px 20px;">{:.1}</td><td style="padding:6px 20px;">${:.2}</td><td style="padding:6px 20px;">${:.2}</td><td style="padding:6px 20px;">${:.2}</td></tr>"#,
                o.candidate.symbol,
                o.candidate.sector.as_str(),
                o.prediction.direction,
                o.rating.as_str(),
                o.score,
                entry,
                stop,
                target,
            )
        })
        .collect();

    format!(
        r#"<div style="background:#0f172a;color:#fff;padding:12px 20px;font-size:16px;font-weight:700;">Top 10 Opportunities</div>
<table style="width:100%;border-collapse:collapse;">
  <tr style="color:#94a3b8;font-size:12px;"><td style="padding:6px 20px;">Symbol</td><td style="padding:6px 20px;">Sector</td><td style="padding:6px 20px;">Signal</td><td style="padding:6px 20px;">Rating</td><td style="padding:6px 20px;">Score</td><td style="padding:6px 20px;">Entry</td><td style="padding:6px 20px;">Stop</td><td style="padding:6px 20px;">Target</td></tr>
  {rows}
</table>"#
    )
}

fn render_watchlist(watchlist: &[&Opportunity]) -> String {
    if watchlist.is_empty() {
        return String::new();
    }
    let rows: String = watchlist
        .iter()
        .map(|o| {
            format!(
                r#"<tr><td style="padding:6px 20px;">{}</td><td style="padding:6px 20px;">{:.1}%</td><td style="padding:6px 20px;">{:?}</td></tr>"#,
                o.candidate.symbol, o.prediction.final_confidence, o.prediction.direction,
            )
        })
        .collect();
    format!(
        r#"<div style="background:#334155;color:#fff;padding:12px 20px;font-size:16px;font-weight:700;">Watchlist (60&ndash;75% confidence)</div>
<table style="width:100%;border-collapse:collapse;">
  <tr style="color:#94a3b8;font-size:12px;"><td style="padding:6px 20px;">Symbol</td><td style="padding:6px 20px;">Confidence</td><td style="padding:6px 20px;">Signal</td></tr>
  {rows}
</table>"#
    )
}

fn render_warnings(sit_outs: &[&Opportunity]) -> String {
    if sit_outs.is_empty() {
        return String::new();
    }
    let rows: String = sit_outs
        .iter()
        .map(|o| {
            format!(
                r#"<tr><td style="padding:6px 20px;">{}</td><td style="padding:6px 20px;color:#ef4444;">{}</td></tr>"#,
                o.candidate.symbol, o.guard.warning_message,
            )
        })
        .collect();
    format!(
        r#"<div style="background:#ef4444;color:#fff;padding:12px 20px;font-size:16px;font-weight:700;">Sit-Out Warnings</div>
<table style="width:100%;border-collapse:collapse;">
  {rows}
</table>"#
    )
}

fn render_sector_breakdown(ranked: &[Opportunity]) -> String {
    let mut counts: std::collections::BTreeMap<&'static str, usize> = std::collections::BTreeMap::new();
    for o in ranked {
        *counts.entry(o.candidate.sector.as_str()).or_insert(0) += 1;
    }
    let rows: String = counts
        .iter()
        .map(|(sector, count)| {
            format!(r#"<tr><td style="padding:6px 20px;">{sector}</td><td style="padding:6px 20px;">{count}</td></tr>"#)
        })
        .collect();
    format!(
        r#"<div style="background:#334155;color:#fff;padding:12px 20px;font-size:16px;font-weight:700;">Sector Breakdown</div>
<table style="width:100%;border-collapse:collapse;">
  {rows}
</table>"#
    )
}
