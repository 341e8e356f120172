use crate::{Alert, AlertType};

pub struct EmailTemplate;

impl EmailTemplate {
    pub fn render(alert: &Alert) -> String {
        let body_content = match &alert.alert_type {
            AlertType::MorningReport { body_html, attachments, .. } => {
                let attachment_list = if attachments.is_empty() {
                    String::new()
                } else {
                    let items: String = attachments
                        .iter()
                        .map(|p| format!("<li>{}</li>", p.display()))
                        .collect();
                    format!(r#"<ul style="padding:0 20px;color:#64748b;">{items}</ul>"#)
                };
                format!("{body_html}{attachment_list}")
            }
            AlertType::PipelineFailure { reason } => {
                format!(
                    r#"<div style="background:#ef4444;color:#fff;padding:12px 20px;border-radius:8px 8px 0 0;font-size:18px;font-weight:700;">PIPELINE FAILURE</div>
<div style="padding:16px 20px;">
  <p style="color:#ef4444;font-weight:600;font-size:16px;margin:0 0 8px;">The overnight run did not complete</p>
  <p style="color:#334155;margin:0;">{reason}</p>
</div>"#
                )
            }
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td>
        {body_content}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">
          {msg}
          <br>Sent at {ts} UTC
        </p>
      </td></tr>
    </table>
    <p style="color:#94a3b8;font-size:11px;margin-top:16px;">Nightscreen Notification Service</p>
  </td></tr>
</table>
</body>
</html>"#,
            msg = alert.message.replace('<', "&lt;").replace('>', "&gt;"),
            ts = alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morning_report_renders_body_html_verbatim() {
        let alert = Alert::morning_report("subj", "<p>report body</p>", vec![]);
        let rendered = EmailTemplate::render(&alert);
        assert!(rendered.contains("report body"));
    }

    #[test]
    fn pipeline_failure_renders_reason() {
        let alert = Alert::pipeline_failure("config error: missing sector file");
        let rendered = EmailTemplate::render(&alert);
        assert!(rendered.contains("PIPELINE FAILURE"));
    }
}
