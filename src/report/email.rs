//! Report email composition.
//!
//! One message per run: a plain-text fallback part plus an HTML part with one
//! section per flow, each section's screenshot attached as a related inline
//! part referenced through a unique content-ID.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Body, Message, MultiPart, SinglePart};
use uuid::Uuid;

use crate::config::SenderSettings;
use crate::error::FlowError;
use crate::report::types::FlowStatus;

const STATUS_COLOR_PASSED: &str = "#1a7f37";
const STATUS_COLOR_FAILED: &str = "#d92d20";

/// One flow's slice of the report email.
#[derive(Debug, Clone)]
pub struct EmailSection {
    pub title: String,
    pub status: FlowStatus,
    /// Intro HTML; entity-escaped input is unescaped so `&lt;br/&gt;`
    /// coming from the environment renders as a line break.
    pub html_intro: String,
    pub observed_error: String,
    pub failure_reason: Option<String>,
    pub image_path: String,
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Render the HTML body, returning it together with the generated
/// (content-id, image-path) pair for each section.
pub fn render_html(sections: &[EmailSection]) -> (String, Vec<(String, String)>) {
    let mut blocks = String::new();
    let mut images = Vec::new();

    for section in sections {
        let cid = format!("{}@claimwatch", Uuid::new_v4().simple());

        let color = match section.status {
            FlowStatus::Passed => STATUS_COLOR_PASSED,
            FlowStatus::Failed => STATUS_COLOR_FAILED,
        };

        let observed_html = if section.observed_error.is_empty() {
            String::new()
        } else {
            format!(
                "<p><strong>Observed error:</strong> {}</p>",
                html_escape(&section.observed_error)
            )
        };
        let reason_html = match &section.failure_reason {
            Some(reason) if !reason.is_empty() => format!(
                "<p><strong>Failure reason:</strong> {}</p>",
                html_escape(reason)
            ),
            _ => String::new(),
        };

        blocks.push_str(&format!(
            r#"
        <section style="margin:14px 0; padding-bottom:12px; border-bottom:1px solid #e8e8e8;">
          <h3 style="font-family:Segoe UI,Arial,sans-serif; margin:0 0 8px;">
            {title} - <span style="color:{color}">{status}</span>
          </h3>
          <div style="font-family:Segoe UI,Arial,sans-serif; font-size:14px; line-height:1.5; color:#222;">
            {intro}
            {observed}
            {reason}
          </div>
          <div>
            <img src="cid:{cid}" alt="{title} screenshot"
                 style="max-width:100%; height:auto; border:1px solid #ddd;"/>
          </div>
        </section>
        "#,
            title = html_escape(&section.title),
            color = color,
            status = section.status.as_str(),
            intro = html_unescape(&section.html_intro),
            observed = observed_html,
            reason = reason_html,
            cid = cid,
        ));

        images.push((cid, section.image_path.clone()));
    }

    let html = format!(
        r#"<html>
      <body style="font-family:Segoe UI, Arial, sans-serif;">
        {}
      </body>
    </html>"#,
        blocks
    );

    (html, images)
}

/// Build the full MIME message: `multipart/alternative` holding the plain
/// part and a `multipart/related` HTML part with one inline PNG per section.
/// Sections whose screenshot file is missing render without an image.
pub fn build_report_message(
    sender: &SenderSettings,
    subject: &str,
    text_body: &str,
    sections: &[EmailSection],
) -> Result<Message, FlowError> {
    let (html, images) = render_html(sections);

    let mut related = MultiPart::related().singlepart(SinglePart::html(html));
    for (cid, path) in images {
        match std::fs::read(&path) {
            Ok(bytes) => {
                let content_type = ContentType::parse("image/png")
                    .map_err(|e| FlowError::Mail(e.to_string()))?;
                related = related
                    .singlepart(Attachment::new_inline(cid).body(Body::new(bytes), content_type));
            }
            Err(e) => {
                log::warn!("inline screenshot missing, section sent without it: {}: {}", path, e);
            }
        }
    }

    Message::builder()
        .from(
            sender
                .username
                .parse()
                .map_err(|e| FlowError::Mail(format!("invalid sender address: {}", e)))?,
        )
        .to(sender
            .to
            .parse()
            .map_err(|e| FlowError::Mail(format!("invalid recipient address: {}", e)))?)
        .subject(subject)
        .multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(text_body.to_string()))
                .multipart(related),
        )
        .map_err(|e| FlowError::Mail(e.to_string()))
}
