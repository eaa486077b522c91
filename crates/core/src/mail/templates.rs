//! HTML bodies for outbound email.

use super::{EmailKind, MovieRequest, OutgoingEmail};

const BRAND_COLOR: &str = "#e50914";

/// Verification code sent after registration or on request.
pub fn verification_email(to: &str, code: &str) -> OutgoingEmail {
    let body = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 560px; margin: 0 auto;">
  <h2 style="color: {color};">Welcome to CineVibes</h2>
  <p>Use this code to verify your email address:</p>
  <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold;">{code}</p>
  <p>If you did not create an account, you can ignore this message.</p>
</div>"#,
        color = BRAND_COLOR,
        code = escape(code),
    );

    OutgoingEmail {
        kind: EmailKind::Verification,
        to: to.to_string(),
        subject: "Your CineVibes verification code".to_string(),
        html_body: body,
    }
}

/// Request forwarded to the catalog maintainers.
pub fn movie_request_email(recipient: &str, request: &MovieRequest) -> OutgoingEmail {
    let mut details = vec![
        ("Title", request.title.clone()),
        ("Requested by", request.user_email.clone()),
        (
            "Year",
            request.year.clone().unwrap_or_else(|| "Not provided".to_string()),
        ),
    ];

    let mut poster = String::new();
    if let Some(meta) = &request.metadata {
        details.push(("IMDb ID", meta.imdb_id.clone()));
        if let Some(director) = &meta.director {
            details.push(("Director", director.clone()));
        }
        if let Some(actors) = &meta.actors {
            details.push(("Actors", actors.clone()));
        }
        if let Some(url) = &meta.poster {
            poster = format!(
                r#"<img src="{}" alt="Poster" style="max-width: 200px; border-radius: 4px;">"#,
                escape(url)
            );
        }
    }
    details.push((
        "Additional info",
        request
            .additional_info
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Not provided".to_string()),
    ));

    let rows: String = details
        .iter()
        .map(|(label, value)| {
            format!(
                "    <tr><td style=\"padding: 4px 12px 4px 0;\"><strong>{}</strong></td><td>{}</td></tr>\n",
                label,
                escape(value)
            )
        })
        .collect();

    let body = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 560px; margin: 0 auto;">
  <h2 style="color: {color};">New movie request</h2>
  {poster}
  <table>
{rows}  </table>
</div>"#,
        color = BRAND_COLOR,
    );

    OutgoingEmail {
        kind: EmailKind::MovieRequest,
        to: recipient.to_string(),
        subject: format!("Movie request: {}", request.title),
        html_body: body,
    }
}

/// Acknowledgement sent back to the requester.
pub fn movie_request_confirmation(request: &MovieRequest) -> OutgoingEmail {
    let body = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 560px; margin: 0 auto;">
  <h2 style="color: {color};">We got your request</h2>
  <p>Thanks for asking for <strong>{title}</strong>. We will let you know once it is in the catalog.</p>
  <p>The CineVibes team</p>
</div>"#,
        color = BRAND_COLOR,
        title = escape(&request.title),
    );

    OutgoingEmail {
        kind: EmailKind::RequestConfirmation,
        to: request.user_email.clone(),
        subject: "Your CineVibes movie request".to_string(),
        html_body: body,
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
