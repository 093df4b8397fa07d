//! Message encoding: the presentational shell and the raw multipart/related
//! document used by the mailbox-API transport.

use base64::Engine;

use crate::message::MessageSpec;

/// Subject used when the resolved subject is empty.
pub const DEFAULT_SUBJECT: &str = "No Subject";

/// Wrap resolved body HTML in the fixed presentational shell.
///
/// Every outgoing message gets the same container card, typography, button,
/// and table styling regardless of transport.
pub fn wrap_html(content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Email</title>
  <style>
    * {{ margin: 0; padding: 0; box-sizing: border-box; }}
    body {{
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
      line-height: 1.6;
      color: #333333;
      background-color: #f8f9fa;
      margin: 0;
      padding: 20px;
    }}
    .email-container {{
      max-width: 600px;
      margin: 0 auto;
      background-color: #ffffff;
      border-radius: 8px;
      box-shadow: 0 2px 10px rgba(0, 0, 0, 0.1);
      overflow: hidden;
    }}
    .email-content {{ padding: 40px; }}
    h1, h2, h3, h4, h5, h6 {{ color: #2c3e50; margin-bottom: 16px; font-weight: 600; }}
    h1 {{ font-size: 28px; line-height: 1.2; }}
    h2 {{ font-size: 24px; line-height: 1.3; }}
    h3 {{ font-size: 20px; line-height: 1.4; }}
    p {{ margin-bottom: 16px; color: #555555; font-size: 16px; }}
    a {{ color: #3498db; text-decoration: none; font-weight: 500; }}
    a:hover {{ color: #2980b9; text-decoration: underline; }}
    .btn {{
      display: inline-block;
      padding: 12px 24px;
      background-color: #3498db;
      color: #ffffff !important;
      text-decoration: none;
      border-radius: 6px;
      font-weight: 600;
      margin: 10px 0;
    }}
    ul, ol {{ margin-bottom: 16px; padding-left: 20px; }}
    li {{ margin-bottom: 8px; color: #555555; }}
    blockquote {{
      border-left: 4px solid #3498db;
      padding-left: 20px;
      margin: 20px 0;
      font-style: italic;
      color: #666666;
    }}
    table {{ width: 100%; border-collapse: collapse; margin-bottom: 20px; }}
    th, td {{ padding: 12px; text-align: left; border-bottom: 1px solid #e0e0e0; }}
    th {{ background-color: #f8f9fa; font-weight: 600; color: #2c3e50; }}
    @media only screen and (max-width: 600px) {{
      body {{ padding: 10px; }}
      .email-content {{ padding: 20px; }}
      h1 {{ font-size: 24px; }}
      h2 {{ font-size: 20px; }}
      h3 {{ font-size: 18px; }}
    }}
  </style>
</head>
<body>
  <div class="email-container">
    <div class="email-content">
      {content}
    </div>
  </div>
</body>
</html>"#
    )
}

/// Build the raw multipart/related document for a message.
///
/// Header block, then a `text/html` part carrying the style-wrapped body,
/// then one base64 part per inline image with its `Content-ID`, then the
/// closing boundary. CRLF line endings throughout.
pub fn build_raw(spec: &MessageSpec) -> String {
    let boundary = format!("related-{}", uuid::Uuid::new_v4().simple());

    let mut headers = Vec::new();
    headers.push(format!("From: {}", spec.from.formatted_rfc5322()));
    headers.push(format!("To: {}", spec.to));
    if let Some(cc) = spec.cc.as_deref().filter(|v| !v.trim().is_empty()) {
        headers.push(format!("Cc: {cc}"));
    }
    if let Some(bcc) = spec.bcc.as_deref().filter(|v| !v.trim().is_empty()) {
        headers.push(format!("Bcc: {bcc}"));
    }
    let subject = if spec.subject.is_empty() {
        DEFAULT_SUBJECT
    } else {
        &spec.subject
    };
    headers.push(format!("Subject: {subject}"));
    headers.push("MIME-Version: 1.0".to_string());
    headers.push(format!(
        "Content-Type: multipart/related; boundary=\"{boundary}\""
    ));

    let mut parts = Vec::new();
    parts.push(
        [
            format!("--{boundary}"),
            "Content-Type: text/html; charset=\"UTF-8\"".to_string(),
            "Content-Transfer-Encoding: 7bit".to_string(),
            String::new(),
            wrap_html(&spec.html),
            String::new(),
        ]
        .join("\r\n"),
    );

    for part in &spec.inline_parts {
        parts.push(
            [
                format!("--{boundary}"),
                format!("Content-Type: {}", part.content_type),
                "Content-Transfer-Encoding: base64".to_string(),
                format!("Content-ID: <{}>", part.content_id),
                format!("Content-Disposition: inline; filename=\"{}\"", part.filename),
                String::new(),
                part.base64_data(),
                String::new(),
            ]
            .join("\r\n"),
        );
    }

    parts.push(format!("--{boundary}--"));

    format!("{}\r\n\r\n{}", headers.join("\r\n"), parts.join("\r\n"))
}

/// Encode a message as the mailbox API's raw payload: the multipart document
/// base64url-encoded (URL-safe alphabet, no padding).
pub fn encode_raw(spec: &MessageSpec) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(build_raw(spec))
}

/// Decode a raw payload back to the multipart document. Test/diagnostic aid.
pub fn decode_raw(payload: &str) -> Option<String> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
