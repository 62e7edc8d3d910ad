//! HTML pages
//!
//! Two small pages rendered with `format!`: the upload form and the file
//! listing. Every value taken from storage is HTML-escaped.

use crate::storage::keys::encode_key;
use crate::storage::StoredObject;
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem}\
table{border-collapse:collapse;width:100%}\
td,th{text-align:left;padding:.4rem;border-bottom:1px solid #ddd}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape_html(title),
    )
}

/// Escape text for use in HTML content and double-quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Human readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// GET /
pub fn upload_form() -> String {
    page(
        "Upload a file",
        "<h1>Upload a file</h1>\n\
         <form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"file\" required>\n\
         <button type=\"submit\">Upload</button>\n\
         </form>\n\
         <p><a href=\"/files\">View uploaded files</a></p>\n",
    )
}

/// GET /files
pub fn file_list(objects: &[StoredObject]) -> String {
    let mut body = String::from("<h1>Uploaded files</h1>\n");

    if objects.is_empty() {
        body.push_str("<p>No files uploaded yet.</p>\n");
    } else {
        body.push_str("<table>\n<tr><th>Name</th><th>Size</th><th>Updated</th></tr>\n");
        for object in objects {
            let updated = object
                .updated
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default();
            // Writing into a String cannot fail.
            let _ = writeln!(
                body,
                "<tr><td><a href=\"/download/{href}\">{name}</a></td><td>{size}</td><td>{updated}</td></tr>",
                href = encode_key(&object.name),
                name = escape_html(&object.name),
                size = format_size(object.size),
                updated = updated,
            );
        }
        body.push_str("</table>\n");
    }

    body.push_str("<p><a href=\"/\">Upload another file</a></p>\n");
    page("Uploaded files", &body)
}
