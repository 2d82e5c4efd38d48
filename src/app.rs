use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::ServerArgs;
use crate::downloader::{XLSX_MIME, output_file_name, to_xlsx};
use crate::error::{PreviewError, Result};
use crate::fetcher::{HttpImageSource, ImageSource};
use crate::loader::from_xlsx_bytes;
use crate::marketplace::Marketplace;
use crate::processor::{
    self, EmbedMode, ProcessOptions, ProcessStats, SheetSelection, SheetSummary, summarize,
};
use crate::workbook::SheetExt;

/// Response header carrying the run counters as JSON
pub const STATS_HEADER: &str = "x-preview-stats";
/// Multipart field holding the uploaded workbook
pub const FILE_FIELD: &str = "spreadsheet";

pub struct AppState<S> {
    pub source: S,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
    detail: Option<String>,
}

#[derive(Serialize)]
struct InspectResponse {
    status: String,
    file_name: String,
    sheets: Vec<String>,
    headers: Vec<String>,
    detected: Vec<String>,
    summary: Vec<SheetSummary>,
    total_url_cells: usize,
}

/// Uploaded workbook plus the settings sent alongside it
struct Upload {
    file_name: String,
    data: Vec<u8>,
    fields: HashMap<String, Vec<String>>,
}

impl IntoResponse for PreviewError {
    fn into_response(self) -> Response {
        let (status, detail) = if self.is_client_error() {
            (StatusCode::BAD_REQUEST, None)
        } else {
            log::error!("request failed: {:?}", self);
            (StatusCode::INTERNAL_SERVER_ERROR, Some(format!("{:?}", self)))
        };
        let body = StatusResponse {
            status: "error".to_string(),
            message: Some(self.to_string()),
            detail,
        };
        (status, Json(body)).into_response()
    }
}

pub async fn run(config: ServerArgs) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let source = HttpImageSource::new(config.network.lookup_timeout(), config.network.fetch_timeout())?;
    let app_state = Arc::new(AppState { source });

    let app = router(app_state, config.max_upload_bytes());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router around an image source
pub fn router<S>(state: Arc<AppState<S>>, max_upload_bytes: usize) -> Router
where
    S: ImageSource + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(serve_landing))
        .route("/api/inspect", post(inspect_upload::<S>))
        .route("/api/process", post(process_upload::<S>))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

async fn serve_landing() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

// Top-level catch-all: the raw panic text goes back to the page
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    log::error!("handler panicked: {}", detail);
    let body = StatusResponse {
        status: "error".to_string(),
        message: Some("An error occurred while running the app.".to_string()),
        detail: Some(detail),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    let mut upload = Upload {
        file_name: String::new(),
        data: Vec::new(),
        fields: HashMap::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PreviewError::Upload(e.to_string()))?
    {
        let name = field.name().unwrap_or("unknown").to_string();
        if name == FILE_FIELD {
            upload.file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
            upload.data = field
                .bytes()
                .await
                .map_err(|e| PreviewError::Upload(e.to_string()))?
                .to_vec();
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| PreviewError::Upload(e.to_string()))?;
            upload.fields.entry(name).or_default().push(value);
        }
    }

    if upload.data.is_empty() {
        return Err(PreviewError::Upload("No file data received".to_string()));
    }
    if !upload.file_name.to_ascii_lowercase().ends_with(".xlsx") {
        return Err(PreviewError::Upload(format!(
            "expected an .xlsx file, got '{}'",
            upload.file_name
        )));
    }
    Ok(upload)
}

fn field<'a>(fields: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .and_then(|v| v.last())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn parse_bool(fields: &HashMap<String, Vec<String>>, name: &str, default: bool) -> Result<bool> {
    match field(fields, name).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "on" | "1" | "yes") => Ok(true),
        Some("false" | "off" | "0" | "no") => Ok(false),
        Some(other) => Err(PreviewError::InvalidOption(format!(
            "{} must be true or false, got '{}'",
            name, other
        ))),
    }
}

fn parse_number(fields: &HashMap<String, Vec<String>>, name: &str, default: u32) -> Result<u32> {
    match field(fields, name) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| {
            PreviewError::InvalidOption(format!("{} must be a whole number, got '{}'", name, v))
        }),
    }
}

/// Read the settings form into run options
fn parse_options(fields: &HashMap<String, Vec<String>>) -> Result<ProcessOptions> {
    let defaults = ProcessOptions::default();

    let marketplace = match field(fields, "marketplace") {
        Some(m) => m.parse::<Marketplace>()?,
        None => defaults.marketplace,
    };
    let mode = match field(fields, "mode") {
        Some(m) => m.parse::<EmbedMode>()?,
        None => defaults.mode,
    };
    let sheets = match (field(fields, "sheet_mode"), field(fields, "sheet")) {
        (Some("one"), Some(name)) => SheetSelection::One(name.to_string()),
        (Some("one"), None) => {
            return Err(PreviewError::InvalidOption(
                "sheet_mode 'one' needs a sheet name".to_string(),
            ));
        }
        _ => SheetSelection::All,
    };
    let columns = fields
        .get("columns")
        .map(|values| {
            values
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let options = ProcessOptions {
        marketplace,
        keep_header_heights: parse_bool(fields, "keep_header_heights", defaults.keep_header_heights)?,
        sheets,
        header_row: parse_number(fields, "header_row", defaults.header_row)?,
        width_px: parse_number(fields, "width", defaults.width_px)?,
        height_px: parse_number(fields, "height", defaults.height_px)?,
        keep_notes: parse_bool(fields, "keep_notes", defaults.keep_notes)?,
        create_adjacent: parse_bool(fields, "create_adjacent", defaults.create_adjacent)?,
        columns,
        mode,
        check_content_type: parse_bool(fields, "check_content_type", defaults.check_content_type)?,
    };
    options.validate()?;
    Ok(options)
}

async fn inspect_upload<S>(
    State(_state): State<Arc<AppState<S>>>,
    multipart: Multipart,
) -> Result<Json<InspectResponse>>
where
    S: ImageSource + Send + Sync + 'static,
{
    let upload = read_upload(multipart).await?;
    let options = parse_options(&upload.fields)?;
    let workbook = from_xlsx_bytes(&upload.data)?;

    let targets = options.target_sheets(&workbook)?;
    let first = targets
        .first()
        .and_then(|name| workbook.sheet(name))
        .ok_or(PreviewError::NoSheets)?;
    let headers = first.headers(options.header_row);
    let detected = first
        .detect_url_columns(options.header_row)
        .into_iter()
        .map(|c| {
            headers
                .get(c as usize - 1)
                .cloned()
                .unwrap_or_else(|| format!("Col {}", c))
        })
        .collect();
    let summary = summarize(&workbook, &options)?;
    let total_url_cells = summary.iter().map(|s| s.url_cells).sum();

    log::info!(
        "inspected '{}': {} sheets, {} URL cells",
        upload.file_name,
        workbook.sheet_count(),
        total_url_cells
    );

    Ok(Json(InspectResponse {
        status: "ok".to_string(),
        file_name: upload.file_name,
        sheets: workbook.sheet_names(),
        headers,
        detected,
        summary,
        total_url_cells,
    }))
}

async fn process_upload<S>(
    State(state): State<Arc<AppState<S>>>,
    multipart: Multipart,
) -> Result<Response>
where
    S: ImageSource + Send + Sync + 'static,
{
    let upload = read_upload(multipart).await?;
    let options = parse_options(&upload.fields)?;
    let mut workbook = from_xlsx_bytes(&upload.data)?;

    log::info!(
        "processing '{}' ({} bytes, mode {:?})",
        upload.file_name,
        upload.data.len(),
        options.mode
    );
    let stats = processor::process(&mut workbook, &options, &state.source, |s: &ProcessStats| {
        log::info!("{}", s.status_line());
    })
    .await?;

    let buffer = to_xlsx(&workbook)?;
    let out_name = output_file_name(&upload.file_name);

    let stats_json = serde_json::to_string(&stats).unwrap_or_default();
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, XLSX_MIME)
        .header(header::CONTENT_DISPOSITION, content_disposition(&out_name))
        .header(
            STATS_HEADER,
            HeaderValue::from_str(&stats_json).unwrap_or(HeaderValue::from_static("{}")),
        )
        .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, STATS_HEADER)
        .body(Body::from(buffer))
        .map_err(|e| PreviewError::Upload(e.to_string()))?;
    Ok(response)
}

/// Attachment header with an ASCII fallback and the UTF-8 name
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        let mut fields: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in pairs {
            fields.entry(k.to_string()).or_default().push(v.to_string());
        }
        fields
    }

    #[test]
    fn empty_form_gives_defaults() {
        assert_eq!(parse_options(&form(&[])).unwrap(), ProcessOptions::default());
    }

    #[test]
    fn reads_every_setting() {
        let opts = parse_options(&form(&[
            ("marketplace", "Amazon"),
            ("keep_header_heights", "false"),
            ("sheet_mode", "one"),
            ("sheet", "Items"),
            ("header_row", "3"),
            ("width", "200"),
            ("height", "100"),
            ("keep_notes", "off"),
            ("create_adjacent", "on"),
            ("columns", "Main Image"),
            ("columns", " Swatch "),
            ("columns", ""),
            ("mode", "auto"),
            ("check_content_type", "0"),
        ]))
        .unwrap();

        assert_eq!(opts.marketplace, Marketplace::Amazon);
        assert!(!opts.keep_header_heights);
        assert_eq!(opts.sheets, SheetSelection::One("Items".into()));
        assert_eq!((opts.header_row, opts.width_px, opts.height_px), (3, 200, 100));
        assert!(!opts.keep_notes);
        assert!(opts.create_adjacent);
        assert_eq!(opts.columns, vec!["Main Image", "Swatch"]);
        assert_eq!(opts.mode, EmbedMode::Auto);
        assert!(!opts.check_content_type);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_options(&form(&[("width", "wide")])).is_err());
        assert!(parse_options(&form(&[("height", "10")])).is_err());
        assert!(parse_options(&form(&[("header_row", "0")])).is_err());
        assert!(parse_options(&form(&[("header_row", "4294967295")])).is_err());
        assert!(parse_options(&form(&[("width", "100000")])).is_err());
        assert!(parse_options(&form(&[("keep_notes", "maybe")])).is_err());
        assert!(parse_options(&form(&[("sheet_mode", "one")])).is_err());
        assert!(parse_options(&form(&[("marketplace", "etsy")])).is_err());
    }

    #[test]
    fn disposition_escapes_name() {
        assert_eq!(
            content_disposition("feed-preview.xlsx"),
            "attachment; filename=\"feed-preview.xlsx\"; filename*=UTF-8''feed-preview.xlsx"
        );
        assert!(content_disposition("Übersicht \"v2\"-preview.xlsx")
            .starts_with("attachment; filename=\"_bersicht _v2_-preview.xlsx\""));
    }
}
