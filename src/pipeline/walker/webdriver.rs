//! W3C WebDriver implementation of `InteractiveDocument`.
//!
//! Talks to a chromedriver (or Selenium) endpoint over blocking HTTP.
//! Element lookups run as page scripts so selectors can carry the
//! `:has-text('...')` extension; clicks go through the native element
//! endpoint. Each export downloads into its own subdirectory (set through
//! chromedriver's CDP passthrough) and is detected as a new, completed file
//! there.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::DocumentError;
use super::traits::InteractiveDocument;
use super::types::OptionChoice;
use crate::config::WebDriverSettings;

/// Key of a web element reference in WebDriver JSON.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const SCRIPT_TIMEOUT_MS: u64 = 30_000;

/// Browser-side helpers shared by every script.
const PRELUDE: &str = r#"
const __find = (css, text) => Array.from(document.querySelectorAll(css))
    .filter(e => text === null || (e.textContent || '').includes(text));
const __visible = e => !!(e.offsetWidth || e.offsetHeight || e.getClientRects().length)
    && getComputedStyle(e).visibility !== 'hidden';
"#;

const VISIBLE_JS: &str = "return __find(arguments[0], arguments[1]).some(__visible);";
const COUNT_JS: &str = "return __find(arguments[0], arguments[1]).length;";
const ELEMENTS_JS: &str = "return __find(arguments[0], arguments[1]);";
const OPTION_COUNT_JS: &str = r#"
const s = __find(arguments[0], arguments[1])[0];
return s && s.options ? s.options.length : 0;
"#;
const SELECT_JS: &str = r#"
const [css, text, kind, want] = arguments;
const s = __find(css, text)[0];
if (!s || !s.options) return 'missing';
const opts = Array.from(s.options);
let i = -1;
if (kind === 'label') i = opts.findIndex(o => o.text.trim() === want);
else if (kind === 'value') i = opts.findIndex(o => o.value === want);
else i = Number(want) < opts.length ? Number(want) : -1;
if (i < 0) return 'no-option';
s.selectedIndex = i;
s.dispatchEvent(new Event('input', { bubbles: true }));
s.dispatchEvent(new Event('change', { bubbles: true }));
return 'ok';
"#;
const CELLS_JS: &str = r#"
const e = __find(arguments[0], arguments[1])[arguments[2]];
if (!e) return null;
const row = e.closest('tr') || e;
return Array.from(row.querySelectorAll('td')).map(td => (td.textContent || '').trim());
"#;
const SCROLL_JS: &str = "arguments[0].scrollIntoView({ block: 'center' });";

// ═══════════════════════════════════════════
// Locator
// ═══════════════════════════════════════════

/// A selector split into its CSS part and an optional text filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub css: String,
    pub text: Option<String>,
}

impl Locator {
    /// `button:has-text('Export')` → css `button`, text `Export`.
    pub fn parse(selector: &str) -> Self {
        const MARKER: &str = ":has-text(";
        let selector = selector.trim();
        if let Some(at) = selector.find(MARKER) {
            if let Some(inner) = selector[at + MARKER.len()..].strip_suffix(')') {
                let text = inner
                    .trim()
                    .trim_matches(|c| c == '\'' || c == '"')
                    .to_string();
                let css = match selector[..at].trim() {
                    "" => "*".to_string(),
                    css => css.to_string(),
                };
                return Self {
                    css,
                    text: Some(text),
                };
            }
        }
        Self {
            css: selector.to_string(),
            text: None,
        }
    }

    fn args(&self) -> [Value; 2] {
        [json!(self.css), json!(self.text)]
    }
}

// ═══════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════

#[derive(Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    script: String,
    args: &'a [Value],
}

/// Map a non-success WebDriver response to a `DocumentError`.
fn protocol_error(status: u16, body: &str, what: &str, waited: Duration) -> DocumentError {
    let wire = serde_json::from_str::<WireResponse>(body)
        .ok()
        .and_then(|r| serde_json::from_value::<WireError>(r.value).ok());
    match wire {
        Some(e) if e.error == "timeout" || e.error == "script timeout" => DocumentError::Timeout {
            what: what.to_string(),
            waited_ms: waited.as_millis() as u64,
        },
        Some(e) if e.error == "no such element" => DocumentError::NotFound(what.to_string()),
        Some(e) => DocumentError::Protocol {
            status,
            error: e.error,
            message: e.message,
        },
        None => DocumentError::Protocol {
            status,
            error: "unknown error".into(),
            message: body.chars().take(200).collect(),
        },
    }
}

fn is_partial_download(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("crdownload" | "part" | "tmp")
    )
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    Ok(files)
}

/// Attributes files in a download directory to the export in progress.
///
/// Only files that appear after an export's snapshot are considered, and
/// whatever an abandoned (timed out) export leaves behind is swept before
/// the next export starts, so its file is never handed to another well.
#[derive(Debug, Default)]
struct DownloadWatch {
    /// Directory and snapshot of the last export that timed out.
    abandoned: Option<(PathBuf, HashSet<PathBuf>)>,
    /// Final names of downloads an abandoned export still has in flight.
    ignored: HashSet<PathBuf>,
}

impl DownloadWatch {
    /// Sweep leftovers of an abandoned export in `dir`, then snapshot it.
    fn begin(&mut self, dir: &Path) -> Result<HashSet<PathBuf>, DocumentError> {
        if let Some((abandoned_dir, before)) = self.abandoned.take() {
            if abandoned_dir.as_path() == dir {
                for path in list_files(dir)? {
                    if before.contains(&path) {
                        continue;
                    }
                    if is_partial_download(&path) {
                        self.ignored.insert(path.with_extension(""));
                    } else {
                        discard_late(&path);
                    }
                }
            }
        }
        self.ignored.retain(|path| {
            if path.exists() {
                discard_late(path);
                false
            } else {
                true
            }
        });
        Ok(list_files(dir)?.into_iter().collect())
    }

    /// The completed file that appeared in `dir` since `before`. `None`
    /// while nothing new has landed or a new file is still partial.
    fn completed(
        &mut self,
        dir: &Path,
        before: &HashSet<PathBuf>,
    ) -> Result<Option<PathBuf>, DocumentError> {
        let mut fresh: Vec<PathBuf> = list_files(dir)?
            .into_iter()
            .filter(|p| !before.contains(p))
            .collect();
        fresh.retain(|p| {
            if self.ignored.remove(p) {
                discard_late(p);
                false
            } else {
                true
            }
        });
        if fresh.iter().any(|p| is_partial_download(p)) {
            return Ok(None);
        }
        fresh.sort();
        Ok(fresh.into_iter().next())
    }

    fn abandon(&mut self, dir: &Path, before: HashSet<PathBuf>) {
        self.abandoned = Some((dir.to_path_buf(), before));
    }
}

fn discard_late(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::warn!(
            path = %path.display(),
            "Discarded download of an abandoned export"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Could not discard download of an abandoned export"
        ),
    }
}

fn remove_export_dir(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        tracing::debug!(dir = %dir.display(), error = %e, "Export directory not removed");
    }
}

// ═══════════════════════════════════════════
// WebDriverDocument
// ═══════════════════════════════════════════

/// One browser session. The session is closed on drop.
pub struct WebDriverDocument {
    client: reqwest::blocking::Client,
    endpoint: String,
    session_id: String,
    download_dir: PathBuf,
    /// Cleared once the driver rejects the CDP download command.
    per_export_dirs: bool,
    exports: usize,
    current_export_dir: Option<PathBuf>,
    watch: DownloadWatch,
}

impl WebDriverDocument {
    /// Start a Chrome session that saves downloads into `download_dir`
    /// without prompting.
    pub fn connect(
        settings: &WebDriverSettings,
        download_dir: &Path,
    ) -> Result<Self, DocumentError> {
        std::fs::create_dir_all(download_dir)?;
        let download_dir = std::path::absolute(download_dir)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| DocumentError::Transport(e.to_string()))?;

        let mut args = vec!["--window-size=1920,1080"];
        if settings.headless {
            args.push("--headless=new");
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": {
                            "download.default_directory": download_dir.to_string_lossy(),
                            "download.prompt_for_download": false,
                            "download.directory_upgrade": true,
                            "safebrowsing.enabled": true
                        }
                    }
                }
            }
        });

        let endpoint = settings.endpoint.trim_end_matches('/').to_string();
        let response = client
            .post(format!("{endpoint}/session"))
            .json(&capabilities)
            .send()
            .map_err(|e| transport_error(&endpoint, e))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| DocumentError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(protocol_error(status.as_u16(), &body, "new session", Duration::ZERO));
        }
        let session: NewSession = serde_json::from_str::<WireResponse>(&body)
            .and_then(|r| serde_json::from_value(r.value))
            .map_err(|e| DocumentError::Response(e.to_string()))?;

        tracing::info!(
            endpoint = %endpoint,
            session = %session.session_id,
            "WebDriver session started"
        );
        Ok(Self {
            client,
            endpoint,
            session_id: session.session_id,
            download_dir,
            per_export_dirs: true,
            exports: 0,
            current_export_dir: None,
            watch: DownloadWatch::default(),
        })
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Directory the next export downloads into: a fresh `export_<n>`
    /// subdirectory when the driver accepts the CDP download command,
    /// otherwise the shared download directory. The previous export's
    /// subdirectory is removed first.
    fn export_dir(&mut self) -> Result<PathBuf, DocumentError> {
        if let Some(previous) = self.current_export_dir.take() {
            remove_export_dir(&previous);
        }
        if !self.per_export_dirs {
            return Ok(self.download_dir.clone());
        }

        self.exports += 1;
        let dir = self.download_dir.join(format!("export_{}", self.exports));
        std::fs::create_dir_all(&dir)?;
        let body = json!({
            "cmd": "Browser.setDownloadBehavior",
            "params": { "behavior": "allow", "downloadPath": dir.to_string_lossy() }
        });
        match self.command(
            reqwest::Method::POST,
            "/goog/cdp/execute",
            &body,
            "download behavior",
            Duration::ZERO,
        ) {
            Ok(_) => {
                self.current_export_dir = Some(dir.clone());
                Ok(dir)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Per-export download directories unavailable, using the shared directory"
                );
                self.per_export_dirs = false;
                remove_export_dir(&dir);
                Ok(self.download_dir.clone())
            }
        }
    }

    fn command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &Value,
        what: &str,
        waited: Duration,
    ) -> Result<Value, DocumentError> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        let response = self
            .client
            .request(method, &url)
            .json(body)
            .send()
            .map_err(|e| transport_error(&self.endpoint, e))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| DocumentError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(protocol_error(status.as_u16(), &text, what, waited));
        }
        serde_json::from_str::<WireResponse>(&text)
            .map(|r| r.value)
            .map_err(|e| DocumentError::Response(e.to_string()))
    }

    fn execute(&self, script: &str, args: &[Value], what: &str) -> Result<Value, DocumentError> {
        let body = serde_json::to_value(ExecuteRequest {
            script: format!("{PRELUDE}{script}"),
            args,
        })
        .map_err(|e| DocumentError::Response(e.to_string()))?;
        self.command(
            reqwest::Method::POST,
            "/execute/sync",
            &body,
            what,
            Duration::from_millis(SCRIPT_TIMEOUT_MS),
        )
    }

    fn elements(&self, selector: &str) -> Result<Vec<String>, DocumentError> {
        let locator = Locator::parse(selector);
        let value = self.execute(ELEMENTS_JS, &locator.args(), selector)?;
        let ids = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.get(ELEMENT_KEY).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    fn click_element(&self, element_id: &str, what: &str) -> Result<(), DocumentError> {
        let element = json!({ ELEMENT_KEY: element_id });
        self.execute(SCROLL_JS, &[element], what)?;
        self.command(
            reqwest::Method::POST,
            &format!("/element/{element_id}/click"),
            &json!({}),
            what,
            Duration::ZERO,
        )?;
        Ok(())
    }

    fn visible_now(&self, selector: &str) -> Result<bool, DocumentError> {
        let locator = Locator::parse(selector);
        let value = self.execute(VISIBLE_JS, &locator.args(), selector)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn option_count(&self, selector: &str) -> Result<usize, DocumentError> {
        let locator = Locator::parse(selector);
        let value = self.execute(OPTION_COUNT_JS, &locator.args(), selector)?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    /// Poll `check` until it holds or `timeout` passes.
    fn poll<F>(&self, what: &str, timeout: Duration, mut check: F) -> Result<(), DocumentError>
    where
        F: FnMut(&Self) -> Result<bool, DocumentError>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if check(self)? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DocumentError::Timeout {
                    what: what.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> DocumentError {
    if e.is_connect() {
        DocumentError::Transport(format!("cannot reach WebDriver at {endpoint}"))
    } else if e.is_timeout() {
        DocumentError::Timeout {
            what: "WebDriver response".into(),
            waited_ms: HTTP_TIMEOUT.as_millis() as u64,
        }
    } else {
        DocumentError::Transport(e.to_string())
    }
}

impl InteractiveDocument for WebDriverDocument {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DocumentError> {
        self.command(
            reqwest::Method::POST,
            "/timeouts",
            &json!({ "pageLoad": timeout.as_millis() as u64, "script": SCRIPT_TIMEOUT_MS }),
            "timeouts",
            Duration::ZERO,
        )?;
        self.command(
            reqwest::Method::POST,
            "/url",
            &json!({ "url": url }),
            url,
            timeout,
        )?;
        Ok(())
    }

    fn select_option(
        &mut self,
        selector: &str,
        choice: &OptionChoice,
    ) -> Result<(), DocumentError> {
        let locator = Locator::parse(selector);
        let (kind, want) = match choice {
            OptionChoice::Label(l) => ("label", l.clone()),
            OptionChoice::Value(v) => ("value", v.clone()),
            OptionChoice::Index(i) => ("index", i.to_string()),
        };
        let [css, text] = locator.args();
        let outcome = self.execute(SELECT_JS, &[css, text, json!(kind), json!(want)], selector)?;
        match outcome.as_str() {
            Some("ok") => Ok(()),
            Some("no-option") => Err(DocumentError::OptionMissing {
                selector: selector.to_string(),
                choice: choice.to_string(),
            }),
            _ => Err(DocumentError::NotFound(selector.to_string())),
        }
    }

    fn wait_until_visible(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DocumentError> {
        self.poll(selector, timeout, |doc| doc.visible_now(selector))
    }

    fn wait_until_populated(
        &mut self,
        selector: &str,
        min_options: usize,
        timeout: Duration,
    ) -> Result<(), DocumentError> {
        self.poll(selector, timeout, |doc| {
            Ok(doc.option_count(selector)? >= min_options)
        })
    }

    fn is_visible(&mut self, selector: &str) -> Result<bool, DocumentError> {
        self.visible_now(selector)
    }

    fn click(&mut self, selector: &str) -> Result<(), DocumentError> {
        let ids = self.elements(selector)?;
        let first = ids
            .first()
            .ok_or_else(|| DocumentError::NotFound(selector.to_string()))?;
        self.click_element(first, selector)
    }

    fn count(&mut self, selector: &str) -> Result<usize, DocumentError> {
        let locator = Locator::parse(selector);
        let value = self.execute(COUNT_JS, &locator.args(), selector)?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), DocumentError> {
        let ids = self.elements(selector)?;
        let id = ids.get(index).ok_or_else(|| DocumentError::IndexOutOfRange {
            selector: selector.to_string(),
            index,
            count: ids.len(),
        })?;
        self.click_element(id, selector)
    }

    fn row_cells(&mut self, selector: &str, index: usize) -> Result<Vec<String>, DocumentError> {
        let [css, text] = Locator::parse(selector).args();
        let value = self.execute(CELLS_JS, &[css, text, json!(index)], selector)?;
        match value {
            Value::Array(cells) => Ok(cells
                .into_iter()
                .map(|c| c.as_str().unwrap_or_default().to_string())
                .collect()),
            _ => Err(DocumentError::IndexOutOfRange {
                selector: selector.to_string(),
                index,
                count: self.count(selector)?,
            }),
        }
    }

    fn await_download(
        &mut self,
        trigger: &str,
        timeout: Duration,
    ) -> Result<PathBuf, DocumentError> {
        let dir = self.export_dir()?;
        let before = self.watch.begin(&dir)?;
        self.click(trigger)?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(path) = self.watch.completed(&dir, &before)? {
                tracing::debug!(path = %path.display(), "Download complete");
                return Ok(path);
            }
            if Instant::now() >= deadline {
                self.watch.abandon(&dir, before);
                return Err(DocumentError::Timeout {
                    what: format!("download from {trigger}"),
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for WebDriverDocument {
    fn drop(&mut self) {
        if let Some(dir) = self.current_export_dir.take() {
            remove_export_dir(&dir);
        }
        let url = format!("{}/session/{}", self.endpoint, self.session_id);
        if let Err(e) = self.client.delete(&url).send() {
            tracing::warn!(
                session = %self.session_id,
                error = %e,
                "Could not close WebDriver session"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::JoinHandle;

    use super::*;

    /// Local WebDriver endpoint. Every command answers with one element
    /// reference; the CDP passthrough is rejected unless `cdp`.
    fn serve(cdp: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let _ = answer(stream, cdp);
            }
        });
        format!("http://{addr}")
    }

    fn answer(mut stream: TcpStream, cdp: bool) -> std::io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;
        let mut length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line)?;
            if line.trim().is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0; length];
        reader.read_exact(&mut body)?;

        let (status, payload) = if request_line.starts_with("POST /session ") {
            ("200 OK", json!({ "value": { "sessionId": "s1", "capabilities": {} } }))
        } else if request_line.contains("/goog/cdp/") && !cdp {
            (
                "404 Not Found",
                json!({ "value": { "error": "unknown command", "message": "no cdp" } }),
            )
        } else {
            ("200 OK", json!({ "value": [{ ELEMENT_KEY: "e1" }] }))
        };
        let payload = payload.to_string();
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
            payload.len()
        )?;
        stream.flush()
    }

    fn session(dir: &Path, cdp: bool) -> WebDriverDocument {
        let settings = WebDriverSettings {
            endpoint: serve(cdp),
            headless: true,
        };
        WebDriverDocument::connect(&settings, dir).unwrap()
    }

    fn write_after(path: PathBuf, delay_ms: u64) -> JoinHandle<()> {
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(delay_ms));
            let _ = std::fs::write(path, "Date,Water Level\n");
        })
    }

    #[test]
    fn late_file_of_timed_out_export_goes_to_no_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = session(dir.path(), true);
        let root = doc.download_dir().to_path_buf();

        let err = doc
            .await_download("button", Duration::from_millis(300))
            .unwrap_err();
        assert!(err.is_timeout());

        // Well 1's file lands while well 2 waits for its own.
        let late = write_after(root.join("export_1").join("well_1.csv"), 100);
        let own = write_after(root.join("export_2").join("well_2.csv"), 500);
        let path = doc
            .await_download("button", Duration::from_secs(5))
            .unwrap();
        late.join().unwrap();
        own.join().unwrap();
        assert_eq!(path, root.join("export_2").join("well_2.csv"));
    }

    #[test]
    fn stale_partial_file_does_not_block_shared_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = session(dir.path(), false);
        let root = doc.download_dir().to_path_buf();
        std::fs::write(root.join("old.csv.crdownload"), "").unwrap();

        let own = write_after(root.join("well.csv"), 100);
        let path = doc
            .await_download("button", Duration::from_secs(5))
            .unwrap();
        own.join().unwrap();
        assert_eq!(path, root.join("well.csv"));
        assert!(!root.join("export_1").exists());
    }

    #[test]
    fn watch_ignores_files_present_before_the_export() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        std::fs::write(d.join("stale.csv.crdownload"), "").unwrap();
        std::fs::write(d.join("stale.csv"), "").unwrap();

        let mut watch = DownloadWatch::default();
        let before = watch.begin(d).unwrap();
        assert_eq!(watch.completed(d, &before).unwrap(), None);

        std::fs::write(d.join("new.csv.crdownload"), "").unwrap();
        assert_eq!(watch.completed(d, &before).unwrap(), None);

        std::fs::remove_file(d.join("new.csv.crdownload")).unwrap();
        std::fs::write(d.join("new.csv"), "").unwrap();
        assert_eq!(watch.completed(d, &before).unwrap(), Some(d.join("new.csv")));
    }

    #[test]
    fn watch_sweeps_leftovers_of_abandoned_export() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let mut watch = DownloadWatch::default();

        let first = watch.begin(d).unwrap();
        std::fs::write(d.join("w1b.csv.crdownload"), "").unwrap();
        assert_eq!(watch.completed(d, &first).unwrap(), None);
        watch.abandon(d, first);
        std::fs::write(d.join("w1a.csv"), "").unwrap();

        let second = watch.begin(d).unwrap();
        assert!(!d.join("w1a.csv").exists());

        // The abandoned partial finishes during the second export's wait.
        std::fs::remove_file(d.join("w1b.csv.crdownload")).unwrap();
        std::fs::write(d.join("w1b.csv"), "").unwrap();
        assert_eq!(watch.completed(d, &second).unwrap(), None);
        assert!(!d.join("w1b.csv").exists());

        std::fs::write(d.join("w2.csv"), "").unwrap();
        assert_eq!(watch.completed(d, &second).unwrap(), Some(d.join("w2.csv")));
    }

    #[test]
    fn plain_css_has_no_text() {
        let l = Locator::parse("table tbody tr input[type='radio']");
        assert_eq!(l.css, "table tbody tr input[type='radio']");
        assert_eq!(l.text, None);
    }

    #[test]
    fn has_text_is_split_out() {
        let l = Locator::parse("button:has-text('Export')");
        assert_eq!(l.css, "button");
        assert_eq!(l.text.as_deref(), Some("Export"));

        let l = Locator::parse(r#"a:has-text("Tabular View")"#);
        assert_eq!(l.css, "a");
        assert_eq!(l.text.as_deref(), Some("Tabular View"));

        let l = Locator::parse(":has-text('Close')");
        assert_eq!(l.css, "*");
    }

    #[test]
    fn locator_args_serialize_null_text() {
        let [css, text] = Locator::parse("#agency").args();
        assert_eq!(css, json!("#agency"));
        assert!(text.is_null());
    }

    #[test]
    fn partial_downloads_are_ignored() {
        assert!(is_partial_download(Path::new("/tmp/a.csv.crdownload")));
        assert!(is_partial_download(Path::new("/tmp/a.part")));
        assert!(!is_partial_download(Path::new("/tmp/a.csv")));
    }

    #[test]
    fn wire_timeout_maps_to_timeout() {
        let body = r#"{"value":{"error":"timeout","message":"page load","stacktrace":""}}"#;
        let err = protocol_error(500, body, "https://portal", Duration::from_secs(60));
        assert!(matches!(err, DocumentError::Timeout { waited_ms: 60_000, .. }));
    }

    #[test]
    fn wire_errors_are_classified() {
        let body = r#"{"value":{"error":"no such element","message":"x"}}"#;
        assert!(protocol_error(404, body, "#x", Duration::ZERO).is_missing());

        let body = r#"{"value":{"error":"invalid session id","message":"gone"}}"#;
        assert!(matches!(
            protocol_error(404, body, "#x", Duration::ZERO),
            DocumentError::Protocol { status: 404, ref error, .. } if error == "invalid session id"
        ));

        assert!(matches!(
            protocol_error(502, "<html>bad gateway</html>", "#x", Duration::ZERO),
            DocumentError::Protocol { status: 502, .. }
        ));
    }

    #[test]
    fn lists_only_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.csv"), "x").unwrap();
        assert_eq!(list_files(dir.path()).unwrap(), vec![dir.path().join("a.csv")]);
    }
}
