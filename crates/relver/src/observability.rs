//! Structured logging for relver.
//!
//! Every record is one JSON line. Fields describing the release in flight
//! (`version`, `tag`, `phase`, `dry_run`) are collected from the event and
//! its enclosing spans into a `release` object, so a single filter such as
//! `jq 'select(.release.tag == "v1.3.0")'` follows one release through all
//! of its phases.
//!
//! Nothing here writes to stdout, which carries command output and `--json`
//! documents.

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use tracing::Event;
use tracing::field::{Field, Visit};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const SERVICE: &str = env!("CARGO_PKG_NAME");
const ENV_LOG_PATH: &str = "RELVER_LOG_PATH";
const ENV_LOG_DIR: &str = "RELVER_LOG_DIR";

/// Span and event fields grouped under `release`.
const RELEASE_KEYS: &[&str] = &["version", "tag", "phase", "dry_run"];

/// Where and for which repository to log.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Working directory of the command, stamped on every record as `repo`.
    pub root: Utf8PathBuf,
    /// `log_dir` from configuration. Relative paths are resolved against `root`.
    pub log_dir: Option<Utf8PathBuf>,
}

impl ObservabilityConfig {
    /// Build from the repository root and the configured log directory.
    pub fn new(root: &Utf8Path, log_dir: Option<&Utf8Path>) -> Self {
        Self {
            root: root.to_path_buf(),
            log_dir: log_dir.map(|dir| {
                if dir.is_absolute() {
                    dir.to_path_buf()
                } else {
                    root.join(dir)
                }
            }),
        }
    }
}

/// Keeps the background log writer alive; hold it until exit.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the JSON log layer.
///
/// Logs go to the first writable file from [`log_file`]. When none is
/// writable the records go to stderr instead.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let candidates = log_file(
        env_path(ENV_LOG_PATH),
        env_path(ENV_LOG_DIR),
        cfg.log_dir.as_deref(),
        default_log_dir(),
    );
    let (writer, guard) = match open_log(&candidates) {
        Some((dir, file_name)) => {
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name))
        }
        None => {
            eprintln!("Warning: no writable log file, logging to stderr");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLogLayer::new(writer, &cfg.root))
        .init();

    tracing::debug!(root = %cfg.root, "logging initialized");
    Ok(ObservabilityGuard { _log_guard: guard })
}

/// Filter from CLI flags: `-q` wins, then `-v`/`-vv`, then `RUST_LOG`, then
/// the configured level.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    }
}

// ============================================================================
// Log file selection
// ============================================================================

fn env_path(name: &str) -> Option<Utf8PathBuf> {
    std::env::var(name).ok().filter(|v| !v.is_empty()).map(Utf8PathBuf::from)
}

/// Per-user log directory, outside any repository.
fn default_log_dir() -> Option<Utf8PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", SERVICE)?;
    Utf8PathBuf::from_path_buf(dirs.data_local_dir().join("logs")).ok()
}

/// Candidate log files, most specific first.
///
/// `RELVER_LOG_PATH` names a file. `RELVER_LOG_DIR`, the configured
/// directory and the per-user directory each hold `relver.jsonl`.
fn log_file(
    path_override: Option<Utf8PathBuf>,
    dir_override: Option<Utf8PathBuf>,
    config_dir: Option<&Utf8Path>,
    default_dir: Option<Utf8PathBuf>,
) -> Vec<Utf8PathBuf> {
    let file_name = format!("{SERVICE}.jsonl");
    path_override
        .into_iter()
        .chain(
            [dir_override, config_dir.map(Utf8Path::to_path_buf), default_dir]
                .into_iter()
                .flatten()
                .map(|dir| dir.join(&file_name)),
        )
        .collect()
}

/// First candidate whose directory can be created and file opened for append.
fn open_log(candidates: &[Utf8PathBuf]) -> Option<(Utf8PathBuf, String)> {
    candidates.iter().find_map(|path| {
        let file_name = path.file_name()?.to_string();
        let dir = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        std::fs::create_dir_all(dir).ok()?;
        OpenOptions::new().create(true).append(true).open(path).ok()?;
        Some((dir.to_path_buf(), file_name))
    })
}

// ============================================================================
// JSON layer
// ============================================================================

struct JsonLogLayer<W> {
    writer: W,
    repo: Value,
}

impl<W> JsonLogLayer<W> {
    fn new(writer: W, root: &Utf8Path) -> Self {
        Self {
            writer,
            repo: Value::String(root.to_string()),
        }
    }
}

/// Fields recorded on a span, read back for every event inside it.
#[derive(Clone, Debug, Default)]
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLogLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut fields = FieldMap::default();
            attrs.record(&mut fields);
            span.extensions_mut().insert(SpanFields(fields.0));
        }
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        values.record(&mut fields);
        let mut extensions = span.extensions_mut();
        if let Some(existing) = extensions.get_mut::<SpanFields>() {
            existing.0.extend(fields.0);
        } else {
            extensions.insert(SpanFields(fields.0));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut record = Record::default();

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    record.absorb(fields.0.clone());
                }
            }
        }
        let mut fields = FieldMap::default();
        event.record(&mut fields);
        record.absorb(fields.0);

        let line = record.into_json(
            format_timestamp(),
            meta.level().as_str().to_lowercase(),
            meta.target(),
            &self.repo,
        );
        let Ok(mut bytes) = serde_json::to_vec(&line) else {
            return;
        };
        bytes.push(b'\n');
        self.writer.make_writer().write_all(&bytes).ok();
    }
}

/// One log line under construction.
#[derive(Default)]
struct Record {
    message: Option<Value>,
    release: Map<String, Value>,
    fields: Map<String, Value>,
}

impl Record {
    /// Sort fields into message, release context and the rest. Later values win.
    fn absorb(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            if key == "message" {
                self.message = Some(value);
            } else if RELEASE_KEYS.contains(&key.as_str()) {
                self.release.insert(key, value);
            } else {
                self.fields.insert(key, value);
            }
        }
    }

    fn into_json(self, ts: String, level: String, target: &str, repo: &Value) -> Value {
        let mut map = Map::new();
        map.insert("ts".into(), Value::String(ts));
        map.insert("level".into(), Value::String(level));
        map.insert("service".into(), Value::String(SERVICE.into()));
        map.insert("target".into(), Value::String(target.into()));
        map.insert("repo".into(), repo.clone());
        if let Some(message) = self.message {
            map.insert("msg".into(), message);
        }
        if !self.release.is_empty() {
            map.insert("release".into(), Value::Object(self.release));
        }
        for (key, value) in self.fields {
            map.entry(key).or_insert(value);
        }
        Value::Object(map)
    }
}

#[derive(Default)]
struct FieldMap(Map<String, Value>);

impl Visit for FieldMap {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().into(), Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().into(), Value::String(value.into()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.0
            .insert(field.name().into(), Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().into(), Value::String(format!("{value:?}")));
    }
}

/// Current UTC time, RFC 3339 with milliseconds.
fn format_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format_unix_timestamp(now.as_secs(), now.subsec_millis())
}

fn format_unix_timestamp(secs: u64, millis: u32) -> String {
    let date = relver_core::notes::iso_date_from_unix(secs);
    let secs_of_day = secs % 86_400;
    format!(
        "{date}T{:02}:{:02}:{:02}.{millis:03}Z",
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}
