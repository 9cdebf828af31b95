//! Authorization log
//!
//! Lines look like `Auth | 2024-05-01 12:00:00 INFO returning true (access granted)`:
//! tag, local timestamp, level, message. Targets, spans and the program
//! name are left out.
//!
//! Only events with the `authz` target reach the log, so it can sit next to
//! the host application's own subscriber layers.

use chrono::{DateTime, Local};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{Filtered, Targets};
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, Layer as FmtLayer, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::AuthorizationConfig;
use crate::error::{AuthzError, AuthzResult};

/// Target of every authorization event.
pub const LOG_TARGET: &str = "authz";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formatting layer restricted to [`LOG_TARGET`] events.
pub type AuthLogLayer<S, W = Arc<File>> =
    Filtered<FmtLayer<S, DefaultFields, AuthLogFormat, W>, Targets, S>;

/// Event formatter for the authorization log.
#[derive(Debug, Clone)]
pub struct AuthLogFormat {
    tag: String,
}

impl Default for AuthLogFormat {
    fn default() -> Self {
        Self::new("Auth |")
    }
}

impl AuthLogFormat {
    /// Create a formatter with `tag` at the start of every line.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Create a formatter using the configured tag.
    pub fn from_config(config: &AuthorizationConfig) -> Self {
        Self::new(config.log_tag.clone())
    }

    /// Line prefix for an event at `level` logged at `time`.
    pub fn prefix(&self, level: &Level, time: &DateTime<Local>) -> String {
        format!("{} {} {}", self.tag, time.format(TIMESTAMP_FORMAT), level)
    }
}

impl<S, N> FormatEvent<S, N> for AuthLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let prefix = self.prefix(event.metadata().level(), &Local::now());
        write!(writer, "{} ", prefix)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Layer writing the authorization log to `config.log_path`.
///
/// Add it to the host's subscriber to keep the host's own output:
///
/// ```no_run
/// use authz_engine::logging::auth_log_layer;
/// use authz_engine::AuthorizationConfig;
/// use tracing_subscriber::layer::SubscriberExt;
/// use tracing_subscriber::util::SubscriberInitExt;
///
/// let config = AuthorizationConfig::default();
/// tracing_subscriber::registry()
///     .with(tracing_subscriber::fmt::layer())
///     .with(auth_log_layer(&config).unwrap())
///     .init();
/// ```
///
/// # Errors
///
/// `AuthzError::Logging` if the file cannot be opened or the level is
/// invalid.
pub fn auth_log_layer<S>(config: &AuthorizationConfig) -> AuthzResult<AuthLogLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = open_log_file(config)?;
    layer_with_writer(config, Arc::new(file))
}

/// Install a global subscriber holding only [`auth_log_layer`].
///
/// # Errors
///
/// `AuthzError::Logging` if the layer cannot be built or a global
/// subscriber is already installed.
pub fn init_logging(config: &AuthorizationConfig) -> AuthzResult<()> {
    tracing_subscriber::registry()
        .with(auth_log_layer(config)?)
        .try_init()
        .map_err(|e| AuthzError::Logging(e.to_string()))
}

fn layer_with_writer<S, W>(config: &AuthorizationConfig, writer: W) -> AuthzResult<AuthLogLayer<S, W>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level: LevelFilter = config
        .log_level
        .trim()
        .parse()
        .map_err(|e| AuthzError::Logging(format!("invalid log level {:?}: {}", config.log_level, e)))?;

    Ok(tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(AuthLogFormat::from_config(config))
        .with_writer(writer)
        .with_filter(Targets::new().with_target(LOG_TARGET, level)))
}

fn open_log_file(config: &AuthorizationConfig) -> AuthzResult<File> {
    if let Some(parent) = config.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AuthzError::Logging(format!("{}: {}", parent.display(), e)))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
        .map_err(|e| AuthzError::Logging(format!("{}: {}", config.log_path.display(), e)))
}
