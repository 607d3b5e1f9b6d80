use super::parsing::{
    non_empty, or_default, parse_bool, parse_environment, parse_positive_u64,
    parse_store_backend, parse_u16, parse_u32, trim_base_url,
};
use super::types::{
    CollaboratorSettings, ConfigError, DatabaseSettings, RuntimeSettings, ServerHost, ServerPort,
    ServerSettings, SessionSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; `load` uses the process
    /// environment.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| non_empty(lookup(key));

        let host = or_default(get("EXAM_SESSIONS_HOST"), "0.0.0.0");
        let port = or_default(get("EXAM_SESSIONS_PORT"), "8084");

        let environment =
            parse_environment(get("EXAM_SESSIONS_ENV").or_else(|| get("ENVIRONMENT")));

        let postgres_server = or_default(get("POSTGRES_SERVER"), "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", or_default(get("POSTGRES_PORT"), "5432"))?;
        let postgres_user = or_default(get("POSTGRES_USER"), "exam_sessions");
        let postgres_password = or_default(get("POSTGRES_PASSWORD"), "");
        let postgres_db = or_default(get("POSTGRES_DB"), "exam_sessions");
        let database_url = get("DATABASE_URL");
        let max_connections = parse_u32(
            "DATABASE_MAX_CONNECTIONS",
            or_default(get("DATABASE_MAX_CONNECTIONS"), "20"),
        )?;

        let exam_service_url = trim_base_url(or_default(get("EXAM_SERVICE_URL"), ""));
        let question_service_url = trim_base_url(or_default(get("QUESTION_SERVICE_URL"), ""));
        let notification_service_url =
            trim_base_url(or_default(get("NOTIFICATION_SERVICE_URL"), ""));
        let timeout_ms = parse_positive_u64(
            "COLLABORATOR_TIMEOUT_MS",
            or_default(get("COLLABORATOR_TIMEOUT_MS"), "5000"),
        )?;

        let sweep_interval_seconds = parse_positive_u64(
            "SWEEP_INTERVAL_SECONDS",
            or_default(get("SWEEP_INTERVAL_SECONDS"), "60"),
        )?;
        let store_backend = parse_store_backend(get("STORE_BACKEND"))?;

        let log_level = or_default(get("EXAM_SESSIONS_LOG_LEVEL"), "info");
        let json = get("EXAM_SESSIONS_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            get("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        Ok(Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            collaborators: CollaboratorSettings {
                exam_service_url,
                question_service_url,
                notification_service_url,
                timeout_ms,
            },
            sessions: SessionSettings { sweep_interval_seconds, store_backend },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        })
    }
}
