use std::time::Duration;

/// Topic used when neither `MEET_MQTT_TOPIC` nor `MQTT_TOPIC` is set.
pub const DEFAULT_TOPIC: &str = "meet/call_active";

const DEFAULT_PORT: u16 = 1883;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_MIN_DELAY: Duration = Duration::from_secs(2);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MQTT_URL not set")]
    UrlUnset,

    #[error("Invalid MQTT_URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddr {
    pub host: String,
    pub port: u16,
}

/// Connection settings for the state publisher, read once at startup.
/// Immutable afterwards; there is no configuration reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub broker: BrokerAddr,
    pub user: String,
    pub password: String,
    pub topic: String,
    pub keep_alive: Duration,
    pub reconnect_min_delay: Duration,
    pub reconnect_max_delay: Duration,
}

impl MqttSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup. `from_env` is the
    /// thin wrapper over the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("MQTT_URL")
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::UrlUnset)?;
        let broker = parse_broker_addr(&url)?;

        let topic = lookup("MEET_MQTT_TOPIC")
            .filter(|value| !value.is_empty())
            .or_else(|| lookup("MQTT_TOPIC").filter(|value| !value.is_empty()))
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

        Ok(MqttSettings {
            broker,
            user: lookup("MQTT_USER").unwrap_or_default(),
            password: lookup("MQTT_PASS").unwrap_or_default(),
            topic,
            keep_alive: KEEP_ALIVE,
            reconnect_min_delay: RECONNECT_MIN_DELAY,
            reconnect_max_delay: RECONNECT_MAX_DELAY,
        })
    }

    /// Credentials are attached to the connection when either half is set.
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() || !self.password.is_empty()
    }
}

/// Parses `host[:port]` with an optional `mqtt://`/`tcp://` scheme and
/// bracketed IPv6 hosts. Anything after the first `/` past the authority is
/// ignored. TLS schemes are rejected; this publisher speaks plain TCP.
pub fn parse_broker_addr(url: &str) -> Result<BrokerAddr, ConfigError> {
    let mut remainder = url.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            other => {
                return Err(ConfigError::InvalidUrl(format!(
                    "unsupported scheme '{other}'"
                )))
            }
        }
        remainder = rest;
    }
    let remainder = remainder.split('/').next().unwrap_or_default();

    let (host, port) = if let Some(rest) = remainder.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| ConfigError::InvalidUrl(format!("unclosed '[' in '{url}'")))?;
        let port = match rest.strip_prefix(':') {
            Some(port) => parse_port(port, url)?,
            None if rest.is_empty() => DEFAULT_PORT,
            None => {
                return Err(ConfigError::InvalidUrl(format!(
                    "unexpected '{rest}' after ']' in '{url}'"
                )))
            }
        };
        (host.to_string(), port)
    } else if let Some((host, port)) = remainder.rsplit_once(':') {
        (host.to_string(), parse_port(port, url)?)
    } else {
        (remainder.to_string(), DEFAULT_PORT)
    };

    if host.is_empty() {
        return Err(ConfigError::InvalidUrl(format!("missing host in '{url}'")));
    }
    Ok(BrokerAddr { host, port })
}

fn parse_port(port: &str, url: &str) -> Result<u16, ConfigError> {
    port.parse()
        .map_err(|_| ConfigError::InvalidUrl(format!("bad port '{port}' in '{url}'")))
}
