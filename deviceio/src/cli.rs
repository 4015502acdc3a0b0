use clap::Parser;
use std::num::ParseIntError;
use std::time::Duration;

use crate::model::Param;
use crate::remote::{DEFAULT_API_ENDPOINT, RemoteConfig, RequestConfig};
use crate::util::http::Uri;
use crate::util::types::{DeviceId, ProxyId};

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

fn parse_proxy_id(s: &str) -> Result<ProxyId, String> {
    if s.is_empty() {
        return Err("proxy id cannot be empty".to_owned());
    }
    Ok(ProxyId::from(s))
}

fn parse_param(s: &str) -> Result<Param, String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok(Param::new(name.trim(), value)),
        _ => Err(format!("expected <name>=<value>, got '{s}'")),
    }
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Device API endpoint URI
    #[arg(
        env = "DEVICEIO_API_ENDPOINT",
        long = "api-endpoint",
        value_name = "uri",
        default_value = DEFAULT_API_ENDPOINT
    )]
    pub api_endpoint: Uri,

    /// Identity of this proxy, eg. the host hardware address "0A1B2C3D4E5F"
    #[arg(
        env = "DEVICEIO_PROXY_ID",
        long = "proxy-id",
        value_name = "id",
        value_parser = parse_proxy_id
    )]
    pub proxy_id: ProxyId,

    /// Device to receive commands for. Defaults to the proxy id
    #[arg(env = "DEVICEIO_DEVICE_ID", long = "device-id", value_name = "id")]
    pub device_id: Option<DeviceId>,

    /// How long the server may hold a command poll, in milliseconds
    #[arg(
        env = "DEVICEIO_POLL_TIMEOUT_MS",
        long = "poll-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub poll_timeout: Option<Duration>,

    /// Upload request timeout in milliseconds
    #[arg(
        env = "DEVICEIO_SEND_TIMEOUT_MS",
        long = "send-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub send_timeout: Option<Duration>,

    /// Measurement param reported once at start-up, eg. "outletStatus=ON".
    /// May be repeated
    #[arg(
        env = "DEVICEIO_MEASURE",
        long = "measure",
        value_name = "name=value",
        value_parser = parse_param,
        value_delimiter = ','
    )]
    pub measure: Vec<Param>,
}

impl Cli {
    pub fn remote_config(&self) -> RemoteConfig {
        let defaults = RequestConfig::default();
        RemoteConfig {
            api_endpoint: self.api_endpoint.clone(),
            proxy_id: self.proxy_id.clone(),
            request: RequestConfig {
                poll_timeout: self.poll_timeout.unwrap_or(defaults.poll_timeout),
                send_timeout: self.send_timeout.unwrap_or(defaults.send_timeout),
            },
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
            .clone()
            .unwrap_or_else(|| self.proxy_id.clone().into())
    }
}

pub fn parse() -> Cli {
    Parser::parse()
}
