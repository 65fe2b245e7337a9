//! Process Configuration
//!
//! `FLASH_SALE_*` environment variables with defaults, then command-line overrides.

use crate::access::AccessPolicy;
use crate::identity::IvMode;
use crate::pipeline::{Product, QueueSettings};
use crate::ring::DEFAULT_REPLICAS;

use anyhow::{Context, anyhow, bail};
use std::{env, fmt::Display, str::FromStr, time::Duration};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Node,
    Gate,
    Broker,
    Consumer,
    Standalone,
    Sign,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "node" => Ok(Role::Node),
            "gate" => Ok(Role::Gate),
            "broker" => Ok(Role::Broker),
            "consumer" => Ok(Role::Consumer),
            "standalone" => Ok(Role::Standalone),
            "sign" => Ok(Role::Sign),
            other => Err(format!(
                "unknown role `{}` (expected node|gate|broker|consumer|standalone|sign)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    pub bind: String,
    pub advertise: String,
    pub peers: Vec<String>,
    pub replicas: usize,
    pub signing_key: Option<Vec<u8>>,
    pub iv_mode: IvMode,
    pub gate_url: String,
    pub broker_url: String,
    pub queue: String,
    pub capacity: u64,
    pub stride: u64,
    pub proxy_timeout: Duration,
    pub gate_timeout: Duration,
    pub max_deliveries: u32,
    pub lease: Duration,
    pub retry_backoff: Duration,
    pub access_policy: AccessPolicy,
    pub products: Vec<Product>,
    /// User id to mint cookies for in the `sign` role.
    pub sign_uid: Option<i64>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let args: Vec<String> = env::args().skip(1).collect();
        Self::from_sources(|key| env::var(key).ok(), &args)
    }

    /// Builds a config from an arbitrary variable lookup and argument list.
    pub fn from_sources<F>(lookup: F, args: &[String]) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind: String = try_load(&lookup, "FLASH_SALE_BIND", "127.0.0.1:8083")?;
        let advertised = lookup("FLASH_SALE_ADVERTISE");
        let advertise_pinned = advertised.is_some();
        let advertise = advertised.unwrap_or_else(|| bind.clone());

        let mut config = Self {
            role: try_load(&lookup, "FLASH_SALE_ROLE", "standalone")?,
            bind,
            advertise,
            peers: lookup("FLASH_SALE_PEERS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            replicas: try_load(&lookup, "FLASH_SALE_REPLICAS", &DEFAULT_REPLICAS.to_string())?,
            signing_key: lookup("FLASH_SALE_SIGNING_KEY").map(String::into_bytes),
            iv_mode: try_load(&lookup, "FLASH_SALE_IV_MODE", "random")?,
            gate_url: try_load(&lookup, "FLASH_SALE_GATE_URL", "http://127.0.0.1:8084")?,
            broker_url: try_load(&lookup, "FLASH_SALE_BROKER_URL", "http://127.0.0.1:5673")?,
            queue: try_load(&lookup, "FLASH_SALE_QUEUE", "flashProduct")?,
            capacity: try_load(&lookup, "FLASH_SALE_CAPACITY", "1000000")?,
            stride: try_load(&lookup, "FLASH_SALE_STRIDE", "100")?,
            proxy_timeout: Duration::from_millis(try_load(
                &lookup,
                "FLASH_SALE_PROXY_TIMEOUT_MS",
                "500",
            )?),
            gate_timeout: Duration::from_millis(try_load(
                &lookup,
                "FLASH_SALE_GATE_TIMEOUT_MS",
                "500",
            )?),
            max_deliveries: try_load(&lookup, "FLASH_SALE_MAX_DELIVERIES", "5")?,
            lease: Duration::from_millis(try_load(&lookup, "FLASH_SALE_LEASE_MS", "30000")?),
            retry_backoff: Duration::from_millis(try_load(
                &lookup,
                "FLASH_SALE_RETRY_BACKOFF_MS",
                "100",
            )?),
            access_policy: try_load(&lookup, "FLASH_SALE_ACCESS_POLICY", "open")?,
            products: parse_products(&try_load::<String, _>(
                &lookup,
                "FLASH_SALE_PRODUCTS",
                "1:100",
            )?)?,
            sign_uid: None,
        };

        config.apply_args(args, advertise_pinned)?;

        if config.peers.is_empty() {
            config.peers.push(config.advertise.clone());
        } else if !config.peers.contains(&config.advertise) {
            warn!(
                "Advertised node {} is not among the ring peers; every uid will be proxied",
                config.advertise
            );
        }
        if config.stride == 0 {
            bail!("FLASH_SALE_STRIDE must be at least 1");
        }
        if config.max_deliveries == 0 {
            bail!("FLASH_SALE_MAX_DELIVERIES must be at least 1");
        }

        Ok(config)
    }

    /// `--bind` also moves the advertised node unless it was given explicitly.
    fn apply_args(&mut self, args: &[String], mut advertise_pinned: bool) -> anyhow::Result<()> {
        let mut cli_peers: Vec<String> = vec![];

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = args
                .get(i + 1)
                .cloned()
                .ok_or_else(|| anyhow!("{} requires a value", flag));
            match flag {
                "--role" => {
                    self.role = value?.parse().map_err(|e: String| anyhow!(e))?;
                    i += 2;
                }
                "--bind" => {
                    let bind = value?;
                    if !advertise_pinned {
                        self.advertise = bind.clone();
                    }
                    self.bind = bind;
                    i += 2;
                }
                "--advertise" => {
                    self.advertise = value?;
                    advertise_pinned = true;
                    i += 2;
                }
                "--peer" => {
                    cli_peers.extend(split_list(&value?));
                    i += 2;
                }
                "--gate" => {
                    self.gate_url = value?;
                    i += 2;
                }
                "--broker" => {
                    self.broker_url = value?;
                    i += 2;
                }
                "--uid" => {
                    let raw = value?;
                    self.sign_uid = Some(
                        raw.parse()
                            .with_context(|| format!("--uid `{}` is not a user id", raw))?,
                    );
                    i += 2;
                }
                other => {
                    warn!("Ignoring unknown argument {}", other);
                    i += 1;
                }
            }
        }

        if !cli_peers.is_empty() {
            self.peers = cli_peers;
        }
        Ok(())
    }

    /// Key material for the signed identity. Required by roles that verify cookies.
    pub fn signing_key(&self) -> anyhow::Result<Vec<u8>> {
        self.signing_key
            .clone()
            .ok_or_else(|| anyhow!("FLASH_SALE_SIGNING_KEY must be set for the {:?} role", self.role))
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            max_deliveries: self.max_deliveries,
            lease: self.lease,
            retry_backoff: self.retry_backoff,
            ..QueueSettings::default()
        }
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("invalid {key} value `{raw}`: {e}")
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `id:stock,id:stock`.
pub fn parse_products(raw: &str) -> anyhow::Result<Vec<Product>> {
    split_list(raw)
        .into_iter()
        .map(|entry| {
            let (id, stock) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("product `{}` must look like id:stock", entry))?;
            let id: i64 = id
                .trim()
                .parse()
                .with_context(|| format!("product id in `{}`", entry))?;
            let stock: i64 = stock
                .trim()
                .parse()
                .with_context(|| format!("product stock in `{}`", entry))?;
            Ok(Product::new(id, format!("product-{}", id), stock))
        })
        .collect()
}
