use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;

use crate::feature::RolloutMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl From<FlexBool> for bool {
    fn from(flex: FlexBool) -> Self {
        flex.0
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    #[envconfig(default = "dealsff")]
    pub key_prefix: String,

    // Sample the rollout per evaluation instead of bucketing teams by hash
    #[envconfig(default = "false")]
    pub randomize_percentage: FlexBool,

    // 0 disables the timeout
    #[envconfig(default = "100")]
    pub redis_response_timeout_ms: u64,

    #[envconfig(default = "5000")]
    pub redis_connection_timeout_ms: u64,
}

impl Config {
    pub fn rollout_mode(&self) -> RolloutMode {
        if *self.randomize_percentage {
            RolloutMode::Randomized
        } else {
            RolloutMode::Deterministic
        }
    }

    pub fn redis_response_timeout(&self) -> Option<Duration> {
        millis_to_timeout(self.redis_response_timeout_ms)
    }

    pub fn redis_connection_timeout(&self) -> Option<Duration> {
        millis_to_timeout(self.redis_connection_timeout_ms)
    }
}

fn millis_to_timeout(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
