//! Process configuration, read from the environment and an optional `.env` file.

use crate::server::ServerSettings;
use postboard_common::{
    query::DEFAULT_PAGE_SIZE,
    util::{NonPositiveDurationError, PositiveDuration},
};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
};

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without a database the server keeps everything in memory.
    pub database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_page_size")]
    pub page_size: NonZeroU32,
    /// Unset keeps sessions valid until logout.
    pub auth_token_lifetime_seconds: Option<i64>,
}

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_page_size() -> NonZeroU32 {
    DEFAULT_PAGE_SIZE
}

impl Env {
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.server_address, self.server_port)
    }

    pub fn server_settings(&self) -> Result<ServerSettings, NonPositiveDurationError> {
        let token_lifetime = self
            .auth_token_lifetime_seconds
            .map(PositiveDuration::from_seconds)
            .transpose()?;

        Ok(ServerSettings {
            page_size: self.page_size,
            token_lifetime,
        })
    }
}
