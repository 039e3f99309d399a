//! MySQL connection pool setup.

use anyhow::Result;
use mysql_async::{OptsBuilder, Pool};

/// Connection settings for the source server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOpts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl ConnectionOpts {
    /// `host:port`, used in log and error messages.
    pub fn server_name(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Create a new MySQL connection pool
pub fn new_mysql_pool(opts: &ConnectionOpts) -> Result<Pool> {
    let builder = OptsBuilder::default()
        .ip_or_hostname(opts.host.clone())
        .tcp_port(opts.port)
        .user(Some(opts.user.clone()))
        .pass(Some(opts.password.clone()));
    Ok(Pool::new(builder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_name() {
        let opts = ConnectionOpts {
            host: "db1".to_string(),
            port: 3307,
            user: "repl".to_string(),
            password: String::new(),
        };
        assert_eq!(opts.server_name(), "db1:3307");
    }
}
