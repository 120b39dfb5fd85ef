use std::time::Duration;

use crate::transport::{TcpTransport, VerifyMode};

/// Connection and identity settings for a [`Client`](super::Client).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Desired nickname.
    pub nick: String,
    /// Username (ident). Defaults to the nick.
    pub user: String,
    /// Real name / GECOS. Defaults to the nick.
    pub realname: String,
    /// Server password, if required.
    pub password: Option<String>,
    pub tls: bool,
    pub verify: VerifyMode,
    /// Bound on opening the socket and the TLS handshake.
    pub connect_timeout: Duration,
    /// Emit progress lines on the `slirc_client::progress` tracing target.
    pub verbose: bool,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, nick: impl Into<String>) -> Self {
        let nick = nick.into();
        Self {
            host: host.into(),
            port,
            user: nick.clone(),
            realname: nick.clone(),
            nick,
            password: None,
            tls: false,
            verify: VerifyMode::Full,
            connect_timeout: Duration::from_secs(30),
            verbose: false,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    #[must_use]
    pub fn with_realname(mut self, realname: impl Into<String>) -> Self {
        self.realname = realname.into();
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Use TLS, verifying the server certificate as `verify` says.
    #[must_use]
    pub fn with_tls(mut self, verify: VerifyMode) -> Self {
        self.tls = true;
        self.verify = verify;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The TCP/TLS transport these settings describe.
    pub fn transport(&self) -> TcpTransport {
        let transport = TcpTransport::new(self.host.clone(), self.port)
            .with_connect_timeout(self.connect_timeout);
        if self.tls {
            transport.with_tls(self.verify)
        } else {
            transport
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_nick() {
        let config = ClientConfig::new("irc.example.net", 6667, "dan");
        assert_eq!(config.user, "dan");
        assert_eq!(config.realname, "dan");
        assert!(!config.tls);
        assert!(!config.verbose);
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new("irc.example.net", 6697, "dan")
            .with_user("d")
            .with_realname("Dan D")
            .with_password("pw")
            .with_tls(VerifyMode::None)
            .with_verbose(true);
        assert_eq!(config.user, "d");
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert!(config.tls);
        assert_eq!(config.verify, VerifyMode::None);
        assert!(config.transport().is_tls());
    }
}
