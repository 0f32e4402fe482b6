//! Guest operating system capabilities.
//!
//! A backend is parameterised by a [`GuestCapability`] rather than
//! specialised through a type hierarchy. The capability decides which OS
//! type the VM is created with and how a test recipe reaches the guest once
//! it has an address.

use std::fmt;
use std::net::IpAddr;

/// Operating system family of a guest image.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OsFamily {
    /// Microsoft Windows.
    Windows,
    /// Linux distributions.
    Linux,
}

impl OsFamily {
    /// Value Azure expects in `storageProfile.osDisk.osType`.
    #[must_use]
    pub const fn as_azure_os_type(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Linux => "Linux",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_azure_os_type())
    }
}

/// Remote management protocol used to drive the guest.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RemoteProtocol {
    /// WinRM over plain HTTP.
    WinRmHttp,
    /// WinRM over HTTPS.
    WinRmHttps,
}

impl RemoteProtocol {
    /// Default port for the protocol.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::WinRmHttp => 5985,
            Self::WinRmHttps => 5986,
        }
    }

    const fn scheme(self) -> &'static str {
        match self {
            Self::WinRmHttp => "http",
            Self::WinRmHttps => "https",
        }
    }
}

/// Guest administrator credentials.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GuestCredentials {
    /// Administrator user name.
    pub username: String,
    /// Administrator password.
    pub password: String,
}

/// Everything a recipe needs to open a remote session on the guest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteEndpoint {
    /// Protocol spoken by the endpoint.
    pub protocol: RemoteProtocol,
    /// Guest address.
    pub address: IpAddr,
    /// TCP port.
    pub port: u16,
    /// Fully formed endpoint URL.
    pub url: String,
    /// Credentials accepted by the endpoint.
    pub credentials: GuestCredentials,
}

/// OS-specific behaviour composed into a backend.
pub trait GuestCapability: Send + Sync {
    /// Family of the guest image.
    fn os_family(&self) -> OsFamily;

    /// Describes how to reach the guest at `address`.
    fn remote_endpoint(&self, address: IpAddr, credentials: &GuestCredentials) -> RemoteEndpoint;
}

/// Windows guests driven over WinRM.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WindowsGuest {
    protocol: RemoteProtocol,
}

impl WindowsGuest {
    /// WinRM over HTTPS on 5986.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            protocol: RemoteProtocol::WinRmHttps,
        }
    }

    /// Selects the WinRM transport.
    #[must_use]
    pub const fn with_protocol(mut self, protocol: RemoteProtocol) -> Self {
        self.protocol = protocol;
        self
    }
}

impl Default for WindowsGuest {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestCapability for WindowsGuest {
    fn os_family(&self) -> OsFamily {
        OsFamily::Windows
    }

    fn remote_endpoint(&self, address: IpAddr, credentials: &GuestCredentials) -> RemoteEndpoint {
        let port = self.protocol.default_port();
        let host = match address {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{v6}]"),
        };
        RemoteEndpoint {
            protocol: self.protocol,
            address,
            port,
            url: format!("{}://{host}:{port}/wsman", self.protocol.scheme()),
            credentials: credentials.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use rstest::rstest;

    use super::*;

    fn credentials() -> GuestCredentials {
        GuestCredentials {
            username: String::from("admin"),
            password: String::from("Passw0rd!"),
        }
    }

    #[rstest]
    #[case(RemoteProtocol::WinRmHttps, "https://10.1.2.3:5986/wsman")]
    #[case(RemoteProtocol::WinRmHttp, "http://10.1.2.3:5985/wsman")]
    fn windows_endpoint_url(#[case] protocol: RemoteProtocol, #[case] expected: &str) {
        let guest = WindowsGuest::new().with_protocol(protocol);
        let endpoint =
            guest.remote_endpoint(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)), &credentials());
        assert_eq!(endpoint.url, expected);
        assert_eq!(endpoint.port, protocol.default_port());
        assert_eq!(endpoint.credentials, credentials());
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let endpoint =
            WindowsGuest::new().remote_endpoint(IpAddr::V6(Ipv6Addr::LOCALHOST), &credentials());
        assert_eq!(endpoint.url, "https://[::1]:5986/wsman");
    }

    #[test]
    fn windows_guest_reports_windows_os_type() {
        assert_eq!(WindowsGuest::default().os_family().as_azure_os_type(), "Windows");
    }
}
