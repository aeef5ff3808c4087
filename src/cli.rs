//! Command-line arguments.

use std::net::IpAddr;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "sshgate", version, about = "Browser-accessible SSH gateway")]
pub struct Cli {
    /// Address to bind the HTTP/WS front to.
    #[arg(long, default_value = "0.0.0.0")]
    pub address: IpAddr,

    /// Port to bind the HTTP/WS front to.
    #[arg(long, default_value_t = 4200)]
    pub port: u16,
}
