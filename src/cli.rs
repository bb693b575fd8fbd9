//! Command line options layered over the file configuration.

use crate::config::Config;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Broker address
    #[arg(short, long)]
    pub broker: Option<String>,

    /// Broker port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Target identity to lock onto
    #[arg(short, long)]
    pub name: Option<String>,

    /// Team identifier used in topic names
    #[arg(short, long)]
    pub team: Option<String>,

    /// Camera index to try (repeat to try several, in order)
    #[arg(long)]
    pub cam: Vec<i32>,

    /// GUI display mode (cam, none)
    #[arg(short, long, default_value = "cam")]
    pub gui: String,

    /// Do not mirror the camera image
    #[arg(long)]
    pub no_mirror: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    pub config: Option<String>,
}

impl Args {
    /// Layer command line values over the file configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(broker) = &self.broker {
            config.broker.address.clone_from(broker);
        }
        if let Some(port) = self.port {
            config.broker.port = port;
        }
        if let Some(team) = &self.team {
            config.broker.team_id.clone_from(team);
        }
        if let Some(name) = &self.name {
            config.target.name.clone_from(name);
        }
        if !self.cam.is_empty() {
            config.camera.indices.clone_from(&self.cam);
        }
        if self.no_mirror {
            config.camera.mirror = false;
        }
        if self.gui == "none" {
            config.display.enabled = false;
        }
    }
}
