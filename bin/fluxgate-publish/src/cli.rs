use std::path::PathBuf;

use clap::Parser;
use fluxgate_io::deser::CONTENT_TYPE_JSON;

/// Publishes a batch of metrics to InfluxDB.
#[derive(Parser, Debug)]
#[command(name = "fluxgate-publish", version)]
pub struct Cli {
    /// Path to the publisher configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Content type of the metric payload.
    #[arg(long = "content-type", default_value = CONTENT_TYPE_JSON)]
    pub content_type: String,

    /// Path to the metric payload, or `-` to read it from stdin.
    #[arg(short = 'p', long = "payload", default_value = "-")]
    pub payload: String,
}

impl Cli {
    /// Returns `true` if the payload should be read from stdin.
    pub fn payload_from_stdin(&self) -> bool {
        self.payload == "-"
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["fluxgate-publish", "--config", "/etc/fluxgate.yaml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/fluxgate.yaml"));
        assert_eq!(cli.content_type, CONTENT_TYPE_JSON);
        assert!(cli.payload_from_stdin());
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["fluxgate-publish"]).is_err());
    }

    #[test]
    fn explicit_payload() {
        let cli = Cli::try_parse_from([
            "fluxgate-publish",
            "-c",
            "publisher.yaml",
            "--content-type",
            "fluxgate.json",
            "--payload",
            "metrics.json",
        ])
        .unwrap();
        assert!(!cli.payload_from_stdin());
        assert_eq!(cli.payload, "metrics.json");
    }
}
