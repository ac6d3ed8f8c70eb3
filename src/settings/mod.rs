use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, value_parser};

pub mod engine;

const VERSION: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => env!("CARGO_PKG_VERSION"),
};

#[derive(Parser, Debug)]
#[command(name = "volstream")]
#[command(version = VERSION)]
#[command(about = "Streams and plays back volumetric video")]
pub struct CliArgs {
    /// Engine configuration as json, defaults apply for everything missing.
    #[arg(long, env = "VOLSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub operation_mode: OperationMode,
}

#[derive(Subcommand, Debug)]
pub enum OperationMode {
    /// Plays an asset headless and logs what would have been drawn.
    Play {
        /// Manifest url, manifest file or asset directory.
        #[arg(long, env = "VOLSTREAM_ASSET")]
        asset: String,
        #[arg(long)]
        looping: bool,
        /// Stop after this many seconds, otherwise at the end of the asset.
        #[arg(long)]
        seconds: Option<f64>,
        #[arg(long, default_value = "1920x1080", value_parser = value_parser!(ViewportSize))]
        viewport: ViewportSize,
    },
    /// Writes a synthetic asset for local testing.
    Generate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 4.0)]
        duration: f64,
        #[arg(long, default_value_t = 1.0)]
        segment_duration: f64,
        #[arg(long, default_value_t = 10.0)]
        fps: f32,
        /// Bits per second of each geometry representation.
        #[arg(long, value_delimiter = ',', default_value = "250000,1000000")]
        representations: Vec<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for ViewportSize {
    type Err = String;

    // 1920x1080
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Expected WIDTHxHEIGHT, got {}", s))?;

        let width = width.parse::<u32>().map_err(|e| format!("Invalid width: {}", e))?;
        let height = height.parse::<u32>().map_err(|e| format!("Invalid height: {}", e))?;
        if width == 0 || height == 0 {
            return Err("Viewport dimensions must not be zero".to_string());
        }

        Ok(ViewportSize { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn parses_viewport_sizes() {
        assert_eq!(
            "1280x720".parse::<ViewportSize>(),
            Ok(ViewportSize {
                width: 1280,
                height: 720
            })
        );
        assert!("1280".parse::<ViewportSize>().is_err());
        assert!("0x720".parse::<ViewportSize>().is_err());
    }

    #[test]
    pub fn parses_the_generate_subcommand() {
        let args = CliArgs::parse_from([
            "volstream",
            "generate",
            "--out",
            "/tmp/asset",
            "--representations",
            "100000,200000,400000",
        ]);
        match args.operation_mode {
            OperationMode::Generate {
                representations,
                duration,
                ..
            } => {
                assert_eq!(representations, vec![100_000, 200_000, 400_000]);
                assert_eq!(duration, 4.0);
            }
            other => panic!("Unexpected mode {:?}", other),
        }
    }
}
