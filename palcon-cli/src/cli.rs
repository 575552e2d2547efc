use std::path::PathBuf;

use clap::Parser;
use color_eyre::{Report, eyre::eyre};

#[derive(Parser, Debug)]
#[command(
    name = "palcon",
    about = "Runs palette-screen wasm guests in a native window",
    long_about = "Loads a sandboxed wasm module and drives its render loop against a \
                  palette-indexed OpenGL screen, serving it named files and a monotonic clock"
)]
pub struct Cli {
    /// Guest module to run
    #[arg(value_name = "WASM", value_parser = validate_file_exists)]
    pub wasm: PathBuf,

    /// Directory of files served to the guest, matched case-insensitively
    #[arg(long, value_name = "DIR", value_parser = validate_dir_exists)]
    pub assets: Option<PathBuf>,

    /// Guest screen width in pixels
    #[arg(long, default_value = "640", value_name = "PIXELS")]
    pub width: u32,

    /// Guest screen height in pixels
    #[arg(long, default_value = "400", value_name = "PIXELS")]
    pub height: u32,

    /// Integer window scale over the guest screen size
    #[arg(long, default_value = "1", value_name = "FACTOR")]
    pub scale: u32,

    /// Render this many frames without a window and write the last as PNG
    #[arg(long, value_name = "FRAMES")]
    pub headless: Option<u32>,

    /// Where the headless frame is written
    #[arg(long, default_value = "frame.png", value_name = "PATH")]
    pub frame_out: PathBuf,

    /// Name of a stored file to hand to the guest's loader after init
    #[arg(long, value_name = "NAME")]
    pub load: Option<String>,
}

impl Cli {
    /// Validates argument combinations clap cannot express.
    pub fn validate(&self) -> Result<(), Report> {
        if self.width == 0 || self.height == 0 {
            return Err(eyre!("Screen size must be nonzero"));
        }

        if self.scale == 0 {
            return Err(eyre!("Window scale must be nonzero"));
        }

        if self.headless == Some(0) {
            return Err(eyre!("Headless mode needs at least one frame"));
        }

        if self.load.is_some() && self.assets.is_none() {
            return Err(eyre!("--load needs --assets to populate the file store"));
        }

        Ok(())
    }
}

fn validate_file_exists(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);

    match () {
        _ if !path.exists() => Err(format!("Guest module does not exist: {s}")),
        _ if !path.is_file() => Err(format!("Path is not a file: {s}")),
        _ => Ok(path),
    }
}

fn validate_dir_exists(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);

    match () {
        _ if !path.exists() => Err(format!("Asset directory does not exist: {s}")),
        _ if !path.is_dir() => Err(format!("Path is not a directory: {s}")),
        _ => Ok(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            wasm: PathBuf::from("guest.wasm"),
            assets: None,
            width: 640,
            height: 400,
            scale: 1,
            headless: None,
            frame_out: PathBuf::from("frame.png"),
            load: None,
        }
    }

    #[test]
    fn default_arguments_validate() {
        assert!(base_cli().validate().is_ok());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut cli = base_cli();
        cli.width = 0;
        assert!(cli.validate().is_err());

        let mut cli = base_cli();
        cli.scale = 0;
        assert!(cli.validate().is_err());

        let mut cli = base_cli();
        cli.headless = Some(0);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn load_requires_assets() {
        let mut cli = base_cli();
        cli.load = Some("SONG.M2".to_string());
        assert!(cli.validate().is_err());

        cli.assets = Some(PathBuf::from("."));
        assert!(cli.validate().is_ok());
    }
}
