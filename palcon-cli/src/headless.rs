//! Headless playback: frames rendered in software, the last one written
//! out as a PNG.

use std::{fs::File, io::BufWriter, path::Path};

use color_eyre::eyre::{Context, Result};
use palcon_host::{FileStore, Session};
use palcon_screen::SoftScreen;
use tracing::{info, warn};

use crate::cli::Cli;

/// Renders `frames` guest frames without a window.
pub fn run(cli: &Cli, wasm: &[u8], files: FileStore, frames: u32) -> Result<()> {
    let screen = SoftScreen::new(cli.width, cli.height);
    let mut session = Session::new(wasm, screen, files)?;
    session.init()?;

    if let Some(name) = &cli.load {
        if !session.load_file(name)? {
            warn!(name = %name, "guest rejected the file");
        }
    }

    for _ in 0..frames {
        session.render_frame()?;
    }

    let screen = session.into_screen();
    write_png(&cli.frame_out, screen.frame(), cli.width, cli.height)
        .wrap_err_with(|| format!("Failed to write {}", cli.frame_out.display()))?;

    info!(frames, out = %cli.frame_out.display(), "headless render complete");
    Ok(())
}

fn write_png(path: &Path, frame: &[u8], width: u32, height: u32) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(frame)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trips_rgba_pixels() {
        let dir = std::env::temp_dir().join(format!("palcon-png-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.png");

        let frame = [255, 0, 0, 255, 0, 255, 0, 255];
        write_png(&path, &frame, 2, 1).unwrap();

        let decoder = png::Decoder::new(std::io::BufReader::new(File::open(&path).unwrap()));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0u8; 64];
        let out = reader.next_frame(&mut buf).unwrap();

        assert_eq!((out.width, out.height), (2, 1));
        assert_eq!(&buf[..out.buffer_size()], &frame);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
