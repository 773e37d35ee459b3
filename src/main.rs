use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thermafuse::camera::{
    list_devices, CameraCapture, CameraSettings, CaptureError, Resolution, StreamKind,
};
use thermafuse::config::Config;
use thermafuse::controls::{ControlState, HotkeyManager};
use thermafuse::fusion::{FusionSettings, DEFAULT_OBJECT_THRESHOLD};
use thermafuse::pump::{setup_ctrlc_handler, FramePump, PumpError};
use thermafuse::record::Recorder;
use thermafuse::sink::{MpvPreview, NullSink};

/// Parse and validate opacity (0.0-1.0)
fn parse_opacity(s: &str) -> Result<f32, String> {
    let opacity: f32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if !(0.0..=1.0).contains(&opacity) {
        return Err(format!(
            "Opacity must be between 0.0 and 1.0, got {}",
            opacity
        ));
    }
    Ok(opacity)
}

/// thermafuse: visible/thermal camera fusion viewer
#[derive(Parser)]
#[command(name = "thermafuse")]
#[command(version, about = "Visible/thermal camera fusion viewer")]
#[command(long_about = "Fuses a visible-light and a thermal camera stream into one live \
    view. Supports contour emphasis on either stream, false-color thermal \
    mapping, and a keyed ThermaVue overlay, with PNG snapshots and MP4 \
    recording.")]
#[command(after_help = "EXAMPLES:
    # Fuse cameras 0 (visible) and 1 (thermal)
    thermafuse run

    # Explicit devices and a stronger thermal weight
    thermafuse run --visible 0 --thermal 2 -o 0.7

    # Start directly in ThermaVue overlay mode
    thermafuse run --overlay

    # List available cameras
    thermafuse list-cameras")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available camera devices
    ListCameras,

    /// Start the fusion viewer
    #[command(after_help = "HOTKEYS (while running):
    T      Toggle thermal contour
    V      Toggle visible contour
    C      Toggle thermal colormap
    O      Toggle ThermaVue overlay
    +/-    Adjust opacity
    R      Start/stop recording
    S      Save snapshot
    Q      Quit")]
    Run {
        /// Visible-light camera device index
        #[arg(long)]
        visible: Option<u32>,

        /// Thermal camera device index
        #[arg(long)]
        thermal: Option<u32>,

        /// Blend opacity (0.0 = pure visible, 1.0 = pure thermal)
        #[arg(long, short = 'o', value_parser = parse_opacity)]
        opacity: Option<f32>,

        /// Start with thermal contour enabled
        #[arg(long)]
        thermal_contour: bool,

        /// Start with visible contour enabled
        #[arg(long)]
        visible_contour: bool,

        /// Start with the thermal colormap enabled
        #[arg(long)]
        thermal_colormap: bool,

        /// Start in ThermaVue overlay mode
        #[arg(long)]
        overlay: bool,

        /// Run without the mpv preview window (snapshots/recording only)
        #[arg(long)]
        no_preview: bool,

        /// Directory for snapshots and recordings
        #[arg(long, short = 'd')]
        output_dir: Option<PathBuf>,

        /// File name prefix for snapshots and recordings
        #[arg(long)]
        prefix: Option<String>,

        /// Custom config file path (default: ~/.config/thermafuse/config.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

/// Display formatted startup status showing current settings
fn print_startup_status(
    visible_index: u32,
    thermal_index: u32,
    settings: &FusionSettings,
    output_dir: &std::path::Path,
    preview: bool,
) {
    println!();
    println!("┌─────────────────────────────────────────┐");
    println!("│           thermafuse v{}            │", env!("CARGO_PKG_VERSION"));
    println!("├─────────────────────────────────────────┤");
    println!("│  Visible:  {:<28}│", format!("camera {}", visible_index));
    println!("│  Thermal:  {:<28}│", format!("camera {}", thermal_index));
    println!("│  Opacity:  {:<28}│", format!("{:.0}%", settings.opacity * 100.0));

    let mut modes = Vec::new();
    if settings.overlay {
        modes.push("ThermaVue");
    } else {
        if settings.thermal_contour {
            modes.push("thermal contour");
        }
        if settings.visible_contour {
            modes.push("visible contour");
        }
        if settings.thermal_colormap {
            modes.push("colormap");
        }
    }
    let modes_str = if modes.is_empty() { "raw blend".to_string() } else { modes.join(", ") };
    println!("│  Mode:     {:<28}│", modes_str);
    println!("│  Output:   {:<28}│", truncate(&output_dir.display().to_string(), 28));
    println!("│  Preview:  {:<28}│", if preview { "mpv window" } else { "disabled" });
    println!("├─────────────────────────────────────────┤");
    println!("│  HOTKEYS                                │");
    println!("│    T       Thermal contour              │");
    println!("│    V       Visible contour              │");
    println!("│    C       Thermal colormap             │");
    println!("│    O       ThermaVue overlay            │");
    println!("│    +/-     Adjust opacity               │");
    println!("│    R       Record    S  Snapshot        │");
    println!("│    Q       Quit      Ctrl+C  Quit       │");
    println!("└─────────────────────────────────────────┘");
    println!();
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        format!("...{}", &s[s.len() - (max - 3)..])
    } else {
        s.to_string()
    }
}

/// Open and start one camera stream.
fn start_camera(stream: StreamKind, device_index: u32) -> Result<CameraCapture, CaptureError> {
    let settings = CameraSettings {
        device_index,
        ..CameraSettings::default()
    };
    let mut camera = CameraCapture::open(stream, settings)?;
    camera.start()?;
    Ok(camera)
}

/// Run the fusion viewer until it stops.
#[allow(clippy::too_many_arguments)] // Direct mapping from CLI args
fn run_viewer(
    visible_index: u32,
    thermal_index: u32,
    initial: FusionSettings,
    overlay_threshold: u8,
    output_dir: PathBuf,
    prefix: String,
    no_preview: bool,
) -> Result<(), PumpError> {
    if let Err(e) = setup_ctrlc_handler() {
        eprintln!("Warning: Could not set up Ctrl+C handler: {}", e);
    }

    let visible = start_camera(StreamKind::Visible, visible_index)?;
    let thermal = start_camera(StreamKind::Thermal, thermal_index)?;
    if let Some(res) = visible.actual_resolution() {
        log::info!("visible camera delivering {}x{}", res.width, res.height);
    }
    if let Some(res) = thermal.actual_resolution() {
        log::info!("thermal camera delivering {}x{}", res.width, res.height);
    }

    let controls = Arc::new(ControlState::new(initial));

    let mut hotkeys = HotkeyManager::new(Arc::clone(&controls));
    if hotkeys.start().is_err() {
        eprintln!("Warning: Could not start hotkey listener. Keyboard controls will not work.");
        eprintln!("On macOS, ensure Accessibility permission is granted.\n");
    }

    let mut recorder = Recorder::new(output_dir.clone(), prefix);
    let mut pump = FramePump::new(visible, thermal, controls, overlay_threshold);

    // Give the capture threads a moment to deliver their first frames;
    // after this, a missing frame is a hard failure.
    pump.wait_until_ready(Duration::from_secs(5))?;

    print_startup_status(visible_index, thermal_index, &initial, &output_dir, !no_preview);

    let runtime = tokio::runtime::Runtime::new().map_err(PumpError::Runtime)?;

    let result = if no_preview {
        let mut sink = NullSink::new();
        runtime.block_on(pump.run(&mut sink, &mut recorder))
    } else {
        let target = Resolution::FUSION;
        let mut sink = MpvPreview::spawn(target.width, target.height)?;
        runtime.block_on(pump.run(&mut sink, &mut recorder))
    };

    hotkeys.stop();
    result?;

    println!("Fusion stopped.");
    Ok(())
}

fn run_list_cameras() -> Result<(), CaptureError> {
    let devices = list_devices()?;
    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }
    println!("Available cameras:");
    for device in &devices {
        println!("  {}", device);
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::ListCameras) => {
            if let Err(e) = run_list_cameras() {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run {
            visible,
            thermal,
            opacity,
            thermal_contour,
            visible_contour,
            thermal_colormap,
            overlay,
            no_preview,
            output_dir,
            prefix,
            config: config_path,
        }) => {
            // Load config file.
            // If --config is specified, require the file to exist;
            // otherwise fall back to defaults if the default file is absent.
            let cfg = if let Some(path) = config_path {
                match Config::load_from_explicit(path) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                match Config::load() {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Warning: Failed to load config file: {}", e);
                        eprintln!("Using default settings.\n");
                        Config::default()
                    }
                }
            };

            // Merge settings: CLI args > config file > built-in defaults
            let visible_index = visible.or(cfg.camera.visible).unwrap_or(0);
            let thermal_index = thermal.or(cfg.camera.thermal).unwrap_or(1);
            let opacity = opacity.or(cfg.fusion.opacity).unwrap_or(0.5).clamp(0.0, 1.0);
            let overlay_threshold = cfg
                .fusion
                .overlay_threshold
                .unwrap_or(DEFAULT_OBJECT_THRESHOLD);
            let output_dir = output_dir
                .or(cfg.output.directory)
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("."));
            let prefix = prefix
                .or(cfg.output.prefix)
                .unwrap_or_else(|| "fusion".to_string());

            let initial = FusionSettings {
                thermal_contour,
                visible_contour,
                thermal_colormap,
                overlay,
                opacity,
            };

            if let Err(e) = run_viewer(
                visible_index,
                thermal_index,
                initial,
                overlay_threshold,
                output_dir,
                prefix,
                no_preview,
            ) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            // Show brief help when no command is provided
            println!("thermafuse {}", env!("CARGO_PKG_VERSION"));
            println!("Visible/thermal camera fusion viewer\n");
            println!("USAGE:");
            println!("    thermafuse <COMMAND>\n");
            println!("COMMANDS:");
            println!("    run           Start the fusion viewer");
            println!("    list-cameras  List available camera devices");
            println!("    help          Print this message or the help of a subcommand\n");
            println!("Run 'thermafuse --help' for more details and examples.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_opacity_valid() {
        assert_eq!(parse_opacity("0.3").unwrap(), 0.3);
        assert_eq!(parse_opacity("0.0").unwrap(), 0.0);
        assert_eq!(parse_opacity("1.0").unwrap(), 1.0);
    }

    #[test]
    fn test_parse_opacity_boundaries() {
        assert!(parse_opacity("0.0").is_ok());
        assert!(parse_opacity("1.0").is_ok());
        assert!(parse_opacity("-0.1").is_err());
        assert!(parse_opacity("1.1").is_err());
    }

    #[test]
    fn test_parse_opacity_invalid_input() {
        assert!(parse_opacity("not_a_number").is_err());
        assert!(parse_opacity("").is_err());
    }

    #[test]
    fn test_parse_opacity_out_of_range_message() {
        let err = parse_opacity("2.0").unwrap_err();
        assert!(err.contains("must be between 0.0 and 1.0"));
        assert!(err.contains("2"));
    }

    #[test]
    fn test_settings_merge_cli_beats_config() {
        // Mirrors the merge logic in main(): CLI > config > default
        let cli_value = Some(0.9f32);
        let config_value = Some(0.2f32);
        let merged = cli_value.or(config_value).unwrap_or(0.5);
        assert_eq!(merged, 0.9);
    }

    #[test]
    fn test_settings_merge_config_beats_default() {
        let cli_value: Option<f32> = None;
        let config_value = Some(0.2f32);
        let merged = cli_value.or(config_value).unwrap_or(0.5);
        assert_eq!(merged, 0.2);
    }

    #[test]
    fn test_settings_merge_default_device_indices() {
        let visible: Option<u32> = None;
        let thermal: Option<u32> = None;
        assert_eq!(visible.or(None).unwrap_or(0), 0);
        assert_eq!(thermal.or(None).unwrap_or(1), 1);
    }

    #[test]
    fn test_truncate_long_paths() {
        assert_eq!(truncate("short", 28), "short");
        let long = "/a/very/long/path/that/does/not/fit/in/the/box";
        let out = truncate(long, 28);
        assert_eq!(out.len(), 28);
        assert!(out.starts_with("..."));
    }
}
