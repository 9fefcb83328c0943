//! Build script for gantry-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates gantry.toml and turns it into constants (`board.rs`)

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Thermistor channels, including the die sensor
const THERMISTOR_CHANNELS: usize = 5;

const AXES: [&str; 2] = ["x", "y"];

const AXIS_KEYS: [&str; 3] = ["acceleration", "start_velocity", "home_velocity"];

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    setup_linker(&out_dir);
    let config = validate_config();
    generate_constants(&config, &out_dir);
}

/// Set up linker search paths for memory.x
fn setup_linker(out_dir: &Path) {
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    if env::var_os("CARGO_FEATURE_DEFMT").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate gantry.toml at compile time
fn validate_config() -> toml::Value {
    println!("cargo:rerun-if-changed=gantry.toml");

    let config_path = Path::new("gantry.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: gantry.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a gantry.toml board configuration.        ║\n\
            ║  Please create one in the gantry-firmware directory.             ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read gantry.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in gantry.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_link(&config, &mut errors);
    validate_axes(&config, &mut errors);
    validate_thermistors(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid configuration in gantry.toml                     ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=gantry.toml validated successfully");
    config
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn validate_link(config: &toml::Value, errors: &mut Vec<String>) {
    match config.get("link").and_then(|l| l.get("baudrate")) {
        Some(toml::Value::Integer(baud)) if (1200..=921_600).contains(baud) => {}
        Some(_) => errors.push("[link] baudrate must be 1200-921600".into()),
        None => errors.push("Missing [link] baudrate".into()),
    }
}

fn validate_axes(config: &toml::Value, errors: &mut Vec<String>) {
    for axis in AXES {
        let table = match config.get("axis").and_then(|a| a.get(axis)) {
            Some(toml::Value::Table(t)) => t,
            Some(_) => {
                errors.push(format!("[axis.{}] must be a table", axis));
                continue;
            }
            None => {
                errors.push(format!("Missing [axis.{}] section", axis));
                continue;
            }
        };

        for key in AXIS_KEYS {
            match table.get(key) {
                Some(toml::Value::Integer(v)) if *v >= 0 && *v <= u32::MAX as i64 => {}
                Some(_) => errors.push(format!("[axis.{}] {} must be a u32", axis, key)),
                None => errors.push(format!("[axis.{}] missing '{}'", axis, key)),
            }
        }

        // The step generator tops out at 50k counts/s
        for key in ["start_velocity", "home_velocity"] {
            if let Some(toml::Value::Integer(v)) = table.get(key) {
                if *v > 50_000 {
                    errors.push(format!("[axis.{}] {} must be <= 50000", axis, key));
                }
            }
        }
    }
}

fn validate_thermistors(config: &toml::Value, errors: &mut Vec<String>) {
    let thermistors = match config.get("thermistor") {
        Some(toml::Value::Table(t)) => t,
        Some(_) => {
            errors.push("[thermistor] must be a table".into());
            return;
        }
        None => return,
    };

    for (name, thermistor) in thermistors {
        match name.parse::<usize>() {
            Ok(n) if n < THERMISTOR_CHANNELS => {}
            _ => errors.push(format!(
                "[thermistor.{}] channel must be 0-{}",
                name,
                THERMISTOR_CHANNELS - 1
            )),
        }

        let table = match thermistor {
            toml::Value::Table(t) => t,
            _ => {
                errors.push(format!("[thermistor.{}] must be a table", name));
                continue;
            }
        };

        for key in ["a", "b", "c"] {
            match table.get(key) {
                Some(toml::Value::Float(v)) if v.is_finite() => {}
                Some(toml::Value::Integer(_)) => {}
                Some(_) => errors.push(format!("[thermistor.{}] {} must be a number", name, key)),
                None => errors.push(format!("[thermistor.{}] missing '{}'", name, key)),
            }
        }
        if let Some(enabled) = table.get("enabled") {
            if !enabled.is_bool() {
                errors.push(format!("[thermistor.{}] enabled must be true or false", name));
            }
        }
    }
}

fn number(value: Option<&toml::Value>) -> Option<f64> {
    match value? {
        toml::Value::Float(v) => Some(*v),
        toml::Value::Integer(v) => Some(*v as f64),
        _ => None,
    }
}

/// Write `board.rs` with the link settings and default calibration
fn generate_constants(config: &toml::Value, out_dir: &Path) {
    let baudrate = config["link"]["baudrate"].as_integer().unwrap();

    let axes = AXES
        .iter()
        .map(|axis| {
            let table = &config["axis"][*axis];
            format!(
                "    AxisCalibration {{ acceleration: {}, start_velocity: {}, home_velocity: {} }},",
                table["acceleration"], table["start_velocity"], table["home_velocity"]
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let thermistors = (0..THERMISTOR_CHANNELS)
        .map(|n| {
            let Some(table) = config.get("thermistor").and_then(|t| t.get(n.to_string())) else {
                return "    gantry_core::config::DEFAULT_THERMISTOR,".to_string();
            };
            format!(
                "    ThermistorCalibration {{ a: {:?}, b: {:?}, c: {:?}, enabled: {} }},",
                number(table.get("a")).unwrap() as f32,
                number(table.get("b")).unwrap() as f32,
                number(table.get("c")).unwrap() as f32,
                table.get("enabled").and_then(|e| e.as_bool()).unwrap_or(false)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let source = format!(
        "// Generated from gantry.toml by build.rs\n\
        \n\
        use gantry_core::config::{{AxisCalibration, Calibration, ThermistorCalibration}};\n\
        \n\
        pub const LINK_BAUDRATE: u32 = {baudrate};\n\
        \n\
        pub const DEFAULT_CALIBRATION: Calibration = Calibration {{\n\
        axes: [\n{axes}\n],\n\
        thermistors: [\n{thermistors}\n],\n\
        }};\n"
    );

    fs::write(out_dir.join("board.rs"), source).unwrap();
}
