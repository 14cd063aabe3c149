use crate::compass::{self, LatLon};
use crate::model::{ArrayConfig, ArrayPatch, ConfigEvent, PlantPatch, PvPlant, Settings};
use crate::registry::{PlantRegistry, RegistryError};
use crate::storage;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// A line of command output and the stream it belongs on.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

type OutputTx = mpsc::UnboundedSender<OutputLine>;

/// Start the task that owns stdout and stderr for the lifetime of a command.
///
/// Handlers only send lines; the task exits once every sender is dropped.
fn spawn_output_writer() -> (OutputTx, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "pvcast-config",
    version,
    about = "Edit and validate the pvcast PV plant configuration"
)]
pub struct Cli {
    /// Path to the plant configuration YAML file
    #[arg(long, global = true, env = "PVCAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Host serving the pvcast API docs
    #[arg(long, global = true, env = "SERVER_NAME", default_value = crate::docs::DEFAULT_HOST)]
    pub docs_host: String,

    /// Port serving the pvcast API docs
    #[arg(long, global = true, env = "SERVER_PORT", default_value_t = crate::docs::DEFAULT_PORT)]
    pub docs_port: u16,

    /// Timeout for the API docs probe
    #[arg(long, global = true, default_value = "2s")]
    pub docs_timeout: humantime::Duration,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create an empty configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show all configured plants and arrays, or a single plant
    Show {
        /// Only show this plant
        plant: Option<String>,
    },
    /// Validate the configuration file
    Validate {
        /// Treat warnings (missing inverter, module, arrays) as failures
        #[arg(long)]
        strict: bool,
    },
    /// Add, edit or remove plants
    #[command(subcommand)]
    Plant(PlantCommand),
    /// Add, edit or remove arrays of a plant
    #[command(subcommand)]
    Array(ArrayCommand),
    /// Compute a compass pointer end point or estimate an azimuth
    Compass(CompassArgs),
    /// Check whether the pvcast API docs are reachable
    Docs,
    /// Print the effective settings
    Settings,
}

#[derive(Debug, Subcommand, Clone)]
pub enum PlantCommand {
    /// Add a new plant
    Add {
        name: String,
        #[arg(long)]
        inverter: Option<String>,
        #[arg(long)]
        microinverter: bool,
    },
    /// Edit an existing plant
    Edit {
        name: String,
        /// New plant name
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        inverter: Option<String>,
        /// Use --microinverter true or --microinverter false
        #[arg(long, action = clap::ArgAction::Set)]
        microinverter: Option<bool>,
    },
    /// Remove a plant and all its arrays
    Remove { name: String },
}

#[derive(Debug, Args, Clone, Default)]
pub struct ArrayFields {
    /// Tilt from horizontal in degrees (0-90)
    #[arg(long)]
    pub tilt: Option<f64>,
    /// Azimuth clockwise from north in degrees (0-360)
    #[arg(long)]
    pub azimuth: Option<f64>,
    #[arg(long)]
    pub modules_per_string: Option<u32>,
    #[arg(long)]
    pub strings: Option<u32>,
    /// Module type identifier
    #[arg(long)]
    pub module: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ArrayCommand {
    /// Add an array to a plant; a name is generated when omitted
    Add {
        plant: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ArrayFields,
    },
    /// Edit an array of a plant
    Edit {
        plant: String,
        array: String,
        /// New array name; an empty string regenerates one
        #[arg(long)]
        rename: Option<String>,
        #[command(flatten)]
        fields: ArrayFields,
    },
    /// Remove an array from a plant
    Remove { plant: String, array: String },
}

#[derive(Debug, Args, Clone)]
pub struct CompassArgs {
    /// Latitude of the map centre
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,
    /// Longitude of the map centre
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,
    /// Panel azimuth to draw the pointer for
    #[arg(
        long,
        allow_negative_numbers = true,
        conflicts_with_all = ["to_lat", "to_lon"],
        required_unless_present_all = ["to_lat", "to_lon"]
    )]
    pub azimuth: Option<f64>,
    /// Pointer length in metres
    #[arg(long, default_value_t = compass::DEFAULT_POINTER_LENGTH_M)]
    pub length_m: f64,
    /// Latitude of the point the panel faces (azimuth estimation)
    #[arg(long, allow_negative_numbers = true, requires = "to_lon")]
    pub to_lat: Option<f64>,
    /// Longitude of the point the panel faces (azimuth estimation)
    #[arg(long, allow_negative_numbers = true, requires = "to_lat")]
    pub to_lon: Option<f64>,
}

/// Build `Settings` from CLI arguments.
pub fn build_settings(args: &Cli) -> Settings {
    Settings {
        config_path: args
            .config
            .clone()
            .unwrap_or_else(storage::default_config_path),
        json: args.json,
        log_level: args.log_level.clone(),
        docs_host: args.docs_host.clone(),
        docs_port: args.docs_port,
        docs_timeout: Duration::from(args.docs_timeout),
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let settings = build_settings(&args);
    let (out_tx, out_handle) = spawn_output_writer();

    let res = dispatch(args.command, &settings, &out_tx).await;

    drop(out_tx);
    let _ = out_handle.await;
    res
}

async fn dispatch(command: Command, settings: &Settings, out: &OutputTx) -> Result<()> {
    match command {
        Command::Init { force } => run_init(settings, force, out),
        Command::Show { plant } => run_show(settings, plant.as_deref(), out),
        Command::Validate { strict } => run_validate(settings, strict, out),
        Command::Plant(cmd) => run_plant(settings, cmd, out),
        Command::Array(cmd) => run_array(settings, cmd, out),
        Command::Compass(c) => run_compass(settings, &c, out),
        Command::Docs => run_docs(settings, out).await,
        Command::Settings => {
            let _ = out.send(OutputLine::Stdout(serde_json::to_string_pretty(settings)?));
            Ok(())
        }
    }
}

fn load_registry(settings: &Settings) -> Result<PlantRegistry> {
    storage::load(&settings.config_path)
        .with_context(|| format!("failed to load {}", settings.config_path.display()))
}

fn emit_event(settings: &Settings, out: &OutputTx, event: &ConfigEvent) -> Result<()> {
    let line = if settings.json {
        serde_json::to_string(event)?
    } else {
        event.to_message()
    };
    let _ = out.send(OutputLine::Stdout(line));
    Ok(())
}

/// Load, apply one registry mutation, and save back.
fn mutate<F>(settings: &Settings, out: &OutputTx, apply: F) -> Result<()>
where
    F: FnOnce(&mut PlantRegistry) -> Result<ConfigEvent, RegistryError>,
{
    let mut registry = load_registry(settings)?;
    let event = apply(&mut registry)?;
    let path = storage::save(&settings.config_path, &registry)
        .with_context(|| format!("failed to save {}", settings.config_path.display()))?;
    emit_event(settings, out, &event)?;
    if !settings.json {
        let _ = out.send(OutputLine::Stderr(ConfigEvent::Saved { path }.to_message()));
    }
    Ok(())
}

fn run_init(settings: &Settings, force: bool, out: &OutputTx) -> Result<()> {
    let path = &settings.config_path;
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; use --force to overwrite it",
            path.display()
        );
    }
    let saved = storage::save(path, &PlantRegistry::new())
        .with_context(|| format!("failed to write {}", path.display()))?;
    emit_event(settings, out, &ConfigEvent::Saved { path: saved })
}

fn run_show(settings: &Settings, plant: Option<&str>, out: &OutputTx) -> Result<()> {
    let registry = load_registry(settings)?;
    let lines = match plant {
        None if settings.json => {
            vec![serde_json::to_string_pretty(&registry.to_document())?]
        }
        None => crate::text_summary::build_text_summary(&registry).lines,
        Some(name) => {
            let Some(found) = registry.get(name) else {
                let known: Vec<&str> = registry.names().collect();
                let known = if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                };
                anyhow::bail!("no plant named '{name}' (configured: {known})");
            };
            if settings.json {
                vec![serde_json::to_string_pretty(found)?]
            } else {
                crate::text_summary::build_plant_summary(found).lines
            }
        }
    };
    for line in lines {
        let _ = out.send(OutputLine::Stdout(line));
    }
    Ok(())
}

fn run_validate(settings: &Settings, strict: bool, out: &OutputTx) -> Result<()> {
    // Skips the registry build so blank and duplicate plant names are listed like any other issue.
    let text = match std::fs::read_to_string(&settings.config_path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read {}", settings.config_path.display()))
        }
    };
    let report = storage::validate_yaml_str(&text).context("configuration could not be parsed")?;

    if settings.json {
        let _ = out.send(OutputLine::Stdout(serde_json::to_string_pretty(&report)?));
    } else {
        for line in crate::text_summary::build_validation_summary(&report, strict).lines {
            let _ = out.send(OutputLine::Stdout(line));
        }
    }

    let ok = if strict {
        report.is_valid_strict()
    } else {
        report.is_valid()
    };
    if !ok {
        anyhow::bail!("configuration is invalid");
    }
    Ok(())
}

fn run_plant(settings: &Settings, cmd: PlantCommand, out: &OutputTx) -> Result<()> {
    match cmd {
        PlantCommand::Add {
            name,
            inverter,
            microinverter,
        } => mutate(settings, out, |reg| {
            reg.add_plant(PvPlant {
                inverter: inverter.unwrap_or_default(),
                microinverter,
                ..PvPlant::new(name)
            })
        }),
        PlantCommand::Edit {
            name,
            rename,
            inverter,
            microinverter,
        } => {
            let patch = PlantPatch {
                name: rename,
                inverter,
                microinverter,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to change; pass at least one field to edit");
            }
            mutate(settings, out, |reg| reg.edit_plant(&name, patch))
        }
        PlantCommand::Remove { name } => mutate(settings, out, |reg| reg.remove_plant(&name)),
    }
}

fn run_array(settings: &Settings, cmd: ArrayCommand, out: &OutputTx) -> Result<()> {
    match cmd {
        ArrayCommand::Add {
            plant,
            name,
            fields,
        } => {
            let defaults = ArrayConfig::default();
            let array = ArrayConfig {
                tilt: fields.tilt.unwrap_or(defaults.tilt),
                azimuth: fields.azimuth.unwrap_or(defaults.azimuth),
                modules_per_string: fields
                    .modules_per_string
                    .unwrap_or(defaults.modules_per_string),
                strings: fields.strings.unwrap_or(defaults.strings),
                module: fields.module.unwrap_or_default(),
                ..ArrayConfig::named(name.unwrap_or_default())
            };
            mutate(settings, out, |reg| reg.add_array(&plant, array))
        }
        ArrayCommand::Edit {
            plant,
            array,
            rename,
            fields,
        } => {
            let patch = ArrayPatch {
                name: rename,
                tilt: fields.tilt,
                azimuth: fields.azimuth,
                modules_per_string: fields.modules_per_string,
                strings: fields.strings,
                module: fields.module,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to change; pass at least one field to edit");
            }
            mutate(settings, out, |reg| reg.edit_array(&plant, &array, patch))
        }
        ArrayCommand::Remove { plant, array } => {
            mutate(settings, out, |reg| reg.remove_array(&plant, &array))
        }
    }
}

fn run_compass(settings: &Settings, args: &CompassArgs, out: &OutputTx) -> Result<()> {
    let center = LatLon::new(args.lat, args.lon).context("invalid map centre")?;

    if let (Some(to_lat), Some(to_lon)) = (args.to_lat, args.to_lon) {
        let target = LatLon::new(to_lat, to_lon).context("invalid target point")?;
        let azimuth = compass::azimuth_between(center, target);
        let line = if settings.json {
            serde_json::to_string_pretty(&serde_json::json!({
                "from": center,
                "to": target,
                "azimuth": azimuth,
                "distance_m": compass::distance_m(center, target),
            }))?
        } else {
            format!("Estimated azimuth: {:.1}", azimuth)
        };
        let _ = out.send(OutputLine::Stdout(line));
        return Ok(());
    }

    let azimuth = args
        .azimuth
        .context("either --azimuth or --to-lat/--to-lon is required")?;
    let end = compass::pointer_end(center, azimuth, args.length_m)?;
    let line = if settings.json {
        serde_json::to_string_pretty(&compass::pointer_line_geojson(center, end, azimuth))?
    } else {
        format!(
            "Pointer from {:.6}, {:.6} at {:.1} deg ends at {:.6}, {:.6}",
            center.lat,
            center.lon,
            compass::normalize_azimuth(azimuth),
            end.lat,
            end.lon
        )
    };
    let _ = out.send(OutputLine::Stdout(line));
    Ok(())
}

#[cfg(feature = "docs")]
async fn run_docs(settings: &Settings, out: &OutputTx) -> Result<()> {
    let url = crate::docs::docs_url(&settings.docs_host, settings.docs_port);
    let probe = crate::docs::probe(&url, settings.docs_timeout).await?;
    let line = if settings.json {
        serde_json::to_string_pretty(&probe)?
    } else {
        probe.to_message()
    };
    let _ = out.send(OutputLine::Stdout(line));
    if probe.result != crate::docs::DocsStatus::Available {
        anyhow::bail!("API docs unavailable");
    }
    Ok(())
}

#[cfg(not(feature = "docs"))]
async fn run_docs(_settings: &Settings, _out: &OutputTx) -> Result<()> {
    anyhow::bail!("this build does not include the API docs probe (enable the `docs` feature)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_resolve_defaults() {
        let cli =
            Cli::try_parse_from(["pvcast-config", "--config", "/tmp/x.yaml", "show"]).unwrap();
        let s = build_settings(&cli);
        assert_eq!(s.config_path, PathBuf::from("/tmp/x.yaml"));
        assert_eq!(s.docs_timeout, Duration::from_secs(2));
        assert!(!s.json);
    }

    #[test]
    fn compass_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "pvcast-config",
            "compass",
            "--lat",
            "-33.9",
            "--lon",
            "-70.6",
            "--azimuth",
            "0",
        ])
        .unwrap();
        match cli.command {
            Command::Compass(c) => {
                assert_eq!(c.lat, -33.9);
                assert_eq!(c.lon, -70.6);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn compass_requires_azimuth_or_target() {
        let missing = Cli::try_parse_from(["pvcast-config", "compass", "--lat", "1", "--lon", "2"]);
        assert!(missing.is_err());
        assert!(Cli::try_parse_from([
            "pvcast-config",
            "compass",
            "--lat",
            "1",
            "--lon",
            "2",
            "--azimuth",
            "10",
            "--to-lat",
            "1",
            "--to-lon",
            "3",
        ])
        .is_err());
    }

    #[test]
    fn show_takes_optional_plant() {
        let cli = Cli::try_parse_from(["pvcast-config", "show", "EastWest"]).unwrap();
        match cli.command {
            Command::Show { plant } => assert_eq!(plant.as_deref(), Some("EastWest")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn microinverter_flag_takes_explicit_value() {
        let cli = Cli::try_parse_from([
            "pvcast-config",
            "plant",
            "edit",
            "Roof",
            "--microinverter",
            "false",
        ])
        .unwrap();
        match cli.command {
            Command::Plant(PlantCommand::Edit { microinverter, .. }) => {
                assert_eq!(microinverter, Some(false))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
