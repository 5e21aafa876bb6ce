// Command-line front end for octamap.
//
// `savemap` and `savecurrentmap` write a map into a media tree the way the
// engine's console commands do; `info`, `verify` and `recode` work on
// individual map files.

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::warn;

use crate::format::header::HEADER_SIZE;
use crate::format::{MAP_VERSION, MAX_ENTS, MIN_VERSION};
use crate::io::{self, MapPaths, SaveStats};
use crate::map::{
    BackupPolicy, Collaborators, LoadOptions, LoadedWorld, LogProgress, MapDecoder, MapEncoder,
    MapError, NamedGame, RawAuxBlocks, SaveOptions, read_identity,
};
use crate::world::{DEFAULT_GAME_IDENT, World};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_MEDIA_ROOT: &str = "media";
const DEFAULT_LEVEL: u32 = 9;
/// World size of a map created from scratch.
const DEFAULT_WORLD_SIZE: i32 = 1024;
/// Environment variable naming the current map for `savecurrentmap`.
const CURRENT_MAP_ENV: &str = "OCTAMAP_MAP";
const UNTITLED_MAP: &str = "untitled";

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Reader/writer for OCTA voxel map files.
#[derive(Parser, Debug)]
#[command(
    name = "octamap",
    version,
    about = "OCTA voxel map reader/writer",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Media directory that map names are resolved against.
    #[arg(long, global = true, value_hint = ValueHint::DirPath, default_value = DEFAULT_MEDIA_ROOT)]
    media: PathBuf,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Save a map under a name in the media tree.
    #[command(name = "savemap")]
    SaveMap(SaveMapArgs),
    /// Save the current map (named by $OCTAMAP_MAP) in place.
    #[command(name = "savecurrentmap")]
    SaveCurrentMap(SaveTuningArgs),
    /// Print header, counts and CRC of a map file.
    Info(FileArgs),
    /// Load and re-save a map in memory and compare the streams.
    Verify(FileArgs),
    /// Rewrite a map file with new save options.
    Recode(RecodeArgs),
    /// Print build/format configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackupArg {
    None,
    Single,
    Timestamped,
}

impl From<BackupArg> for BackupPolicy {
    fn from(b: BackupArg) -> Self {
        match b {
            BackupArg::None => BackupPolicy::None,
            BackupArg::Single => BackupPolicy::Single,
            BackupArg::Timestamped => BackupPolicy::Timestamped,
        }
    }
}

#[derive(Args, Debug)]
struct SaveTuningArgs {
    /// Omit editor-only data (merges, surfaces, PVS).
    #[arg(long)]
    bare: bool,

    /// What happens to an existing map file.
    #[arg(long, value_enum, default_value_t = BackupArg::Timestamped)]
    backup: BackupArg,

    /// Gzip compression level (0-9).
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=9), default_value_t = DEFAULT_LEVEL)]
    level: u32,
}

#[derive(Args, Debug)]
struct SaveMapArgs {
    /// Map name, e.g. `complex` or `custom/dm1`.
    name: String,

    /// Map file to take the world from (default: the existing map).
    #[arg(long, value_hint = ValueHint::FilePath)]
    from: Option<PathBuf>,

    #[command(flatten)]
    tuning: SaveTuningArgs,
}

#[derive(Args, Debug)]
struct FileArgs {
    /// Map file (.ogz).
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct RecodeArgs {
    /// Input map file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output map file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    #[command(flatten)]
    tuning: SaveTuningArgs,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    SaveMap,
    SaveCurrentMap,
    Info,
    Verify,
    Recode,
    Config,
}

struct Options {
    command: Command,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    media_root: PathBuf,
    map_name: Option<String>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    save: SaveOptions,
}

fn save_options(t: &SaveTuningArgs) -> SaveOptions {
    SaveOptions {
        bare: t.bare,
        backup: t.backup.into(),
        compression_level: t.level,
    }
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        media_root: cli.media,
        map_name: None,
        input_file: None,
        output_file: None,
        save: SaveOptions::default(),
    };

    match cli.command {
        Cmd::SaveMap(args) => {
            opts.command = Command::SaveMap;
            opts.save = save_options(&args.tuning);
            opts.map_name = Some(args.name);
            opts.input_file = args.from;
        }
        Cmd::SaveCurrentMap(tuning) => {
            opts.command = Command::SaveCurrentMap;
            opts.save = save_options(&tuning);
        }
        Cmd::Info(args) => {
            opts.command = Command::Info;
            opts.input_file = Some(args.input);
        }
        Cmd::Verify(args) => {
            opts.command = Command::Verify;
            opts.input_file = Some(args.input);
        }
        Cmd::Recode(args) => {
            opts.command = Command::Recode;
            opts.save = save_options(&args.tuning);
            opts.input_file = Some(args.input);
            opts.output_file = Some(args.output);
        }
        Cmd::Config => {}
    }
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("octamap".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn current_map_name() -> String {
    std::env::var(CURRENT_MAP_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNTITLED_MAP.to_string())
}

// ---------------------------------------------------------------------------
// Loading a file as it was written
// ---------------------------------------------------------------------------

/// A map loaded under the game identity that wrote it, with its optional
/// blocks kept opaque so it can be saved back unchanged.
struct LoadedFile {
    stream: Vec<u8>,
    loaded: LoadedWorld,
    game: NamedGame,
    aux: RawAuxBlocks,
}

fn load_file(path: &Path) -> Result<LoadedFile, MapError> {
    let stream = io::read_stream(path)?;
    let (_, block) = read_identity(&stream[..])?;
    let game = NamedGame::new(block.ident, usize::from(block.extra_entity_size));
    let mut aux = RawAuxBlocks::default();
    let mut progress = LogProgress;
    let loaded = MapDecoder::new(
        &stream[..],
        LoadOptions::default(),
        Collaborators::new(&game, &mut aux, &mut progress),
    )
    .decode()?;
    Ok(LoadedFile {
        stream,
        loaded,
        game,
        aux,
    })
}

fn encode_to_vec(
    world: &World,
    game: &NamedGame,
    aux: &mut RawAuxBlocks,
) -> Result<Vec<u8>, MapError> {
    let mut progress = LogProgress;
    let mut enc = MapEncoder::new(
        Vec::new(),
        false,
        Collaborators::new(game, aux, &mut progress),
    );
    enc.encode(world)?;
    Ok(enc.finish())
}

fn report_save(opts: &Options, label: &str, path: &Path, stats: &SaveStats) {
    if opts.json_output {
        let json = serde_json::json!({
            "map": label,
            "path": path.display().to_string(),
            "entities": stats.encode.num_ents,
            "vars": stats.encode.num_vars,
            "vslots": stats.encode.num_vslots,
            "octree_groups": stats.encode.octree_groups,
            "stream_size": stats.stream_size,
            "file_size": stats.file_size,
            "crc": stats.crc,
            "backup": stats.backup.as_ref().map(|p| p.display().to_string()),
        });
        eprintln!("{json}");
    } else if !opts.quiet {
        eprintln!("octamap: wrote map file {}", path.display());
        if let Some(bak) = &stats.backup {
            eprintln!("octamap: previous map moved to {}", bak.display());
        }
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config(opts: &Options) -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("octamap version {version}");
    eprintln!("MAP_VERSION={MAP_VERSION}");
    eprintln!("MIN_VERSION={MIN_VERSION}");
    eprintln!("HEADER_SIZE={HEADER_SIZE}");
    eprintln!("MAX_ENTS={MAX_ENTS}");
    eprintln!("GAME_IDENT={DEFAULT_GAME_IDENT}");
    eprintln!("DEFAULT_LEVEL={DEFAULT_LEVEL}");
    eprintln!("MEDIA_ROOT={}", opts.media_root.display());

    let paths = MapPaths::resolve(&opts.media_root, &current_map_name());
    eprintln!("CURRENT_MAP={}", paths.name);
    eprintln!("MAP_FILE={}", paths.ogz.display());
    eprintln!("MAP_CONFIG={}", paths.cfg.display());
    eprintln!("MAP_SHOT={}", paths.pic.display());
    0
}

// ---------------------------------------------------------------------------
// Save commands
// ---------------------------------------------------------------------------

fn cmd_save(opts: &Options) -> i32 {
    let name = opts.map_name.clone().unwrap_or_else(current_map_name);
    let paths = MapPaths::resolve(&opts.media_root, &name);

    let source = opts
        .input_file
        .clone()
        .or_else(|| paths.ogz.exists().then(|| paths.ogz.clone()));
    let (world, game, mut aux) = match source {
        Some(path) => match load_file(&path) {
            Ok(file) => {
                if file.loaded.report.failed {
                    warn!("{} is damaged; saving what could be read", path.display());
                }
                (file.loaded.world, file.game, file.aux)
            }
            Err(e) => {
                eprintln!("octamap: {}: {e}", path.display());
                return 1;
            }
        },
        None => (
            World::new(DEFAULT_WORLD_SIZE),
            NamedGame::new(DEFAULT_GAME_IDENT, 0),
            RawAuxBlocks::default(),
        ),
    };

    let mut progress = LogProgress;
    match io::save_world(
        &paths.ogz,
        &world,
        &opts.save,
        Collaborators::new(&game, &mut aux, &mut progress),
    ) {
        Ok(stats) => {
            report_save(opts, &paths.name, &paths.ogz, &stats);
            0
        }
        Err(e) => {
            eprintln!("octamap: could not write map to {}: {e}", paths.ogz.display());
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options) -> i32 {
    let Some(path) = &opts.input_file else {
        eprintln!("octamap: info requires an input file");
        return 1;
    };
    let file = match load_file(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("octamap: {}: {e}", path.display());
            return 1;
        }
    };
    let report = &file.loaded.report;
    let c = &report.counts;

    if opts.json_output {
        let json = serde_json::json!({
            "path": path.display().to_string(),
            "version": report.map_version,
            "world_size": report.map_size,
            "map_scale": report.map_scale,
            "game": report.game_ident,
            "entities": c.entities,
            "dropped_entities": c.dropped_entities,
            "skipped_entities": c.skipped_entities,
            "vars": c.vars,
            "vslots": c.vslots,
            "nodes": c.nodes,
            "view_cells": file.aux.view_cells,
            "blend_map": file.aux.blend_map,
            "stream_size": file.stream.len(),
            "crc": report.crc,
            "failed": report.failed,
            "warnings": report.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
        });
        eprintln!("{json}");
    } else if !opts.quiet {
        println!("map:        {}", path.display());
        println!("version:    {}", report.map_version);
        println!("world size: {} (scale {})", report.map_size, report.map_scale);
        println!("game:       {}", report.game_ident);
        println!(
            "entities:   {} (dropped {}, skipped {})",
            c.entities, c.dropped_entities, c.skipped_entities
        );
        println!("vars:       {}", c.vars);
        println!("vslots:     {}", c.vslots);
        println!("nodes:      {}", c.nodes);
        println!("pvs cells:  {}", file.aux.view_cells);
        println!("blend map:  {}", file.aux.blend_map);
        println!("stream:     {} bytes, crc {:08x}", file.stream.len(), report.crc);
        for w in &report.warnings {
            println!("warning:    {w}");
        }
        println!("status:     {}", if report.failed { "damaged" } else { "ok" });
    }

    i32::from(report.failed)
}

// ---------------------------------------------------------------------------
// Verify command
// ---------------------------------------------------------------------------

/// Offset of the first byte where `a` and `b` differ.
fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len())))
}

fn cmd_verify(opts: &Options) -> i32 {
    let Some(path) = &opts.input_file else {
        eprintln!("octamap: verify requires an input file");
        return 1;
    };
    let mut file = match load_file(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("octamap: {}: {e}", path.display());
            return 1;
        }
    };
    if file.loaded.report.failed {
        eprintln!("octamap: {}: octree is damaged", path.display());
        return 1;
    }

    let first = match encode_to_vec(&file.loaded.world, &file.game, &mut file.aux) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("octamap: re-encode failed: {e}");
            return 1;
        }
    };
    let identical = first == file.stream;

    // A second generation must reproduce the first exactly.
    let stable = identical || {
        let mut aux = RawAuxBlocks::default();
        let mut progress = LogProgress;
        let mut dec = MapDecoder::new(
            &first[..],
            LoadOptions::default(),
            Collaborators::new(&file.game, &mut aux, &mut progress),
        );
        let again = dec.decode();
        drop(dec);
        again
            .and_then(|again| encode_to_vec(&again.world, &file.game, &mut aux))
            .is_ok_and(|second| second == first)
    };
    let diff = first_difference(&file.stream, &first);

    if opts.json_output {
        let json = serde_json::json!({
            "path": path.display().to_string(),
            "identical": identical,
            "stable": stable,
            "first_difference": diff,
            "original_size": file.stream.len(),
            "reencoded_size": first.len(),
        });
        eprintln!("{json}");
    } else if !opts.quiet {
        match (identical, diff) {
            (true, _) => eprintln!("octamap: {}: re-encoded stream is identical", path.display()),
            (false, Some(off)) => eprintln!(
                "octamap: {}: re-encoded stream differs at byte {off} ({})",
                path.display(),
                if stable { "stable after one pass" } else { "unstable" }
            ),
            (false, None) => {}
        }
    }

    if stable { 0 } else { 1 }
}

// ---------------------------------------------------------------------------
// Recode command
// ---------------------------------------------------------------------------

fn cmd_recode(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        eprintln!("octamap: recode requires an input and an output file");
        return 1;
    };
    let mut file = match load_file(input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("octamap: {}: {e}", input.display());
            return 1;
        }
    };
    if file.loaded.report.failed {
        warn!("{} is damaged; recoding what could be read", input.display());
    }

    let mut progress = LogProgress;
    match io::save_world(
        output,
        &file.loaded.world,
        &opts.save,
        Collaborators::new(&file.game, &mut file.aux, &mut progress),
    ) {
        Ok(stats) => {
            report_save(opts, &input.display().to_string(), output, &stats);
            0
        }
        Err(e) => {
            eprintln!("octamap: {}: {e}", output.display());
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_filter = match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::SaveMap | Command::SaveCurrentMap => cmd_save(&opts),
        Command::Info => cmd_info(&opts),
        Command::Verify => cmd_verify(&opts),
        Command::Recode => cmd_recode(&opts),
        Command::Config => cmd_config(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("octamap".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn savemap_maps_correctly() {
        let opts = parse_opts(&[
            "savemap",
            "custom/dm1",
            "--from",
            "old.ogz",
            "--bare",
            "--backup",
            "single",
            "--level",
            "3",
        ]);
        assert_eq!(opts.command, Command::SaveMap);
        assert_eq!(opts.map_name.as_deref(), Some("custom/dm1"));
        assert_eq!(opts.input_file, Some(PathBuf::from("old.ogz")));
        assert!(opts.save.bare);
        assert_eq!(opts.save.backup, BackupPolicy::Single);
        assert_eq!(opts.save.compression_level, 3);
    }

    #[test]
    fn save_defaults() {
        let opts = parse_opts(&["savecurrentmap"]);
        assert_eq!(opts.command, Command::SaveCurrentMap);
        assert!(opts.map_name.is_none());
        assert!(!opts.save.bare);
        assert_eq!(opts.save.backup, BackupPolicy::Timestamped);
        assert_eq!(opts.save.compression_level, 9);
        assert_eq!(opts.media_root, PathBuf::from("media"));
    }

    #[test]
    fn level_is_range_checked() {
        let argv = ["octamap", "savemap", "x", "--level", "12"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn file_commands_map() {
        let info = parse_opts(&["info", "a.ogz"]);
        assert_eq!(info.command, Command::Info);
        assert_eq!(info.input_file, Some(PathBuf::from("a.ogz")));
        assert_eq!(parse_opts(&["verify", "a.ogz"]).command, Command::Verify);

        let recode = parse_opts(&["--media", "m", "recode", "a.ogz", "b.ogz", "--bare"]);
        assert_eq!(recode.command, Command::Recode);
        assert_eq!(recode.output_file, Some(PathBuf::from("b.ogz")));
        assert_eq!(recode.media_root, PathBuf::from("m"));
        assert!(recode.save.bare);
    }

    #[test]
    fn global_flags() {
        let opts = parse_opts(&["--json", "-v", "-v", "-v", "config"]);
        assert_eq!(opts.command, Command::Config);
        assert!(opts.json_output);
        assert_eq!(opts.verbose, 2);
        assert!(parse_opts(&["-q", "config"]).quiet);
    }

    #[test]
    fn difference_offsets() {
        assert_eq!(first_difference(b"abc", b"abc"), None);
        assert_eq!(first_difference(b"abc", b"abd"), Some(2));
        assert_eq!(first_difference(b"ab", b"abc"), Some(2));
    }

    #[test]
    fn arbitrary_args_do_not_panic() {
        fuzz_try_parse_args(&["savemap".into()]);
        fuzz_try_parse_args(&["--bogus".into(), "x".into()]);
    }
}
