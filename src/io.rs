// File-level I/O for map files.
//
// Maps are stored gzip-compressed on disk. `save_world()` and `load_world()`
// wrap the streaming `MapEncoder` / `MapDecoder` with buffered files, gzip
// framing and the backup policy. `MapPaths` derives the file names that
// belong to one map.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, CrcWriter};
use log::{debug, info, warn};

use crate::map::decoder::{self, LoadOptions, LoadReport, LoadedWorld, MapDecoder};
use crate::map::encoder::{BackupPolicy, EncodeStats, MapEncoder, SaveOptions};
use crate::map::{Collaborators, GameIdentity, MapError, Stage, at};
use crate::world::{Entity, World};

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Map paths
// ---------------------------------------------------------------------------

/// The files that belong to one map below a media directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapPaths {
    /// Map name relative to the media root, without extension (`map/foo`).
    pub name: String,
    /// Package directory holding the map config (`map` by default).
    pub pak: String,
    pub ogz: PathBuf,
    pub cfg: PathBuf,
    pub pic: PathBuf,
}

impl MapPaths {
    /// Resolve `name` (with or without `.ogz`) under `media_root`.
    ///
    /// Names without a separator live in `map/`. The config file sits in
    /// the package directory, the part of the name before its first
    /// separator.
    pub fn resolve(media_root: impl AsRef<Path>, name: &str) -> Self {
        let media_root = media_root.as_ref();
        let name = name.replace('\\', "/");
        let name = name.strip_suffix(".ogz").unwrap_or(&name);

        let (pak, cfg_name) = match name.split_once('/') {
            Some((pak, rest)) => (pak.to_string(), rest.to_string()),
            None => ("map".to_string(), name.to_string()),
        };
        let map_name = if name.contains('/') {
            name.to_string()
        } else {
            format!("map/{name}")
        };

        Self {
            ogz: media_root.join(format!("{map_name}.ogz")),
            cfg: media_root.join(&pak).join(format!("{cfg_name}.cfg")),
            pic: media_root.join(format!("{map_name}.jpg")),
            name: map_name,
            pak,
        }
    }

    /// Backup file name of the map under `policy`.
    pub fn backup(&self, policy: BackupPolicy, millis: u128) -> Option<PathBuf> {
        backup_path(&self.ogz, policy, millis)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `save_world()`.
#[derive(Debug, Clone)]
pub struct SaveStats {
    pub encode: EncodeStats,
    /// CRC-32 of the uncompressed stream, as a later load reports it.
    pub crc: u32,
    /// Uncompressed stream size in bytes.
    pub stream_size: u64,
    /// Size of the file on disk.
    pub file_size: u64,
    /// Where the previous file was moved, if anywhere.
    pub backup: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// save_world
// ---------------------------------------------------------------------------

/// Backup name for the map at `path`: `foo.BAK`, or `foo_<millis>.BAK`
/// when timestamped.
pub fn backup_path(path: &Path, policy: BackupPolicy, millis: u128) -> Option<PathBuf> {
    match policy {
        BackupPolicy::None => None,
        BackupPolicy::Single => Some(with_suffix(path, ".BAK")),
        BackupPolicy::Timestamped => Some(with_suffix(path, &format!("_{millis}.BAK"))),
    }
}

/// Move an existing map file out of the way according to `policy`.
///
/// Returns the backup path when a file was actually moved.
pub fn backup_existing(
    path: &Path,
    policy: BackupPolicy,
) -> std::io::Result<Option<PathBuf>> {
    let Some(bak) = backup_path(path, policy, now_millis()) else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    if bak.exists() {
        fs::remove_file(&bak)?;
    }
    fs::rename(path, &bak)?;
    debug!("backed up {} to {}", path.display(), bak.display());
    Ok(Some(bak))
}

/// `dir/foo.ogz` -> `dir/foo<suffix>`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}"))
}

/// Sibling file a save is written to before it replaces `path`.
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

struct Written {
    encode: EncodeStats,
    crc: u32,
    stream_size: u64,
}

fn write_compressed(
    file: File,
    world: &World,
    opts: &SaveOptions,
    ctx: Collaborators<'_>,
) -> Result<Written, MapError> {
    let gz = GzEncoder::new(
        BufWriter::with_capacity(BUF_SIZE, file),
        Compression::new(opts.compression_level.min(9)),
    );
    let mut encoder = MapEncoder::new(CrcWriter::new(gz), opts.bare, ctx);
    let encode = encoder.encode(world)?;

    let crc_writer = encoder.finish();
    let crc = crc_writer.crc().sum();
    let stream_size = u64::from(crc_writer.crc().amount());
    let mut out = crc_writer.into_inner().finish().map_err(at(Stage::Closed))?;
    out.flush().map_err(at(Stage::Closed))?;
    Ok(Written {
        encode,
        crc,
        stream_size,
    })
}

/// Save `world` to `path` as a gzip-compressed map.
///
/// The map is written to a staging file next to `path` and only moved into
/// place once the whole stream is out, so a failed save leaves the previous
/// file (and its backup) untouched. The CRC is computed on the uncompressed
/// bytes.
pub fn save_world(
    path: &Path,
    world: &World,
    opts: &SaveOptions,
    ctx: Collaborators<'_>,
) -> Result<SaveStats, MapError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(at(Stage::Idle))?;
    }
    let tmp = staging_path(path);
    let file = File::create(&tmp).map_err(|e| {
        warn!("could not write map to {}", path.display());
        MapError::new(Stage::Idle, e)
    })?;

    let written = match write_compressed(file, world, opts, ctx) {
        Ok(w) => w,
        Err(e) => {
            warn!("discarding incomplete map {}: {e}", tmp.display());
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };

    let backup = backup_existing(path, opts.backup).map_err(at(Stage::Closed))?;
    fs::rename(&tmp, path).map_err(at(Stage::Closed))?;
    let file_size = fs::metadata(path).map_err(at(Stage::Closed))?.len();

    info!("wrote map file {}", path.display());
    Ok(SaveStats {
        encode: written.encode,
        crc: written.crc,
        stream_size: written.stream_size,
        file_size,
        backup,
    })
}

// ---------------------------------------------------------------------------
// load_world
// ---------------------------------------------------------------------------

fn open_gz(path: &Path) -> Result<GzDecoder<BufReader<File>>, MapError> {
    let file = File::open(path).map_err(at(Stage::Idle))?;
    Ok(GzDecoder::new(BufReader::with_capacity(BUF_SIZE, file)))
}

/// Load a gzip-compressed map from `path`.
pub fn load_world(
    path: &Path,
    ctx: Collaborators<'_>,
    opts: &LoadOptions,
) -> Result<LoadedWorld, MapError> {
    let gz = open_gz(path)?;
    let loaded = MapDecoder::new(gz, opts.clone(), ctx).decode()?;
    info!("read map {}", path.display());
    Ok(loaded)
}

/// Load `path` into `world`, replacing it only when the load succeeds.
pub fn load_into(
    world: &mut World,
    path: &Path,
    ctx: Collaborators<'_>,
    opts: &LoadOptions,
) -> Result<LoadReport, MapError> {
    let loaded = load_world(path, ctx, opts)?;
    *world = loaded.world;
    Ok(loaded.report)
}

/// Read only the entities of the map at `path`, plus the CRC of its stream.
pub fn load_entities(
    path: &Path,
    game: &dyn GameIdentity,
) -> Result<(Vec<Entity>, u32), MapError> {
    decoder::read_entities(open_gz(path)?, game, crate::format::MAX_ENTS)
}

/// The uncompressed stream of the map at `path`.
pub fn read_stream(path: &Path) -> Result<Vec<u8>, MapError> {
    let mut data = Vec::new();
    open_gz(path)?
        .read_to_end(&mut data)
        .map_err(at(Stage::Idle))?;
    Ok(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
