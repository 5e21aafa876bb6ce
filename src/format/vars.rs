// Map variable overrides.
//
// Each record is a type byte, a u16-prefixed name and a value whose layout
// depends on the type. A record of unknown type carries no value: it is
// skipped after its name, with a warning, and the block goes on.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};
use log::{debug, warn};

use super::error::{FormatError, Result};
use super::stream::{self, LE};
use crate::world::{MapVar, VarValue};

pub const VAR_INT: u8 = 0;
pub const VAR_FLOAT: u8 = 1;
pub const VAR_STR: u8 = 2;

pub fn encode_var<W: Write>(w: &mut W, var: &MapVar) -> io::Result<()> {
    w.write_u8(var.value.type_tag())?;
    stream::write_str16(w, &var.name)?;
    match &var.value {
        VarValue::Int(v) => {
            debug!("wrote var {}: {v}", var.name);
            w.write_i32::<LE>(*v)
        }
        VarValue::Float(v) => {
            debug!("wrote fvar {}: {v}", var.name);
            w.write_f32::<LE>(*v)
        }
        VarValue::Str(v) => {
            debug!("wrote svar {}: {v}", var.name);
            stream::write_str16(w, v)
        }
    }
}

pub fn encode_vars<W: Write>(w: &mut W, vars: &[MapVar]) -> io::Result<()> {
    for var in vars {
        encode_var(w, var)?;
    }
    debug!("wrote {} vars", vars.len());
    Ok(())
}

/// A decoded variable block and the records that were skipped.
#[derive(Debug, Default)]
pub struct DecodedVars {
    pub vars: Vec<MapVar>,
    pub warnings: Vec<FormatError>,
}

/// Decode record `index` of the block.
///
/// An unknown type yields `Ok(Err(..))` once the type byte and name have
/// been consumed, leaving the reader at the next record.
pub fn decode_var<R: Read>(
    r: &mut R,
    index: usize,
) -> Result<std::result::Result<MapVar, FormatError>> {
    let ty = r.read_u8()?;
    let name = stream::read_str16(r)?;
    let value = match ty {
        VAR_INT => VarValue::Int(r.read_i32::<LE>()?),
        VAR_FLOAT => VarValue::Float(r.read_f32::<LE>()?),
        VAR_STR => VarValue::Str(stream::read_str16(r)?),
        _ => {
            warn!("unknown variable type {ty} for {name}, skipping");
            return Ok(Err(FormatError::InvalidVariableType { index, ty }));
        }
    };
    debug!("read var {name}: {value:?}");
    Ok(Ok(MapVar { name, value }))
}

pub fn decode_vars<R: Read>(r: &mut R, count: usize) -> Result<DecodedVars> {
    let mut out = DecodedVars {
        vars: Vec::with_capacity(count.min(1024)),
        warnings: Vec::new(),
    };
    for i in 0..count {
        match decode_var(r, i)? {
            Ok(var) => out.vars.push(var),
            Err(skipped) => out.warnings.push(skipped),
        }
    }
    debug!("read {} of {count} vars", out.vars.len());
    Ok(out)
}

/// Consume `count` records without keeping them.
pub fn skip_vars<R: Read>(r: &mut R, count: usize) -> Result<()> {
    for i in 0..count {
        let _ = decode_var(r, i)?;
    }
    Ok(())
}
