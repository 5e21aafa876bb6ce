// VSlot table codec.
//
// Unchanged slots are run-length coded as a single negative count. A changed
// slot is written as its `changed` mask, a back-reference to its predecessor
// in the variant chain (-1 for none) and the overridden fields in bit order.
// Chains are stored backwards and relinked forwards once every slot exists.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};
use log::warn;

use super::error::{FormatError, Result};
use super::stream::{self, LE};
use crate::world::{ShaderParam, VSlot, VSlotFields};

/// Back-reference of every slot below `num_vslots`, derived by walking the
/// chain of each root slot. Links to slots at or past `num_vslots` are
/// stepped over.
pub fn back_references(vslots: &[VSlot], num_vslots: usize) -> Vec<i32> {
    let num = num_vslots.min(vslots.len());
    let mut prev = vec![-1i32; num];
    for root in 0..num {
        if !vslots[root].is_root() {
            continue;
        }
        let mut cur = root;
        // Each step moves to a new slot; the bound stops malformed cycles.
        for _ in 0..vslots.len() {
            let mut next = vslots[cur].next;
            while let Some(n) = next {
                if n < num {
                    break;
                }
                next = vslots.get(n).and_then(|vs| vs.next);
            }
            let Some(n) = next else { break };
            prev[n] = cur as i32;
            cur = n;
        }
    }
    prev
}

pub fn encode_vslot<W: Write>(w: &mut W, vs: &VSlot, prev: i32) -> io::Result<()> {
    let changed = vs.changed;
    w.write_i32::<LE>(changed.bits() as i32)?;
    w.write_i32::<LE>(prev)?;
    if changed.contains(VSlotFields::SHPARAM) {
        let count = u16::try_from(vs.params.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "too many shader params")
        })?;
        w.write_u16::<LE>(count)?;
        for p in &vs.params {
            stream::write_str16(w, &p.name)?;
            stream::write_f32s(w, &p.val)?;
        }
    }
    if changed.contains(VSlotFields::SCALE) {
        w.write_f32::<LE>(vs.scale)?;
    }
    if changed.contains(VSlotFields::ROTATION) {
        w.write_i32::<LE>(vs.rotation)?;
    }
    if changed.contains(VSlotFields::OFFSET) {
        w.write_i32::<LE>(vs.offset[0])?;
        w.write_i32::<LE>(vs.offset[1])?;
    }
    if changed.contains(VSlotFields::SCROLL) {
        stream::write_f32s(w, &vs.scroll)?;
    }
    if changed.contains(VSlotFields::LAYER) {
        w.write_i32::<LE>(vs.layer)?;
    }
    if changed.contains(VSlotFields::ALPHA) {
        stream::write_f32s(w, &[vs.alpha_front, vs.alpha_back])?;
    }
    if changed.contains(VSlotFields::COLOR) {
        stream::write_f32s(w, &vs.color_scale)?;
    }
    if changed.contains(VSlotFields::REFRACT) {
        w.write_f32::<LE>(vs.refract_scale)?;
        stream::write_f32s(w, &vs.refract_color)?;
    }
    if changed.contains(VSlotFields::DECAL) {
        w.write_i32::<LE>(vs.decal)?;
    }
    Ok(())
}

/// Encode the first `num_vslots` slots.
pub fn encode_vslots<W: Write>(w: &mut W, vslots: &[VSlot], num_vslots: usize) -> io::Result<()> {
    let num = num_vslots.min(vslots.len());
    if num == 0 {
        return Ok(());
    }
    let prev = back_references(vslots, num);
    let mut last_root = 0;
    for (i, vs) in vslots[..num].iter().enumerate() {
        if vs.is_root() {
            continue;
        }
        if last_root < i {
            w.write_i32::<LE>(-((i - last_root) as i32))?;
        }
        encode_vslot(w, vs, prev[i])?;
        last_root = i + 1;
    }
    if last_root < num {
        w.write_i32::<LE>(-((num - last_root) as i32))?;
    }
    Ok(())
}

/// Read the fields selected by `changed` into a fresh slot.
pub fn decode_vslot<R: Read>(r: &mut R, index: usize, changed: VSlotFields) -> Result<VSlot> {
    let mut vs = VSlot::new(index);
    vs.changed = changed;
    if changed.contains(VSlotFields::SHPARAM) {
        let count = r.read_u16::<LE>()?;
        for _ in 0..count {
            let name = stream::read_str16(r)?;
            let val = stream::read_f32_array::<_, 4>(r)?;
            vs.params.push(ShaderParam { name, val });
        }
    }
    if changed.contains(VSlotFields::SCALE) {
        vs.scale = r.read_f32::<LE>()?;
    }
    if changed.contains(VSlotFields::ROTATION) {
        vs.rotation = r.read_i32::<LE>()?;
    }
    if changed.contains(VSlotFields::OFFSET) {
        r.read_i32_into::<LE>(&mut vs.offset)?;
    }
    if changed.contains(VSlotFields::SCROLL) {
        vs.scroll = stream::read_f32_array(r)?;
    }
    if changed.contains(VSlotFields::LAYER) {
        vs.layer = r.read_i32::<LE>()?;
    }
    if changed.contains(VSlotFields::ALPHA) {
        vs.alpha_front = r.read_f32::<LE>()?;
        vs.alpha_back = r.read_f32::<LE>()?;
    }
    if changed.contains(VSlotFields::COLOR) {
        vs.color_scale = stream::read_f32_array(r)?;
    }
    if changed.contains(VSlotFields::REFRACT) {
        vs.refract_scale = r.read_f32::<LE>()?;
        vs.refract_color = stream::read_f32_array(r)?;
    }
    if changed.contains(VSlotFields::DECAL) {
        vs.decal = r.read_i32::<LE>()?;
    }
    Ok(vs)
}

#[derive(Debug, Default)]
pub struct DecodedVSlots {
    pub vslots: Vec<VSlot>,
    /// Back-references that pointed outside the table; their links are
    /// dropped.
    pub warnings: Vec<FormatError>,
}

/// Decode `num_vslots` slots and relink their chains.
pub fn decode_vslots<R: Read>(r: &mut R, num_vslots: usize) -> Result<DecodedVSlots> {
    let mut vslots: Vec<VSlot> = Vec::with_capacity(num_vslots.min(1 << 16));
    let mut prev: Vec<i32> = Vec::with_capacity(vslots.capacity());
    let mut remaining = num_vslots;

    while remaining > 0 {
        let changed = r.read_i32::<LE>()?;
        if changed < 0 {
            let run = changed.unsigned_abs() as usize;
            if run > remaining {
                return Err(FormatError::CorruptVSlots(format!(
                    "run of {run} unchanged slots at slot {} exceeds the {remaining} left",
                    vslots.len()
                )));
            }
            for _ in 0..run {
                vslots.push(VSlot::new(vslots.len()));
                prev.push(-1);
            }
            remaining -= run;
        } else {
            prev.push(r.read_i32::<LE>()?);
            let fields = VSlotFields::from_bits_retain(changed as u32);
            let vs = decode_vslot(r, vslots.len(), fields)?;
            vslots.push(vs);
            remaining -= 1;
        }
    }

    let mut warnings = Vec::new();
    for (i, &p) in prev.iter().enumerate() {
        if p == -1 {
            continue;
        }
        match usize::try_from(p).ok().filter(|&p| p < vslots.len()) {
            Some(p) => vslots[p].next = Some(i),
            None => {
                warn!("vslot {i} refers back to missing slot {p}, link dropped");
                warnings.push(FormatError::InvalidVSlotBackref { slot: i, prev: p });
            }
        }
    }
    Ok(DecodedVSlots { vslots, warnings })
}
