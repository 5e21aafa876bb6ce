// Texture-slot variants (VSlots).
//
// A VSlot overrides a subset of the parameters of its base texture slot.
// `changed` records which fields differ from the defaults; `next` links the
// variants that were derived from the same root slot into a forward chain.

use bitflags::bitflags;

bitflags! {
    /// Fields a VSlot overrides. Bit positions are part of the file format.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct VSlotFields: u32 {
        const SHPARAM  = 1 << 0;
        const SCALE    = 1 << 1;
        const ROTATION = 1 << 2;
        const OFFSET   = 1 << 3;
        const SCROLL   = 1 << 4;
        const LAYER    = 1 << 5;
        const ALPHA    = 1 << 6;
        const COLOR    = 1 << 7;
        // Bit 8 was used by a retired field and is never written.
        const REFRACT  = 1 << 9;
        const DECAL    = 1 << 10;
    }
}

/// A named shader uniform override.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParam {
    pub name: String,
    pub val: [f32; 4],
}

impl ShaderParam {
    pub fn new(name: impl Into<String>, val: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            val,
        }
    }
}

/// A texture application variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VSlot {
    pub index: usize,
    pub changed: VSlotFields,
    pub params: Vec<ShaderParam>,
    pub scale: f32,
    pub rotation: i32,
    pub offset: [i32; 2],
    pub scroll: [f32; 2],
    pub layer: i32,
    pub alpha_front: f32,
    pub alpha_back: f32,
    pub color_scale: [f32; 3],
    pub refract_scale: f32,
    pub refract_color: [f32; 3],
    pub decal: i32,
    /// Next variant derived from the same root slot.
    pub next: Option<usize>,
}

impl VSlot {
    /// A slot with every field at its default and no overrides.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            changed: VSlotFields::empty(),
            params: Vec::new(),
            scale: 1.0,
            rotation: 0,
            offset: [0, 0],
            scroll: [0.0, 0.0],
            layer: 0,
            alpha_front: 0.5,
            alpha_back: 0.0,
            color_scale: [1.0, 1.0, 1.0],
            refract_scale: 0.0,
            refract_color: [1.0, 1.0, 1.0],
            decal: 0,
            next: None,
        }
    }

    /// A root slot: one that overrides nothing and heads a variant chain.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self.changed |= VSlotFields::SCALE;
        self
    }

    pub fn with_rotation(mut self, rotation: i32) -> Self {
        self.rotation = rotation;
        self.changed |= VSlotFields::ROTATION;
        self
    }

    pub fn with_offset(mut self, offset: [i32; 2]) -> Self {
        self.offset = offset;
        self.changed |= VSlotFields::OFFSET;
        self
    }

    pub fn with_scroll(mut self, scroll: [f32; 2]) -> Self {
        self.scroll = scroll;
        self.changed |= VSlotFields::SCROLL;
        self
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self.changed |= VSlotFields::LAYER;
        self
    }

    pub fn with_alpha(mut self, front: f32, back: f32) -> Self {
        self.alpha_front = front;
        self.alpha_back = back;
        self.changed |= VSlotFields::ALPHA;
        self
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color_scale = color;
        self.changed |= VSlotFields::COLOR;
        self
    }

    pub fn with_refract(mut self, scale: f32, color: [f32; 3]) -> Self {
        self.refract_scale = scale;
        self.refract_color = color;
        self.changed |= VSlotFields::REFRACT;
        self
    }

    pub fn with_decal(mut self, decal: i32) -> Self {
        self.decal = decal;
        self.changed |= VSlotFields::DECAL;
        self
    }

    pub fn with_param(mut self, param: ShaderParam) -> Self {
        self.params.push(param);
        self.changed |= VSlotFields::SHPARAM;
        self
    }
}

/// Walk the chain starting at `start`, yielding indices in link order.
///
/// Stops if the chain leaves the table or revisits a slot.
pub fn chain(vslots: &[VSlot], start: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut cur = Some(start);
    while let Some(i) = cur {
        if i >= vslots.len() || out.contains(&i) {
            break;
        }
        out.push(i);
        cur = vslots[i].next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_reset() {
        let vs = VSlot::new(3);
        assert_eq!(vs.index, 3);
        assert!(vs.is_root());
        assert_eq!(vs.scale, 1.0);
        assert_eq!(vs.alpha_front, 0.5);
        assert_eq!(vs.color_scale, [1.0; 3]);
        assert_eq!(vs.refract_color, [1.0; 3]);
    }

    #[test]
    fn builders_set_changed_bits() {
        let vs = VSlot::new(0).with_scale(2.0).with_decal(4);
        assert_eq!(vs.changed, VSlotFields::SCALE | VSlotFields::DECAL);
        assert!(!vs.is_root());
    }

    #[test]
    fn field_bits_are_stable() {
        assert_eq!(VSlotFields::REFRACT.bits(), 0x200);
        assert_eq!(VSlotFields::DECAL.bits(), 0x400);
        assert_eq!(VSlotFields::all().bits() & 0x100, 0);
    }

    #[test]
    fn chain_stops_on_cycle() {
        let mut slots: Vec<_> = (0..3).map(VSlot::new).collect();
        slots[0].next = Some(2);
        slots[2].next = Some(0);
        assert_eq!(chain(&slots, 0), vec![0, 2]);
    }
}
