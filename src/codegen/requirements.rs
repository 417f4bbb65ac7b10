use std::collections::BTreeSet;

use serde::Serialize;

use crate::nodes::PrecisionHint;

pub const COMPONENTS_PER_INTERPOLATOR: u32 = 4;

/// Cross-stage facts collected during one generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requirements {
    /// Number of declared interpolator slots.
    pub interpolator_count: u32,
    pub vertex_precision_hint: PrecisionHint,
    pub fragment_precision_hint: PrecisionHint,
    pub local_size: [u32; 3],
    pub use_target_size: bool,
    pub extensions: BTreeSet<String>,
    #[serde(skip)]
    slot_usage: Vec<u32>,
    /// Parallel to `slot_usage`: slot carries integers without interpolation.
    #[serde(skip)]
    flat_slots: Vec<bool>,
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            interpolator_count: 0,
            vertex_precision_hint: PrecisionHint::Undefined,
            fragment_precision_hint: PrecisionHint::Undefined,
            local_size: [1, 1, 1],
            use_target_size: false,
            extensions: BTreeSet::new(),
            slot_usage: Vec::new(),
            flat_slots: Vec::new(),
        }
    }
}

/// Where an interpolated value was packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolatorSlot {
    pub slot: u32,
    pub offset: u32,
    pub flat: bool,
    /// True when this request opened the slot; its declaration must be written now.
    pub declare: bool,
}

impl Requirements {
    /// Reserve `width` contiguous components. Packs into the newest slot of the
    /// same kind while it has room, otherwise opens a new one. Float and flat
    /// integer values never share a slot.
    pub fn allocate_interpolator(&mut self, width: u32, flat: bool) -> InterpolatorSlot {
        debug_assert!((1..=COMPONENTS_PER_INTERPOLATOR).contains(&width));
        if let Some(slot) = self.flat_slots.iter().rposition(|&f| f == flat)
            && self.slot_usage[slot] + width <= COMPONENTS_PER_INTERPOLATOR
        {
            let offset = self.slot_usage[slot];
            self.slot_usage[slot] += width;
            return InterpolatorSlot {
                slot: slot as u32,
                offset,
                flat,
                declare: false,
            };
        }
        self.slot_usage.push(width);
        self.flat_slots.push(flat);
        self.interpolator_count = self.slot_usage.len() as u32;
        InterpolatorSlot {
            slot: self.interpolator_count - 1,
            offset: 0,
            flat,
            declare: true,
        }
    }

    /// Components used in each slot.
    pub fn slot_usage(&self) -> &[u32] {
        &self.slot_usage
    }

    /// Keeps the strongest hint seen.
    pub fn record_vertex_precision(&mut self, hint: PrecisionHint) {
        self.vertex_precision_hint = self.vertex_precision_hint.max(hint);
    }

    pub fn record_fragment_precision(&mut self, hint: PrecisionHint) {
        self.fragment_precision_hint = self.fragment_precision_hint.max(hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_until_slot_is_full() {
        let mut r = Requirements::default();
        let a = r.allocate_interpolator(3, false);
        let b = r.allocate_interpolator(1, false);
        let c = r.allocate_interpolator(2, false);
        assert_eq!((a.slot, a.offset, a.declare), (0, 0, true));
        assert_eq!((b.slot, b.offset, b.declare), (0, 3, false));
        assert_eq!((c.slot, c.offset, c.declare), (1, 0, true));
        assert_eq!(r.interpolator_count, 2);
        assert_eq!(r.slot_usage(), &[4, 2]);
    }

    #[test]
    fn integers_pack_apart_from_floats() {
        let mut r = Requirements::default();
        let a = r.allocate_interpolator(2, false);
        let i = r.allocate_interpolator(1, true);
        let b = r.allocate_interpolator(2, false);
        let j = r.allocate_interpolator(3, true);
        assert_eq!((i.slot, i.offset, i.flat, i.declare), (1, 0, true, true));
        assert_eq!((b.slot, b.offset, b.declare), (0, 2, false));
        assert_eq!((j.slot, j.offset, j.declare), (1, 1, false));
        assert_eq!(a.slot, 0);
        assert_eq!(r.slot_usage(), &[4, 4]);
    }

    #[test]
    fn precision_keeps_strongest() {
        let mut r = Requirements::default();
        r.record_fragment_precision(PrecisionHint::High);
        r.record_fragment_precision(PrecisionHint::Low);
        assert_eq!(r.fragment_precision_hint, PrecisionHint::High);
    }
}
