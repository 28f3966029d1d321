//! Forward, last-write-wins tracking of which move kind each register needs.
//!
//! There is no merging at control-flow joins: the most recently scanned
//! definition of a register is the one that counts.

use std::collections::BTreeMap;

use log::trace;

use crate::instruction::Instruction;
use crate::register::{p_to_v, Register};
use crate::signature::MethodSignature;
use crate::value_type::{MoveKind, ValueType};

pub type MoveTypeMap = BTreeMap<Register, MoveKind>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveTypeTracker {
    kinds: MoveTypeMap,
}

impl MoveTypeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with the parameters, which are live on entry without any write.
    pub fn from_signature(signature: &MethodSignature, locals: u32) -> Self {
        let mut tracker = Self::new();
        for (reg, t) in signature.parameter_type_map() {
            tracker.kinds.insert(p_to_v(reg, locals), t.move_kind());
        }
        tracker
    }

    pub fn kind_of(&self, reg: Register) -> Option<MoveKind> {
        self.kinds.get(&reg).copied()
    }

    pub fn map(&self) -> &MoveTypeMap {
        &self.kinds
    }

    /// Record that `reg` now holds a value of type `t`. Overwriting one half
    /// of a wide pair with anything else orphans the other half, which is
    /// forgotten.
    pub fn record(&mut self, reg: Register, t: &ValueType) {
        let kind = t.move_kind();
        let old = self.kinds.insert(reg, kind);
        if old == Some(kind) {
            return;
        }
        if old == Some(MoveKind::Wide) {
            let above = reg.offset(1);
            if self.kinds.get(&above) == Some(&MoveKind::WideContinuation) {
                self.kinds.remove(&above);
            }
        }
        if old == Some(MoveKind::WideContinuation) {
            if let Some(n) = reg.number.checked_sub(1) {
                let below = Register { kind: reg.kind, number: n };
                if self.kinds.get(&below) == Some(&MoveKind::Wide) {
                    self.kinds.remove(&below);
                }
            }
        }
    }

    /// Apply the type implications of `instruction`.
    pub fn update(&mut self, instruction: &Instruction) {
        let implications = instruction.type_implications();
        if implications.is_empty() {
            return;
        }
        trace!("{} -> {:?}", instruction, implications);
        // primaries before their continuation, so a fresh pair survives the
        // orphan clean-up in `record`
        for (reg, t) in implications.iter().filter(|(_, t)| !t.is_continuation()) {
            self.record(*reg, t);
        }
        for (reg, t) in implications.iter().filter(|(_, t)| t.is_continuation()) {
            self.record(*reg, t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::v;

    fn tracker_with(entries: &[(Register, MoveKind)]) -> MoveTypeTracker {
        MoveTypeTracker { kinds: entries.iter().copied().collect() }
    }

    fn update(tracker: &mut MoveTypeTracker, line: &str) {
        tracker.update(&Instruction::parse(line).unwrap());
    }

    #[test]
    fn seeded_from_signature() {
        let sig = MethodSignature::parse(
            ".method private calculatePageOffsets(Landroidx/viewpager/widget/ViewPager$ItemInfo;ILandroidx/viewpager/widget/ViewPager$ItemInfo;)V",
        )
        .unwrap();
        let tracker = MoveTypeTracker::from_signature(&sig, 13);
        let expected = tracker_with(&[
            (v(13), MoveKind::Object),
            (v(14), MoveKind::Object),
            (v(15), MoveKind::Word),
            (v(16), MoveKind::Object),
        ]);
        assert_eq!(tracker, expected);

        let sig = MethodSignature::parse(
            ".method private calculatePageOffsets(Landroidx/viewpager/widget/ViewPager$ItemInfo;ILandroidx/viewpager/widget/ViewPager$ItemInfo;J)V",
        )
        .unwrap();
        let tracker = MoveTypeTracker::from_signature(&sig, 13);
        assert_eq!(tracker.kind_of(v(17)), Some(MoveKind::Wide));
        assert_eq!(tracker.kind_of(v(18)), Some(MoveKind::WideContinuation));
    }

    #[test]
    fn updates_from_instructions() {
        let mut tracker = MoveTypeTracker::new();
        update(&mut tracker, "const-wide/16 v18, 0x1");
        let expected =
            tracker_with(&[(v(18), MoveKind::Wide), (v(19), MoveKind::WideContinuation)]);
        assert_eq!(tracker, expected);

        let mut tracker = tracker_with(&[(v(21), MoveKind::Object)]);
        update(&mut tracker, "array-length v16, v21");
        assert_eq!(tracker, tracker_with(&[(v(16), MoveKind::Word), (v(21), MoveKind::Object)]));

        let before = tracker.clone();
        update(&mut tracker, "return-void");
        assert_eq!(tracker, before);
    }

    #[test]
    fn last_write_wins() {
        let mut tracker = MoveTypeTracker::new();
        update(&mut tracker, "const/4 v0, 0x0");
        update(&mut tracker, "new-instance v0, Ljava/lang/Object;");
        assert_eq!(tracker.kind_of(v(0)), Some(MoveKind::Object));
    }

    #[test]
    fn broken_wide_pairs_are_forgotten() {
        let mut tracker = MoveTypeTracker::new();
        update(&mut tracker, "const-wide v4, 0x100000000L");
        update(&mut tracker, "const/4 v5, 0x1");
        assert_eq!(tracker.kind_of(v(4)), None);
        assert_eq!(tracker.kind_of(v(5)), Some(MoveKind::Word));

        update(&mut tracker, "const-wide v4, 0x100000000L");
        update(&mut tracker, "move-object v4, v9");
        assert_eq!(tracker.kind_of(v(4)), Some(MoveKind::Object));
        assert_eq!(tracker.kind_of(v(5)), None);

        // a new pair overlapping an old one keeps only the new one
        update(&mut tracker, "const-wide v4, 0x100000000L");
        update(&mut tracker, "const-wide v5, 0x1L");
        assert_eq!(tracker.kind_of(v(4)), None);
        assert_eq!(tracker.kind_of(v(5)), Some(MoveKind::Wide));
        assert_eq!(tracker.kind_of(v(6)), Some(MoveKind::WideContinuation));
    }
}
