//! Register-limit fixing.
//!
//! Most Dalvik instruction formats can only name registers `v0..v15` (some
//! only `v0..v255`). When a method needs more registers than that, every
//! instruction that names a high register is rewritten to use a low
//! "corresponding" register instead: the low register's current value is
//! parked in a shadow register, the high value is loaded into the low one,
//! the renamed instruction runs, and then everything is moved back. The
//! `/16` moves used for this can address any register.

use std::collections::HashMap;

use log::debug;

use crate::config::RewriteConfig;
use crate::error::{FrlError, Result};
use crate::instruction::Instruction;
use crate::line::{is_decodable_instruction, LineBuffer, LineKind, LineScanner};
use crate::register::{p_to_v, v, Register};
use crate::signature::MethodSignature;
use crate::tracker::MoveTypeTracker;
use crate::value_type::MoveKind;

const BLOCK_START: &str = "# register-limit block";
const BLOCK_END: &str = "# end register-limit block";

/// One relocated register of a rewritten instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowTriple {
    pub high: Register,
    pub shadow: Register,
    pub corresponding: Register,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowMapping {
    pub triples: Vec<ShadowTriple>,
    /// Shadow registers left in the pool after this instruction took its share.
    pub remaining: Vec<Register>,
}

/// Explicit registers above `limit`, first occurrence order.
fn high_registers(instruction: &Instruction, limit: u32) -> Vec<Register> {
    instruction
        .unique_registers()
        .into_iter()
        .filter(|r| r.number > limit)
        .collect()
}

impl ShadowMapping {
    /// Pick a shadow and a corresponding register for every high register
    /// of `instruction`. `tracker` must describe the registers as they are
    /// just before the instruction executes.
    ///
    /// Shadows are taken from the end of `pool`. A saved wide value also
    /// occupies the slot above its shadow, which the pool has to keep free.
    /// No pool slot ever stands in for a high register, even when the pool
    /// sits below the limit.
    pub fn build(
        instruction: &Instruction,
        limit: u32,
        pool: &[Register],
        tracker: &MoveTypeTracker,
    ) -> Result<ShadowMapping> {
        let referenced = instruction.all_registers();
        let implicit = instruction.implicit_registers();
        let reserved: Vec<Register> = pool.iter().flat_map(|s| [*s, s.offset(1)]).collect();
        let mut remaining = pool.to_vec();
        let mut claimed: Vec<Register> = Vec::new();
        let mut triples = Vec::new();

        for high in high_registers(instruction, limit) {
            let shadow = remaining.pop().ok_or_else(|| FrlError::ShadowPoolExhausted {
                instruction: instruction.to_string(),
            })?;
            let high_wide =
                implicit.contains(&high.offset(1)) || tracker.kind_of(high) == Some(MoveKind::Wide);

            let corresponding = (0..=limit).map(v).find_map(|c| {
                let footprint = footprint(c, high_wide, tracker)?;
                let free = footprint.iter().all(|r| {
                    r.number <= limit
                        && !referenced.contains(r)
                        && !claimed.contains(r)
                        && !reserved.contains(r)
                });
                free.then_some((c, footprint))
            });
            let Some((corresponding, footprint)) = corresponding else {
                return Err(FrlError::RegisterRangeExhausted {
                    register: high,
                    limit,
                    instruction: instruction.to_string(),
                });
            };

            claimed.extend(footprint);
            triples.push(ShadowTriple { high, shadow, corresponding });
        }

        Ok(ShadowMapping { triples, remaining })
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// High register to corresponding register.
    pub fn renaming(&self) -> HashMap<Register, Register> {
        self.triples.iter().map(|t| (t.high, t.corresponding)).collect()
    }
}

fn emit(insn: Instruction, tracker: &mut MoveTypeTracker, block: &mut Vec<Instruction>) {
    tracker.update(&insn);
    block.push(insn);
}

/// Registers clobbered when `candidate` stands in for a high register, or
/// `None` when it cannot stand in at all. The slot above joins in when the
/// loaded value is wide or the candidate's own saved value is.
fn footprint(
    candidate: Register,
    high_wide: bool,
    tracker: &MoveTypeTracker,
) -> Option<Vec<Register>> {
    let above = candidate.offset(1);
    match tracker.kind_of(candidate) {
        // half of a pair that starts one register lower
        Some(MoveKind::WideContinuation) => None,
        Some(MoveKind::Wide) => Some(vec![candidate, above]),
        // a live value in the slot above would need a second shadow
        _ if high_wide && tracker.kind_of(above).is_some() => None,
        _ if high_wide => Some(vec![candidate, above]),
        _ => Some(vec![candidate]),
    }
}

pub struct RegisterLimitRewriter {
    config: RewriteConfig,
}

impl RegisterLimitRewriter {
    pub fn new(config: RewriteConfig) -> Self {
        RegisterLimitRewriter { config }
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Feed `instruction` to `tracker` and, when it names registers above
    /// the limit, build the block that replaces it: saves and loads, the
    /// renamed instruction, then stores and restores. `None` means the
    /// instruction stays as it is.
    pub fn rewrite_instruction(
        &self,
        instruction: &Instruction,
        pool: &[Register],
        tracker: &mut MoveTypeTracker,
    ) -> Result<Option<Vec<Instruction>>> {
        let limit = self.config.limit;
        if instruction.is_rewrite_exempt() || high_registers(instruction, limit).is_empty() {
            tracker.update(instruction);
            return Ok(None);
        }

        let before = tracker.clone();
        tracker.update(instruction);
        let mapping = ShadowMapping::build(instruction, limit, pool, &before)?;

        let unknown = |register: Register| FrlError::UnknownRegisterType {
            register,
            instruction: instruction.to_string(),
        };
        let mut block = Vec::new();

        let mut saved = Vec::with_capacity(mapping.triples.len());
        for t in &mapping.triples {
            let save = tracker
                .kind_of(t.corresponding)
                .and_then(|kind| kind.build_move(t.shadow, t.corresponding));
            saved.push(save.is_some());
            if let Some(mv) = save {
                emit(mv, tracker, &mut block);
            }

            // the value the high register holds going in, or for a plain
            // write the type it is about to get
            let load_kind = before
                .kind_of(t.high)
                .or_else(|| tracker.kind_of(t.high))
                .ok_or_else(|| unknown(t.high))?;
            if let Some(mv) = load_kind.build_move(t.corresponding, t.high) {
                emit(mv, tracker, &mut block);
            }
        }

        let renamed = instruction.rename(&mapping.renaming());
        emit(renamed, tracker, &mut block);

        for (t, was_saved) in mapping.triples.iter().zip(saved) {
            let store_kind = tracker
                .kind_of(t.corresponding)
                .ok_or_else(|| unknown(t.corresponding))?;
            if let Some(mv) = store_kind.build_move(t.high, t.corresponding) {
                emit(mv, tracker, &mut block);
            }
            if was_saved {
                let restore_kind = tracker.kind_of(t.shadow).ok_or_else(|| unknown(t.shadow))?;
                if let Some(mv) = restore_kind.build_move(t.corresponding, t.shadow) {
                    emit(mv, tracker, &mut block);
                }
            }
        }

        debug!("`{}` rewritten into {} instructions", instruction, block.len());
        Ok(Some(block))
    }

    /// Rewrite a whole method body. The first line is the `.method` header;
    /// a `.locals` or `.registers` directive must follow before the first
    /// instruction. Methods that fit under the limit come back unchanged.
    pub fn rewrite_method(&self, lines: Vec<String>) -> Result<Vec<String>> {
        let limit = self.config.limit;
        let mut buffer = LineBuffer::new(lines);
        if buffer.is_empty() {
            return Ok(buffer.into_lines());
        }
        let signature = MethodSignature::parse(buffer.get(0).unwrap_or_default())?;
        let params = signature.parameter_register_count();

        let kinds = LineScanner::scan(buffer.lines());

        let Some((directive_at, directive)) = find_register_directive(&buffer, &kinds)? else {
            let has_instructions = buffer
                .lines()
                .iter()
                .zip(&kinds)
                .any(|(line, kind)| {
                    *kind == LineKind::Instruction && is_decodable_instruction(line)
                });
            if has_instructions {
                return Err(FrlError::MissingRegisterDirective);
            }
            debug!("{}: no register directive, leaving body alone", signature.name);
            return Ok(buffer.into_lines());
        };
        let locals = match directive {
            RegisterDirective::Locals(n) => n,
            RegisterDirective::Registers(n) => n.checked_sub(params).ok_or_else(|| {
                let line = buffer.get(directive_at).unwrap_or_default();
                FrlError::RegisterDirective(line.trim().to_string())
            })?,
        };

        let total = locals + params;
        if total <= limit + 1 {
            return Ok(buffer.into_lines());
        }

        // two slots per shadow so a saved wide value has room
        let instructions = decode_body(&buffer, &kinds)?;
        let shadows = shadow_count(&instructions, locals, limit);
        let new_locals = locals + 2 * shadows;
        let pool: Vec<Register> = (0..shadows).map(|i| v(locals + 2 * i)).collect();
        debug!(
            "{}: {} registers, {} shadows, locals {} -> {}",
            signature.name, total, shadows, locals, new_locals
        );

        let directive_line = match directive {
            RegisterDirective::Locals(_) => format!(".locals {}", new_locals),
            RegisterDirective::Registers(_) => format!(".registers {}", new_locals + params),
        };
        let indent = indentation(buffer.get(directive_at).unwrap_or_default()).to_string();
        buffer.set(directive_at, format!("{}{}", indent, directive_line));

        dereference_parameters(&mut buffer, &instructions, new_locals);

        let mut tracker = MoveTypeTracker::from_signature(&signature, new_locals);
        let mut scanner = LineScanner::new();
        let mut i = 1;
        while i < buffer.len() {
            let line = buffer.get(i).unwrap_or_default().to_string();
            if scanner.next_kind(&line) != LineKind::Instruction {
                i += 1;
                continue;
            }
            let instruction = Instruction::parse(&line)?;
            match self.rewrite_instruction(&instruction, &pool, &mut tracker)? {
                None => i += 1,
                Some(block) => {
                    let indent = indentation(&line);
                    let mut new_lines = Vec::with_capacity(block.len() + 2);
                    if self.config.annotate {
                        new_lines.push(format!("{}{}", indent, BLOCK_START));
                    }
                    new_lines.extend(block.iter().map(|insn| format!("{}{}", indent, insn)));
                    if self.config.annotate {
                        new_lines.push(format!("{}{}", indent, BLOCK_END));
                    }
                    i = buffer.replace_range(i, i + 1, new_lines);
                }
            }
        }

        Ok(buffer.into_lines())
    }
}

/// Rewrite `lines` so no instruction outside the `/range` forms and the
/// `/16` moves names a register above `limit`.
pub fn rewrite_method(lines: Vec<String>, limit: u32) -> Result<Vec<String>> {
    RegisterLimitRewriter::new(RewriteConfig::with_limit(limit)).rewrite_method(lines)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegisterDirective {
    Locals(u32),
    Registers(u32),
}

/// The `.locals`/`.registers` line, which precedes the first instruction.
fn find_register_directive(
    buffer: &LineBuffer,
    kinds: &[LineKind],
) -> Result<Option<(usize, RegisterDirective)>> {
    for (i, (line, kind)) in buffer.lines().iter().zip(kinds).enumerate().skip(1) {
        let mut words = line.split_whitespace();
        let make: fn(u32) -> RegisterDirective = match words.next() {
            Some(".locals") => RegisterDirective::Locals,
            Some(".registers") => RegisterDirective::Registers,
            _ if *kind == LineKind::Instruction => return Ok(None),
            _ => continue,
        };
        let count = words
            .next()
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| FrlError::RegisterDirective(line.trim().to_string()))?;
        return Ok(Some((i, make(count))));
    }
    Ok(None)
}

fn indentation(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Every instruction line of the body, decoded, with its line index.
fn decode_body(buffer: &LineBuffer, kinds: &[LineKind]) -> Result<Vec<(usize, Instruction)>> {
    buffer
        .lines()
        .iter()
        .zip(kinds)
        .enumerate()
        .filter(|(_, (_, kind))| **kind == LineKind::Instruction)
        .map(|(i, (line, _))| -> Result<(usize, Instruction)> {
            Ok((i, Instruction::parse(line)?))
        })
        .collect()
}

/// Shadow registers the body needs: the most distinct high registers any
/// one instruction names once parameters sit above the grown locals.
/// Growing the locals can push more parameters over the limit, so the
/// count is raised until it covers itself.
fn shadow_count(instructions: &[(usize, Instruction)], locals: u32, limit: u32) -> u32 {
    let mut shadows = 0;
    loop {
        let shifted = locals + 2 * shadows;
        let needed = instructions
            .iter()
            .filter(|(_, insn)| !insn.is_rewrite_exempt())
            .map(|(_, insn)| {
                let mut highs: Vec<Register> = insn
                    .registers()
                    .into_iter()
                    .map(|r| p_to_v(r, shifted))
                    .filter(|r| r.number > limit)
                    .collect();
                highs.sort();
                highs.dedup();
                highs.len() as u32
            })
            .max()
            .unwrap_or(0);
        if needed <= shadows {
            return shadows;
        }
        shadows = needed;
    }
}

/// Rename every parameter register of the decoded instructions to its local
/// number. Lines without parameter registers are left byte for byte.
fn dereference_parameters(
    buffer: &mut LineBuffer,
    instructions: &[(usize, Instruction)],
    locals: u32,
) {
    for (i, instruction) in instructions {
        let mapping: HashMap<Register, Register> = instruction
            .registers()
            .into_iter()
            .filter(|r| r.is_parameter())
            .map(|r| (r, p_to_v(r, locals)))
            .collect();
        if mapping.is_empty() {
            continue;
        }
        let line = buffer.get(*i).unwrap_or_default();
        let renamed = format!("{}{}", indentation(line), instruction.rename(&mapping));
        buffer.set(*i, renamed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::p;

    fn insn(line: &str) -> Instruction {
        Instruction::parse(line).unwrap()
    }

    fn tracker_with(entries: &[(Register, MoveKind)]) -> MoveTypeTracker {
        let mut tracker = MoveTypeTracker::new();
        for (r, k) in entries {
            let mv = match k {
                MoveKind::Word => format!("const/4 {}, 0x0", r),
                MoveKind::Object => format!("new-instance {}, Ljava/lang/Object;", r),
                MoveKind::Wide => format!("const-wide/16 {}, 0x0", r),
                MoveKind::WideContinuation => unreachable!(),
            };
            tracker.update(&insn(&mv));
        }
        tracker
    }

    fn rendered(block: &[Instruction]) -> Vec<String> {
        block.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn single_high_register_triple() {
        let tracker = MoveTypeTracker::new();
        let mapping = ShadowMapping::build(&insn("throw v17"), 15, &[v(16)], &tracker).unwrap();
        assert_eq!(
            mapping.triples,
            vec![ShadowTriple { high: v(17), shadow: v(16), corresponding: v(0) }]
        );
        assert!(mapping.remaining.is_empty());
    }

    #[test]
    fn triples_take_shadows_from_the_end() {
        let tracker = tracker_with(&[(v(21), MoveKind::Object)]);
        let pool = [v(17), v(18), v(19)];
        let mapping =
            ShadowMapping::build(&insn("array-length v16, v21"), 15, &pool, &tracker).unwrap();
        assert_eq!(
            mapping.triples,
            vec![
                ShadowTriple { high: v(16), shadow: v(19), corresponding: v(0) },
                ShadowTriple { high: v(21), shadow: v(18), corresponding: v(1) },
            ]
        );
        assert_eq!(mapping.remaining, vec![v(17)]);
    }

    #[test]
    fn corresponding_avoids_instruction_registers() {
        let tracker = MoveTypeTracker::new();
        let instruction = insn("add-int v0, v1, v20");
        let mapping = ShadowMapping::build(&instruction, 15, &[v(30)], &tracker).unwrap();
        assert_eq!(mapping.triples[0].corresponding, v(2));

        // continuation slots count as referenced too
        let instruction = insn("add-long v0, v2, v20");
        let mapping = ShadowMapping::build(&instruction, 15, &[v(30)], &tracker).unwrap();
        assert_eq!(mapping.triples[0].corresponding, v(4));
    }

    #[test]
    fn corresponding_skips_wide_halves() {
        let tracker = tracker_with(&[(v(0), MoveKind::Wide), (v(2), MoveKind::Word)]);
        // v0 can stand in, its saved pair covers v1
        let mapping = ShadowMapping::build(&insn("throw v16"), 15, &[v(30)], &tracker).unwrap();
        assert_eq!(mapping.triples[0].corresponding, v(0));

        // a wide high value needs two free slots: v0/v1 is a saved pair, fine
        let mapping =
            ShadowMapping::build(&insn("return-wide v16"), 15, &[v(30)], &tracker).unwrap();
        assert_eq!(mapping.triples[0].corresponding, v(0));

        // v1 is the upper half of a pair and never stands in alone
        let tracker = tracker_with(&[(v(0), MoveKind::Wide)]);
        let mapping = ShadowMapping::build(&insn("move v0, v16"), 15, &[v(30)], &tracker).unwrap();
        assert_eq!(mapping.triples[0].corresponding, v(2));
    }

    #[test]
    fn exhausted_low_registers() {
        let instruction = insn("move v0, v20");
        let tracker = MoveTypeTracker::new();
        let err = ShadowMapping::build(&instruction, 0, &[v(30)], &tracker).unwrap_err();
        assert!(matches!(
            err,
            FrlError::RegisterRangeExhausted { register, limit: 0, .. } if register == v(20)
        ));

        let err = ShadowMapping::build(&instruction, 15, &[], &tracker).unwrap_err();
        assert!(matches!(err, FrlError::ShadowPoolExhausted { .. }));
    }

    #[test]
    fn array_length_block() {
        let rewriter = RegisterLimitRewriter::new(RewriteConfig::default());
        let pool = [v(17), v(18), v(19)];
        let mut tracker = tracker_with(&[(v(21), MoveKind::Object)]);
        let block = rewriter
            .rewrite_instruction(&insn("array-length v16, v21"), &pool, &mut tracker)
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&block),
            vec![
                "move/16 v0, v16",
                "move-object/16 v1, v21",
                "array-length v0, v1",
                "move/16 v16, v0",
                "move-object/16 v21, v1",
            ]
        );
    }

    #[test]
    fn array_length_block_saves_live_low_register() {
        let rewriter = RegisterLimitRewriter::new(RewriteConfig::default());
        let pool = [v(17), v(18), v(19)];
        let mut tracker = tracker_with(&[(v(0), MoveKind::Word), (v(21), MoveKind::Object)]);
        let block = rewriter
            .rewrite_instruction(&insn("array-length v16, v21"), &pool, &mut tracker)
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&block),
            vec![
                "move/16 v19, v0",
                "move/16 v0, v16",
                "move-object/16 v1, v21",
                "array-length v0, v1",
                "move/16 v16, v0",
                "move/16 v0, v19",
                "move-object/16 v21, v1",
            ]
        );
        assert_eq!(tracker.kind_of(v(16)), Some(MoveKind::Word));
        assert_eq!(tracker.kind_of(v(0)), Some(MoveKind::Word));
        assert_eq!(tracker.kind_of(v(1)), Some(MoveKind::Object));
    }

    #[test]
    fn wide_high_register_moves_as_a_pair() {
        let rewriter = RegisterLimitRewriter::new(RewriteConfig::default());
        let mut tracker = tracker_with(&[(v(20), MoveKind::Wide), (v(0), MoveKind::Object)]);
        let block = rewriter
            .rewrite_instruction(&insn("long-to-int v3, v20"), &[v(16)], &mut tracker)
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&block),
            vec![
                "move-object/16 v16, v0",
                "move-wide/16 v0, v20",
                "long-to-int v3, v0",
                "move-wide/16 v20, v0",
                "move-object/16 v0, v16",
            ]
        );
    }

    #[test]
    fn write_only_instruction_uses_previous_type_for_load() {
        let rewriter = RegisterLimitRewriter::new(RewriteConfig::default());
        let mut tracker = tracker_with(&[(v(16), MoveKind::Object)]);
        let block = rewriter
            .rewrite_instruction(&insn("move-result v16"), &[v(17)], &mut tracker)
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&block),
            vec!["move-object/16 v0, v16", "move-result v0", "move/16 v16, v0"]
        );
        assert_eq!(tracker.kind_of(v(16)), Some(MoveKind::Word));
    }

    #[test]
    fn untyped_high_register_is_fatal() {
        let rewriter = RegisterLimitRewriter::new(RewriteConfig::default());
        let mut tracker = MoveTypeTracker::new();
        let err = rewriter
            .rewrite_instruction(&insn("if-eqz v16, :cond_0"), &[v(17)], &mut tracker)
            .unwrap_err();
        assert!(matches!(err, FrlError::UnknownRegisterType { register, .. } if register == v(16)));
    }

    #[test]
    fn exempt_and_low_instructions_are_left_alone() {
        let rewriter = RegisterLimitRewriter::new(RewriteConfig::default());
        let mut tracker = MoveTypeTracker::new();
        for line in [
            "move-wide/16 v12, v20",
            "move-object/from16 v1, v200",
            "filled-new-array/range {v19 .. v21}, [B",
            "invoke-super-quick/range {v0 .. v5}, vtable@0x10",
            "move-wide v15, v0",
            "const/4 v2, 0x1",
        ] {
            let block = rewriter.rewrite_instruction(&insn(line), &[v(30)], &mut tracker).unwrap();
            assert_eq!(block, None, "{line}");
        }
        // the tracker still saw them
        assert_eq!(tracker.kind_of(v(12)), Some(MoveKind::Wide));
        assert_eq!(tracker.kind_of(v(2)), Some(MoveKind::Word));
    }

    #[test]
    fn throw_saves_word_and_relocates_object() {
        let rewriter = RegisterLimitRewriter::new(RewriteConfig::default());
        let mut tracker = tracker_with(&[(v(0), MoveKind::Word), (v(16), MoveKind::Object)]);
        let block = rewriter
            .rewrite_instruction(&insn("throw v16"), &[v(17), v(18), v(19)], &mut tracker)
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&block),
            vec![
                "move/16 v19, v0",
                "move-object/16 v0, v16",
                "throw v0",
                "move-object/16 v16, v0",
                "move/16 v0, v19",
            ]
        );
    }

    #[test]
    fn constant_into_high_register() {
        let rewriter = RegisterLimitRewriter::new(RewriteConfig::default());
        let mut tracker = MoveTypeTracker::new();
        let block = rewriter
            .rewrite_instruction(&insn("const v21, 0x800053"), &[v(16)], &mut tracker)
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&block),
            vec!["move/16 v0, v21", "const v0, 0x800053", "move/16 v21, v0"]
        );
        assert_eq!(tracker.kind_of(v(21)), Some(MoveKind::Word));

        // a live low register is parked in the shadow and put back
        let mut tracker = tracker_with(&[(v(0), MoveKind::Object)]);
        let block = rewriter
            .rewrite_instruction(&insn("const v21, 0x800053"), &[v(16)], &mut tracker)
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&block),
            vec![
                "move-object/16 v16, v0",
                "move/16 v0, v21",
                "const v0, 0x800053",
                "move/16 v21, v0",
                "move-object/16 v0, v16",
            ]
        );
        assert_eq!(tracker.kind_of(v(0)), Some(MoveKind::Object));
    }

    #[test]
    fn pool_slots_never_stand_in() {
        let instruction = insn("add-int v20, v21, v22");
        let pool = [v(0), v(2), v(4)];
        let tracker = MoveTypeTracker::new();
        let mapping = ShadowMapping::build(&instruction, 15, &pool, &tracker).unwrap();
        let corresponding: Vec<Register> =
            mapping.triples.iter().map(|t| t.corresponding).collect();
        assert_eq!(corresponding, vec![v(6), v(7), v(8)]);
        let shadows: Vec<Register> = mapping.triples.iter().map(|t| t.shadow).collect();
        assert_eq!(shadows, vec![v(4), v(2), v(0)]);
    }

    fn body(text: &str) -> (LineBuffer, Vec<LineKind>) {
        let buffer = LineBuffer::from_text(text);
        let kinds = LineScanner::scan(buffer.lines());
        (buffer, kinds)
    }

    #[test]
    fn directives() {
        let (buffer, kinds) =
            body(".method public foo()V\n    .registers 4\n    return-void\n.end method");
        assert_eq!(
            find_register_directive(&buffer, &kinds).unwrap(),
            Some((1, RegisterDirective::Registers(4)))
        );

        let (buffer, kinds) = body(".method public foo()V\n    return-void\n    .locals 2");
        assert_eq!(find_register_directive(&buffer, &kinds).unwrap(), None);

        let (buffer, kinds) = body(".method public foo()V\n    .locals x");
        assert!(matches!(
            find_register_directive(&buffer, &kinds),
            Err(FrlError::RegisterDirective(_))
        ));
    }

    #[test]
    fn shadow_count_covers_shifted_parameters() {
        // only p2 is high as written, but the grown locals push p0 and p1 up too
        let (buffer, kinds) =
            body(".method public static f(III)V\n    .locals 14\n    add-int p0, p1, p2");
        let instructions = decode_body(&buffer, &kinds).unwrap();
        assert_eq!(shadow_count(&instructions, 14, 15), 3);

        let (buffer, kinds) = body(".method public static f(I)V\n    .locals 16\n    throw p0");
        let instructions = decode_body(&buffer, &kinds).unwrap();
        assert_eq!(shadow_count(&instructions, 16, 15), 1);

        let (buffer, kinds) = body(
            ".method public static f(I)V\n    .locals 20\n    \
             invoke-static/range {v16 .. v20}, La;->b()V",
        );
        let instructions = decode_body(&buffer, &kinds).unwrap();
        assert_eq!(shadow_count(&instructions, 20, 15), 0);
    }

    #[test]
    fn parameters_are_dereferenced() {
        let (mut buffer, kinds) = body(
            ".method public foo(II)V\n    .locals 16\n    throw p1\n    if-eqz p2, :cond_6\n    \
             # p1 stays\n    const/4 v0, 0x1",
        );
        let instructions = decode_body(&buffer, &kinds).unwrap();
        dereference_parameters(&mut buffer, &instructions, 16);
        assert_eq!(buffer.get(2), Some("    throw v17"));
        assert_eq!(buffer.get(3), Some("    if-eqz v18, :cond_6"));
        assert_eq!(buffer.get(4), Some("    # p1 stays"));
        assert_eq!(buffer.get(5), Some("    const/4 v0, 0x1"));
        assert_eq!(p_to_v(p(3), 13), v(16));
    }
}
