//! # Smali FRL
//!
//! Fixes smali methods that use more registers than the non-range Dalvik
//! instruction formats can address. Each offending instruction is wrapped
//! in `/16` moves that swap the high registers through low ones, guided by
//! a forward pass that infers which kind of move every register needs.
//!
//! ```
//! use smali_frl::rewrite_method;
//!
//! let body = ".method public static f()V\n    .locals 1\n    return-void\n.end method";
//! let lines: Vec<String> = body.lines().map(str::to_string).collect();
//! // fits under the limit, so nothing changes
//! assert_eq!(rewrite_method(lines.clone(), 15).unwrap(), lines);
//! ```

pub mod config;
mod descriptor;
pub mod error;
pub mod instruction;
pub mod line;
pub mod register;
pub mod rewriter;
pub mod signature;
pub mod tracker;
pub mod value_type;


pub use config::{RewriteConfig, DEFAULT_REGISTER_LIMIT};
pub use error::{DecodeError, FrlError};
pub use instruction::{Instruction, Opcode, Operands};
pub use line::LineBuffer;
pub use register::{p_to_v, Register, RegisterKind};
pub use rewriter::{rewrite_method, RegisterLimitRewriter, ShadowMapping, ShadowTriple};
pub use signature::{parse_signature, MethodSignature};
pub use tracker::{MoveTypeMap, MoveTypeTracker};
pub use value_type::{MoveKind, ValueType};
