// =============================================================================
// Program Fingerprints: content hashes used as analysis cache keys
// =============================================================================
//
// Two levels:
//
// **Model hash**: bincode encoding of the declaration graph, hashed with blake3
// - Ignores the attached source text and the program name
// - Used for: "Does a cached report still apply?"
//
// **Source hash**: blake3 of the attached source text
// - Used for: "Did the front-end hand over a different file?"

use crate::ast::Program;
use crate::error::IsoResult;
use std::fmt;

/// blake3 digest identifying a program model.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash everything the analysis reads: bindings, functions and objects.
    pub fn of_program(program: &Program) -> IsoResult<Self> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&bincode::serialize(&program.bindings)?);
        hasher.update(&bincode::serialize(&program.functions)?);
        hasher.update(&bincode::serialize(&program.objects)?);
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// Hash the source text attached to the program, if any.
    pub fn of_source(program: &Program) -> Option<Self> {
        program
            .source
            .as_ref()
            .map(|s| Self(*blake3::hash(s.text.as_bytes()).as_bytes()))
    }

    /// First 8 bytes, little-endian.
    pub fn short(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(head)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:016x})", self.short())
    }
}
