//! Per-run counters shared by the generation stages.

/// Counters that must be unique across one generation run.
///
/// One session is threaded through extraction, generation and encoding of a
/// whole program, so mutant IDs stay contiguous across functions and block
/// labels never collide.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    next_mutant: u32,
    next_proxy: usize,
    next_statement: usize,
}

impl Default for GenerationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationSession {
    /// Creates a session whose first mutant will get ID 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_mutant: 1,
            next_proxy: 0,
            next_statement: 0,
        }
    }

    /// Mints the next mutant ID.
    pub fn next_mutant_id(&mut self) -> u32 {
        let id = self.next_mutant;
        self.next_mutant += 1;
        id
    }

    /// Returns the highest ID minted so far, 0 if none.
    #[must_use]
    pub fn highest_mutant_id(&self) -> u32 {
        self.next_mutant - 1
    }

    /// Mints the ordinal of the next proxy block.
    pub fn next_proxy(&mut self) -> usize {
        let n = self.next_proxy;
        self.next_proxy += 1;
        n
    }

    /// Mints the ordinal of the next statement.
    pub fn next_statement(&mut self) -> usize {
        let n = self.next_statement;
        self.next_statement += 1;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_contiguous() {
        let mut session = GenerationSession::new();
        assert_eq!(session.highest_mutant_id(), 0);
        assert_eq!(session.next_mutant_id(), 1);
        assert_eq!(session.next_mutant_id(), 2);
        assert_eq!(session.highest_mutant_id(), 2);
        assert_eq!(session.next_proxy(), 0);
        assert_eq!(session.next_proxy(), 1);
    }
}
