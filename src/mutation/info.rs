//! Mutant metadata and its JSON store.
//!
//! The metadata describes every mutant independently of the encoded program,
//! so selection can run from a stored list without regenerating anything.
//! Positions refer to the instruction numbering of the subject program
//! returned next to the encoded one, see [`crate::ir::Function::positions`].

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::{
    ir::Function,
    mutation::{operators::ReplacerKind, Mutant, Statement},
    Error, Result,
};

/// Metadata of one mutant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutantInfo {
    /// The mutant ID
    pub id: u32,
    /// Name of the function holding the statement
    pub function: String,
    /// Run-wide index of the originating statement
    pub statement: usize,
    /// SHA-1 of the statement's shape, hex encoded
    pub fingerprint: String,
    /// Kind label of the operator that produced the mutant
    pub kind: String,
    /// Replacer category of that operator
    pub replacer: ReplacerKind,
    /// Positions of the instructions the mutant alters
    pub altered: Vec<usize>,
    /// Positions of every instruction of the statement
    pub statement_positions: Vec<usize>,
}

impl MutantInfo {
    /// Describes `mutant` of `statement`.
    ///
    /// `function` must still be in the state the statement was extracted
    /// from; only instruction kinds are read from it.
    #[must_use]
    pub fn new(function: &Function, statement: &Statement, mutant: &Mutant) -> Self {
        let altered = mutant
            .altered()
            .iter()
            .filter_map(|id| {
                statement
                    .instructions()
                    .iter()
                    .position(|i| i == id)
                    .map(|idx| statement.positions()[idx])
            })
            .collect();

        Self {
            id: mutant.id(),
            function: function.name().to_string(),
            statement: statement.index(),
            fingerprint: fingerprint(function, statement),
            kind: mutant.kind().to_string(),
            replacer: mutant.replacer(),
            altered,
            statement_positions: statement.positions().to_vec(),
        }
    }

    /// Returns `true` if the mutant deletes its statement.
    #[must_use]
    pub fn is_statement_deletion(&self) -> bool {
        self.replacer == ReplacerKind::DeleteStatement
    }
}

/// Hashes the function name and the `position:mnemonic` list of a statement.
fn fingerprint(function: &Function, statement: &Statement) -> String {
    let mut hasher = Sha1::new();
    hasher.update(function.name().as_bytes());
    for (id, pos) in statement.instructions().iter().zip(statement.positions()) {
        hasher.update(format!(";{pos}:{}", function.instruction(*id).op().mnemonic()).as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// The metadata of every mutant of one run, in ID order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutantInfoList {
    mutants: Vec<MutantInfo>,
}

impl MutantInfoList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, keeping the list in ID order.
    ///
    /// A record with an ID already present goes after the existing ones.
    pub fn push(&mut self, info: MutantInfo) {
        let at = self.mutants.partition_point(|m| m.id <= info.id);
        self.mutants.insert(at, info);
    }

    /// Returns the record for `id`.
    ///
    /// After [`MutantInfoList::apply_remap`] several records can share an ID;
    /// the survivor's own record comes first.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&MutantInfo> {
        self.mutants.iter().find(|m| m.id == id)
    }

    /// Iterates over the records.
    pub fn iter(&self) -> impl Iterator<Item = &MutantInfo> {
        self.mutants.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutants.len()
    }

    /// Returns `true` if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutants.is_empty()
    }

    /// The highest mutant ID, 0 if the list is empty.
    #[must_use]
    pub fn highest_id(&self) -> u32 {
        self.mutants.iter().map(|m| m.id).max().unwrap_or(0)
    }

    /// The distinct mutant IDs in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.mutants.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Groups the distinct mutant IDs by originating statement.
    #[must_use]
    pub fn by_statement(&self) -> BTreeMap<usize, Vec<u32>> {
        let mut groups: BTreeMap<usize, Vec<u32>> = BTreeMap::new();
        for info in &self.mutants {
            let group = groups.entry(info.statement).or_default();
            if !group.contains(&info.id) {
                group.push(info.id);
            }
        }
        groups
    }

    /// Returns `true` if mutant `id` deletes its statement.
    #[must_use]
    pub fn is_statement_deletion(&self, id: u32) -> bool {
        self.get(id).is_some_and(MutantInfo::is_statement_deletion)
    }

    /// Rewrites the IDs after equivalence reduction.
    ///
    /// `remap[old]` is the new ID of mutant `old`, 0 if it turned out
    /// equivalent to the original program. Those records are removed; records
    /// of mutants that duplicate another one stay and carry the survivor's ID.
    ///
    /// # Returns
    ///
    /// The old IDs of the removed records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMutant`] if a record has no entry in `remap`.
    pub fn apply_remap(&mut self, remap: &[u32]) -> Result<Vec<u32>> {
        let highest = u32::try_from(remap.len().saturating_sub(1)).unwrap_or(u32::MAX);
        if let Some(info) = self.mutants.iter().find(|m| m.id as usize >= remap.len()) {
            return Err(Error::UnknownMutant {
                id: info.id,
                highest,
            });
        }

        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(self.mutants.len());
        for mut info in self.mutants.drain(..) {
            match remap.get(info.id as usize).copied().unwrap_or(0) {
                0 => dropped.push(info.id),
                new => {
                    info.id = new;
                    kept.push(info);
                }
            }
        }
        kept.sort_by_key(|m| m.id);
        self.mutants = kept;
        Ok(dropped)
    }

    /// Writes the list as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] or [`Error::Serialization`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Reads a list written by [`MutantInfoList::save`].
    ///
    /// Records are put back in ID order whatever order the file lists them
    /// in; records sharing an ID keep their relative order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] or [`Error::Serialization`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let stored: Self = serde_json::from_reader(reader)?;
        Ok(stored.mutants.into_iter().collect())
    }
}

impl FromIterator<MutantInfo> for MutantInfoList {
    fn from_iter<I: IntoIterator<Item = MutantInfo>>(iter: I) -> Self {
        let mut mutants: Vec<MutantInfo> = iter.into_iter().collect();
        mutants.sort_by_key(|m| m.id);
        Self { mutants }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u32, statement: usize, replacer: ReplacerKind) -> MutantInfo {
        MutantInfo {
            id,
            function: "f".to_string(),
            statement,
            fingerprint: String::new(),
            kind: format!("K{id}"),
            replacer,
            altered: vec![statement],
            statement_positions: vec![statement],
        }
    }

    #[test]
    fn test_apply_remap_keeps_duplicates() {
        let mut list: MutantInfoList = [
            info(1, 0, ReplacerKind::Binary),
            info(2, 0, ReplacerKind::Binary),
            info(3, 1, ReplacerKind::Binary),
        ]
        .into_iter()
        .collect();

        let dropped = list.apply_remap(&[0, 1, 1, 0]).unwrap();
        assert_eq!(dropped, vec![3]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.highest_id(), 1);
        assert_eq!(list.ids(), vec![1]);
        assert_eq!(list.get(1).unwrap().kind, "K1");
    }

    #[test]
    fn test_load_restores_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mutants.json");
        let unordered = MutantInfoList {
            mutants: vec![
                info(2, 1, ReplacerKind::Binary),
                info(1, 0, ReplacerKind::Binary),
                info(2, 0, ReplacerKind::Const),
            ],
        };
        unordered.save(&path).unwrap();

        let list = MutantInfoList::load(&path).unwrap();
        assert_eq!(list.ids(), vec![1, 2]);
        let order: Vec<(u32, usize)> = list.iter().map(|m| (m.id, m.statement)).collect();
        assert_eq!(order, vec![(1, 0), (2, 1), (2, 0)]);
        assert_eq!(list.get(2).unwrap().statement, 1);
    }

    #[test]
    fn test_push_keeps_id_order() {
        let mut list = MutantInfoList::new();
        list.push(info(3, 0, ReplacerKind::Binary));
        list.push(info(1, 0, ReplacerKind::Binary));
        list.push(info(3, 1, ReplacerKind::Const));
        list.push(info(2, 1, ReplacerKind::Binary));
        let order: Vec<(u32, usize)> = list.iter().map(|m| (m.id, m.statement)).collect();
        assert_eq!(order, vec![(1, 0), (2, 1), (3, 0), (3, 1)]);
        assert_eq!(list.ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_apply_remap_rejects_short_table() {
        let mut list: MutantInfoList = [info(4, 0, ReplacerKind::Const)].into_iter().collect();
        assert!(matches!(
            list.apply_remap(&[0, 1]),
            Err(Error::UnknownMutant { id: 4, highest: 1 })
        ));
    }

    #[test]
    fn test_grouping_and_deletion() {
        let list: MutantInfoList = [
            info(1, 3, ReplacerKind::Binary),
            info(2, 3, ReplacerKind::DeleteStatement),
            info(3, 5, ReplacerKind::Operand),
        ]
        .into_iter()
        .collect();
        let groups = list.by_statement();
        assert_eq!(groups[&3], vec![1, 2]);
        assert_eq!(groups[&5], vec![3]);
        assert!(list.is_statement_deletion(2));
        assert!(!list.is_statement_deletion(1));
    }

    #[test]
    fn test_store_round_trip() {
        let list: MutantInfoList = [info(1, 0, ReplacerKind::Cmp)].into_iter().collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mutants.json");
        list.save(&path).unwrap();
        assert_eq!(MutantInfoList::load(&path).unwrap(), list);
    }
}
