//! Line encoding and the multi-way merge.
//!
//! Every distinct source line gets a global index; permutations are folded
//! together one by one with a Myers diff over those indices, accumulating
//! for every merged line the list of flag assignments under which it
//! appears.

use std::collections::HashMap;

use similar::{capture_diff_slices, Algorithm, DiffOp};

use crate::search::FlagSet;
use crate::DecompilerError;

#[derive(Clone, Debug, Default)]
pub struct LineTable {
    lines: Vec<String>,
    index: HashMap<String, u32>,
}

impl LineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode_line(&mut self, line: &str) -> u32 {
        if let Some(&id) = self.index.get(line) {
            return id;
        }

        let id = self.lines.len() as u32;
        self.lines.push(line.to_owned());
        self.index.insert(line.to_owned(), id);
        id
    }

    pub fn encode(&mut self, code: &str) -> Vec<u32> {
        code.lines().map(|line| self.encode_line(line)).collect()
    }

    pub fn decode(&self, id: u32) -> &str {
        &self.lines[id as usize]
    }
}

/// One deduplicated code body and every flag assignment that produced it.
#[derive(Clone, Debug)]
pub struct Permutation {
    pub lines: Vec<u32>,
    pub flag_sets: Vec<FlagSet>,
}

/// Deduplicates byte-identical bodies, merging their flag sets in input
/// order.
pub fn dedup_permutations(raw: Vec<(Vec<u32>, FlagSet)>) -> Vec<Permutation> {
    let mut out: Vec<Permutation> = Vec::new();

    for (lines, flags) in raw {
        if let Some(existing) = out.iter_mut().find(|p| p.lines == lines) {
            existing.flag_sets.push(flags);
        } else {
            out.push(Permutation {
                lines,
                flag_sets: vec![flags],
            });
        }
    }

    out
}

#[derive(Clone, Debug)]
pub struct ConditionedLine {
    pub line: u32,
    /// Every flag assignment under which this line appears, in merge
    /// order.
    pub condition: Vec<FlagSet>,
}

/// Folds all permutations into one conditioned line sequence.
pub fn merge_permutations(perms: &[Permutation]) -> Vec<ConditionedLine> {
    let mut merged: Vec<ConditionedLine> = Vec::new();

    for (i, perm) in perms.iter().enumerate() {
        if i == 0 {
            merged = perm
                .lines
                .iter()
                .map(|&line| ConditionedLine {
                    line,
                    condition: perm.flag_sets.clone(),
                })
                .collect();
            continue;
        }

        let old: Vec<u32> = merged.iter().map(|l| l.line).collect();
        let ops = capture_diff_slices(Algorithm::Myers, &old, &perm.lines);

        let mut next: Vec<ConditionedLine> = Vec::new();
        for op in ops {
            match op {
                DiffOp::Equal {
                    old_index,
                    new_index: _,
                    len,
                } => {
                    for k in 0..len {
                        let mut line = merged[old_index + k].clone();
                        line.condition.extend(perm.flag_sets.iter().cloned());
                        next.push(line);
                    }
                }
                DiffOp::Delete {
                    old_index, old_len, ..
                } => {
                    for k in 0..old_len {
                        next.push(merged[old_index + k].clone());
                    }
                }
                DiffOp::Insert {
                    new_index, new_len, ..
                } => {
                    for k in 0..new_len {
                        next.push(ConditionedLine {
                            line: perm.lines[new_index + k],
                            condition: perm.flag_sets.clone(),
                        });
                    }
                }
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => {
                    for k in 0..old_len {
                        next.push(merged[old_index + k].clone());
                    }
                    for k in 0..new_len {
                        next.push(ConditionedLine {
                            line: perm.lines[new_index + k],
                            condition: perm.flag_sets.clone(),
                        });
                    }
                }
            }
        }

        merged = next;
    }

    merged
}

/// Checks the fold invariant: selecting the merged lines whose condition
/// contains a permutation's flags reproduces that permutation exactly.
pub fn verify_merge(
    merged: &[ConditionedLine],
    perms: &[Permutation],
) -> Result<(), DecompilerError> {
    for perm in perms {
        for flags in &perm.flag_sets {
            let selected: Vec<u32> = merged
                .iter()
                .filter(|line| line.condition.contains(flags))
                .map(|line| line.line)
                .collect();

            if selected != perm.lines {
                return Err(DecompilerError::DiffInconsistency(format!("{flags:?}")));
            }
        }
    }

    Ok(())
}

/// Consecutive lines under the same condition.
#[derive(Clone, Debug)]
pub struct LineGroup {
    pub lines: Vec<u32>,
    pub condition: Vec<FlagSet>,
}

pub fn group_lines(merged: Vec<ConditionedLine>) -> Vec<LineGroup> {
    let mut groups: Vec<LineGroup> = Vec::new();

    for line in merged {
        match groups.last_mut() {
            Some(group) if group.condition == line.condition => {
                group.lines.push(line.line);
            }
            _ => groups.push(LineGroup {
                lines: vec![line.line],
                condition: line.condition,
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::{
        dedup_permutations, group_lines, merge_permutations, verify_merge, LineTable,
    };
    use crate::search::FlagSet;

    fn flags(pairs: &[(&str, &str)]) -> FlagSet {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn line_table_dedups() {
        let mut table = LineTable::new();
        let ids = table.encode("a\nb\na");
        assert_eq!(ids, [0, 1, 0]);
        assert_eq!(table.decode(1), "b");
    }

    #[test]
    fn identical_bodies_merge_flags() {
        let mut table = LineTable::new();
        let body = table.encode("x\ny");

        let perms = dedup_permutations(vec![
            (body.clone(), flags(&[("F", "On")])),
            (body.clone(), flags(&[("F", "Off")])),
        ]);

        assert_eq!(perms.len(), 1);
        assert_eq!(perms[0].flag_sets.len(), 2);
    }

    #[test]
    fn diamond_merge() {
        let mut table = LineTable::new();
        let on = table.encode("head\nextra\ntail");
        let off = table.encode("head\ntail");

        let perms = dedup_permutations(vec![
            (on, flags(&[("X", "On")])),
            (off, flags(&[("X", "Off")])),
        ]);

        let merged = merge_permutations(&perms);
        verify_merge(&merged, &perms).unwrap();

        assert_eq!(merged.len(), 3);
        // head and tail appear under both assignments, extra only under On.
        assert_eq!(merged[0].condition.len(), 2);
        assert_eq!(merged[1].condition, vec![flags(&[("X", "On")])]);
        assert_eq!(merged[2].condition.len(), 2);

        let groups = group_lines(merged);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn replace_keeps_both_sides() {
        let mut table = LineTable::new();
        let a = table.encode("common\nvariant a\nend");
        let b = table.encode("common\nvariant b\nend");

        let perms = dedup_permutations(vec![
            (a, flags(&[("V", "A")])),
            (b, flags(&[("V", "B")])),
        ]);

        let merged = merge_permutations(&perms);
        verify_merge(&merged, &perms).unwrap();
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn three_way_merge_preserves_order() {
        let mut table = LineTable::new();
        let p1 = table.encode("a\nb\nc");
        let p2 = table.encode("a\nc");
        let p3 = table.encode("a\nb\nc\nd");

        let perms = dedup_permutations(vec![
            (p1, flags(&[("M", "1")])),
            (p2, flags(&[("M", "2")])),
            (p3, flags(&[("M", "3")])),
        ]);

        let merged = merge_permutations(&perms);
        verify_merge(&merged, &perms).unwrap();
    }
}
