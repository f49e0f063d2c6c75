//! Read-only consistency check.
//!
//! The block bitmap is rebuilt from the inode table alone and compared with
//! the stored one, then the tree is walked from the root to count the entries
//! naming each inode. Findings are reported, never repaired.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use tracing::warn;

use crate::error::FsResult;
use crate::layout::bits::Bitmap;
use crate::layout::constants::{DIRECT_PTRS, MAX_FILE_BLOCKS, ROOT_INO};
use crate::layout::inode::{Inode, read_u32};
use crate::layout::{BlockId, InodeId, empty_block};
use crate::retention::disk::BlockDevice;

use super::VolumeFs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsckProblem {
    /// Marked allocated but owned by no live inode.
    LeakedBlock(BlockId),
    /// Owned by a live inode but marked free.
    UnmarkedBlock(BlockId),
    DoubleReferenced {
        block: BlockId,
        first: InodeId,
        second: InodeId,
    },
    BadBlockPointer {
        ino: InodeId,
        index: usize,
        block: BlockId,
    },
    OversizedInode {
        ino: InodeId,
        size: u64,
    },
    /// Inode bitmap and table slot disagree.
    InodeBitmapMismatch {
        ino: InodeId,
        marked: bool,
    },
    LinkCountMismatch {
        ino: InodeId,
        recorded: u32,
        counted: u32,
    },
    DanglingEntry {
        dir: InodeId,
        name: String,
        ino: InodeId,
    },
    KindMismatch {
        dir: InodeId,
        name: String,
        ino: InodeId,
    },
    BadSelf {
        dir: InodeId,
    },
    BadParent {
        dir: InodeId,
        recorded: InodeId,
        expected: InodeId,
    },
    UnreadableDirectory {
        dir: InodeId,
        detail: String,
    },
    MissingRoot,
    /// Live but unreachable from the root.
    Orphan(InodeId),
}

impl fmt::Display for FsckProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeakedBlock(block) => write!(f, "block {block} allocated but unused"),
            Self::UnmarkedBlock(block) => write!(f, "block {block} in use but marked free"),
            Self::DoubleReferenced {
                block,
                first,
                second,
            } => write!(f, "block {block} owned by inodes {first} and {second}"),
            Self::BadBlockPointer { ino, index, block } => {
                write!(f, "inode {ino} block {index} points at invalid block {block}")
            }
            Self::OversizedInode { ino, size } => {
                write!(f, "inode {ino} size {size} exceeds the addressable maximum")
            }
            Self::InodeBitmapMismatch { ino, marked: true } => {
                write!(f, "inode {ino} marked live but its slot is empty")
            }
            Self::InodeBitmapMismatch { ino, marked: false } => {
                write!(f, "inode {ino} slot in use but marked free")
            }
            Self::LinkCountMismatch {
                ino,
                recorded,
                counted,
            } => write!(f, "inode {ino} records {recorded} links, {counted} found"),
            Self::DanglingEntry { dir, name, ino } => {
                write!(f, "entry {name:?} in directory {dir} names free inode {ino}")
            }
            Self::KindMismatch { dir, name, ino } => {
                write!(f, "entry {name:?} in directory {dir} has the wrong kind for inode {ino}")
            }
            Self::BadSelf { dir } => write!(f, "directory {dir} lacks a leading \".\" record"),
            Self::BadParent {
                dir,
                recorded,
                expected,
            } => write!(f, "directory {dir} \"..\" names {recorded}, expected {expected}"),
            Self::UnreadableDirectory { dir, detail } => {
                write!(f, "directory {dir} unreadable: {detail}")
            }
            Self::MissingRoot => write!(f, "root directory missing"),
            Self::Orphan(ino) => write!(f, "inode {ino} unreachable from root"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FsckReport {
    pub problems: Vec<FsckProblem>,
    /// Block bitmap implied by the live inodes.
    pub expected_bitmap: Bitmap,
    pub inodes_checked: u32,
    pub blocks_in_use: u32,
}

impl FsckReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

impl<D: BlockDevice> VolumeFs<D> {
    /// # Errors
    /// Only device errors; inconsistencies land in the report.
    pub fn fsck(&self) -> FsResult<FsckReport> {
        let mut problems = Vec::new();

        let mut live = BTreeMap::new();
        for ino in 1..=self.inodes.capacity() {
            let marked = self.inodes.is_live(ino);
            match (marked, self.inodes.read_slot(&self.store, ino)?) {
                (true, Some(inode)) => {
                    live.insert(ino, inode);
                }
                (false, None) => {}
                (marked, _) => problems.push(FsckProblem::InodeBitmapMismatch { ino, marked }),
            }
        }

        let mut expected = Bitmap::new(self.store.capacity());
        let mut owner = BTreeMap::new();
        for (&ino, inode) in &live {
            for block in self.block_refs(ino, inode, &mut problems)? {
                if expected.set(block, true) {
                    problems.push(FsckProblem::DoubleReferenced {
                        block,
                        first: owner.get(&block).copied().unwrap_or_default(),
                        second: ino,
                    });
                } else {
                    owner.insert(block, ino);
                }
            }
        }
        for block in 0..self.store.capacity() {
            match (self.store.is_allocated(block), expected.get(block)) {
                (true, false) => problems.push(FsckProblem::LeakedBlock(block)),
                (false, true) => problems.push(FsckProblem::UnmarkedBlock(block)),
                _ => {}
            }
        }

        let (counted, reached) = self.walk_tree(&live, &mut problems);
        if !live.contains_key(&ROOT_INO) {
            problems.push(FsckProblem::MissingRoot);
        }
        for (&ino, inode) in &live {
            let counted = counted.get(&ino).copied().unwrap_or(0);
            if counted != inode.nlink {
                problems.push(FsckProblem::LinkCountMismatch {
                    ino,
                    recorded: inode.nlink,
                    counted,
                });
            }
            if !reached.contains(&ino) {
                problems.push(FsckProblem::Orphan(ino));
            }
        }

        for problem in &problems {
            warn!(%problem, "fsck");
        }
        Ok(FsckReport {
            problems,
            blocks_in_use: expected.count_set(),
            expected_bitmap: expected,
            inodes_checked: live.len() as u32,
        })
    }

    /// Blocks `inode` holds, indirection block included. Pointers outside the
    /// data region are reported and skipped.
    fn block_refs(
        &self,
        ino: InodeId,
        inode: &Inode,
        problems: &mut Vec<FsckProblem>,
    ) -> FsResult<Vec<BlockId>> {
        let capacity = self.store.capacity();
        let mut count = inode.block_count();
        if count > MAX_FILE_BLOCKS {
            problems.push(FsckProblem::OversizedInode {
                ino,
                size: inode.size,
            });
            count = MAX_FILE_BLOCKS;
        }

        let mut refs = Vec::with_capacity(count + 1);
        let mut check = |index: usize, block: BlockId, refs: &mut Vec<BlockId>| {
            if block < capacity {
                refs.push(block);
            } else {
                problems.push(FsckProblem::BadBlockPointer { ino, index, block });
            }
        };
        for index in 0..count.min(DIRECT_PTRS) {
            check(index, inode.direct[index], &mut refs);
        }
        if count > DIRECT_PTRS {
            if inode.indirect < capacity {
                refs.push(inode.indirect);
                let mut table = empty_block();
                self.store.read(inode.indirect, &mut table)?;
                for index in DIRECT_PTRS..count {
                    check(index, read_u32(&table, (index - DIRECT_PTRS) * 4), &mut refs);
                }
            } else {
                check(DIRECT_PTRS, inode.indirect, &mut refs);
            }
        }
        Ok(refs)
    }

    /// Breadth-first walk from the root. Returns the non-"." entry count per
    /// inode and the set of inodes reached.
    fn walk_tree(
        &self,
        live: &BTreeMap<InodeId, Inode>,
        problems: &mut Vec<FsckProblem>,
    ) -> (BTreeMap<InodeId, u32>, BTreeSet<InodeId>) {
        let mut counted: BTreeMap<InodeId, u32> = BTreeMap::new();
        let mut reached = BTreeSet::from([ROOT_INO]);
        let mut queue = VecDeque::from([(ROOT_INO, ROOT_INO)]);

        while let Some((dir, parent)) = queue.pop_front() {
            let Some(inode) = live.get(&dir) else {
                continue;
            };
            let entries = match self.entries_of(inode) {
                Ok(entries) => entries,
                Err(err) => {
                    problems.push(FsckProblem::UnreadableDirectory {
                        dir,
                        detail: err.to_string(),
                    });
                    continue;
                }
            };
            match entries.first() {
                Some(first) if first.name == "." && first.inode == dir => {}
                _ => problems.push(FsckProblem::BadSelf { dir }),
            }
            match entries.get(1) {
                Some(second) if second.name == ".." && second.inode == parent => {}
                other => problems.push(FsckProblem::BadParent {
                    dir,
                    recorded: other
                        .filter(|entry| entry.name == "..")
                        .map_or(0, |entry| entry.inode),
                    expected: parent,
                }),
            }

            for entry in entries.iter().filter(|entry| entry.name != ".") {
                *counted.entry(entry.inode).or_default() += 1;
                let Some(target) = live.get(&entry.inode) else {
                    problems.push(FsckProblem::DanglingEntry {
                        dir,
                        name: entry.name.clone(),
                        ino: entry.inode,
                    });
                    continue;
                };
                if target.kind != entry.kind {
                    problems.push(FsckProblem::KindMismatch {
                        dir,
                        name: entry.name.clone(),
                        ino: entry.inode,
                    });
                }
                if entry.name != ".." && reached.insert(entry.inode) && target.is_dir() {
                    queue.push_back((entry.inode, dir));
                }
            }
        }
        (counted, reached)
    }
}
