use std::io::SeekFrom;

use super::*;
use crate::error::FsError;
use crate::layout::constants::{
    BLOCK_SIZE, DIRENT_SIZE, MAX_FILE_SIZE, MAX_NAME_LEN, MAX_OPEN_FILES,
};
use crate::retention::disk::{Disk, MemDisk};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

const ROOT: InodeId = ROOT_INO;

fn fresh() -> VolumeFs<MemDisk> {
    VolumeFs::format(MemDisk::new(DEFAULT_TOTAL_BLOCKS), Geometry::default()).expect("format")
}

fn small(total_blocks: u32, inode_count: u32) -> VolumeFs<MemDisk> {
    let geometry = Geometry {
        total_blocks,
        inode_count,
    };
    VolumeFs::format(MemDisk::new(total_blocks), geometry).expect("format")
}

fn names(fs: &VolumeFs<MemDisk>, dir: InodeId) -> Vec<String> {
    fs.list(dir)
        .expect("list")
        .into_iter()
        .map(|entry| entry.name)
        .collect()
}

fn assert_clean(fs: &VolumeFs<MemDisk>) {
    let report = fs.fsck().expect("fsck");
    assert!(report.is_clean(), "fsck problems: {:?}", report.problems);
}

fn write_file(fs: &mut VolumeFs<MemDisk>, path: &str, data: &[u8]) -> InodeId {
    let ino = fs.open_append(ROOT, path).expect("open_append");
    fs.append(ino, data).expect("append");
    ino
}

#[test]
fn format_creates_root_with_dot_entries() {
    let fs = fresh();
    let entries = fs.list(ROOT).expect("list");
    assert_eq!(
        entries,
        vec![
            DirEntry::new(ROOT, NodeKind::Dir, "."),
            DirEntry::new(ROOT, NodeKind::Dir, ".."),
        ]
    );
    let stat = fs.stat(ROOT, "/").expect("stat");
    assert_eq!(stat.kind, NodeKind::Dir);
    assert_eq!(stat.links, 1);
    assert_eq!(stat.blocks, 1);
    assert_eq!(fs.free_inodes(), DEFAULT_INODE_COUNT - 1);
    assert_clean(&fs);
}

#[test]
fn mkdir_maintains_link_counts() {
    let mut fs = fresh();
    let a = fs.mkdir(ROOT, "a").expect("mkdir a");
    let b = fs.mkdir(ROOT, "a/b").expect("mkdir a/b");

    assert_eq!(fs.stat_inode(ROOT).expect("root").links, 2);
    assert_eq!(fs.stat_inode(a).expect("a").links, 2);
    assert_eq!(fs.stat_inode(b).expect("b").links, 1);
    assert_eq!(fs.lookup(b, "..").expect(".."), a);
    assert_eq!(names(&fs, a), vec![".", "..", "b"]);
    assert_clean(&fs);
}

#[test]
fn creation_rejects_bad_and_duplicate_names() {
    let mut fs = fresh();
    fs.mkdir(ROOT, "dir").expect("mkdir");
    write_file(&mut fs, "file", b"x\n");

    assert!(matches!(fs.mkdir(ROOT, "."), Err(FsError::InvalidName)));
    assert!(matches!(fs.mkdir(ROOT, ".."), Err(FsError::InvalidName)));
    assert!(matches!(fs.mkdir(ROOT, "dir/.."), Err(FsError::InvalidName)));
    assert!(matches!(fs.mkdir(ROOT, "/"), Err(FsError::InvalidName)));
    assert!(matches!(fs.mkdir(ROOT, ""), Err(FsError::InvalidName)));
    assert!(matches!(fs.mkdir(ROOT, "dir"), Err(FsError::NameExists)));
    assert!(matches!(fs.mkdir(ROOT, "file"), Err(FsError::NameExists)));
    assert!(matches!(
        fs.mkdir(ROOT, &"n".repeat(MAX_NAME_LEN + 1)),
        Err(FsError::NameTooLong)
    ));
    assert!(matches!(fs.mkdir(ROOT, "file/sub"), Err(FsError::NotADirectory)));
    assert!(matches!(fs.mkdir(ROOT, "nope/sub"), Err(FsError::NotFound)));
    assert!(matches!(
        fs.create(ROOT, "dir/slash", NodeKind::Dir),
        Err(FsError::InvalidName)
    ));
    assert_eq!(names(&fs, ROOT), vec![".", "..", "dir", "file"]);
    assert_eq!(names(&fs, fs.resolve(ROOT, "dir").expect("dir")), vec![".", ".."]);
    assert_clean(&fs);
}

#[test]
fn rmdir_rules_and_inode_reuse() {
    let mut fs = fresh();
    let dir = fs.mkdir(ROOT, "dir").expect("mkdir");
    fs.mkdir(ROOT, "dir/inner").expect("mkdir inner");
    write_file(&mut fs, "file", b"x\n");

    assert!(matches!(fs.rmdir_at(ROOT, "file"), Err(FsError::NotADirectory)));
    assert!(matches!(fs.rmdir_at(ROOT, "."), Err(FsError::InvalidName)));
    assert!(matches!(fs.rmdir_at(ROOT, "dir/.."), Err(FsError::InvalidName)));
    assert!(matches!(fs.rmdir_at(ROOT, "ghost"), Err(FsError::NotFound)));
    assert!(matches!(
        fs.rmdir_at(ROOT, "dir"),
        Err(FsError::DirectoryNotEmpty)
    ));

    fs.rmdir_at(ROOT, "dir/inner").expect("rmdir inner");
    assert_eq!(fs.stat_inode(dir).expect("dir").links, 1);
    fs.rmdir_at(ROOT, "dir").expect("rmdir dir");
    assert!(!fs.is_live(dir));
    assert_eq!(fs.stat_inode(ROOT).expect("root").links, 1);
    assert!(matches!(fs.resolve(ROOT, "dir"), Err(FsError::NotFound)));

    let again = fs.mkdir(ROOT, "dir2").expect("mkdir dir2");
    assert_eq!(again, dir, "lowest free inode is reused");
    assert_clean(&fs);
}

#[test]
fn append_and_read_back() {
    let mut fs = fresh();
    let ino = fs.open_append(ROOT, "text").expect("open");
    assert_eq!(fs.append(ino, b"ABCD\n").expect("append"), 5);

    let stat = fs.stat(ROOT, "text").expect("stat");
    assert_eq!((stat.kind, stat.links, stat.size), (NodeKind::File, 1, 5));
    assert_eq!(fs.read_path(ROOT, "/text").expect("read"), b"ABCD\n");

    let same = fs.open_append(ROOT, "text").expect("reopen");
    assert_eq!(same, ino, "existing file is opened, not recreated");
    fs.append(ino, b"EF\n").expect("append");
    assert_eq!(fs.read_all(ino).expect("read"), b"ABCD\nEF\n");
    assert_clean(&fs);
}

#[test]
fn file_operations_reject_directories() {
    let mut fs = fresh();
    let dir = fs.mkdir(ROOT, "dir").expect("mkdir");

    assert!(matches!(fs.open_append(ROOT, "dir"), Err(FsError::NotAFile)));
    assert!(matches!(fs.open_append(ROOT, "."), Err(FsError::InvalidName)));
    assert!(matches!(fs.open_append(ROOT, "dir/.."), Err(FsError::InvalidName)));
    assert!(matches!(fs.open_append(ROOT, "/"), Err(FsError::InvalidName)));
    assert!(matches!(fs.append(dir, b"x"), Err(FsError::NotAFile)));
    assert!(matches!(fs.read_all(dir), Err(FsError::NotAFile)));
    assert!(matches!(fs.link_at(ROOT, "dir", "alias"), Err(FsError::IsADirectory)));
    assert!(matches!(fs.unlink_at(ROOT, "dir"), Err(FsError::IsADirectory)));
    assert!(matches!(fs.unlink_at(ROOT, "."), Err(FsError::IsADirectory)));
    assert_clean(&fs);
}

#[test]
fn hard_link_outlives_first_name() {
    let mut fs = fresh();
    let ino = write_file(&mut fs, "text", b"ABCD\n");
    let free_blocks = fs.free_blocks();

    fs.link_at(ROOT, "text", "copy").expect("ln");
    assert_eq!(fs.stat(ROOT, "copy").expect("stat").links, 2);
    assert!(matches!(fs.link_at(ROOT, "text", "copy"), Err(FsError::NameExists)));

    fs.unlink_at(ROOT, "text").expect("rm text");
    assert_eq!(fs.read_path(ROOT, "copy").expect("more"), b"ABCD\n");
    assert_eq!(fs.stat_inode(ino).expect("stat").links, 1);

    fs.unlink_at(ROOT, "copy").expect("rm copy");
    assert!(matches!(fs.resolve(ROOT, "copy"), Err(FsError::NotFound)));
    assert!(!fs.is_live(ino));
    assert_eq!(fs.free_blocks(), free_blocks + 1);
    assert!(matches!(fs.unlink_at(ROOT, "copy"), Err(FsError::NotFound)));
    assert_clean(&fs);
}

#[test]
fn dot_segments_and_relative_paths() {
    let mut fs = fresh();
    fs.mkdir(ROOT, "a").expect("a");
    fs.mkdir(ROOT, "a/b").expect("b");
    let c = fs.mkdir(ROOT, "/a/b/c").expect("c");

    assert_eq!(fs.resolve(ROOT, "/./.././../.././.").expect("dots"), ROOT);
    assert_eq!(fs.resolve(ROOT, "a/b/c").expect("rel"), c);
    assert_eq!(fs.resolve(ROOT, "/a/b/c").expect("abs"), c);
    assert_eq!(fs.resolve(ROOT, "a//b///c/").expect("slashes"), c);
    assert_eq!(fs.resolve(c, "../../..").expect("up"), ROOT);
    assert_eq!(fs.resolve(c, "/").expect("root"), ROOT);
    assert_eq!(fs.path_of(c).expect("path"), "/a/b/c");
    assert_eq!(fs.path_of(ROOT).expect("path"), "/");

    write_file(&mut fs, "a/file", b"x\n");
    assert!(matches!(fs.resolve(ROOT, "a/file/x"), Err(FsError::NotADirectory)));
    assert!(matches!(fs.chdir(ROOT, "a/file"), Err(FsError::NotADirectory)));
    assert!(matches!(fs.chdir(ROOT, "a/none"), Err(FsError::NotFound)));
}

#[test]
fn deep_nesting() {
    let mut fs = fresh();
    let mut cwd = ROOT;
    for level in 0..60 {
        cwd = fs.mkdir(cwd, &format!("d{level}")).expect("mkdir");
    }
    let path: String = (0..60).map(|level| format!("/d{level}")).collect();
    assert_eq!(fs.resolve(ROOT, &path).expect("resolve"), cwd);
    assert_eq!(fs.path_of(cwd).expect("path_of"), path);
    assert_clean(&fs);
}

#[test]
fn large_directory_spans_blocks_and_shrinks_back() {
    let mut fs = fresh();
    let free_blocks = fs.free_blocks();
    let mut inodes = Vec::new();
    for i in 0..45 {
        inodes.push(write_file(&mut fs, &format!("file{i}"), b"x\n"));
    }

    let root = fs.stat_inode(ROOT).expect("stat");
    assert_eq!(root.size, 47 * DIRENT_SIZE as u64);
    assert_eq!(root.blocks, 3);
    assert_eq!(fs.list(ROOT).expect("list").len(), 47);
    for (i, ino) in inodes.iter().enumerate() {
        assert_eq!(fs.resolve(ROOT, &format!("/file{i}")).expect("resolve"), *ino);
    }
    assert_clean(&fs);

    for i in 0..45 {
        fs.unlink_at(ROOT, &format!("file{i}")).expect("rm");
    }
    assert_eq!(fs.stat_inode(ROOT).expect("stat").blocks, 1);
    assert_eq!(fs.free_blocks(), free_blocks);
    assert_eq!(names(&fs, ROOT), vec![".", ".."]);
    assert_clean(&fs);
}

#[test]
fn removal_moves_last_record_into_the_gap() {
    let mut fs = fresh();
    for name in ["a", "b", "c", "d"] {
        fs.mkdir(ROOT, name).expect("mkdir");
    }
    fs.rmdir_at(ROOT, "b").expect("rmdir");
    assert_eq!(names(&fs, ROOT), vec![".", "..", "a", "d", "c"]);
    fs.rmdir_at(ROOT, "c").expect("rmdir last");
    assert_eq!(names(&fs, ROOT), vec![".", "..", "a", "d"]);
}

#[test]
fn large_file_uses_the_indirection_block() {
    let mut fs = fresh();
    let free_blocks = fs.free_blocks();
    let data: Vec<u8> = (0..20 * BLOCK_SIZE + 100).map(|i| (i % 251) as u8).collect();
    let ino = write_file(&mut fs, "big", &data);

    let stat = fs.stat_inode(ino).expect("stat");
    assert_eq!(stat.size, data.len() as u64);
    assert_eq!(stat.blocks, 21 + 1, "21 data blocks plus the indirection block");
    assert_eq!(fs.read_all(ino).expect("read"), data);
    assert_clean(&fs);

    fs.unlink_at(ROOT, "big").expect("rm");
    assert_eq!(fs.free_blocks(), free_blocks);
    assert_clean(&fs);
}

#[test]
fn oversized_append_changes_nothing() {
    let mut fs = fresh();
    let ino = write_file(&mut fs, "f", b"seed\n");
    let free_blocks = fs.free_blocks();

    let huge = vec![0u8; MAX_FILE_SIZE as usize];
    assert!(matches!(fs.append(ino, &huge), Err(FsError::FileTooLarge)));
    assert_eq!(fs.stat_inode(ino).expect("stat").size, 5);
    assert_eq!(fs.free_blocks(), free_blocks);
    assert_clean(&fs);
}

#[test]
fn running_out_of_blocks_leaves_volume_untouched() {
    let mut fs = small(48, 16);
    let ino = fs.open_append(ROOT, "big").expect("open");
    let chunk = [b'z'; BLOCK_SIZE];
    let err = loop {
        if let Err(err) = fs.append(ino, &chunk) {
            break err;
        }
    };
    assert!(matches!(err, FsError::OutOfSpace));
    assert_eq!(fs.free_blocks(), 0);
    let size = fs.stat_inode(ino).expect("stat").size;
    assert_eq!(size % BLOCK_SIZE as u64, 0);

    let free_inodes = fs.free_inodes();
    assert!(matches!(fs.mkdir(ROOT, "dir"), Err(FsError::OutOfSpace)));
    assert_eq!(fs.free_inodes(), free_inodes);
    assert!(matches!(fs.resolve(ROOT, "dir"), Err(FsError::NotFound)));
    assert!(matches!(fs.append(ino, b"x"), Err(FsError::OutOfSpace)));
    assert_eq!(fs.stat_inode(ino).expect("stat").size, size);
    assert_clean(&fs);

    fs.unlink_at(ROOT, "big").expect("rm");
    fs.mkdir(ROOT, "dir").expect("space is back");
    assert_clean(&fs);
}

#[test]
fn running_out_of_inodes_leaves_volume_untouched() {
    let mut fs = small(64, 8);
    for i in 0..7 {
        fs.open_append(ROOT, &format!("f{i}")).expect("create");
    }
    let free_blocks = fs.free_blocks();
    assert!(matches!(fs.open_append(ROOT, "one-more"), Err(FsError::OutOfSpace)));
    assert!(matches!(fs.mkdir(ROOT, "dir"), Err(FsError::OutOfSpace)));
    assert_eq!(fs.free_blocks(), free_blocks);
    assert_eq!(fs.list(ROOT).expect("list").len(), 9);
    assert_clean(&fs);
}

#[test]
fn image_persists_across_remounts() {
    let tf = NamedTempFile::new().expect("tmp file");
    let geometry = Geometry {
        total_blocks: 256,
        inode_count: 32,
    };
    {
        let disk = Disk::open_prealloc(tf.path(), 256 * BLOCK_SIZE as u64).expect("open");
        let mut fs = VolumeFs::mount_or_format(disk, geometry).expect("format");
        fs.mkdir(ROOT, "docs").expect("mkdir");
        let ino = fs.open_append(ROOT, "docs/note").expect("open");
        fs.append(ino, b"hello\n").expect("append");
        fs.flush().expect("flush");
    }

    let disk = Disk::open_prealloc(tf.path(), 256 * BLOCK_SIZE as u64).expect("reopen");
    let fs = VolumeFs::mount_or_format(disk, Geometry::default()).expect("mount");
    assert_eq!(fs.superblock().total_blocks, 256, "existing volume is not reformatted");
    assert_eq!(fs.read_path(ROOT, "/docs/note").expect("read"), b"hello\n");
    let report = fs.fsck().expect("fsck");
    assert!(report.is_clean(), "{:?}", report.problems);
    assert_eq!(report.inodes_checked, 3);
}

#[test]
fn damaged_superblock_is_not_reformatted() {
    let mut disk = fresh().into_device();
    let mut block = empty_block();
    disk.read_block(0, &mut block).expect("read");
    block[12] ^= 0x01;
    disk.write_block(0, &block).expect("write");

    assert!(VolumeFs::mount_or_format(disk.clone(), Geometry::default()).is_err());
    let mut after = empty_block();
    disk.read_block(0, &mut after).expect("read");
    assert_eq!(after, block);
}

#[test]
fn geometry_must_fit_the_device() {
    assert!(VolumeFs::format(MemDisk::new(100), Geometry::default()).is_err());
    assert!(VolumeFs::format(MemDisk::new(4), Geometry {
        total_blocks: 4,
        inode_count: 8,
    })
    .is_err());
}

#[test]
fn fsck_reports_tampering() {
    let mut fs = fresh();
    let ino = write_file(&mut fs, "f", b"data\n");
    let block = fs.owned_blocks(&fs.load_inode(ino).expect("inode")).expect("blocks")[0];

    fs.store.free(block).expect("free behind the engine's back");
    let report = fs.fsck().expect("fsck");
    assert!(report.problems.contains(&FsckProblem::UnmarkedBlock(block)));
    assert!(report.expected_bitmap.get(block));

    let mut fs = fresh();
    let ino = write_file(&mut fs, "f", b"data\n");
    let mut inode = fs.load_inode(ino).expect("inode");
    inode.nlink = 3;
    fs.store_inode(ino, &inode).expect("put");
    let report = fs.fsck().expect("fsck");
    assert_eq!(
        report.problems,
        vec![FsckProblem::LinkCountMismatch {
            ino,
            recorded: 3,
            counted: 1,
        }]
    );
}

#[test]
fn fsck_reports_leaked_blocks() {
    let mut fs = fresh();
    let leaked = fs.store.allocate().expect("allocate");
    let report = fs.fsck().expect("fsck");
    assert_eq!(report.problems, vec![FsckProblem::LeakedBlock(leaked)]);
    assert_eq!(report.blocks_in_use, 1);
}

fn tolerate<T>(result: FsResult<T>) {
    if let Err(err) = result {
        assert!(!err.is_fatal(), "fatal error: {err}");
    }
}

#[test]
fn random_operations_keep_the_volume_consistent() {
    let mut fs = small(512, 64);
    fs.mkdir(ROOT, "p").expect("p");
    fs.mkdir(ROOT, "p/q").expect("q");

    let parents = ["/", "/p/", "/p/q/"];
    let leaves = ["a", "b", "c", "d"];
    let mut rng = StdRng::seed_from_u64(0x1f5_2201);

    for step in 0..400 {
        let path = format!(
            "{}{}",
            parents[rng.random_range(0..parents.len())],
            leaves[rng.random_range(0..leaves.len())]
        );
        match rng.random_range(0..5) {
            0 => tolerate(fs.mkdir(ROOT, &path)),
            1 => {
                if let Ok(ino) = fs.open_append(ROOT, &path) {
                    let len = rng.random_range(1..3 * BLOCK_SIZE);
                    tolerate(fs.append(ino, &vec![b'r'; len]));
                }
            }
            2 => tolerate(fs.unlink_at(ROOT, &path)),
            3 => tolerate(fs.rmdir_at(ROOT, &path)),
            _ => {
                let other = format!("/{}", leaves[rng.random_range(0..leaves.len())]);
                tolerate(fs.link_at(ROOT, &path, &other));
            }
        }
        let report = fs.fsck().expect("fsck");
        assert!(report.is_clean(), "step {step}: {:?}", report.problems);
        assert_eq!(
            report.blocks_in_use + fs.free_blocks(),
            fs.superblock().data_blocks
        );
    }
}

#[test]
fn descriptors_read_and_write_from_their_position() {
    let mut fs = fresh();
    let mut files = FileTable::default();
    let fd = fs
        .open(&mut files, ROOT, "notes", OpenMode::READ_WRITE.create())
        .expect("open");
    assert_eq!(fd, 0);
    assert_eq!(fs.write(&mut files, fd, b"hello world").expect("write"), 11);

    assert_eq!(fs.seek(&mut files, fd, SeekFrom::Start(6)).expect("seek"), 6);
    assert_eq!(fs.read(&mut files, fd, 3).expect("read"), b"wor");
    assert_eq!(fs.seek(&mut files, fd, SeekFrom::Current(-3)).expect("seek"), 6);
    fs.write(&mut files, fd, b"there").expect("overwrite");
    assert_eq!(fs.read_path(ROOT, "notes").expect("read"), b"hello there");

    assert_eq!(fs.seek(&mut files, fd, SeekFrom::End(-5)).expect("seek"), 6);
    assert_eq!(fs.read(&mut files, fd, 100).expect("read"), b"there");
    assert!(fs.read(&mut files, fd, 100).expect("read at end").is_empty());
    fs.close(&mut files, fd).expect("close");
    assert_eq!(files.open_count(), 0);
    assert_clean(&fs);
}

#[test]
fn descriptor_writes_cross_block_boundaries() {
    let mut fs = fresh();
    let mut files = FileTable::default();
    let mut rng = StdRng::seed_from_u64(11);
    let data: Vec<u8> = (0..BLOCK_SIZE * 12 + 7).map(|_| rng.random()).collect();

    let fd = fs
        .open(&mut files, ROOT, "big", OpenMode::WRITE.create())
        .expect("open");
    for chunk in data.chunks(300) {
        fs.write(&mut files, fd, chunk).expect("write");
    }
    let patch = vec![0xAB; BLOCK_SIZE + 10];
    let at = (BLOCK_SIZE * 9 + 100) as u64;
    fs.seek(&mut files, fd, SeekFrom::Start(at)).expect("seek");
    fs.write(&mut files, fd, &patch).expect("patch");
    fs.close(&mut files, fd).expect("close");

    let mut expected = data;
    expected[at as usize..at as usize + patch.len()].copy_from_slice(&patch);
    let reader = fs.open(&mut files, ROOT, "big", OpenMode::READ).expect("open");
    let mut read = Vec::new();
    loop {
        let chunk = fs.read(&mut files, reader, 700).expect("read");
        if chunk.is_empty() {
            break;
        }
        read.extend_from_slice(&chunk);
    }
    assert_eq!(read, expected);
    assert_clean(&fs);
}

#[test]
fn open_modes_gate_access() {
    let mut fs = fresh();
    let mut files = FileTable::default();
    write_file(&mut fs, "log", b"abc\n");
    fs.mkdir(ROOT, "dir").expect("mkdir");

    assert!(matches!(
        fs.open(&mut files, ROOT, "missing", OpenMode::READ),
        Err(FsError::NotFound)
    ));
    assert!(matches!(
        fs.open(&mut files, ROOT, "new", OpenMode::READ.create()),
        Err(FsError::NotPermitted)
    ));
    assert!(matches!(
        fs.open(&mut files, ROOT, "dir", OpenMode::READ),
        Err(FsError::NotAFile)
    ));
    assert!(matches!(
        fs.open(&mut files, ROOT, "..", OpenMode::WRITE.create()),
        Err(FsError::InvalidName)
    ));
    assert!(matches!(
        fs.open(&mut files, ROOT, ".", OpenMode::READ),
        Err(FsError::NotAFile)
    ));
    assert!(matches!(fs.lookup(ROOT, "new"), Err(FsError::NotFound)));
    assert_eq!(files.open_count(), 0);

    let reader = fs.open(&mut files, ROOT, "log", OpenMode::READ).expect("open");
    assert!(matches!(
        fs.write(&mut files, reader, b"x"),
        Err(FsError::NotPermitted)
    ));
    let writer = fs
        .open(&mut files, ROOT, "log", OpenMode::WRITE.append())
        .expect("open");
    assert_eq!(files.get(writer).map(|open| open.pos), Some(4));
    assert!(matches!(
        fs.read(&mut files, writer, 1),
        Err(FsError::NotPermitted)
    ));
    fs.write(&mut files, writer, b"def\n").expect("append");
    assert_eq!(fs.read(&mut files, reader, 100).expect("read"), b"abc\ndef\n");
}

#[test]
fn truncate_on_open_releases_blocks() {
    let mut fs = fresh();
    let mut files = FileTable::default();
    let before = fs.free_blocks();
    write_file(&mut fs, "big", &vec![7; BLOCK_SIZE * 11]);
    assert_eq!(fs.free_blocks(), before - 12);

    let fd = fs
        .open(&mut files, ROOT, "big", OpenMode::WRITE.truncate())
        .expect("open");
    assert_eq!(fs.free_blocks(), before);
    assert_eq!(fs.stat(ROOT, "big").expect("stat").size, 0);
    fs.write(&mut files, fd, b"short").expect("write");
    assert_eq!(fs.read_path(ROOT, "big").expect("read"), b"short");
    assert_clean(&fs);
}

#[test]
fn seek_stays_inside_the_file() {
    let mut fs = fresh();
    let mut files = FileTable::default();
    write_file(&mut fs, "f", b"0123456789");
    let fd = fs.open(&mut files, ROOT, "f", OpenMode::READ).expect("open");

    assert_eq!(fs.seek(&mut files, fd, SeekFrom::End(0)).expect("seek"), 10);
    for bad in [SeekFrom::Start(11), SeekFrom::Current(1), SeekFrom::End(-11)] {
        assert!(matches!(
            fs.seek(&mut files, fd, bad),
            Err(FsError::InvalidSeek)
        ));
    }
    assert_eq!(files.get(fd).map(|open| open.pos), Some(10));
}

#[test]
fn descriptor_table_has_fixed_capacity() {
    let mut fs = fresh();
    let mut files = FileTable::default();
    write_file(&mut fs, "f", b"x");
    for expected in 0..MAX_OPEN_FILES {
        let fd = fs.open(&mut files, ROOT, "f", OpenMode::READ).expect("open");
        assert_eq!(fd, expected);
    }
    assert!(matches!(
        fs.open(&mut files, ROOT, "f", OpenMode::READ),
        Err(FsError::TooManyOpenFiles)
    ));

    fs.close(&mut files, 3).expect("close");
    assert!(matches!(fs.close(&mut files, 3), Err(FsError::BadDescriptor)));
    assert!(matches!(
        fs.close(&mut files, MAX_OPEN_FILES),
        Err(FsError::BadDescriptor)
    ));
    assert_eq!(fs.open(&mut files, ROOT, "f", OpenMode::READ).expect("reopen"), 3);
}

#[test]
fn reclaimed_file_invalidates_its_descriptors() {
    let mut fs = fresh();
    let mut files = FileTable::default();
    write_file(&mut fs, "gone", b"data");
    let fd = fs.open(&mut files, ROOT, "gone", OpenMode::READ).expect("open");
    fs.unlink(ROOT, "gone").expect("unlink");
    assert!(matches!(fs.read(&mut files, fd, 4), Err(FsError::NotFound)));
    fs.close(&mut files, fd).expect("close");
    assert_clean(&fs);
}

#[test]
fn writer_behind_a_truncation_is_refused() {
    let mut fs = fresh();
    let mut files = FileTable::default();
    let writer = fs
        .open(&mut files, ROOT, "f", OpenMode::WRITE.create())
        .expect("open");
    fs.write(&mut files, writer, b"0123456789").expect("write");
    fs.open(&mut files, ROOT, "f", OpenMode::WRITE.truncate())
        .expect("truncate");
    assert!(matches!(
        fs.write(&mut files, writer, b"x"),
        Err(FsError::InvalidSeek)
    ));
    assert_eq!(fs.stat(ROOT, "f").expect("stat").size, 0);
    assert_clean(&fs);
}

#[test]
fn format_handles_a_bitmap_block_boundary() {
    let geometry = Geometry {
        total_blocks: 4132,
        inode_count: 256,
    };
    let fs = VolumeFs::format(MemDisk::new(4132), geometry).expect("format");
    assert_eq!(fs.superblock().block_bitmap_blocks, 2);
    assert_eq!(fs.superblock().data_blocks, 4096);
    assert_clean(&fs);
}
