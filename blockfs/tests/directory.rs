mod common;

use std::collections::BTreeSet;

use blockfs::{FsError, InodeType, BLOCK_SIZE, EXT_TABLE_LEN, NAME_MAX_LEN, ROOT_INODE};
use common::{format, format_with, hold_blocks, small, ticking_clock, tiny, usage, K};
use proptest::prelude::*;

fn entries(fs: &blockfs::BlockFileSystem, dir: u32) -> Vec<(u32, String)> {
    fs.read_dir(dir)
        .unwrap()
        .into_iter()
        .map(|entry| (entry.inode_id(), entry.name().to_owned()))
        .collect()
}

#[test]
fn hello_under_root() {
    let mut fs = format(small());
    let docs = fs.create(InodeType::Dir).unwrap();
    fs.add_to_dir(ROOT_INODE, docs, "docs").unwrap();

    let file = fs.create(InodeType::File).unwrap();
    fs.add_to_dir(ROOT_INODE, file, "a.txt").unwrap();
    fs.put(file, b"hello").unwrap();

    let listing = entries(&fs, ROOT_INODE);
    assert!(listing.contains(&(file, "a.txt".to_owned())));
    assert!(listing.contains(&(docs, "docs".to_owned())));
    assert_eq!(fs.get(file).unwrap(), b"hello");
    assert!(fs.read_dir(docs).unwrap().is_empty());
}

#[test]
fn overflowing_direct_slots() {
    let mut fs = format(small());
    let baseline = usage(&fs);

    let mut expected = BTreeSet::new();
    for i in 0..=K {
        let file = fs.create(InodeType::File).unwrap();
        let name = format!("f{i}");
        fs.add_to_dir(ROOT_INODE, file, &name).unwrap();
        expected.insert((file, name));
    }

    let listing: BTreeSet<_> = entries(&fs, ROOT_INODE).into_iter().collect();
    assert_eq!(listing, expected);
    assert_eq!(fs.getattr(ROOT_INODE).unwrap().size, ((K + 1) * BLOCK_SIZE) as u64);
    // K + 1 个目录项块与一个扩展表块；K + 1 个文件与一个子目录 inode
    assert_eq!(usage(&fs), (baseline.0 + K as u32 + 2, baseline.1 + K as u32 + 2));

    // 删掉第一项后扩展表变空，随之释放
    let (first, _) = entries(&fs, ROOT_INODE)[0].clone();
    fs.remove_from_dir(ROOT_INODE, first).unwrap();
    assert_eq!(usage(&fs), (baseline.0 + K as u32, baseline.1 + K as u32 + 1));
    assert_eq!(fs.read_dir(ROOT_INODE).unwrap().len(), K);
}

#[test]
fn removal_swaps_in_the_last_entry() {
    let mut fs = format(small());
    let files: Vec<u32> = (0..3)
        .map(|i| {
            let file = fs.create(InodeType::File).unwrap();
            fs.add_to_dir(ROOT_INODE, file, &format!("f{i}")).unwrap();
            file
        })
        .collect();

    fs.remove_from_dir(ROOT_INODE, files[0]).unwrap();
    assert_eq!(
        entries(&fs, ROOT_INODE),
        [(files[2], "f2".to_owned()), (files[1], "f1".to_owned())]
    );
    // 目录项被删除，inode 本身仍然存在
    assert_eq!(fs.getattr(files[0]).unwrap().kind, InodeType::File);
}

#[test]
fn large_directory_matches_swap_remove() {
    let mut fs = format(small());
    let child = fs.create(InodeType::File).unwrap();
    let baseline = usage(&fs);

    // 越过扩展表最后一项，使其继续扩展
    let count = K + EXT_TABLE_LEN * K + 2;
    let mut model: Vec<(u32, String)> = Vec::with_capacity(count);
    for i in 0..count {
        let name = format!("e{i}");
        fs.add_to_dir(ROOT_INODE, child, &name).unwrap();
        model.push((child, name));
    }
    assert_eq!(entries(&fs, ROOT_INODE), model);
    assert_eq!(fs.block_count(ROOT_INODE).unwrap(), count);

    for step in 0..count {
        fs.remove_from_dir(ROOT_INODE, child).unwrap();
        model.swap_remove(0);
        if step % 37 == 0 {
            assert_eq!(entries(&fs, ROOT_INODE), model, "step {step}");
        }
    }

    assert!(fs.read_dir(ROOT_INODE).unwrap().is_empty());
    assert_eq!(usage(&fs), baseline);
    assert_eq!(
        fs.remove_from_dir(ROOT_INODE, child),
        Err(FsError::NotFound(child))
    );
}

#[test]
fn failed_append_keeps_directory_intact() {
    let mut fs = format(tiny());
    let file = fs.create(InodeType::File).unwrap();
    for i in 0..K {
        fs.add_to_dir(ROOT_INODE, file, &format!("f{i}")).unwrap();
    }
    // 只够分配扩展表，子目录 inode 放不下目录项
    let _held = hold_blocks(&mut fs, 1);
    let before = usage(&fs);

    assert_eq!(fs.add_to_dir(ROOT_INODE, file, "extra"), Err(FsError::OutOfSpace));
    assert_eq!(usage(&fs), before);
    assert_eq!(fs.read_dir(ROOT_INODE).unwrap().len(), K);
    assert_eq!(fs.getattr(ROOT_INODE).unwrap().size, (K * BLOCK_SIZE) as u64);
}

#[test]
fn nested_directories() {
    let mut fs = format(small());
    let bin = fs.create(InodeType::Dir).unwrap();
    fs.add_to_dir(ROOT_INODE, bin, "bin").unwrap();
    let sh = fs.create(InodeType::File).unwrap();
    fs.add_to_dir(bin, sh, "sh").unwrap();

    assert_eq!(entries(&fs, ROOT_INODE), [(bin, "bin".to_owned())]);
    assert_eq!(entries(&fs, bin), [(sh, "sh".to_owned())]);
    assert_eq!(fs.getattr(bin).unwrap().size, BLOCK_SIZE as u64);
    assert_eq!(fs.getattr(bin).unwrap().mode(), 0o040000);
}

#[test]
fn entry_names() {
    let mut fs = format(small());
    let file = fs.create(InodeType::File).unwrap();

    assert_eq!(fs.add_to_dir(ROOT_INODE, file, ""), Err(FsError::InvalidName));
    assert_eq!(fs.add_to_dir(ROOT_INODE, file, "a\0b"), Err(FsError::InvalidName));
    let too_long = "x".repeat(NAME_MAX_LEN + 1);
    assert_eq!(fs.add_to_dir(ROOT_INODE, file, &too_long), Err(FsError::InvalidName));
    assert!(fs.read_dir(ROOT_INODE).unwrap().is_empty());

    let longest = "y".repeat(NAME_MAX_LEN);
    fs.add_to_dir(ROOT_INODE, file, &longest).unwrap();
    fs.add_to_dir(ROOT_INODE, file, "名字").unwrap();
    assert_eq!(
        entries(&fs, ROOT_INODE),
        [(file, longest), (file, "名字".to_owned())]
    );
}

#[test]
fn directory_errors() {
    let mut fs = format(small());
    let file = fs.create(InodeType::File).unwrap();

    assert_eq!(fs.add_to_dir(file, ROOT_INODE, "x"), Err(FsError::NotADirectory(file)));
    assert_eq!(fs.read_dir(file), Err(FsError::NotADirectory(file)));
    assert_eq!(fs.remove_from_dir(file, ROOT_INODE), Err(FsError::NotADirectory(file)));
    assert_eq!(fs.add_to_dir(ROOT_INODE, 77, "x"), Err(FsError::NotFound(77)));
    assert_eq!(fs.remove_from_dir(ROOT_INODE, file), Err(FsError::NotFound(file)));
}

#[test]
fn linking_touches_parent() {
    let mut fs = format_with(small(), ticking_clock());
    let before = fs.getattr(ROOT_INODE).unwrap();
    let file = fs.create(InodeType::File).unwrap();

    fs.add_to_dir(ROOT_INODE, file, "f").unwrap();
    let linked = fs.getattr(ROOT_INODE).unwrap();
    assert_eq!(linked.atime, before.atime);
    assert!(linked.mtime > before.mtime);
    assert_eq!(linked.ctime, linked.mtime);

    fs.remove_from_dir(ROOT_INODE, file).unwrap();
    let unlinked = fs.getattr(ROOT_INODE).unwrap();
    assert!(unlinked.mtime > linked.mtime);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn removal_keeps_set_semantics(
        (count, removed) in (1usize..24).prop_flat_map(|count| {
            let order = proptest::sample::subsequence((0..count).collect::<Vec<_>>(), 0..=count);
            (Just(count), order.prop_shuffle())
        })
    ) {
        let mut fs = format(small());
        let baseline = usage(&fs);

        let mut expected = BTreeSet::new();
        let mut children = Vec::with_capacity(count);
        for i in 0..count {
            let child = fs.create(InodeType::File).unwrap();
            fs.add_to_dir(ROOT_INODE, child, &format!("c{i}")).unwrap();
            expected.insert((child, format!("c{i}")));
            children.push(child);
        }

        for &i in &removed {
            fs.remove_from_dir(ROOT_INODE, children[i]).unwrap();
            expected.remove(&(children[i], format!("c{i}")));

            let listing: BTreeSet<_> = entries(&fs, ROOT_INODE).into_iter().collect();
            prop_assert_eq!(&listing, &expected);
        }

        // 只剩下文件 inode 与剩余目录项占用的资源
        let (blocks, inodes) = usage(&fs);
        let remaining = expected.len() as u32;
        prop_assert_eq!(inodes - baseline.1 - count as u32, remaining.saturating_sub(1) / K as u32);
        prop_assert_eq!(blocks - baseline.0, remaining + u32::from(remaining > K as u32));
    }
}
