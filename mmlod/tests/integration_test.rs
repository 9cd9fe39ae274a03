use std::fs;

use mmlod::prelude::*;
use mmlod::def::DefFrame;
use mmlod::pixels::Palette;
use tempfile::tempdir;

fn sample_def() -> Vec<u8> {
    let mut palette: Palette = [[0u8; 3]; 256];
    palette[99] = [200, 0, 0];
    let mut builder = DefBuilder::new(0x42, 8, 4, palette);
    let frame = DefFrame {
        size_on_disk: 0,
        encoding: 2,
        full_width: 8,
        full_height: 4,
        width: 4,
        height: 2,
        left: 1,
        top: 1,
        pixels: vec![0, 99, 99, 0, 99, 5, 5, 99],
    };
    let idx = builder.add_frame("tstcre00", frame, 2);
    builder.add_to_group(0, idx);
    builder.add_to_group(2, idx);
    builder.build().unwrap()
}

fn build_sample_lod(path: &std::path::Path) {
    let mut archive = Archive::create(path, ArchiveFlavour::Lod(LodVersion::Heroes));
    archive
        .add("a.pcx", b"pcx payload bytes".to_vec(), false)
        .unwrap();
    archive
        .add("b.bmp", vec![0x42u8; 600], true)
        .unwrap();
    archive.add("c.def", sample_def(), true).unwrap();
    archive.save_as(path).unwrap();
}

#[test]
fn list_heroes_lod() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.lod");
    build_sample_lod(&path);

    let archive = Archive::open(&path).unwrap();
    assert_eq!(archive.flavour(), ArchiveFlavour::Lod(LodVersion::Heroes));
    let names: Vec<&str> = archive.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.pcx", "b.bmp", "c.def"]);

    let a = &archive.entries()[0];
    assert_eq!(a.unpacked_size, 17);
    assert!(!a.is_packed());
    let b = &archive.entries()[1];
    assert_eq!(b.unpacked_size, 600);
    assert!(b.is_packed(), "600 repeated bytes must compress");
    let c = &archive.entries()[2];
    assert_eq!(c.unpacked_size as usize, sample_def().len());
    assert_eq!(c.kind, EntryKind::Def);
}

#[test]
fn extract_with_filter() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.lod");
    build_sample_lod(&path);

    let mut archive = Archive::open(&path).unwrap();
    let matched = archive.matching_indices(Some("*.def"));
    assert_eq!(matched.len(), 1);
    let entry = archive.entry(matched[0]).unwrap().clone();
    let data = archive.entry_data(matched[0]).unwrap();
    assert_eq!(entry.name, "c.def");
    assert_eq!(data.len(), entry.unpacked_size as usize);
    assert_eq!(data, sample_def());
}

#[test]
fn add_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.lod");
    build_sample_lod(&path);

    let mut archive = Archive::open(&path).unwrap();
    archive.add("new.bmp", vec![0xAB; 1024], true).unwrap();
    archive.rebuild().unwrap();

    let mut reloaded = Archive::open(&path).unwrap();
    assert_eq!(reloaded.len(), 4);
    let idx = reloaded.find("NEW.BMP").expect("lookup is case-insensitive");
    let data = reloaded.entry_data(idx).unwrap();
    assert_eq!(data, vec![0xAB; 1024]);
}

#[test]
fn rebuild_preserves_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.lod");
    build_sample_lod(&path);

    let mut original = Archive::open(&path).unwrap();
    let mut contents = Vec::new();
    for i in 0..original.len() {
        contents.push((
            original.entry(i).unwrap().name.clone(),
            original.entry_data(i).unwrap(),
        ));
    }

    original.rebuild().unwrap();
    let mut reloaded = Archive::open(&path).unwrap();
    assert_eq!(reloaded.len(), contents.len());
    for (i, (name, data)) in contents.iter().enumerate() {
        assert_eq!(&reloaded.entry(i).unwrap().name, name);
        assert_eq!(&reloaded.entry_data(i).unwrap(), data);
    }
}

#[test]
fn replacing_an_entry_keeps_its_position() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.lod");
    build_sample_lod(&path);

    let mut archive = Archive::open(&path).unwrap();
    archive.add("B.BMP", vec![7u8; 32], false).unwrap();
    archive.rebuild().unwrap();

    let mut reloaded = Archive::open(&path).unwrap();
    assert_eq!(reloaded.len(), 3);
    assert_eq!(reloaded.entry(1).unwrap().name, "B.BMP");
    assert_eq!(reloaded.entry_data(1).unwrap(), vec![7u8; 32]);
}

#[test]
fn strict_errors_surface_tolerant_recovers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.lod");
    build_sample_lod(&path);

    // Damage the packed entry's stored bytes on disk.
    let archive = Archive::open(&path).unwrap();
    let entry = archive.entries()[1].clone();
    assert!(entry.is_packed());
    let mut bytes = fs::read(&path).unwrap();
    let mid = entry.offset as usize + entry.packed_size as usize / 2;
    bytes[mid] ^= 0xFF;
    bytes[mid + 1] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let mut strict = Archive::open(&path).unwrap();
    assert!(matches!(
        strict.entry_data(1),
        Err(Error::DecompressionMismatch { .. })
    ));

    let mut tolerant = Archive::open(&path).unwrap();
    tolerant.set_tolerant(true);
    let data = tolerant.entry_data(1).unwrap();
    assert_eq!(data.len(), entry.unpacked_size as usize);
}

#[test]
fn unknown_magic_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.lod");
    fs::write(&path, vec![0x13u8; 4096]).unwrap();
    assert!(matches!(
        Archive::open(&path),
        Err(Error::UnknownFormat { .. })
    ));
}

#[test]
fn truncated_directory_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.lod");
    build_sample_lod(&path);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..100]).unwrap();
    assert!(matches!(
        Archive::open(&path),
        Err(Error::CorruptIndex { .. })
    ));
}

#[test]
fn def_extracted_from_archive_decodes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.lod");
    build_sample_lod(&path);

    let mut archive = Archive::open(&path).unwrap();
    let idx = archive.find("c.def").unwrap();
    let sprite = DefSprite::parse(archive.entry_data(idx).unwrap()).unwrap();
    assert_eq!(sprite.header.def_type, 0x42);
    assert_eq!(sprite.groups.len(), 2);
    let frame = sprite.frame(0, 0).unwrap();
    assert_eq!(frame.pixels, vec![0, 99, 99, 0, 99, 5, 5, 99]);
    assert_eq!((frame.left, frame.top), (1, 1));
    assert!(frame.left as u32 + frame.width <= frame.full_width);
    assert!(frame.top as u32 + frame.height <= frame.full_height);
}

#[test]
fn snd_archive_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sounds.snd");
    let mut archive = Archive::create(&path, ArchiveFlavour::Snd { mm: false });
    archive
        .add("thunder.wav", b"RIFFxxxxWAVE".to_vec(), false)
        .unwrap();
    archive.save_as(&path).unwrap();

    let mut reloaded = Archive::open(&path).unwrap();
    assert_eq!(reloaded.flavour(), ArchiveFlavour::Snd { mm: false });
    assert_eq!(reloaded.len(), 1);
    // SND strips the extension on add and restores it on extraction.
    assert_eq!(reloaded.entry(0).unwrap().name, "thunder");
    assert_eq!(reloaded.extract_name(0).unwrap(), "thunder.wav");
    assert_eq!(reloaded.entry_data(0).unwrap(), b"RIFFxxxxWAVE".to_vec());
}

#[test]
fn vid_sizes_derive_from_offsets() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("movies.vid");
    let mut archive = Archive::create(&path, ArchiveFlavour::Vid { no_extension: false });
    archive.add("intro.smk", vec![1u8; 100], false).unwrap();
    archive.add("outro.smk", vec![2u8; 50], false).unwrap();
    archive.save_as(&path).unwrap();

    let mut reloaded = Archive::open(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.entry(0).unwrap().unpacked_size, 100);
    assert_eq!(reloaded.entry(1).unwrap().unpacked_size, 50);
    assert_eq!(reloaded.entry_data(0).unwrap(), vec![1u8; 100]);
    assert_eq!(reloaded.entry_data(1).unwrap(), vec![2u8; 50]);
}

#[test]
fn heroes_pcx_entry_extracts_as_image() {
    use mmlod::pixels::{pcx, PixelBuffer, PixelImage};

    let mut palette = [[0u8; 3]; 256];
    palette[1] = [10, 20, 30];
    let image = PixelImage {
        width: 2,
        height: 2,
        buffer: PixelBuffer::Indexed {
            palette: Box::new(palette),
            pixels: vec![1, 0, 0, 1],
        },
    };
    let dir = tempdir().unwrap();
    let path = dir.path().join("gfx.lod");
    let mut archive = Archive::create(&path, ArchiveFlavour::Lod(LodVersion::Heroes));
    archive
        .add("tile.pcx", pcx::encode_heroes(&image), true)
        .unwrap();
    archive.save_as(&path).unwrap();

    let mut reloaded = Archive::open(&path).unwrap();
    let decoded = reloaded.extract_image(0).unwrap().expect("pcx decodes");
    assert_eq!((decoded.width, decoded.height), (2, 2));
    assert_eq!(reloaded.extract_name(0).unwrap(), "tile.bmp");
    match decoded.buffer {
        PixelBuffer::Indexed { pixels, .. } => assert_eq!(pixels, vec![1, 0, 0, 1]),
        _ => panic!("expected indexed buffer"),
    }
}

#[test]
fn name_too_long_is_rejected() {
    let mut archive = Archive::create("x.lod", ArchiveFlavour::Lod(LodVersion::Heroes));
    let err = archive.add("a-very-long-entry-name.def", Vec::new(), false);
    assert!(matches!(err, Err(Error::NameTooLong { limit: 16, .. })));
}
