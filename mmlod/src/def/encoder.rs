//! DEF frame encoding and file assembly.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::pixels::{palette_to_bytes, Palette};

use super::types::DefFrame;
use super::{FRAME_HEADER_LEN, FRAME_NAME_LEN, GROUP_TABLE_START};

/// Encode one frame (header plus body) in the requested mode.
///
/// Indices below the mode's run-code threshold become run segments, the
/// rest raw segments, so `decode(encode(frame)) == frame` for every valid
/// indexed buffer.
///
/// # Errors
/// Returns [`Error::InvalidDef`] when the frame violates its own
/// geometry.
pub fn encode_frame(frame: &DefFrame, mode: u32) -> Result<Vec<u8>> {
    let w = frame.width as usize;
    let h = frame.height as usize;
    if frame.pixels.len() != w * h {
        return Err(Error::InvalidDef(format!(
            "frame buffer of {} bytes does not match {w}x{h}",
            frame.pixels.len()
        )));
    }
    if frame.left < 0
        || frame.top < 0
        || i64::from(frame.left) + w as i64 > i64::from(frame.full_width)
        || i64::from(frame.top) + h as i64 > i64::from(frame.full_height)
    {
        return Err(Error::InvalidDef(
            "frame lies outside its full canvas".into(),
        ));
    }

    let body = match mode {
        0 => frame.pixels.clone(),
        1 => {
            let table_len = h * 4;
            let mut table = Vec::with_capacity(table_len);
            let mut segments = Vec::new();
            for j in 0..h {
                let offset = (table_len + segments.len()) as u32;
                table.extend_from_slice(&offset.to_le_bytes());
                encode_row_pairs(&frame.pixels[j * w..(j + 1) * w], &mut segments);
            }
            table.extend_from_slice(&segments);
            table
        }
        2 | 3 => {
            let blocks = if mode == 3 { w.div_ceil(32) } else { 1 };
            let table_len = h * blocks * 2;
            let mut table = Vec::with_capacity(table_len);
            let mut segments = Vec::new();
            for j in 0..h {
                for b in 0..blocks {
                    let offset = table_len + segments.len();
                    if offset > usize::from(u16::MAX) {
                        return Err(Error::InvalidDef(
                            "frame body overflows 16-bit row offsets".into(),
                        ));
                    }
                    table.extend_from_slice(&(offset as u16).to_le_bytes());
                    let start = j * w + b * 32;
                    let seg_w = if mode == 3 { (w - b * 32).min(32) } else { w };
                    encode_row_packed(&frame.pixels[start..start + seg_w], &mut segments);
                }
            }
            table.extend_from_slice(&segments);
            table
        }
        other => {
            return Err(Error::InvalidDef(format!(
                "unknown frame encoding {other}"
            )))
        }
    };

    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&mode.to_le_bytes());
    out.extend_from_slice(&frame.full_width.to_le_bytes());
    out.extend_from_slice(&frame.full_height.to_le_bytes());
    out.extend_from_slice(&frame.width.to_le_bytes());
    out.extend_from_slice(&frame.height.to_le_bytes());
    out.extend_from_slice(&frame.left.to_le_bytes());
    out.extend_from_slice(&frame.top.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Mode 1 segments: `(code, length-1)` byte pairs, 0xFF introducing raw
/// bytes; indices below 8 travel as runs.
fn encode_row_pairs(row: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < row.len() {
        let v = row[i];
        if v < 8 {
            let mut len = 1;
            while i + len < row.len() && row[i + len] == v && len < 256 {
                len += 1;
            }
            out.push(v);
            out.push((len - 1) as u8);
            i += len;
        } else {
            let mut len = 1;
            while i + len < row.len() && row[i + len] >= 8 && len < 256 {
                len += 1;
            }
            out.push(0xFF);
            out.push((len - 1) as u8);
            out.extend_from_slice(&row[i..i + len]);
            i += len;
        }
    }
}

/// Mode 2/3 segments: one byte packs `code << 5 | (length-1)`, code 7
/// introducing raw bytes; indices below 7 travel as runs.
fn encode_row_packed(row: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < row.len() {
        let v = row[i];
        if v < 7 {
            let mut len = 1;
            while i + len < row.len() && row[i + len] == v && len < 32 {
                len += 1;
            }
            out.push((v << 5) | (len - 1) as u8);
            i += len;
        } else {
            let mut len = 1;
            while i + len < row.len() && row[i + len] >= 7 && len < 32 {
                len += 1;
            }
            out.push((7 << 5) | (len - 1) as u8);
            out.extend_from_slice(&row[i..i + len]);
            i += len;
        }
    }
}

struct GroupSlot {
    unk1: u32,
    unk2: u32,
    items: Vec<usize>,
}

/// Assembles a DEF from frames and group assignments. Frames are encoded
/// once; groups referencing the same frame index share its body offset.
pub struct DefBuilder {
    def_type: u32,
    width: u32,
    height: u32,
    palette: Palette,
    frames: Vec<(String, DefFrame, u32)>,
    groups: BTreeMap<u32, GroupSlot>,
}

impl DefBuilder {
    #[must_use]
    pub fn new(def_type: u32, width: u32, height: u32, palette: Palette) -> Self {
        Self {
            def_type,
            width,
            height,
            palette,
            frames: Vec::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Register a frame; returns its index for group assignment.
    pub fn add_frame(&mut self, name: &str, frame: DefFrame, encoding: u32) -> usize {
        self.frames.push((name.to_string(), frame, encoding));
        self.frames.len() - 1
    }

    /// Append a registered frame to a group.
    pub fn add_to_group(&mut self, group: u32, frame_index: usize) {
        self.groups
            .entry(group)
            .or_insert(GroupSlot {
                unk1: 0,
                unk2: 0,
                items: Vec::new(),
            })
            .items
            .push(frame_index);
    }

    /// Carry a group's opaque legacy fields through a round-trip.
    pub fn set_group_unknowns(&mut self, group: u32, unk1: u32, unk2: u32) {
        let slot = self.groups.entry(group).or_insert(GroupSlot {
            unk1: 0,
            unk2: 0,
            items: Vec::new(),
        });
        slot.unk1 = unk1;
        slot.unk2 = unk2;
    }

    /// Serialise the DEF. Frame-table offsets are filled in a second pass
    /// once every frame body has been encoded.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDef`] on frame geometry errors or when no
    /// frame was added.
    pub fn build(&self) -> Result<Vec<u8>> {
        if self.frames.is_empty() {
            return Err(Error::InvalidDef("a DEF needs at least one frame".into()));
        }

        let populated: Vec<(&u32, &GroupSlot)> =
            self.groups.iter().filter(|(_, g)| !g.items.is_empty()).collect();
        let header_size = GROUP_TABLE_START
            + populated
                .iter()
                .map(|(_, g)| 16 + g.items.len() * (FRAME_NAME_LEN + 4))
                .sum::<usize>();

        let mut bodies = Vec::with_capacity(self.frames.len());
        let mut offsets = Vec::with_capacity(self.frames.len());
        let mut at = header_size;
        for (_, frame, encoding) in &self.frames {
            let body = encode_frame(frame, *encoding)?;
            offsets.push(at as u32);
            at += body.len();
            bodies.push(body);
        }

        let mut out = Vec::with_capacity(at);
        out.extend_from_slice(&self.def_type.to_le_bytes());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&(populated.len() as u32).to_le_bytes());
        out.extend_from_slice(&palette_to_bytes(&self.palette));

        for (index, slot) in &populated {
            out.extend_from_slice(&index.to_le_bytes());
            out.extend_from_slice(&(slot.items.len() as u32).to_le_bytes());
            out.extend_from_slice(&slot.unk1.to_le_bytes());
            out.extend_from_slice(&slot.unk2.to_le_bytes());
            for &item in &slot.items {
                let mut name_field = [0u8; FRAME_NAME_LEN];
                let name = self.frames[item].0.as_bytes();
                let n = name.len().min(FRAME_NAME_LEN);
                name_field[..n].copy_from_slice(&name[..n]);
                out.extend_from_slice(&name_field);
            }
            for &item in &slot.items {
                out.extend_from_slice(&offsets[item].to_le_bytes());
            }
        }

        for body in &bodies {
            out.extend_from_slice(body);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::DefSprite;

    fn frame(width: u32, height: u32, pixels: Vec<u8>) -> DefFrame {
        DefFrame {
            size_on_disk: 0,
            encoding: 0,
            full_width: width + 4,
            full_height: height + 2,
            width,
            height,
            left: 2,
            top: 1,
            pixels,
        }
    }

    fn build_and_reload(frames: Vec<(String, DefFrame, u32)>) -> DefSprite {
        let mut builder = DefBuilder::new(0x42, 20, 10, [[0u8; 3]; 256]);
        for (name, f, mode) in frames {
            let idx = builder.add_frame(&name, f, mode);
            builder.add_to_group(0, idx);
        }
        DefSprite::parse(builder.build().unwrap()).unwrap()
    }

    #[test]
    fn round_trip_all_encodings() {
        // A buffer mixing shadow codes, high indices, and 0xFF itself.
        let mut pixels = vec![0u8; 16 * 4];
        for (i, px) in pixels.iter_mut().enumerate() {
            *px = match i % 7 {
                0 => 0,
                1 => 5,
                2 => 7,
                3 => 0xFF,
                4 => 42,
                5 => 5,
                _ => 200,
            };
        }
        for mode in 0..4u32 {
            let sprite = build_and_reload(vec![(
                "frame0".into(),
                frame(16, 4, pixels.clone()),
                mode,
            )]);
            let decoded = sprite.frame(0, 0).unwrap();
            assert_eq!(decoded.encoding, mode);
            assert_eq!(decoded.pixels, pixels, "mode {mode}");
            assert_eq!((decoded.left, decoded.top), (2, 1));
        }
    }

    #[test]
    fn mode3_partial_final_block() {
        let pixels: Vec<u8> = (0..40u8).map(|i| if i % 3 == 0 { 2 } else { 99 }).collect();
        let sprite = build_and_reload(vec![("f".into(), frame(40, 1, pixels.clone()), 3)]);
        assert_eq!(sprite.frame(0, 0).unwrap().pixels, pixels);
    }

    #[test]
    fn long_runs_split_at_caps() {
        // 300 equal shadow bytes force run splitting in every mode.
        let pixels = vec![3u8; 300];
        for mode in 1..4u32 {
            let sprite = build_and_reload(vec![("f".into(), frame(300, 1, pixels.clone()), mode)]);
            assert_eq!(sprite.frame(0, 0).unwrap().pixels, pixels, "mode {mode}");
        }
    }

    #[test]
    fn mode2_decodes_raw_then_run() {
        // 4x2 mode-2 frame: a raw segment 1,2,3,4 then a run of index 5.
        let pixels = vec![1, 2, 3, 4, 5, 5, 5, 5];
        let sprite = build_and_reload(vec![("f".into(), frame(4, 2, pixels), 2)]);
        assert_eq!(
            sprite.frame(0, 0).unwrap().pixels,
            vec![1, 2, 3, 4, 5, 5, 5, 5]
        );
    }

    #[test]
    fn shared_offsets_share_cache_slots() {
        let f = frame(4, 2, vec![9; 8]);
        let mut builder = DefBuilder::new(0x42, 8, 4, [[0u8; 3]; 256]);
        let idx = builder.add_frame("same", f, 2);
        builder.add_to_group(0, idx);
        builder.add_to_group(1, idx);
        let sprite = DefSprite::parse(builder.build().unwrap()).unwrap();
        let a = sprite.frame(0, 0).unwrap();
        let b = sprite.frame(1, 0).unwrap();
        assert!(std::rc::Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_group_fields_survive() {
        let mut builder = DefBuilder::new(0x44, 8, 4, [[0u8; 3]; 256]);
        let idx = builder.add_frame("f", frame(4, 2, vec![0; 8]), 2);
        builder.add_to_group(3, idx);
        builder.set_group_unknowns(3, 0xAABB, 0xCCDD);
        let sprite = DefSprite::parse(builder.build().unwrap()).unwrap();
        assert_eq!(sprite.groups[0].group_index, 3);
        assert_eq!(sprite.groups[0].unk1, 0xAABB);
        assert_eq!(sprite.groups[0].unk2, 0xCCDD);
    }
}
