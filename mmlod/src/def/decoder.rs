//! DEF parsing and frame decoding.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::pixels::{palette_from_bytes, Palette};
use crate::reader::ByteReader;

use super::types::{DefFrame, DefGroup, DefHeader, FramePlanes};
use super::{FRAME_HEADER_LEN, FRAME_NAME_LEN, GROUP_TABLE_START, NO_SHADOW};

/// Frames larger than this in either dimension are treated as corrupt.
const MAX_DIMENSION: u32 = 8192;

/// A parsed DEF sprite. Headers, palette, and the group table are decoded
/// eagerly; frame pixel blocks are decoded on first request and cached by
/// body offset, so identically-named frames pointing at the same block
/// share one slot.
pub struct DefSprite {
    data: Vec<u8>,
    pub header: DefHeader,
    pub palette: Palette,
    pub groups: Vec<DefGroup>,
    cache: RefCell<HashMap<u32, Rc<DefFrame>>>,
}

impl std::fmt::Debug for DefSprite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefSprite")
            .field("header", &self.header)
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl DefSprite {
    /// Parse a DEF from its full file contents.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDef`] when the header or group table is
    /// malformed.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        if data.len() < GROUP_TABLE_START {
            return Err(Error::InvalidDef(format!(
                "file of {} bytes is too small for a DEF header",
                data.len()
            )));
        }
        let header;
        let palette;
        let mut groups = Vec::new();
        {
            let mut r = ByteReader::new(&data);
            let def_type = def_err(r.read_u32())?;
            let width = def_err(r.read_u32())?;
            let height = def_err(r.read_u32())?;
            let group_count = def_err(r.read_u32())?;
            header = DefHeader {
                def_type,
                width,
                height,
                group_count,
            };
            palette = palette_from_bytes(def_err(r.read_bytes(768))?);

            for _ in 0..group_count {
                let group_index = def_err(r.read_u32())?;
                let frame_count = def_err(r.read_u32())?;
                let unk1 = def_err(r.read_u32())?;
                let unk2 = def_err(r.read_u32())?;
                // Each frame costs at least a name and an offset; a count
                // beyond the remaining bytes is corruption, not data.
                if frame_count as usize * (FRAME_NAME_LEN + 4) > r.remaining() {
                    return Err(Error::InvalidDef(format!(
                        "group {group_index} declares {frame_count} frames beyond end of file"
                    )));
                }
                let mut frame_names = Vec::with_capacity(frame_count as usize);
                for _ in 0..frame_count {
                    frame_names.push(def_err(r.read_name(FRAME_NAME_LEN))?);
                }
                let mut frame_offsets = Vec::with_capacity(frame_count as usize);
                for _ in 0..frame_count {
                    frame_offsets.push(def_err(r.read_u32())?);
                }
                groups.push(DefGroup {
                    group_index,
                    frame_count,
                    unk1,
                    unk2,
                    frame_names,
                    frame_offsets,
                });
            }
        }
        Ok(Self {
            data,
            header,
            palette,
            groups,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Total frame count across all groups.
    #[must_use]
    pub fn frames_total(&self) -> usize {
        self.groups.iter().map(|g| g.frame_count as usize).sum()
    }

    /// All `(group, frame)` index pairs in group order.
    #[must_use]
    pub fn frame_indices(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(self.frames_total());
        for (g, group) in self.groups.iter().enumerate() {
            for f in 0..group.frame_count as usize {
                out.push((g, f));
            }
        }
        out
    }

    /// # Errors
    /// Returns [`Error::InvalidDef`] for out-of-range indices.
    pub fn group(&self, group: usize) -> Result<&DefGroup> {
        self.groups
            .get(group)
            .ok_or_else(|| Error::InvalidDef(format!("group index {group} out of range")))
    }

    /// # Errors
    /// Returns [`Error::InvalidDef`] for out-of-range indices.
    pub fn frame_name(&self, group: usize, frame: usize) -> Result<&str> {
        let g = self.group(group)?;
        g.frame_names
            .get(frame)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidDef(format!("frame index {frame} out of range")))
    }

    /// # Errors
    /// Returns [`Error::InvalidDef`] for out-of-range indices.
    pub fn frame_offset(&self, group: usize, frame: usize) -> Result<u32> {
        let g = self.group(group)?;
        g.frame_offsets
            .get(frame)
            .copied()
            .ok_or_else(|| Error::InvalidDef(format!("frame index {frame} out of range")))
    }

    /// Decode a frame into a single indexed buffer (run codes stored
    /// verbatim), cached by body offset.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDef`] / [`Error::InvalidPixelStream`].
    pub fn frame(&self, group: usize, frame: usize) -> Result<Rc<DefFrame>> {
        let offset = self.frame_offset(group, frame)?;
        if let Some(hit) = self.cache.borrow().get(&offset) {
            return Ok(Rc::clone(hit));
        }
        let meta = frame_meta(&self.data, offset)?;
        let (pixels, _) = decode_pixels(&self.data, &meta, false)?;
        let decoded = Rc::new(meta.into_frame(pixels));
        self.cache
            .borrow_mut()
            .insert(offset, Rc::clone(&decoded));
        Ok(decoded)
    }

    /// Decode a frame into separate pixel and shadow planes, for
    /// separate-shadow composition.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDef`] / [`Error::InvalidPixelStream`].
    pub fn frame_planes(&self, group: usize, frame: usize) -> Result<FramePlanes> {
        let offset = self.frame_offset(group, frame)?;
        let meta = frame_meta(&self.data, offset)?;
        let (pixels, shadow) = decode_pixels(&self.data, &meta, true)?;
        let len = pixels.len();
        Ok(FramePlanes {
            frame: meta.into_frame(pixels),
            shadow: shadow.unwrap_or_else(|| vec![NO_SHADOW; len]),
        })
    }
}

fn def_err<T>(r: Result<T>) -> Result<T> {
    r.map_err(|e| match e {
        Error::Truncated { .. } => Error::InvalidDef("header or group table is truncated".into()),
        other => other,
    })
}

struct FrameMeta {
    size_on_disk: u32,
    encoding: u32,
    full_width: u32,
    full_height: u32,
    width: u32,
    height: u32,
    left: i32,
    top: i32,
    body: usize,
}

impl FrameMeta {
    fn into_frame(self, pixels: Vec<u8>) -> DefFrame {
        DefFrame {
            size_on_disk: self.size_on_disk,
            encoding: self.encoding,
            full_width: self.full_width,
            full_height: self.full_height,
            width: self.width,
            height: self.height,
            left: self.left,
            top: self.top,
            pixels,
        }
    }
}

fn frame_meta(data: &[u8], offset: u32) -> Result<FrameMeta> {
    let mut r = ByteReader::new(data);
    r.seek(offset as usize)
        .map_err(|_| Error::InvalidDef(format!("frame offset {offset} past end of file")))?;
    let read_err = |_| Error::InvalidDef(format!("frame header at {offset} is truncated"));

    let size_on_disk = r.read_u32().map_err(read_err)?;
    let encoding = r.read_u32().map_err(read_err)?;
    let full_width = r.read_u32().map_err(read_err)?;
    let full_height = r.read_u32().map_err(read_err)?;
    let mut width = r.read_u32().map_err(read_err)?;
    let mut height = r.read_u32().map_err(read_err)?;
    let mut left = r.read_i32().map_err(read_err)?;
    let mut top = r.read_i32().map_err(read_err)?;
    let mut body = offset as usize + FRAME_HEADER_LEN;

    // Early DEFs use a 16-byte shorter frame header; they betray
    // themselves by a frame rectangle larger than the canvas.
    if width > full_width && height > full_height && encoding == 1 {
        width = full_width;
        height = full_height;
        left = 0;
        top = 0;
        body -= 16;
    }

    if encoding > 3 {
        return Err(Error::InvalidDef(format!(
            "frame at {offset} uses unknown encoding {encoding}"
        )));
    }
    if full_width > MAX_DIMENSION
        || full_height > MAX_DIMENSION
        || width > MAX_DIMENSION
        || height > MAX_DIMENSION
    {
        return Err(Error::InvalidDef(format!(
            "frame at {offset} has implausible dimensions {width}x{height}"
        )));
    }
    if left < 0
        || top < 0
        || i64::from(left) + i64::from(width) > i64::from(full_width)
        || i64::from(top) + i64::from(height) > i64::from(full_height)
    {
        return Err(Error::InvalidDef(format!(
            "frame at {offset} lies outside its {full_width}x{full_height} canvas"
        )));
    }

    Ok(FrameMeta {
        size_on_disk,
        encoding,
        full_width,
        full_height,
        width,
        height,
        left,
        top,
        body,
    })
}

fn stream_err(msg: impl Into<String>) -> Error {
    Error::InvalidPixelStream(msg.into())
}

/// Decode a frame body. In single-plane mode run codes land in the pixel
/// buffer alongside raw data; in dual mode raw data fills the main plane
/// (plus run code 5, which the packed encodings mirror into it) and run
/// codes fill the shadow plane.
fn decode_pixels(data: &[u8], meta: &FrameMeta, dual: bool) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
    let w = meta.width as usize;
    let h = meta.height as usize;
    let body = meta.body;

    if meta.encoding == 0 {
        let end = body
            .checked_add(w * h)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| stream_err("raw frame data past end of file"))?;
        let pixels = data[body..end].to_vec();
        let shadow = dual.then(|| vec![NO_SHADOW; w * h]);
        return Ok((pixels, shadow));
    }

    let mut main = vec![0u8; w * h];
    let mut shadow = if dual { vec![NO_SHADOW; w * h] } else { Vec::new() };

    if meta.encoding == 1 {
        for j in 0..h {
            let line_off = read_u32_at(data, body + j * 4)
                .ok_or_else(|| stream_err(format!("row offset {j} past end of file")))?;
            let mut p = body + line_off as usize;
            let mut i = 0usize;
            while i < w {
                let code = *data
                    .get(p)
                    .ok_or_else(|| stream_err(format!("row {j} data past end of file")))?;
                let length = *data
                    .get(p + 1)
                    .ok_or_else(|| stream_err(format!("row {j} data past end of file")))?
                    as usize
                    + 1;
                p += 2;
                let count = length.min(w - i);
                if code == 0xFF {
                    let src = data
                        .get(p..p + count)
                        .ok_or_else(|| stream_err(format!("row {j} raw bytes past end of file")))?;
                    main[j * w + i..j * w + i + count].copy_from_slice(src);
                    p += length;
                } else {
                    let dst = if dual { &mut shadow } else { &mut main };
                    dst[j * w + i..j * w + i + count].fill(code);
                }
                i += length;
            }
        }
        return Ok((main, dual.then_some(shadow)));
    }

    // Encodings 2 and 3 share the packed segment byte; 3 splits each row
    // into 32-pixel blocks with their own offsets.
    let blocks = if meta.encoding == 3 { w.div_ceil(32) } else { 1 };
    let mut seg_index = 0usize;
    for j in 0..h {
        for b in 0..blocks {
            let (row_start, seg_w) = if meta.encoding == 3 {
                (j * w + b * 32, (w - b * 32).min(32))
            } else {
                (j * w, w)
            };
            let line_off = read_u16_at(data, body + seg_index * 2)
                .ok_or_else(|| stream_err(format!("segment offset {seg_index} past end of file")))?;
            seg_index += 1;
            let mut p = body + line_off as usize;
            let mut i = 0usize;
            while i < seg_w {
                let packed = *data
                    .get(p)
                    .ok_or_else(|| stream_err(format!("row {j} data past end of file")))?;
                p += 1;
                let code = packed >> 5;
                let length = (packed & 31) as usize + 1;
                let count = length.min(seg_w - i);
                let at = row_start + i;
                if code == 7 {
                    let src = data
                        .get(p..p + count)
                        .ok_or_else(|| stream_err(format!("row {j} raw bytes past end of file")))?;
                    main[at..at + count].copy_from_slice(src);
                    p += length;
                } else if dual {
                    shadow[at..at + count].fill(code);
                    if code == 5 {
                        main[at..at + count].fill(code);
                    }
                } else {
                    main[at..at + count].fill(code);
                }
                i += length;
            }
        }
    }
    Ok((main, dual.then_some(shadow)))
}

fn read_u32_at(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u16_at(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}
