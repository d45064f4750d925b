//! The frame type that flows from capture through processing to the sink.

use std::fmt;
use std::sync::Arc;

use relay_scale::channels::ChannelOrder;
use relay_scale::plan::Size;

/// One 4-channel 8-bit image. Owned by a single relay iteration.
///
/// `data` is `Arc`-wrapped so a processor that leaves pixels untouched can
/// hand the frame on without copying.
#[derive(Clone)]
pub struct VideoFrame {
    /// Pixel data, `stride * height` bytes (the last row may be unpadded).
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row (may exceed `width * 4` due to padding)
    pub stride: usize,
    /// Byte order of each pixel
    pub order: ChannelOrder,
    /// Optional presentation timestamp in nanoseconds
    pub pts_ns: Option<u64>,
}

impl VideoFrame {
    /// Frame from tightly packed bytes.
    pub fn from_packed(bytes: Vec<u8>, width: u32, height: u32, order: ChannelOrder) -> Self {
        Self {
            data: Arc::new(bytes),
            width,
            height,
            stride: width as usize * 4,
            order,
            pts_ns: None,
        }
    }

    /// Frame filled with a single pixel value.
    pub fn solid(width: u32, height: u32, order: ChannelOrder, px: [u8; 4]) -> Self {
        let bytes = px
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::from_packed(bytes, width, height, order)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }

    pub fn is_packed(&self) -> bool {
        self.stride == self.row_bytes()
    }

    /// Tightly packed bytes, copying only when the buffer is shared or padded.
    pub fn into_packed_bytes(self) -> Vec<u8> {
        let row = self.row_bytes();
        let rows = self.height as usize;
        if self.is_packed() {
            let mut bytes = Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone());
            bytes.truncate(row * rows);
            return bytes;
        }
        let mut packed = Vec::with_capacity(row * rows);
        for r in 0..rows {
            let start = r * self.stride;
            packed.extend_from_slice(&self.data[start..start + row]);
        }
        packed
    }

    /// Pixel at (x, y) as stored.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.stride + x as usize * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("order", &self.order)
            .field("pts_ns", &self.pts_ns)
            .field("bytes", &self.data.len())
            .finish()
    }
}
