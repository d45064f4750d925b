// SPDX-License-Identifier: MIT
// Fixed channel-order permutations for 4-channel 8-bit frames.

/// Byte order of one pixel in a 4-channel 8-bit frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelOrder {
    /// Blue, green, red, alpha: what decoders hand out by default.
    Bgra,
    /// Red, green, blue, alpha: what virtual camera devices accept.
    Rgba,
}

impl ChannelOrder {
    /// GStreamer raw-video format name for this order.
    pub fn gst_format(self) -> &'static str {
        match self {
            ChannelOrder::Bgra => "BGRA",
            ChannelOrder::Rgba => "RGBA",
        }
    }

    /// Index permutation `p` such that `out[i] = in[p[i]]` converts a pixel
    /// from `self` to `to`.
    pub fn permutation_to(self, to: ChannelOrder) -> [usize; 4] {
        if self == to {
            [0, 1, 2, 3]
        } else {
            // BGRA <-> RGBA is a swap of channels 0 and 2.
            [2, 1, 0, 3]
        }
    }
}

/// Apply `perm` to every pixel of `buf` in place.
/// A trailing partial pixel (only possible with a malformed buffer) is left untouched.
pub fn permute_in_place(buf: &mut [u8], perm: [usize; 4]) {
    if perm == [0, 1, 2, 3] {
        return;
    }
    for px in buf.chunks_exact_mut(4) {
        let src = [px[0], px[1], px[2], px[3]];
        for (dst, &i) in px.iter_mut().zip(perm.iter()) {
            *dst = src[i];
        }
    }
}

/// Convert `buf` from one channel order to another in place.
pub fn convert_in_place(buf: &mut [u8], from: ChannelOrder, to: ChannelOrder) {
    permute_in_place(buf, from.permutation_to(to));
}
