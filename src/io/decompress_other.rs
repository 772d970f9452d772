//! Auxiliary decompression backends: gzip, xz, lzma-alone, and lz4.
//!
//! All of them start from the dispatcher's position: the frame's magic is
//! still in the held-over buffer, so each decoder consumes it as part of its
//! own header parsing. Wrapped decoders (gzip, lz4) run over a
//! [`HeldOverReader`], which serves the held-over bytes first and leaves
//! whatever the decoder does not consume in place for the next dispatch
//! iteration; the xz/lzma state machine is driven directly against the
//! held-over buffer the same way.

use std::io::{self, Read};

use flate2::bufread::GzDecoder;
use liblzma::stream::{Action, Status, Stream};
use lz4_flex::frame::FrameDecoder;

use crate::io::decompress::{DecodeOut, HeldOverReader, SrcBuffer};
use crate::io::display::{human_size, Display};

// ---------------------------------------------------------------------------
// gzip
// ---------------------------------------------------------------------------

/// Decodes one gzip member. Unconsumed trailing bytes (for example the
/// header of a following concatenated member) stay in the held-over buffer.
pub(crate) fn decompress_gzip_frame(
    hold: &mut SrcBuffer,
    dst_buf: &mut [u8],
    src: &mut dyn Read,
    out: &mut DecodeOut<'_>,
    display: &Display,
    src_name: &str,
) -> io::Result<u64> {
    let reader = HeldOverReader::new(hold, src);
    let mut decoder = GzDecoder::new(reader);
    let mut out_size = 0u64;

    loop {
        let n = decoder.read(dst_buf).map_err(|e| {
            let msg = if e.kind() == io::ErrorKind::UnexpectedEof {
                format!("{}: premature gzip end", src_name)
            } else {
                format!("{}: gzip decoding error: {}", src_name, e)
            };
            display.say(1, &format!("zstdr: {} \n", msg));
            io::Error::new(e.kind(), msg)
        })?;
        if n == 0 {
            break;
        }
        out.write_block(&dst_buf[..n])?;
        out_size += n as u64;
    }

    Ok(out_size)
}

// ---------------------------------------------------------------------------
// xz / lzma
// ---------------------------------------------------------------------------

/// Decodes one xz stream or lzma-alone stream, feeding the state machine
/// from the held-over buffer and refilling it from `src` as needed.
pub(crate) fn decompress_lzma_frame(
    hold: &mut SrcBuffer,
    dst_buf: &mut [u8],
    src: &mut dyn Read,
    out: &mut DecodeOut<'_>,
    display: &Display,
    src_name: &str,
    plain_lzma: bool,
) -> io::Result<u64> {
    let mut strm = if plain_lzma {
        Stream::new_lzma_decoder(u64::MAX)
    } else {
        Stream::new_stream_decoder(u64::MAX, 0)
    }
    .map_err(|e| {
        let msg = format!("{}: lzma decoder init error: {}", src_name, e);
        display.say(1, &format!("zstdr: {} \n", msg));
        io::Error::other(msg)
    })?;

    let mut out_size = 0u64;
    let mut finishing = false;

    loop {
        if hold.loaded == 0 && !finishing {
            hold.fill_to(hold.buf.len(), src)?;
            if hold.loaded == 0 {
                finishing = true;
            }
        }

        let action = if finishing { Action::Finish } else { Action::Run };
        let before_in = strm.total_in();
        let before_out = strm.total_out();
        let status = strm
            .process(&hold.buf[..hold.loaded], dst_buf, action)
            .map_err(|e| {
                let msg = format!("{}: lzma decoding error: {}", src_name, e);
                display.say(1, &format!("zstdr: {} \n", msg));
                io::Error::new(io::ErrorKind::InvalidData, msg)
            })?;
        let consumed = (strm.total_in() - before_in) as usize;
        let produced = (strm.total_out() - before_out) as usize;
        hold.consume_front(consumed);

        if produced > 0 {
            out.write_block(&dst_buf[..produced])?;
            out_size += produced as u64;
        }

        if let Status::StreamEnd = status {
            break;
        }
    }

    Ok(out_size)
}

// ---------------------------------------------------------------------------
// lz4
// ---------------------------------------------------------------------------

/// Decodes one lz4 frame. The frame decoder reads exactly through the end
/// mark, so any following data stays in the held-over buffer.
pub(crate) fn decompress_lz4_frame(
    hold: &mut SrcBuffer,
    dst_buf: &mut [u8],
    src: &mut dyn Read,
    out: &mut DecodeOut<'_>,
    display: &Display,
    src_name: &str,
) -> io::Result<u64> {
    let reader = HeldOverReader::new(hold, src);
    let mut decoder = FrameDecoder::new(reader);
    let mut out_size = 0u64;

    loop {
        let n = decoder.read(dst_buf).map_err(|e| {
            let msg = format!("{}: lz4 decompression error: {}", src_name, e);
            display.say(1, &format!("zstdr: {} \n", msg));
            io::Error::new(io::ErrorKind::InvalidData, msg)
        })?;
        if n == 0 {
            break;
        }
        out.write_block(&dst_buf[..n])?;
        out_size += n as u64;
        display.update(2, &format!("\rDecompressed : {}  ", human_size(out_size)));
    }

    Ok(out_size)
}
