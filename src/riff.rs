//! RMID files are Standard Midi Files embedded in a RIFF container.
//! They are supported by locating the `data` chunk and decoding it as a plain SMF.

use crate::prelude::*;

/// Iterates over little-endian RIFF chunks, stopping at the first incomplete chunk header.
struct RiffChunks<'a>(Reader<'a>);
impl<'a> Iterator for RiffChunks<'a> {
    type Item = (&'a [u8], &'a [u8]);
    fn next(&mut self) -> Option<(&'a [u8], &'a [u8])> {
        let id = self.0.read_slice(4).ok()?;
        let mut len = [0; 4];
        len.copy_from_slice(self.0.read_slice(4).ok()?);
        let len = u32::from_le_bytes(len) as usize;
        let data = self.0.read_slice(len.min(self.0.remaining())).ok()?;
        if len % 2 == 1 {
            //Chunks are padded to an even size
            let _pad = self.0.read_u8();
        }
        Some((id, data))
    }
}

/// Get the SMF data wrapped in an RMID file, or `None` if `raw` is not an RMID file.
pub(crate) fn unwrap(raw: &[u8]) -> Option<&[u8]> {
    let (id, riff) = RiffChunks(Reader::new(raw)).next()?;
    if id != b"RIFF" {
        return None;
    }
    let mut riff = Reader::new(riff);
    if riff.read_slice(4).ok()? != b"RMID" {
        return None;
    }
    RiffChunks(riff)
        .find(|(id, _)| *id == b"data")
        .map(|(_, data)| data)
}
