use miette::{bail, Result};

/// Assembled object code: an origin plus the words to place there, in
/// program order. On disk this is a stream of big-endian 16-bit words with
/// the origin first, matching what `Core::load_obj` consumes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ObjFile {
    orig: u16,
    words: Vec<u16>,
}

impl ObjFile {
    pub fn new(orig: u16, words: Vec<u16>) -> Self {
        ObjFile { orig, words }
    }

    pub fn orig(&self) -> u16 {
        self.orig
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word stream for the loader: origin first, then the program words.
    pub fn to_words(&self) -> Vec<u16> {
        let mut out = Vec::with_capacity(self.words.len() + 1);
        out.push(self.orig);
        out.extend_from_slice(&self.words);
        out
    }

    pub fn from_words(words: &[u16]) -> Result<Self> {
        let Some((&orig, rest)) = words.split_first() else {
            bail!("Object code is empty");
        };
        Ok(ObjFile::new(orig, rest.to_vec()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_words()
            .into_iter()
            .flat_map(u16::to_be_bytes)
            .collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            bail!("Object file is not aligned to 16 bits");
        }
        let words: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Self::from_words(&words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip() {
        let obj = ObjFile::new(0x3000, vec![0x1234, 0xFFFF, 0x0000]);
        let bytes = obj.to_bytes();
        assert_eq!(bytes[..4], [0x30, 0x00, 0x12, 0x34]);
        assert_eq!(ObjFile::from_bytes(&bytes).unwrap(), obj);
    }

    #[test]
    fn words_round_trip() {
        let obj = ObjFile::new(0x0200, vec![0b0001_010_111_1_00111]);
        assert_eq!(obj.to_words(), vec![0x0200, 0b0001_010_111_1_00111]);
        assert_eq!(ObjFile::from_words(&obj.to_words()).unwrap(), obj);
    }

    #[test]
    fn misaligned_bytes_rejected() {
        assert!(ObjFile::from_bytes(&[0x30, 0x00, 0x12]).is_err());
    }

    #[test]
    fn empty_stream_rejected() {
        assert!(ObjFile::from_words(&[]).is_err());
        assert!(ObjFile::from_bytes(&[]).is_err());
    }
}
