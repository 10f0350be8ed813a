use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Chain, Cursor, Read};

type ChainReader = Chain<Cursor<Vec<u8>>, File>;
type GzipReader = BufReader<MultiGzDecoder<ChainReader>>;
type ZstdReader = BufReader<zstd::Decoder<'static, BufReader<ChainReader>>>;

/// Streaming decompression wrapper that implements BufRead
/// Detects gzip (1F 8B 08) and zstd (28 B5 2F FD) compression using magic bytes
pub enum DecompressionReader {
    /// Gzip decompression, including multi-member files
    Gzip(GzipReader),
    /// Zstd decompression - decoder requires BufRead input and provides Read output
    Zstd(ZstdReader),
}

// Manually implement Debug since zstd::Decoder doesn't implement it
impl std::fmt::Debug for DecompressionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecompressionReader::Gzip(_) => write!(f, "DecompressionReader::Gzip"),
            DecompressionReader::Zstd(_) => write!(f, "DecompressionReader::Zstd"),
        }
    }
}

impl BufRead for DecompressionReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            DecompressionReader::Gzip(reader) => reader.fill_buf(),
            DecompressionReader::Zstd(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            DecompressionReader::Gzip(reader) => reader.consume(amt),
            DecompressionReader::Zstd(reader) => reader.consume(amt),
        }
    }
}

impl Read for DecompressionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DecompressionReader::Gzip(reader) => reader.read(buf),
            DecompressionReader::Zstd(reader) => reader.read(buf),
        }
    }
}

impl DecompressionReader {
    /// Wrap an already opened file, sniffing the first bytes for the format.
    /// Uncompressed input is rejected: the loader only accepts compressed batches.
    pub fn from_file(mut file: File) -> io::Result<Self> {
        let mut head = [0u8; 4];
        let n = read_head(&mut file, &mut head)?;

        // Put the read bytes back in front using a cursor chain
        let prefix = Cursor::new(head[..n].to_vec());
        let chained = prefix.chain(file);

        let is_gzip = n >= 3 && head[0] == 0x1F && head[1] == 0x8B && head[2] == 0x08;
        let is_zstd =
            n >= 4 && head[0] == 0x28 && head[1] == 0xB5 && head[2] == 0x2F && head[3] == 0xFD;

        if is_gzip {
            Ok(DecompressionReader::Gzip(BufReader::new(
                MultiGzDecoder::new(chained),
            )))
        } else if is_zstd {
            let decoder = zstd::Decoder::new(chained)?;
            Ok(DecompressionReader::Zstd(BufReader::new(decoder)))
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a gzip or zstd stream (bad magic bytes)",
            ))
        }
    }
}

// A single read() may return fewer bytes than available on some files
fn read_head(file: &mut File, head: &mut [u8; 4]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
