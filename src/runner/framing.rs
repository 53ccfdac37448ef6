use super::options::Granularity;

/// Splits raw pipe reads into the chunks handed to the sink.
#[derive(Debug)]
pub(crate) enum ChunkFramer {
    /// Holds the bytes after the last newline until the line completes
    Line { pending: Vec<u8> },
    /// Reads are already capped at the chunk size, pass them through
    Bytes,
}

impl ChunkFramer {
    pub(crate) fn new(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Line => ChunkFramer::Line {
                pending: Vec::new(),
            },
            Granularity::Bytes(_) => ChunkFramer::Bytes,
        }
    }

    pub(crate) fn push(&mut self, data: &[u8], mut emit: impl FnMut(&[u8])) {
        match self {
            ChunkFramer::Bytes => {
                if !data.is_empty() {
                    emit(data);
                }
            }
            ChunkFramer::Line { pending } => {
                // `pending` never contains a newline, only `data` needs scanning
                let mut rest = data;
                while let Some(offset) = rest.iter().position(|&b| b == b'\n') {
                    let (line, tail) = rest.split_at(offset + 1);
                    if pending.is_empty() {
                        emit(line);
                    } else {
                        pending.extend_from_slice(line);
                        emit(pending);
                        pending.clear();
                    }
                    rest = tail;
                }
                pending.extend_from_slice(rest);
            }
        }
    }

    /// End-of-stream: flush a trailing partial line, if any.
    pub(crate) fn finish(&mut self, mut emit: impl FnMut(&[u8])) {
        if let ChunkFramer::Line { pending } = self {
            if !pending.is_empty() {
                emit(pending);
                pending.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(granularity: Granularity, reads: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut framer = ChunkFramer::new(granularity);
        let mut chunks = Vec::new();
        for read in reads {
            framer.push(read, |chunk| chunks.push(chunk.to_vec()));
        }
        framer.finish(|chunk| chunks.push(chunk.to_vec()));
        chunks
    }

    #[test]
    fn test_lines_split_within_one_read() {
        let chunks = collect(Granularity::Line, &[b"a\nb\nc"]);
        assert_eq!(chunks, vec![b"a\n".to_vec(), b"b\n".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_line_spanning_reads_is_held() {
        let mut framer = ChunkFramer::new(Granularity::Line);
        let mut chunks: Vec<Vec<u8>> = Vec::new();

        framer.push(b"hel", |chunk| chunks.push(chunk.to_vec()));
        assert!(chunks.is_empty());

        framer.push(b"lo\nwor", |chunk| chunks.push(chunk.to_vec()));
        assert_eq!(chunks, vec![b"hello\n".to_vec()]);

        framer.push(b"ld\n", |chunk| chunks.push(chunk.to_vec()));
        framer.finish(|chunk| chunks.push(chunk.to_vec()));
        assert_eq!(chunks, vec![b"hello\n".to_vec(), b"world\n".to_vec()]);
    }

    #[test]
    fn test_empty_lines_are_delivered() {
        let chunks = collect(Granularity::Line, &[b"\n\nx\n"]);
        assert_eq!(chunks, vec![b"\n".to_vec(), b"\n".to_vec(), b"x\n".to_vec()]);
    }

    #[test]
    fn test_bytes_pass_through() {
        let granularity = Granularity::bytes(4).unwrap();
        let chunks = collect(granularity, &[b"0123", b"45", b"", b"6789"]);
        assert_eq!(
            chunks,
            vec![b"0123".to_vec(), b"45".to_vec(), b"6789".to_vec()]
        );
    }

    #[test]
    fn test_long_line_is_framed_in_linear_time() {
        let mut framer = ChunkFramer::new(Granularity::Line);
        let mut chunks: Vec<usize> = Vec::new();
        let read = vec![b'x'; 8 * 1024];

        // 32 MiB without a newline; rescanning the held bytes on every read would take minutes
        let started = std::time::Instant::now();
        for _ in 0..4096 {
            framer.push(&read, |chunk| chunks.push(chunk.len()));
        }
        framer.push(b"\nnext", |chunk| chunks.push(chunk.len()));
        framer.finish(|chunk| chunks.push(chunk.len()));

        assert_eq!(chunks, vec![32 * 1024 * 1024 + 1, 4]);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_finish_without_data() {
        assert!(collect(Granularity::Line, &[]).is_empty());
    }
}
