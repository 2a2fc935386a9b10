//! Request path canonicalization
//!
//! The normalizer is the only defense against directory traversal: every
//! caller treats its output as root-relative and never looks at the raw
//! request path again.
//!
//! Rules:
//! - empty segments and `.` segments are dropped
//! - `..` drops itself and the nearest kept segment before it; with nothing
//!   left to drop it is discarded on its own, so a path can never climb
//!   above the root
//! - the leading `/` is stripped unless the whole result is `/`
//! - a trailing `/` (or a trailing `.`/`..`) is preserved as a trailing `/`,
//!   since directory resolution depends on it

/// Rewrite `buf` in place to its shortest equivalent form.
///
/// Returns the new length; `&buf[..len]` is the normalized path. Only whole
/// segments and separators are removed, so UTF-8 input stays valid UTF-8.
pub fn normalize_in_place(buf: &mut [u8]) -> usize {
    if buf.is_empty() {
        return 0;
    }

    let len = buf.len();
    let mut kept: Vec<(usize, usize)> = Vec::new();
    let mut has_separator = false;
    let mut trailing_dir = false;
    let mut start = 0;

    while start <= len {
        let end = buf[start..]
            .iter()
            .position(|&b| b == b'/')
            .map(|offset| start + offset)
            .unwrap_or(len);

        let segment = &buf[start..end];
        let is_last = end == len;

        match segment {
            b"" | b"." => {
                if is_last {
                    trailing_dir = true;
                }
            }
            b".." => {
                kept.pop();
                if is_last {
                    trailing_dir = true;
                }
            }
            _ => kept.push((start, end)),
        }

        if end < len {
            has_separator = true;
        }
        start = end + 1;
    }

    // Segments only ever move left, so copy_within never overwrites unread input.
    let mut write = 0;
    for (index, &(seg_start, seg_end)) in kept.iter().enumerate() {
        if index > 0 {
            buf[write] = b'/';
            write += 1;
        }
        buf.copy_within(seg_start..seg_end, write);
        write += seg_end - seg_start;
    }

    if kept.is_empty() {
        if has_separator {
            buf[0] = b'/';
            return 1;
        }
        return 0;
    }

    if trailing_dir {
        buf[write] = b'/';
        write += 1;
    }

    write
}

/// Owned convenience wrapper around [`normalize_in_place`].
pub fn normalize(path: &str) -> String {
    let mut bytes = path.as_bytes().to_vec();
    let len = normalize_in_place(&mut bytes);
    bytes.truncate(len);
    match String::from_utf8(bytes) {
        Ok(normalized) => normalized,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// True when a normalized path names a directory (ends with `/`).
pub fn is_directory_path(normalized: &str) -> bool {
    normalized.ends_with('/')
}

/// Iterate the non-empty segments of a normalized path.
pub fn segments(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split('/').filter(|s| !s.is_empty())
}
