//! HTTP Range request parsing module
//!
//! Single `bytes` ranges only (RFC 7233). Multi-range and malformed headers
//! are ignored and the whole representation is sent.

/// Inclusive byte range within a representation of known length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub const fn len(self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value
    pub fn content_range(self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// What to send for a given `Range` header
#[derive(Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable Range header: send everything with 200
    Full,
    /// Send this slice with 206
    Partial(ByteRange),
    /// Range lies outside the representation: 416
    Unsatisfiable,
}

/// Resolve a `Range` header against a representation of `total` bytes
///
/// Supported forms: `bytes=start-end`, `bytes=start-`, `bytes=-suffix`.
pub fn parse_range_header(range_header: Option<&str>, total: u64) -> RangeOutcome {
    let Some(spec) = range_header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    if spec.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = spec.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix: the final N bytes
        return match last.parse::<u64>() {
            Ok(0) => RangeOutcome::Unsatisfiable,
            Ok(_) if total == 0 => RangeOutcome::Unsatisfiable,
            Ok(n) => RangeOutcome::Partial(ByteRange {
                start: total.saturating_sub(n),
                end: total - 1,
            }),
            Err(_) => RangeOutcome::Full,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeOutcome::Full;
    };
    let end = if last.is_empty() {
        None
    } else {
        match last.parse::<u64>() {
            Ok(e) => Some(e),
            Err(_) => return RangeOutcome::Full,
        }
    };

    if start >= total {
        return RangeOutcome::Unsatisfiable;
    }
    let end = end.map_or(total - 1, |e| e.min(total - 1));
    if start > end {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Partial(ByteRange { start, end })
}
