/*!
 * Procfs Counters
 * Token parsing for /proc/self/status and /proc/self/statm
 */

use crate::core::limits::{DEFAULT_PAGE_SIZE, KB};
use crate::core::types::{Bytes, ProcessMemory};

/// Value token following `key` in a whitespace separated table, scaled by
/// `units`
///
/// `/proc/self/status` lines look like `VmRSS:    10240 kB`, so the value is
/// simply the next token after the key.
pub fn token_value(text: &str, key: &str, units: Bytes) -> Option<Bytes> {
    let mut tokens = text.split_whitespace();
    tokens.find(|token| *token == key)?;
    tokens
        .next()?
        .parse::<Bytes>()
        .ok()
        .map(|value| value.saturating_mul(units))
}

/// Resident and swapped memory from a status table; both must be present
pub fn parse_status(text: &str) -> Option<ProcessMemory> {
    Some(ProcessMemory {
        resident_bytes: token_value(text, "VmRSS:", KB)?,
        swap_bytes: token_value(text, "VmSwap:", KB)?,
    })
}

/// Private resident memory, `(resident - shared) * page_size`, from statm
pub fn parse_statm(text: &str, page_size: Bytes) -> Option<Bytes> {
    let mut fields = text.split_whitespace().skip(1);
    let resident = fields.next()?.parse::<Bytes>().ok()?;
    let shared = fields.next()?.parse::<Bytes>().ok()?;
    Some(resident.saturating_sub(shared).saturating_mul(page_size))
}

/// System page size in bytes
pub fn page_size() -> Bytes {
    // SAFETY: sysconf has no preconditions and only reads system configuration
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as Bytes
    } else {
        DEFAULT_PAGE_SIZE
    }
}
