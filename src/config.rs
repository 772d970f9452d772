//! Build-wide numeric constants shared by the I/O engine and the CLI.

// ---------------------------------------------------------------------------
// Size units
// ---------------------------------------------------------------------------

pub const KB: usize = 1 << 10;
pub const MB: usize = 1 << 20;
pub const GB: usize = 1 << 30;

// ---------------------------------------------------------------------------
// Worker limits
// ---------------------------------------------------------------------------

/// Upper bound on `--threads`. Requests above this are clamped with a notice.
pub const NB_WORKERS_MAX: u32 = 200;

/// Returns the default number of compression worker threads for `-T0`.
///
/// Uses the available physical core count and reserves a small fraction
/// (one core, plus one per eight) for the rest of the system.
pub fn default_nb_workers() -> u32 {
    let nb_cores = num_cpus::get_physical() as u32;
    let spared = 1 + (nb_cores >> 3);
    if nb_cores <= spared {
        1
    } else {
        nb_cores - spared
    }
}

// ---------------------------------------------------------------------------
// Window-log bounds
// ---------------------------------------------------------------------------

/// Largest reference-window log the decoder side will ever accept.
#[cfg(target_pointer_width = "64")]
pub const WINDOWLOG_MAX: u32 = 31;
#[cfg(not(target_pointer_width = "64"))]
pub const WINDOWLOG_MAX: u32 = 30;

/// Smallest valid reference-window log.
pub const WINDOWLOG_MIN: u32 = 10;

/// Window log pinned when adaptive mode is active and the user gave neither
/// an explicit window log nor long-distance matching. Keeping the window
/// stable means live level changes never alter the frame's decode memory.
pub const ADAPT_WINDOWLOG_DEFAULT: u32 = 23;

// ---------------------------------------------------------------------------
// Dictionary limits
// ---------------------------------------------------------------------------

/// Dictionary files larger than this are refused outside patch-from mode.
pub const DICTSIZE_MAX: usize = 32 * MB;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_nb_workers_at_least_one() {
        assert!(default_nb_workers() >= 1);
        assert!(default_nb_workers() <= NB_WORKERS_MAX);
    }

    #[test]
    fn window_log_bounds_ordered() {
        assert!(WINDOWLOG_MIN < ADAPT_WINDOWLOG_DEFAULT);
        assert!(ADAPT_WINDOWLOG_DEFAULT < WINDOWLOG_MAX);
    }
}
