// Logical/physical pixel conversion. Every DPI scaling computation in the
// crate goes through these two functions so all handlers truncate the same
// way. DPI values come from the resolver, which never reports zero.

/// Baseline DPI: one logical pixel equals one physical pixel at this density.
pub const BASELINE_DPI: u32 = 96;

/// Convert a dimension from physical to logical pixels.
pub fn physical_to_logical(dim: u32, dpi: u32) -> u32 {
    dim * BASELINE_DPI / dpi
}

/// Convert a dimension from logical to physical pixels.
pub fn logical_to_physical(dim: u32, dpi: u32) -> u32 {
    dim * dpi / BASELINE_DPI
}
