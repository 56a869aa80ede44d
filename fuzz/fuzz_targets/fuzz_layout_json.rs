#![no_main]

use libfuzzer_sys::fuzz_target;
use panelgrid_layout::{GRID_COLUMNS, GridLayout, convert};

fuzz_target!(|data: &[u8]| {
    // Arbitrary stored layouts, however malformed, must convert without panicking.
    let Ok(layout) = serde_json::from_slice::<GridLayout>(data) else {
        return;
    };
    if layout.rows().len() > 64 {
        return;
    }

    let positions = convert(&layout);

    for (i, a) in positions.iter().enumerate() {
        assert!(a.width >= 1, "zero-width placement");
        assert!(a.height >= 1, "zero-height placement");
        assert!(a.x + a.width <= GRID_COLUMNS, "placement past the grid edge");
        for b in &positions[i + 1..] {
            assert!(
                !a.footprint().intersects(&b.footprint()),
                "overlapping placements"
            );
        }
    }

    let _ = layout.invariant_report();
});
