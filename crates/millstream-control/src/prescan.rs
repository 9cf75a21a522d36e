//! Dry-run prescan for total job length
//!
//! Interprets the whole job without executing anything, summing the length
//! of every primitive the runtime would emit. The result feeds percent and
//! ETA reporting.
//!
//! The prescan consumes its own streamer and interpreter, so its modal
//! state cannot leak into (or be observed by) the runtime session; the
//! runtime builds fresh instances. Given identical input and identical
//! segmentation configuration, the prescan total is bit-for-bit equal to
//! the sum of lengths the runtime executes.

use millstream_core::Result;
use millstream_gcode::{parser, Interpreter};

use crate::streamer::GcodeStreamer;

/// Sum the `length_mm` of every primitive the job would emit.
///
/// No executor is invoked and no soft limits are checked; interpretation
/// errors surface exactly as they would at runtime.
pub fn prescan_total_length(
    mut streamer: GcodeStreamer,
    mut interpreter: Interpreter,
) -> Result<f64> {
    let mut total = 0.0;
    while let Some((number, text)) = streamer.next_line()? {
        let Some(parsed) = parser::parse_line(&text, number)? else {
            continue;
        };
        for primitive in interpreter.interpret(&parsed)? {
            total += primitive.length_mm;
        }
    }
    Ok(total)
}
