//! Per-image filter graphs.
//!
//! Each graph turns one looped still image into 1920x1080 frames. There are
//! four treatments: plain letterbox, letterbox + zoom, blurred background,
//! and blurred background + zoom. Zoom only ever touches the foreground; the
//! blurred backdrop stays static.

use super::types::{OUTPUT_HEIGHT, OUTPUT_WIDTH, ZOOM_GAIN};

/// boxblur radius:power for the background copy
const BACKGROUND_BLUR: &str = "boxblur=80:10";

fn fit_and_pad() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black",
        w = OUTPUT_WIDTH,
        h = OUTPUT_HEIGHT
    )
}

fn zoom_ramp(frame_count: u32, fps: u32) -> String {
    format!(
        "zoompan=z='1+{gain}*on/{n}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={n}:s={w}x{h}:fps={fps}",
        gain = ZOOM_GAIN,
        n = frame_count,
        w = OUTPUT_WIDTH,
        h = OUTPUT_HEIGHT,
        fps = fps
    )
}

fn blurred_backdrop() -> String {
    format!(
        "[bg]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},{blur}[blur]",
        w = OUTPUT_WIDTH,
        h = OUTPUT_HEIGHT,
        blur = BACKGROUND_BLUR
    )
}

/// Build the `-vf` expression for one image.
///
/// `frame_count` is the clip length in frames; it only matters when `zoom`
/// is set, where the ramp reaches full gain on the last frame.
pub fn build_filter_graph(zoom: bool, blur_background: bool, frame_count: u32, fps: u32) -> String {
    match (zoom, blur_background) {
        (false, false) => fit_and_pad(),
        (true, false) => format!("{},{}", fit_and_pad(), zoom_ramp(frame_count, fps)),
        (false, true) => format!(
            "split[bg][fg];{};[fg]scale='min({w},iw)':'min({h},ih)':force_original_aspect_ratio=decrease[img];[blur][img]overlay=(W-w)/2:(H-h)/2",
            blurred_backdrop(),
            w = OUTPUT_WIDTH,
            h = OUTPUT_HEIGHT
        ),
        (true, true) => format!(
            "split[bg][fg];{};[fg]scale=-1:{h}:force_original_aspect_ratio=decrease,{}[zoomed];[blur][zoomed]overlay=(W-w)/2:(H-h)/2:shortest=1",
            blurred_backdrop(),
            zoom_ramp(frame_count, fps),
            h = OUTPUT_HEIGHT
        ),
    }
}
