//! The calendar seam: turning a story timestamp into display text.
//!
//! Calendar systems live with the host. The engine only needs a pure formatter to
//! keep `currentDate` in step with `currentTime`.

/// Formats story time (minutes on the story calendar) for display.
pub trait TimeFormatter: Send + Sync {
    fn format_time(&self, story_time: i64) -> String;
}

impl<F> TimeFormatter for F
where
    F: Fn(i64) -> String + Send + Sync,
{
    fn format_time(&self, story_time: i64) -> String {
        self(story_time)
    }
}

/// Fallback formatter used when no calendar is configured: the raw minute count.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinuteFormatter;

impl TimeFormatter for MinuteFormatter {
    fn format_time(&self, story_time: i64) -> String {
        story_time.to_string()
    }
}
