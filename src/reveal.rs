//! Typewriter text reveal.

use crate::surface::TextPanel;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Reveal `text` into `panel` one character at a time at a fixed interval.
///
/// Abandonment is handled by the caller aborting the task and writing the
/// full text itself; an abandoned reveal jumps to the final state, it is
/// never resumed and never blanked.
pub(crate) async fn reveal_text(panel: Arc<dyn TextPanel>, text: String, interval: Duration) {
    panel.clear();
    for ch in text.chars() {
        sleep(interval).await;
        panel.append_char(ch);
    }
}
