//! Notifier that writes the summary to the log.

use tracing::info;

use crate::domain::error::EodTraderError;
use crate::ports::notify_port::NotifierPort;

#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotifierPort for LogNotifier {
    fn send(&self, text: &str) -> Result<(), EodTraderError> {
        for line in text.lines() {
            info!("[notify] {}", line);
        }
        Ok(())
    }
}
