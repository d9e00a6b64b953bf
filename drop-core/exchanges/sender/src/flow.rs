use roomdropx_common::{ChannelClosed, DirectChannel};
use tracing::debug;

/// Hysteresis gate on a channel's outstanding bytes.
///
/// Sending pauses while more than `high_watermark` bytes are buffered and
/// resumes once the channel has drained to `low_watermark` or less.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowControl {
    pub high_watermark: u64,
    pub low_watermark: u64,
}

impl FlowControl {
    /// Resolves once another chunk may be queued on `channel`.
    ///
    /// The buffered amount is re-checked after every wake-up, so a drain
    /// immediately followed by a refill keeps the caller parked.
    pub async fn ready<C: DirectChannel>(
        &self,
        channel: &C,
    ) -> Result<(), ChannelClosed> {
        loop {
            let buffered = channel.buffered_amount();
            if buffered <= self.high_watermark {
                return Ok(());
            }
            debug!(
                "Pausing: {} bytes buffered (high {}), waiting for {}",
                buffered, self.high_watermark, self.low_watermark
            );
            channel
                .wait_buffered_at_most(self.low_watermark)
                .await?;
        }
    }
}
