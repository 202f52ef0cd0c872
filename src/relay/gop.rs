use std::sync::Arc;

use tokio::sync::watch;

use crate::av::Packet;

/// An immutable view of the GOP cache. Readers either observe the
/// previous snapshot or the new one, never a partial mutation.
#[derive(Clone)]
pub struct GopSnapshot {
    /// Monotone per-stream put counter
    pub seq: u64,
    pub packets: Arc<Vec<Packet>>,
}

impl Default for GopSnapshot {
    fn default() -> Self {
        GopSnapshot {
            seq: 0,
            packets: Arc::new(Vec::new()),
        }
    }
}

/// The publisher-owned GOP buffer. A keyframe resets it to just that
/// keyframe, anything else appends; each put publishes a fresh snapshot
/// through the shared watch slot, which doubles as the subscribers' 1-slot
/// wake signal (coalesced wakes are harmless, the cursor catches up from
/// the sequence numbers).
pub struct GopCache {
    packets: Vec<Packet>,
    tx: Arc<watch::Sender<GopSnapshot>>,
}

impl GopCache {
    pub fn new(tx: Arc<watch::Sender<GopSnapshot>>) -> Self {
        GopCache {
            packets: Vec::new(),
            tx,
        }
    }

    pub fn put(&mut self, pkt: Packet) {
        if pkt.is_keyframe {
            self.packets.clear();
        }
        self.packets.push(pkt);

        let packets = Arc::new(self.packets.clone());
        // seq comes from the slot itself so it stays monotone across
        // publisher takeovers
        self.tx.send_modify(|snap| {
            snap.seq += 1;
            snap.packets = packets;
        });
    }
}

/// A subscriber's position in the stream, measured in sequence numbers
#[derive(Debug, Default)]
pub struct GopCursor {
    last_seq: u64,
}

impl GopCursor {
    /// Packets to emit for this wake: the last `min(delta, len)` of the
    /// snapshot. Falling more than one GOP behind resumes from the
    /// snapshot head, which is the newest keyframe.
    pub fn advance(&mut self, snap: &GopSnapshot) -> Vec<Packet> {
        let delta = snap.seq.saturating_sub(self.last_seq);
        self.last_seq = snap.seq;

        let n = (delta as usize).min(snap.packets.len());
        snap.packets[snap.packets.len() - n..].to_vec()
    }
}
