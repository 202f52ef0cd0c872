use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch, Notify};

use crate::av::{PacketReader, PacketWriter};
use crate::connection::{Conn, Prepare, Stage};
use crate::relay::gop::{GopCache, GopCursor, GopSnapshot};
use crate::relay::seqhdr::{SeqhdrMerge, SeqhdrSplit};
use crate::Result;

struct PublisherSlot {
    cancel: Arc<Notify>,
}

/// One relayed stream: the snapshot slot every subscriber watches and the
/// single-occupancy publisher slot.
pub struct RelayStream {
    name: String,
    cache_tx: Arc<watch::Sender<GopSnapshot>>,
    publisher: Mutex<Option<PublisherSlot>>,
}

impl RelayStream {
    fn new(name: String) -> Self {
        let (tx, _rx) = watch::channel(GopSnapshot::default());
        RelayStream {
            name,
            cache_tx: Arc::new(tx),
            publisher: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Watch the stream's snapshot slot directly (demos, tests)
    pub fn snapshot_rx(&self) -> watch::Receiver<GopSnapshot> {
        self.cache_tx.subscribe()
    }

    /// Run a publisher until it errors, ends, or is displaced by a
    /// takeover. The previous occupant of the slot is cancelled; its read
    /// loop observes that between packets and exits.
    pub async fn publish<R>(&self, reader: &mut R) -> Result<()>
    where
        R: PacketReader + ?Sized,
    {
        let cancel = Arc::new(Notify::new());
        {
            let mut slot = self.publisher.lock().expect("publisher lock");
            if let Some(old) = slot.replace(PublisherSlot {
                cancel: cancel.clone(),
            }) {
                info!("taking over publisher slot for {}", self.name);
                old.cancel.notify_one();
            }
        }

        let mut cache = GopCache::new(self.cache_tx.clone());
        let mut merge = SeqhdrMerge::new();
        let result = loop {
            tokio::select! {
                _ = cancel.notified() => {
                    debug!("publisher for {} displaced", self.name);
                    break Ok(());
                }
                res = reader.read_packet() => {
                    match res {
                        Ok(pkt) => {
                            if let Some(pkt) = merge.merge(pkt) {
                                cache.put(pkt);
                            }
                        }
                        Err(e) if e.is_eof() => {
                            debug!("publisher for {} ended", self.name);
                            break Ok(());
                        }
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        // release the slot, unless a takeover already owns it
        let mut slot = self.publisher.lock().expect("publisher lock");
        if let Some(cur) = slot.as_ref() {
            if Arc::ptr_eq(&cur.cancel, &cancel) {
                *slot = None;
            }
        }
        result
    }

    /// Run a subscriber until its writer fails or `closed` signals. Each
    /// wake reads the current snapshot and advances the cursor; sequence
    /// headers are injected whenever the sideband changes.
    pub async fn subscribe<W>(
        &self,
        writer: &mut W,
        closed: &mut mpsc::Receiver<()>,
    ) -> Result<()>
    where
        W: PacketWriter + ?Sized,
    {
        let mut rx = self.cache_tx.subscribe();
        let mut cursor = GopCursor::default();
        let mut split = SeqhdrSplit::new();

        loop {
            let snap = rx.borrow_and_update().clone();
            let pkts = cursor.advance(&snap);

            if pkts.is_empty() {
                writer.flush().await?;
                tokio::select! {
                    _ = closed.recv() => {
                        debug!("subscriber of {} closed", self.name);
                        return Ok(());
                    }
                    res = rx.changed() => {
                        if res.is_err() {
                            return Ok(());
                        }
                    }
                }
                continue;
            }

            for pkt in pkts {
                for out in split.split(&pkt) {
                    writer.write_packet(out).await?;
                }
            }
        }
    }
}

struct Entry {
    stream: Arc<RelayStream>,
    refs: usize,
}

/// Stream table keyed by URL path. Entries are reference counted by
/// attach/detach so a stream lives exactly as long as its last
/// participant.
#[derive(Default)]
pub struct RelayHub {
    streams: Mutex<HashMap<String, Entry>>,
}

impl RelayHub {
    pub fn new() -> Self {
        RelayHub::default()
    }

    pub fn attach(&self, name: &str) -> Arc<RelayStream> {
        let mut streams = self.streams.lock().expect("stream table lock");
        let entry = streams.entry(name.to_string()).or_insert_with(|| Entry {
            stream: Arc::new(RelayStream::new(name.to_string())),
            refs: 0,
        });
        entry.refs += 1;
        entry.stream.clone()
    }

    pub fn detach(&self, name: &str) {
        let mut streams = self.streams.lock().expect("stream table lock");
        if let Some(entry) = streams.get_mut(name) {
            entry.refs -= 1;
            if entry.refs == 0 {
                streams.remove(name);
            }
        }
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().expect("stream table lock").len()
    }

    /// Drive one accepted connection through the relay: publishers feed
    /// the stream's GOP cache, subscribers follow it. Rejected
    /// connections (pub_play_err set by the caller) get their failure
    /// status before the socket closes.
    pub async fn handle_conn<S>(&self, mut conn: Conn<S>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if conn.pub_play_err.is_some() {
            conn.write_pub_play_err_before_close().await;
            return;
        }

        let path = conn.stream_path();
        let stream = self.attach(&path);

        if conn.publishing {
            match conn.prepare(Stage::CommandDone, Prepare::Reading).await {
                Ok(()) => {
                    if let Err(e) = stream.publish(&mut conn).await {
                        debug!("publisher for {} failed: {}", path, e);
                    }
                }
                Err(e) => debug!("publisher setup for {} failed: {}", path, e),
            }
        } else {
            match conn.prepare(Stage::DataStart, Prepare::Writing).await {
                Ok(()) => {
                    let mut closed = conn.take_close_notify().expect("close notify taken once");
                    if let Err(e) = stream.subscribe(&mut conn, &mut closed).await {
                        debug!("subscriber of {} detached: {}", path, e);
                    }
                }
                Err(e) => debug!("subscriber setup for {} failed: {}", path, e),
            }
        }

        self.detach(&path);
    }
}
